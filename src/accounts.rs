use crate::models::User;
use crate::retry::RetryPolicy;
use crate::store::Store;
use anyhow::{bail, Context, Result};
use base64::Engine;
use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};

// Decoded profile pictures larger than this are refused.
const PICTURE_LIMIT: usize = 1024 * 1024;

/// User record store plus the session side of the identity provider. Every
/// operation takes the session token explicitly; there is no ambient
/// current-user state.
#[derive(Debug, Clone)]
pub struct Accounts {
    store: Store,
    retry: RetryPolicy,
}

#[derive(Debug, Default, Clone)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub picture: Option<String>,
}

impl Accounts {
    pub fn new(store: Store, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    pub async fn user_create(
        &self,
        email: &str,
        password: &str,
        name: &str,
        phone: &str,
        address: &str,
    ) -> Result<User> {
        if self.store.user_by_email(email).await?.is_some() {
            bail!("email already registered");
        }

        let user = User {
            id: document_id(),
            email: email.to_string(),
            password: password.to_string(),
            name: name.to_string(),
            phone: phone.to_string(),
            address: address.to_string(),
            picture: None,
            created_at: Utc::now().naive_utc(),
            admin: false,
            books_to_be_picked_up: Vec::new(),
            currently_borrowing: Vec::new(),
            completed: Vec::new(),
            total_points: 0,
            points_history: Vec::new(),
        };
        self.store.user_set(user.clone()).await?;

        tracing::info!(user = %user.id, "user created");
        Ok(user)
    }

    /// None means bad credentials, not a failure.
    pub async fn user_login(&self, email: &str, password: &str) -> Result<Option<String>> {
        let Some(user) = self.store.user_by_email(email).await? else {
            return Ok(None);
        };
        if user.password != password {
            return Ok(None);
        }

        let mut buf = [0u8; 32];
        rand::rngs::OsRng.fill(&mut buf);
        let token = base64::engine::general_purpose::STANDARD.encode(buf);

        self.store.session_put(&token, &user.id).await?;
        Ok(Some(token))
    }

    pub async fn user_logout(&self, token: &str) -> Result<()> {
        self.store.session_delete(token).await
    }

    /// Resolve the session token to its user document. The read runs under
    /// the retry policy; an unknown token reads as None.
    pub async fn user_get(&self, token: &str) -> Result<Option<User>> {
        self.retry
            .run(|| async move {
                let Some(user_id) = self.store.session_get(token).await? else {
                    return Ok(None);
                };
                self.store.user_get(&user_id).await
            })
            .await
    }

    pub async fn user_update_profile(&self, token: &str, update: ProfileUpdate) -> Result<Option<User>> {
        let Some(user) = self.user_get(token).await? else {
            return Ok(None);
        };

        if let Some(picture) = update.picture.as_deref() {
            validate_picture(picture)?;
        }

        let updated = self
            .store
            .user_update(&user.id, |user| {
                if let Some(name) = update.name {
                    user.name = name;
                }
                if let Some(phone) = update.phone {
                    user.phone = phone;
                }
                if let Some(address) = update.address {
                    user.address = address;
                }
                if let Some(picture) = update.picture {
                    user.picture = Some(picture);
                }
                user.clone()
            })
            .await?;

        Ok(Some(updated))
    }

    pub async fn users_all(&self) -> Result<Vec<User>> {
        self.store.users_all().await
    }
}

fn document_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(20)
        .map(char::from)
        .collect()
}

// The media picker hands the picture over as a base64 data URI; anything
// else is refused before it reaches the user document.
fn validate_picture(uri: &str) -> Result<()> {
    let rest = uri
        .strip_prefix("data:image/")
        .context("picture must be an image data URI")?;
    let (_, payload) = rest
        .split_once(";base64,")
        .context("picture must be base64 encoded")?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .context("picture payload is not valid base64")?;
    if decoded.len() > PICTURE_LIMIT {
        bail!("picture too large");
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::{Accounts, ProfileUpdate};
    use crate::retry::RetryPolicy;
    use crate::store::Store;
    use base64::Engine;

    fn accounts() -> Accounts {
        Accounts::new(Store::new(), RetryPolicy::default())
    }

    #[actix_web::test]
    async fn test_create_login_get_logout() {
        let accounts = accounts();
        let created = accounts
            .user_create("alice@example.com", "secret", "Alice", "555-0101", "12 Elm St")
            .await
            .unwrap();
        assert_eq!(created.total_points, 0);
        assert!(created.books_to_be_picked_up.is_empty());

        assert!(accounts
            .user_login("alice@example.com", "wrong")
            .await
            .unwrap()
            .is_none());

        let token = accounts
            .user_login("alice@example.com", "secret")
            .await
            .unwrap()
            .unwrap();

        let user = accounts.user_get(&token).await.unwrap().unwrap();
        assert_eq!(user.id, created.id);

        accounts.user_logout(&token).await.unwrap();
        assert!(accounts.user_get(&token).await.unwrap().is_none());
    }

    #[actix_web::test]
    async fn test_duplicate_email_is_refused() {
        let accounts = accounts();
        accounts
            .user_create("bob@example.com", "pw", "Bob", "", "")
            .await
            .unwrap();
        assert!(accounts
            .user_create("bob@example.com", "pw2", "Bobby", "", "")
            .await
            .is_err());
    }

    #[actix_web::test]
    async fn test_profile_update_validates_picture() {
        let accounts = accounts();
        accounts
            .user_create("carol@example.com", "pw", "Carol", "", "")
            .await
            .unwrap();
        let token = accounts
            .user_login("carol@example.com", "pw")
            .await
            .unwrap()
            .unwrap();

        let payload = base64::engine::general_purpose::STANDARD.encode([1u8, 2, 3]);
        let uri = format!("data:image/png;base64,{payload}");
        let user = accounts
            .user_update_profile(
                &token,
                ProfileUpdate {
                    name: Some("Caroline".into()),
                    picture: Some(uri.clone()),
                    ..ProfileUpdate::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.name, "Caroline");
        assert_eq!(user.picture.as_deref(), Some(uri.as_str()));

        let bad = accounts
            .user_update_profile(
                &token,
                ProfileUpdate {
                    picture: Some("data:text/plain;base64,aGk=".into()),
                    ..ProfileUpdate::default()
                },
            )
            .await;
        assert!(bad.is_err());
    }
}
