use crate::models::{Book, Branch, BranchId, Reward, User};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, RwLock},
};

// All collections sit behind a single lock. A write acquisition is the
// store's transaction primitive: every multi-document mutation the workflow
// needs (availability flip + list append, list move + point credit) runs
// inside one critical section and can never interleave with another writer.
#[derive(Debug, Default)]
struct Collections {
    users: HashMap<String, User>,
    books: HashMap<String, Book>,
    branches: HashMap<BranchId, Branch>,
    rewards: HashMap<String, Reward>,
    // token -> user id
    sessions: HashMap<String, String>,
}

/// Document-store boundary. Stands in for the managed database the mobile
/// app talked to; exposes get-by-id, get-all, membership queries, set, and
/// atomic update closures over whole documents.
#[derive(Debug, Default, Clone)]
pub struct Store {
    inner: Arc<RwLock<Collections>>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Seed {
    pub users: Vec<User>,
    pub books: Vec<Book>,
    pub perpus: Vec<Branch>,
    pub rewards: Vec<Reward>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn load_seed(&self, path: &Path) -> Result<()> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read seed file {}", path.display()))?;
        let seed: Seed = serde_json::from_str(&text).context("malformed seed file")?;
        self.apply_seed(seed)
    }

    pub fn apply_seed(&self, seed: Seed) -> Result<()> {
        let mut data = self.inner.write().ok().context("poisoned")?;
        for user in seed.users {
            data.users.insert(user.id.clone(), user);
        }
        for book in seed.books {
            data.books.insert(book.id.clone(), book);
        }
        for branch in seed.perpus {
            data.branches.insert(branch.id, branch);
        }
        for reward in seed.rewards {
            data.rewards.insert(reward.id.clone(), reward);
        }
        tracing::info!(
            users = data.users.len(),
            books = data.books.len(),
            branches = data.branches.len(),
            rewards = data.rewards.len(),
            "seed applied"
        );
        Ok(())
    }

    pub async fn user_get(&self, id: &str) -> Result<Option<User>> {
        let data = self.inner.read().ok().context("poisoned")?;
        Ok(data.users.get(id).cloned())
    }

    pub async fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        let data = self.inner.read().ok().context("poisoned")?;
        Ok(data.users.values().find(|user| user.email == email).cloned())
    }

    pub async fn user_set(&self, user: User) -> Result<()> {
        let mut data = self.inner.write().ok().context("poisoned")?;
        data.users.insert(user.id.clone(), user);
        Ok(())
    }

    pub async fn users_all(&self) -> Result<Vec<User>> {
        let data = self.inner.read().ok().context("poisoned")?;
        Ok(data.users.values().cloned().collect())
    }

    /// Atomic read-modify-write of one user document.
    pub async fn user_update<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut User) -> T,
    ) -> Result<T> {
        let mut data = self.inner.write().ok().context("poisoned")?;
        let user = data.users.get_mut(id).context("user not found")?;
        Ok(f(user))
    }

    /// Atomic mutation of one user and one book together. This is the
    /// conditional-write step the reserve and return transitions need: the
    /// availability check, the flip, and the list change all commit or none
    /// do, so two racing reserves can never both observe a free copy.
    pub async fn user_book_transaction<T>(
        &self,
        user_id: &str,
        book_id: &str,
        f: impl FnOnce(&mut User, &mut Book) -> T,
    ) -> Result<T> {
        let mut data = self.inner.write().ok().context("poisoned")?;
        let Collections { users, books, .. } = &mut *data;
        let user = users.get_mut(user_id).context("user not found")?;
        let book = books.get_mut(book_id).context("book not found")?;
        Ok(f(user, book))
    }

    pub async fn book_get(&self, id: &str) -> Result<Option<Book>> {
        let data = self.inner.read().ok().context("poisoned")?;
        Ok(data.books.get(id).cloned())
    }

    pub async fn books_all(&self) -> Result<Vec<Book>> {
        let data = self.inner.read().ok().context("poisoned")?;
        let mut books: Vec<_> = data.books.values().cloned().collect();
        books.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(books)
    }

    /// Membership query over branch ids. Unresolved ids are skipped, not
    /// reported.
    pub async fn branches_get(&self, ids: &[BranchId]) -> Result<Vec<Branch>> {
        let data = self.inner.read().ok().context("poisoned")?;
        Ok(ids
            .iter()
            .filter_map(|id| data.branches.get(id))
            .cloned()
            .collect())
    }

    pub async fn rewards_all(&self) -> Result<Vec<Reward>> {
        let data = self.inner.read().ok().context("poisoned")?;
        let mut rewards: Vec<_> = data.rewards.values().cloned().collect();
        rewards.sort_by(|a, b| a.cost.cmp(&b.cost));
        Ok(rewards)
    }

    pub async fn reward_get(&self, id: &str) -> Result<Option<Reward>> {
        let data = self.inner.read().ok().context("poisoned")?;
        Ok(data.rewards.get(id).cloned())
    }

    pub async fn session_put(&self, token: &str, user_id: &str) -> Result<()> {
        let mut data = self.inner.write().ok().context("poisoned")?;
        data.sessions.insert(token.to_string(), user_id.to_string());
        Ok(())
    }

    pub async fn session_get(&self, token: &str) -> Result<Option<String>> {
        let data = self.inner.read().ok().context("poisoned")?;
        Ok(data.sessions.get(token).cloned())
    }

    pub async fn session_delete(&self, token: &str) -> Result<()> {
        let mut data = self.inner.write().ok().context("poisoned")?;
        data.sessions.remove(token);
        Ok(())
    }
}
