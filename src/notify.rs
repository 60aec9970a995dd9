use crate::store::Store;
use anyhow::Result;
use chrono::{Duration, Utc};
use std::time::Duration as StdDuration;

/// Periodic due-date sweep. Stands in for the app's local-notification poll:
/// every tick it scans the borrowing lists and emits an event for entries
/// due inside the lookahead window. Dropping the poller cancels the task,
/// as the app did when its controlling screen went away.
#[derive(Debug)]
pub struct DuePoller {
    handle: actix_web::rt::task::JoinHandle<()>,
}

impl DuePoller {
    pub fn spawn(store: Store, interval: StdDuration, lookahead_days: i64) -> Self {
        let handle = actix_web::rt::spawn(async move {
            let mut ticker = actix_web::rt::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(err) = sweep(&store, lookahead_days).await {
                    tracing::warn!(error = %err, "due date sweep failed");
                }
            }
        });
        Self { handle }
    }

    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for DuePoller {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn sweep(store: &Store, lookahead_days: i64) -> Result<()> {
    let today = Utc::now().date_naive();
    let horizon = today + Duration::days(lookahead_days);
    let mut due = 0usize;

    for user in store.users_all().await? {
        for borrowed in &user.currently_borrowing {
            if borrowed.due_date <= horizon {
                due += 1;
                tracing::info!(
                    user = %user.id,
                    book = %borrowed.entry.book_id,
                    due = %borrowed.due_date,
                    "book due soon"
                );
            }
        }
    }

    tracing::debug!(due, "due date sweep finished");
    Ok(())
}

#[cfg(test)]
mod test {
    use super::{sweep, DuePoller};
    use crate::accounts::Accounts;
    use crate::models::{Book, BranchCopy};
    use crate::reserve::{PointPolicy, Reservations};
    use crate::retry::RetryPolicy;
    use crate::store::{Seed, Store};
    use chrono::Utc;
    use std::time::Duration;

    async fn store_with_borrowed_book() -> Store {
        let store = Store::new();
        store
            .apply_seed(Seed {
                books: vec![Book {
                    id: "b1".into(),
                    title: "Dune".into(),
                    genres: vec!["fantasy".into()],
                    pages: 412,
                    copies: vec![BranchCopy {
                        branch_id: 1,
                        available: true,
                    }],
                }],
                ..Seed::default()
            })
            .unwrap();

        let accounts = Accounts::new(store.clone(), RetryPolicy::default());
        let user = accounts
            .user_create("hana@example.com", "pw", "Hana", "", "")
            .await
            .unwrap();

        let reservations =
            Reservations::new(store.clone(), PointPolicy::Fixed(50), RetryPolicy::default());
        reservations
            .reserve(&user.id, "b1", 1, Utc::now().date_naive(), 2)
            .await
            .unwrap();
        reservations.pickup(&user.id, "b1", 1).await.unwrap();

        store
    }

    #[actix_web::test]
    async fn test_sweep_runs_over_borrowing_lists() {
        let store = store_with_borrowed_book().await;
        // due in 2 days, inside the default lookahead of the test
        sweep(&store, 3).await.unwrap();
        sweep(&store, 0).await.unwrap();
    }

    #[actix_web::test]
    async fn test_poller_stops_on_drop() {
        let store = store_with_borrowed_book().await;
        let poller = DuePoller::spawn(store, Duration::from_millis(5), 3);
        actix_web::rt::time::sleep(Duration::from_millis(12)).await;
        poller.stop();
        drop(poller);
    }
}
