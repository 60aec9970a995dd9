use crate::models::{BorrowingEntry, BranchId, PointsKind, ReservationEntry};
use crate::retry::RetryPolicy;
use crate::rewards;
use crate::store::Store;
use anyhow::{bail, Result};
use chrono::{Duration, NaiveDate, Utc};
use rand::seq::SliceRandom;
use std::str::FromStr;

// Loan duration bounds, in days.
const MIN_RESERVE_DAYS: u32 = 1;
const MAX_RESERVE_DAYS: u32 = 7;

const RANDOM_POINTS: [i64; 6] = [50, 60, 70, 80, 90, 100];

/// How many points a reservation is worth. The source app flip-flopped
/// between a fixed 50 and a random draw, so the choice is explicit
/// configuration here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointPolicy {
    Fixed(i64),
    Random,
}

impl PointPolicy {
    pub fn assign(&self) -> i64 {
        match self {
            PointPolicy::Fixed(points) => *points,
            PointPolicy::Random => *RANDOM_POINTS
                .choose(&mut rand::thread_rng())
                .unwrap_or(&RANDOM_POINTS[0]),
        }
    }
}

impl FromStr for PointPolicy {
    type Err = anyhow::Error;

    fn from_str(text: &str) -> Result<Self> {
        if text == "random" {
            return Ok(PointPolicy::Random);
        }
        if let Some(points) = text.strip_prefix("fixed:") {
            return Ok(PointPolicy::Fixed(points.parse()?));
        }
        bail!("point policy must be \"random\" or \"fixed:<points>\"")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReserveOutcome {
    Reserved(ReservationEntry),
    Unavailable,
    AlreadyHeld,
    InvalidDuration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickupOutcome {
    PickedUp { due_date: NaiveDate },
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnOutcome {
    Completed { credited: i64 },
    NotFound,
}

/// Reservation workflow: reserve -> picked up -> completed, one state per
/// (user, book, branch) tuple, each transition a single atomic store update.
#[derive(Debug, Clone)]
pub struct Reservations {
    store: Store,
    policy: PointPolicy,
    retry: RetryPolicy,
}

impl Reservations {
    pub fn new(store: Store, policy: PointPolicy, retry: RetryPolicy) -> Self {
        Self {
            store,
            policy,
            retry,
        }
    }

    /// Reserve one copy of a book at a branch. The availability check, the
    /// flip to unavailable, and the pickup-list append commit together, so a
    /// copy observed free by two racing callers is granted to exactly one.
    pub async fn reserve(
        &self,
        user_id: &str,
        book_id: &str,
        branch_id: BranchId,
        pickup_date: NaiveDate,
        reserve_days: u32,
    ) -> Result<ReserveOutcome> {
        if !(MIN_RESERVE_DAYS..=MAX_RESERVE_DAYS).contains(&reserve_days) {
            return Ok(ReserveOutcome::InvalidDuration);
        }

        // the one read the source app retried; kept under the uniform policy
        let user = self
            .retry
            .run(|| self.store.user_get(user_id))
            .await?;
        if user.is_none() {
            bail!("user not found");
        }
        if self.store.book_get(book_id).await?.is_none() {
            return Ok(ReserveOutcome::Unavailable);
        }

        let entry = ReservationEntry {
            book_id: book_id.to_string(),
            branch_id,
            pickup_date,
            reserve_days,
            book_point: self.policy.assign(),
        };

        let outcome = self
            .store
            .user_book_transaction(user_id, book_id, move |user, book| {
                let held = user
                    .books_to_be_picked_up
                    .iter()
                    .chain(user.completed.iter())
                    .any(|e| e.book_id == entry.book_id && e.branch_id == entry.branch_id)
                    || user
                        .currently_borrowing
                        .iter()
                        .any(|b| {
                            b.entry.book_id == entry.book_id
                                && b.entry.branch_id == entry.branch_id
                        });
                if held {
                    return ReserveOutcome::AlreadyHeld;
                }

                let Some(copy) = book
                    .copies
                    .iter_mut()
                    .find(|copy| copy.branch_id == entry.branch_id && copy.available)
                else {
                    return ReserveOutcome::Unavailable;
                };

                copy.available = false;
                user.books_to_be_picked_up.push(entry.clone());
                ReserveOutcome::Reserved(entry)
            })
            .await?;

        if let ReserveOutcome::Reserved(entry) = &outcome {
            tracing::info!(
                user = %user_id,
                book = %entry.book_id,
                branch = entry.branch_id,
                points = entry.book_point,
                "copy reserved"
            );
        }
        Ok(outcome)
    }

    /// Administrator transition: pickup list -> borrowing list, due date set
    /// to today plus the loan duration. The branch copy stays checked out.
    pub async fn pickup(
        &self,
        user_id: &str,
        book_id: &str,
        branch_id: BranchId,
    ) -> Result<PickupOutcome> {
        let today = Utc::now().date_naive();
        let book = book_id.to_string();

        self.store
            .user_update(user_id, move |user| {
                let Some(pos) = user
                    .books_to_be_picked_up
                    .iter()
                    .position(|e| e.book_id == book && e.branch_id == branch_id)
                else {
                    return PickupOutcome::NotFound;
                };

                let entry = user.books_to_be_picked_up.remove(pos);
                let due_date = today + Duration::days(entry.reserve_days as i64);
                user.currently_borrowing
                    .push(BorrowingEntry { entry, due_date });
                PickupOutcome::PickedUp { due_date }
            })
            .await
    }

    /// Administrator transition: borrowing list -> completed list. Credits
    /// the entry's points through the ledger and releases the branch copy,
    /// all in the same transaction as the list move.
    pub async fn complete(
        &self,
        user_id: &str,
        book_id: &str,
        branch_id: BranchId,
    ) -> Result<ReturnOutcome> {
        let book = book_id.to_string();

        let outcome = self
            .store
            .user_book_transaction(user_id, book_id, move |user, book_doc| {
                let Some(pos) = user
                    .currently_borrowing
                    .iter()
                    .position(|b| b.entry.book_id == book && b.entry.branch_id == branch_id)
                else {
                    return ReturnOutcome::NotFound;
                };

                let borrowed = user.currently_borrowing.remove(pos);
                let credited = borrowed.entry.book_point;
                let activity = format!("Returned {}", borrowed.entry.book_id);
                user.completed.push(borrowed.entry);
                rewards::record(user, credited, &activity, PointsKind::Addition);

                if let Some(copy) = book_doc
                    .copies
                    .iter_mut()
                    .find(|copy| copy.branch_id == branch_id)
                {
                    copy.available = true;
                }
                ReturnOutcome::Completed { credited }
            })
            .await?;

        if let ReturnOutcome::Completed { credited } = outcome {
            tracing::info!(user = %user_id, book = %book_id, credited, "book returned");
        }
        Ok(outcome)
    }
}

/// Display-only: a reserved entry whose pickup date has passed. No state
/// transition exists for this case; the copy stays reserved.
pub fn is_expired(entry: &ReservationEntry, today: NaiveDate) -> bool {
    entry.pickup_date < today
}
