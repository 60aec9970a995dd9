use crate::models::{PointsEntry, PointsKind, Reward, User};
use crate::store::Store;
use anyhow::Result;
use chrono::Utc;
use serde::Serialize;

/// Append-only points ledger with a stored running total. Both live on the
/// user document and only ever change together, inside one atomic update.
#[derive(Debug, Clone)]
pub struct Rewards {
    store: Store,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ledger {
    pub entries: Vec<PointsEntry>,
    pub running_total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedeemOutcome {
    Redeemed { remaining: i64 },
    InsufficientPoints { total: i64, cost: i64 },
    UnknownReward,
}

/// Signed increment of the stored total plus the matching history append, on
/// a document already held under the store's write lock. Shared with the
/// return transition so the credit stays atomic with the list move.
pub(crate) fn record(user: &mut User, points: i64, activity: &str, kind: PointsKind) {
    user.total_points += kind.signed(points);
    user.points_history.push(PointsEntry {
        kind,
        points,
        activity: activity.to_string(),
        date: Utc::now().naive_utc(),
    });
}

impl Rewards {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn rewards_all(&self) -> Result<Vec<Reward>> {
        self.store.rewards_all().await
    }

    pub async fn ledger(&self, user_id: &str) -> Result<Ledger> {
        let Some(user) = self.store.user_get(user_id).await? else {
            // missing document reads as an empty ledger
            return Ok(Ledger {
                entries: Vec::new(),
                running_total: 0,
            });
        };
        Ok(Ledger {
            entries: user.points_history,
            running_total: user.total_points,
        })
    }

    pub async fn append_transaction(
        &self,
        user_id: &str,
        points: i64,
        activity: &str,
        kind: PointsKind,
    ) -> Result<()> {
        self.store
            .user_update(user_id, |user| record(user, points, activity, kind))
            .await
    }

    /// Deducts the reward cost if and only if the balance covers it. The
    /// gate and the deduction run inside the same atomic update, so a racing
    /// redeem can never overdraw the total.
    pub async fn redeem(&self, user_id: &str, reward_id: &str) -> Result<RedeemOutcome> {
        let Some(reward) = self.store.reward_get(reward_id).await? else {
            return Ok(RedeemOutcome::UnknownReward);
        };

        let outcome = self
            .store
            .user_update(user_id, |user| {
                if user.total_points < reward.cost {
                    return RedeemOutcome::InsufficientPoints {
                        total: user.total_points,
                        cost: reward.cost,
                    };
                }
                record(
                    user,
                    reward.cost,
                    &format!("Redeemed {}", reward.title),
                    PointsKind::Deduction,
                );
                RedeemOutcome::Redeemed {
                    remaining: user.total_points,
                }
            })
            .await?;

        if let RedeemOutcome::Redeemed { remaining } = &outcome {
            tracing::info!(user = %user_id, reward = %reward_id, remaining, "reward redeemed");
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod test {
    use super::{RedeemOutcome, Rewards};
    use crate::accounts::Accounts;
    use crate::models::{PointsKind, Reward};
    use crate::retry::RetryPolicy;
    use crate::store::{Seed, Store};

    async fn fixture() -> (Rewards, String) {
        let store = Store::new();
        store
            .apply_seed(Seed {
                rewards: vec![Reward {
                    id: "r1".into(),
                    title: "Free Coffee".into(),
                    cost: 200,
                }],
                ..Seed::default()
            })
            .unwrap();

        let accounts = Accounts::new(store.clone(), RetryPolicy::default());
        let user = accounts
            .user_create("dana@example.com", "pw", "Dana", "", "")
            .await
            .unwrap();

        (Rewards::new(store), user.id)
    }

    #[actix_web::test]
    async fn test_append_transaction_moves_total_and_history_together() {
        let (rewards, user_id) = fixture().await;

        rewards
            .append_transaction(&user_id, 50, "Returned book b1", PointsKind::Addition)
            .await
            .unwrap();

        let ledger = rewards.ledger(&user_id).await.unwrap();
        assert_eq!(ledger.running_total, 50);
        assert_eq!(ledger.entries.len(), 1);
        assert_eq!(ledger.entries[0].points, 50);
        assert_eq!(ledger.entries[0].kind, PointsKind::Addition);
    }

    #[actix_web::test]
    async fn test_total_equals_signed_sum_of_history() {
        let (rewards, user_id) = fixture().await;

        rewards
            .append_transaction(&user_id, 300, "Returned book b1", PointsKind::Addition)
            .await
            .unwrap();
        rewards
            .append_transaction(&user_id, 80, "Promo adjustment", PointsKind::Deduction)
            .await
            .unwrap();

        let ledger = rewards.ledger(&user_id).await.unwrap();
        let signed: i64 = ledger
            .entries
            .iter()
            .map(|e| e.kind.signed(e.points))
            .sum();
        assert_eq!(ledger.running_total, signed);
        assert_eq!(ledger.running_total, 220);
    }

    #[actix_web::test]
    async fn test_insufficient_balance_rejects_and_changes_nothing() {
        let (rewards, user_id) = fixture().await;

        rewards
            .append_transaction(&user_id, 150, "Returned book b1", PointsKind::Addition)
            .await
            .unwrap();

        let outcome = rewards.redeem(&user_id, "r1").await.unwrap();
        assert_eq!(
            outcome,
            RedeemOutcome::InsufficientPoints {
                total: 150,
                cost: 200
            }
        );

        let ledger = rewards.ledger(&user_id).await.unwrap();
        assert_eq!(ledger.running_total, 150);
        assert_eq!(ledger.entries.len(), 1);
    }

    #[actix_web::test]
    async fn test_redeem_deducts_once() {
        let (rewards, user_id) = fixture().await;

        rewards
            .append_transaction(&user_id, 250, "Returned book b1", PointsKind::Addition)
            .await
            .unwrap();

        let outcome = rewards.redeem(&user_id, "r1").await.unwrap();
        assert_eq!(outcome, RedeemOutcome::Redeemed { remaining: 50 });

        let ledger = rewards.ledger(&user_id).await.unwrap();
        assert_eq!(ledger.running_total, 50);
        assert_eq!(ledger.entries.len(), 2);
        assert_eq!(ledger.entries[1].kind, PointsKind::Deduction);
    }

    #[actix_web::test]
    async fn test_unknown_reward() {
        let (rewards, user_id) = fixture().await;
        let outcome = rewards.redeem(&user_id, "nope").await.unwrap();
        assert_eq!(outcome, RedeemOutcome::UnknownReward);
    }
}
