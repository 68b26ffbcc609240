// Reputation ledger: the only writer of a user's prestige score.
//
// Every change is a catalog action times a multiplier, applied as a single
// relative update floored at zero. Accounts are created on first touch.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::db::models::{record, ReputationAccount};
use crate::db::{Filter, RecordStore, Table};
use crate::error::{EngineError, Result};

use super::catalog::{PointCatalog, ScoredAction};
use super::rank::{Rank, RankTable};

#[derive(Clone)]
pub struct ReputationLedger {
    store: Arc<dyn RecordStore>,
    catalog: PointCatalog,
}

impl ReputationLedger {
    pub fn new(store: Arc<dyn RecordStore>, catalog: PointCatalog) -> Self {
        Self { store, catalog }
    }

    /// Apply `action` `multiplier` times to `user_id` and return the new score.
    ///
    /// A negative result is clamped to zero, never an error. Pass
    /// `multiplier = -1` to reverse an earlier award.
    pub async fn apply_action(
        &self,
        user_id: &str,
        action: ScoredAction,
        multiplier: i64,
    ) -> Result<i64> {
        self.ensure_account(user_id).await?;

        let delta = self.catalog.delta(action, multiplier);
        let score = self
            .store
            .increment_counter(Table::Users, json!(user_id), "prestige", delta)
            .await?;

        debug!(user_id, action = %action, delta, score, "Applied prestige action");
        Ok(score)
    }

    /// Load a user's account, or a zero-score view if none exists yet.
    pub async fn account(&self, user_id: &str) -> Result<ReputationAccount> {
        let rows = self.store.find(Table::Users, &Filter::by_id(user_id)).await?;
        match rows.first() {
            Some(row) => Ok(ReputationAccount::from_record(row)?),
            None => Ok(ReputationAccount {
                user_id: user_id.to_string(),
                username: None,
                score: 0,
                is_admin: false,
                last_login_at: None,
            }),
        }
    }

    /// Resolve the user's current rank from their stored score and admin flag.
    pub async fn rank_of<'t>(&self, ranks: &'t RankTable, user_id: &str) -> Result<&'t Rank> {
        let account = self.account(user_id).await?;
        Ok(ranks.resolve(account.score, account.is_admin))
    }

    /// Create the account row with score 0 if it doesn't exist.
    pub async fn ensure_account(&self, user_id: &str) -> Result<()> {
        if user_id.trim().is_empty() {
            return Err(EngineError::InvalidInput("empty user id".to_string()));
        }

        let filter = Filter::by_id(user_id);
        if self.store.count(Table::Users, &filter).await? > 0 {
            return Ok(());
        }

        if let Err(e) = self
            .store
            .insert(Table::Users, record([("id", json!(user_id)), ("prestige", json!(0))]))
            .await
        {
            // Lost a race with another first-touch insert; the row exists now
            if self.store.count(Table::Users, &filter).await? == 0 {
                return Err(e.into());
            }
        }
        Ok(())
    }

    /// Award DAILY_LOGIN at most once per UTC calendar day.
    ///
    /// Returns the new score when the award was applied, `None` when the user
    /// already collected it today. The day is claimed with an update that
    /// only matches the previously stored stamp, so concurrent logins award
    /// once; a failed award releases the claim again.
    pub async fn record_login(&self, user_id: &str, now: DateTime<Utc>) -> Result<Option<i64>> {
        self.ensure_account(user_id).await?;
        let account = self.account(user_id).await?;
        if logged_in_on(account.last_login_at.as_deref(), now) {
            return Ok(None);
        }

        let previous = json!(account.last_login_at);
        let stamp = now.to_rfc3339();
        let claim = Filter::by_id(user_id).eq("last_login_at", previous.clone());
        if let Err(e) = self
            .store
            .update(Table::Users, &claim, record([("last_login_at", stamp.clone())]))
            .await
        {
            // Either another login got there first or the write failed
            let current = self.account(user_id).await?;
            if logged_in_on(current.last_login_at.as_deref(), now) {
                return Ok(None);
            }
            return Err(e.into());
        }

        match self.apply_action(user_id, ScoredAction::DailyLogin, 1).await {
            Ok(score) => {
                info!(user_id, score, "Daily login award applied");
                Ok(Some(score))
            }
            Err(e) => {
                let ours = Filter::by_id(user_id).eq("last_login_at", stamp);
                if let Err(release) = self
                    .store
                    .update(Table::Users, &ours, record([("last_login_at", previous)]))
                    .await
                {
                    warn!(user_id, error = %release, "Failed to release daily login claim");
                }
                Err(e)
            }
        }
    }

    /// Mark or unmark a user as an administrator.
    pub async fn set_admin(&self, user_id: &str, is_admin: bool) -> Result<()> {
        self.ensure_account(user_id).await?;
        self.store
            .update(
                Table::Users,
                &Filter::by_id(user_id),
                record([("is_admin", json!(is_admin))]),
            )
            .await?;
        Ok(())
    }
}

/// Whether an RFC 3339 `last_login_at` stamp falls on the same UTC day as `now`.
fn logged_in_on(last_login_at: Option<&str>, now: DateTime<Utc>) -> bool {
    last_login_at
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .is_some_and(|last| last.with_timezone(&Utc).date_naive() == now.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use chrono::TimeZone;

    fn ledger() -> ReputationLedger {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        ReputationLedger::new(store, PointCatalog::default())
    }

    #[tokio::test]
    async fn test_violation_on_fresh_account_clamps_to_zero() {
        let ledger = ledger();
        let score = ledger
            .apply_action("did:new", ScoredAction::Violation, 1)
            .await
            .unwrap();
        assert_eq!(score, 0);
    }

    #[tokio::test]
    async fn test_actions_accumulate() {
        let ledger = ledger();
        ledger.apply_action("u", ScoredAction::CreatePost, 1).await.unwrap();
        ledger.apply_action("u", ScoredAction::PostLike, 3).await.unwrap();
        let score = ledger
            .apply_action("u", ScoredAction::PostFlagged, 1)
            .await
            .unwrap();
        // 10 + 3*2 - 3
        assert_eq!(score, 13);
        assert_eq!(ledger.account("u").await.unwrap().score, 13);
    }

    #[tokio::test]
    async fn test_unknown_account_reads_as_zero() {
        let ledger = ledger();
        let account = ledger.account("ghost").await.unwrap();
        assert_eq!(account.score, 0);
        assert!(!account.is_admin);
    }

    #[tokio::test]
    async fn test_empty_user_id_rejected() {
        let ledger = ledger();
        let err = ledger
            .apply_action("  ", ScoredAction::DailyLogin, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_daily_login_once_per_day() {
        let ledger = ledger();
        let morning = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let evening = Utc.with_ymd_and_hms(2024, 3, 1, 22, 0, 0).unwrap();
        let next_day = Utc.with_ymd_and_hms(2024, 3, 2, 0, 5, 0).unwrap();

        assert_eq!(ledger.record_login("u", morning).await.unwrap(), Some(1));
        assert_eq!(ledger.record_login("u", evening).await.unwrap(), None);
        assert_eq!(ledger.record_login("u", next_day).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_admin_flag_resolves_admin_rank() {
        let ledger = ledger();
        let ranks = RankTable::standard();
        ledger.set_admin("mod", true).await.unwrap();
        let rank = ledger.rank_of(&ranks, "mod").await.unwrap();
        assert!(rank.is_admin());
    }

    #[tokio::test]
    async fn test_concurrent_logins_award_once() {
        let ledger = ledger();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();

        let results = futures::future::join_all(
            (0..4).map(|i| ledger.record_login("u", now + chrono::Duration::seconds(i))),
        )
        .await;

        let awarded = results
            .into_iter()
            .map(|r| r.unwrap())
            .filter(Option::is_some)
            .count();
        assert_eq!(awarded, 1);
        assert_eq!(ledger.account("u").await.unwrap().score, 1);
    }
}
