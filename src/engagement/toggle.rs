// Like toggling: flips a user's membership on a post or comment and keeps
// the subject's denormalized like_count in step.
//
// The membership row is the source of truth. The counter only ever moves by
// a relative +1/-1 so concurrent toggles from different users commute. If
// the counter write fails after the membership write succeeded, the
// membership change stands and the reported count is recomputed from the
// membership rows, or estimated from the pre-toggle count when that fails too.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::db::models::{record, LikeMembership};
use crate::db::{Filter, RecordStore, SubjectRef, SubjectType, Table};
use crate::error::{EngineError, Result};
use crate::reputation::{ReputationLedger, ScoredAction};

/// What the presentation layer gets back from a toggle.
#[derive(Debug, Serialize)]
pub struct ToggleOutcome {
    /// Membership state after the call
    pub liked: bool,
    /// Count read back from the store (or recomputed, see `counter_warning`)
    pub like_count: i64,
    /// Set when the stored counter could not be updated and `like_count`
    /// came from counting membership rows instead
    #[serde(skip)]
    pub counter_warning: Option<EngineError>,
}

/// A like count plus whether it had to be recomputed.
#[derive(Debug)]
pub struct CounterRead {
    pub value: i64,
    pub warning: Option<EngineError>,
}

#[derive(Clone)]
pub struct EngagementService {
    store: Arc<dyn RecordStore>,
    ledger: ReputationLedger,
}

impl EngagementService {
    pub fn new(store: Arc<dyn RecordStore>, ledger: ReputationLedger) -> Self {
        Self { store, ledger }
    }

    /// Flip `actor`'s like on `subject`.
    ///
    /// Fails with `Unauthorized` before touching anything when there is no
    /// actor, and with `NotFound` when the subject doesn't exist.
    pub async fn toggle_like(&self, actor: Option<&str>, subject: SubjectRef) -> Result<ToggleOutcome> {
        let user_id = actor
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(EngineError::unauthenticated)?;
        let (author_id, last_known) = self.subject_author(subject).await?;

        let membership = subject.likes_filter().eq("user_id", user_id);
        let already_liked = self.store.count(Table::Likes, &membership).await? > 0;

        let (liked, delta) = if already_liked {
            let removed = self.store.delete(Table::Likes, &membership).await?;
            (false, if removed > 0 { -1 } else { 0 })
        } else {
            let row = record([
                ("subject_id", json!(subject.id)),
                ("subject_type", json!(subject.kind.as_str())),
                ("user_id", json!(user_id)),
            ]);
            match self.store.insert(Table::Likes, row).await {
                Ok(_) => (true, 1),
                // A concurrent request from the same user may have inserted
                // first; the unique key makes that our no-op, not an error
                Err(e) => {
                    if self.store.count(Table::Likes, &membership).await? == 0 {
                        return Err(e.into());
                    }
                    (true, 0)
                }
            }
        };

        // From here on the membership change stands, so nothing below may
        // turn the call into an error.
        if delta != 0 {
            let action = match subject.kind {
                SubjectType::Post => ScoredAction::PostLike,
                SubjectType::Comment => ScoredAction::CommentLike,
            };
            // Prestige is a background effect; a failure here never fails the like
            if let Err(e) = self.ledger.apply_action(&author_id, action, delta).await {
                warn!(
                    subject = %subject,
                    author_id = %author_id,
                    error = %e,
                    "Failed to apply like to author's prestige"
                );
            }
        }

        let counter = self.settle_counter(subject, delta, last_known).await;

        debug!(
            subject = %subject,
            user_id,
            liked,
            like_count = counter.value,
            "Toggled like"
        );

        Ok(ToggleOutcome {
            liked,
            like_count: counter.value,
            counter_warning: counter.warning,
        })
    }

    /// Whether `user_id` currently likes `subject`.
    pub async fn is_liked(&self, user_id: &str, subject: SubjectRef) -> Result<bool> {
        let membership = subject.likes_filter().eq("user_id", user_id);
        Ok(self.store.count(Table::Likes, &membership).await? > 0)
    }

    /// Every membership row on `subject`, oldest first.
    pub async fn likers(&self, subject: SubjectRef) -> Result<Vec<LikeMembership>> {
        let rows = self.store.find(Table::Likes, &subject.likes_filter()).await?;
        let mut likes = Vec::with_capacity(rows.len());
        for row in &rows {
            likes.push(LikeMembership::from_record(row)?);
        }
        Ok(likes)
    }

    /// Read the stored like count, recomputing from membership rows when the
    /// stored value is missing, non-numeric, or unreadable.
    pub async fn like_count(&self, subject: SubjectRef) -> Result<CounterRead> {
        let stored = self
            .store
            .find(subject.kind.table(), &Filter::by_id(subject.id))
            .await;

        let reason = match stored {
            Ok(rows) => match rows.first() {
                None => return Err(EngineError::not_found(subject.kind.table(), subject.id)),
                Some(row) => match row.get("like_count").and_then(Value::as_i64) {
                    Some(n) => {
                        return Ok(CounterRead {
                            value: n,
                            warning: None,
                        })
                    }
                    None => "stored like_count is missing or not a number".to_string(),
                },
            },
            Err(e) => format!("{e:#}"),
        };

        self.recount(subject, reason).await
    }

    async fn apply_counter_delta(&self, subject: SubjectRef, delta: i64) -> Result<CounterRead> {
        match self
            .store
            .increment_counter(subject.kind.table(), json!(subject.id), "like_count", delta)
            .await
        {
            Ok(value) => Ok(CounterRead {
                value,
                warning: None,
            }),
            Err(e) => {
                warn!(subject = %subject, delta, error = %e, "Like counter update failed, recounting");
                self.recount(subject, format!("{e:#}")).await
            }
        }
    }

    /// Move the stored counter by `delta` and report the result. When both
    /// the counter write and the recount fail, the value is estimated from
    /// the counter as read before the toggle.
    async fn settle_counter(&self, subject: SubjectRef, delta: i64, last_known: Option<i64>) -> CounterRead {
        let read = if delta == 0 {
            self.like_count(subject).await
        } else {
            self.apply_counter_delta(subject, delta).await
        };

        match read {
            Ok(counter) => counter,
            Err(e) => {
                warn!(subject = %subject, delta, error = %e, "Like recount failed, reporting last known count");
                CounterRead {
                    value: last_known.unwrap_or(0).saturating_add(delta).max(0),
                    warning: Some(EngineError::InconsistentCounter {
                        subject,
                        reason: format!("counter update and recount both failed: {e}"),
                    }),
                }
            }
        }
    }

    /// Fallback path: count membership rows directly.
    async fn recount(&self, subject: SubjectRef, reason: String) -> Result<CounterRead> {
        let value = self
            .store
            .count(Table::Likes, &subject.likes_filter())
            .await?;
        Ok(CounterRead {
            value,
            warning: Some(EngineError::InconsistentCounter { subject, reason }),
        })
    }

    /// Author of the subject, whose prestige a like feeds, plus the like
    /// count stored at the time of the read.
    async fn subject_author(&self, subject: SubjectRef) -> Result<(String, Option<i64>)> {
        let rows = self
            .store
            .find(subject.kind.table(), &Filter::by_id(subject.id))
            .await?;
        let row = rows
            .first()
            .ok_or_else(|| EngineError::not_found(subject.kind.table(), subject.id))?;
        let author_id = row
            .get("author_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                EngineError::StoreFailure(anyhow::anyhow!("{subject} has no author_id"))
            })?;
        Ok((author_id, row.get("like_count").and_then(Value::as_i64)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use crate::reputation::PointCatalog;

    async fn setup() -> (Arc<dyn RecordStore>, EngagementService, i64) {
        let store: Arc<dyn RecordStore> = Arc::new(SqliteStore::in_memory().unwrap());
        let ledger = ReputationLedger::new(store.clone(), PointCatalog::default());
        let post = store
            .insert(
                Table::Posts,
                record([("author_id", json!("author")), ("like_count", json!(5))]),
            )
            .await
            .unwrap();
        let id = post["id"].as_i64().unwrap();
        (store.clone(), EngagementService::new(store, ledger), id)
    }

    #[tokio::test]
    async fn test_like_then_unlike_from_five() {
        let (_store, service, id) = setup().await;

        let liked = service.toggle_like(Some("reader"), SubjectRef::post(id)).await.unwrap();
        assert!(liked.liked);
        assert_eq!(liked.like_count, 6);
        assert!(liked.counter_warning.is_none());

        let unliked = service.toggle_like(Some("reader"), SubjectRef::post(id)).await.unwrap();
        assert!(!unliked.liked);
        assert_eq!(unliked.like_count, 5);
    }

    #[tokio::test]
    async fn test_anonymous_toggle_rejected_without_writes() {
        let (store, service, id) = setup().await;
        let err = service.toggle_like(None, SubjectRef::post(id)).await.unwrap_err();
        assert!(matches!(err, EngineError::Unauthorized(_)));
        assert_eq!(store.count(Table::Likes, &Filter::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_subject_is_not_found() {
        let (_store, service, _id) = setup().await;
        let err = service
            .toggle_like(Some("reader"), SubjectRef::comment(77))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_like_feeds_author_not_actor() {
        let (store, service, id) = setup().await;
        service.toggle_like(Some("reader"), SubjectRef::post(id)).await.unwrap();

        let ledger = ReputationLedger::new(store, PointCatalog::default());
        assert_eq!(ledger.account("author").await.unwrap().score, 2);
        assert_eq!(ledger.account("reader").await.unwrap().score, 0);

        service.toggle_like(Some("reader"), SubjectRef::post(id)).await.unwrap();
        assert_eq!(ledger.account("author").await.unwrap().score, 0);
    }
}
