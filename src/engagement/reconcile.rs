// Counter reconciliation sweep.
//
// Toggles and comment writes only ever move counters by relative deltas, and
// a failed counter write leaves the stored value behind the membership rows.
// This sweep is what brings drifted counters back: recount the facts for
// every subject and rewrite the counters that disagree. It is the only code
// that writes an absolute counter value.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::db::models::record;
use crate::db::{Filter, Record, RecordStore, SubjectRef, Table};
use crate::error::Result;

/// Outcome of one sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub checked: usize,
    pub corrected: usize,
    pub failed: usize,
}

/// One subject's stored counters, as read at the start of the sweep.
struct CounterSnapshot {
    subject: SubjectRef,
    like_count: Option<i64>,
    /// Only posts carry a comment count
    comment_count: Option<Option<i64>>,
}

impl CounterSnapshot {
    fn from_row(row: &Record, subject_of: fn(i64) -> SubjectRef) -> Option<Self> {
        let id = row.get("id").and_then(Value::as_i64)?;
        let subject = subject_of(id);
        let comment_count = match subject.kind.table() {
            Table::Posts => Some(row.get("comment_count").and_then(Value::as_i64)),
            _ => None,
        };
        Some(Self {
            subject,
            like_count: row.get("like_count").and_then(Value::as_i64),
            comment_count,
        })
    }
}

/// Recount likes (and comments, for posts) across every subject, rewriting
/// counters that drifted. `concurrency` bounds the in-flight subjects.
pub async fn reconcile_counters(
    store: &Arc<dyn RecordStore>,
    concurrency: usize,
) -> Result<ReconcileReport> {
    let posts = store.find(Table::Posts, &Filter::new()).await?;
    let comments = store.find(Table::Comments, &Filter::new()).await?;

    let snapshots: Vec<CounterSnapshot> = posts
        .iter()
        .filter_map(|r| CounterSnapshot::from_row(r, SubjectRef::post))
        .chain(
            comments
                .iter()
                .filter_map(|r| CounterSnapshot::from_row(r, SubjectRef::comment)),
        )
        .collect();

    let results: Vec<(SubjectRef, anyhow::Result<bool>)> = stream::iter(snapshots)
        .map(|snapshot| {
            let store = Arc::clone(store);
            async move {
                let subject = snapshot.subject;
                (subject, reconcile_one(store.as_ref(), snapshot).await)
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut report = ReconcileReport::default();
    for (subject, result) in results {
        report.checked += 1;
        match result {
            Ok(true) => report.corrected += 1,
            Ok(false) => {}
            Err(e) => {
                report.failed += 1;
                warn!(subject = %subject, error = %e, "Failed to reconcile counters, skipping");
            }
        }
    }

    info!(
        checked = report.checked,
        corrected = report.corrected,
        failed = report.failed,
        "Counter reconciliation finished"
    );
    Ok(report)
}

/// Returns whether anything had to be rewritten.
async fn reconcile_one(store: &dyn RecordStore, snapshot: CounterSnapshot) -> anyhow::Result<bool> {
    let subject = snapshot.subject;
    let mut patch = Record::new();

    let likes = store.count(Table::Likes, &subject.likes_filter()).await?;
    if snapshot.like_count != Some(likes) {
        patch.insert("like_count".to_string(), json!(likes));
    }

    if let Some(stored_comments) = snapshot.comment_count {
        let comments = store
            .count(Table::Comments, &Filter::new().eq("post_id", subject.id))
            .await?;
        if stored_comments != Some(comments) {
            patch.insert("comment_count".to_string(), json!(comments));
        }
    }

    if patch.is_empty() {
        return Ok(false);
    }

    let summary = serde_json::Value::Object(patch.clone());
    info!(subject = %subject, patch = %summary, "Correcting drifted counters");
    store
        .update(subject.kind.table(), &Filter::by_id(subject.id), patch)
        .await?;
    Ok(true)
}

/// Rewrite a single subject's like counter from its membership rows.
pub async fn reconcile_subject(store: &Arc<dyn RecordStore>, subject: SubjectRef) -> Result<i64> {
    let likes = store.count(Table::Likes, &subject.likes_filter()).await?;
    store
        .update(
            subject.kind.table(),
            &Filter::by_id(subject.id),
            record([("like_count", likes)]),
        )
        .await?;
    Ok(likes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;

    #[tokio::test]
    async fn test_sweep_fixes_drift_and_leaves_clean_rows() {
        let store: Arc<dyn RecordStore> = Arc::new(SqliteStore::in_memory().unwrap());

        // Post 1 claims 9 likes and 4 comments but has 1 like and 1 comment
        let drifted = store
            .insert(
                Table::Posts,
                record([
                    ("author_id", json!("a")),
                    ("like_count", json!(9)),
                    ("comment_count", json!(4)),
                ]),
            )
            .await
            .unwrap();
        let drifted_id = drifted["id"].as_i64().unwrap();
        store
            .insert(
                Table::Likes,
                record([
                    ("subject_id", json!(drifted_id)),
                    ("subject_type", json!("post")),
                    ("user_id", json!("u1")),
                ]),
            )
            .await
            .unwrap();
        store
            .insert(
                Table::Comments,
                record([("post_id", json!(drifted_id)), ("author_id", json!("b"))]),
            )
            .await
            .unwrap();

        // Post 2 is already consistent
        store
            .insert(Table::Posts, record([("author_id", json!("a"))]))
            .await
            .unwrap();

        let report = reconcile_counters(&store, 4).await.unwrap();
        // two posts + one comment
        assert_eq!(report.checked, 3);
        assert_eq!(report.corrected, 1);
        assert_eq!(report.failed, 0);

        let row = &store
            .find(Table::Posts, &Filter::by_id(drifted_id))
            .await
            .unwrap()[0];
        assert_eq!(row["like_count"], json!(1));
        assert_eq!(row["comment_count"], json!(1));

        // A second pass finds nothing to do
        let again = reconcile_counters(&store, 4).await.unwrap();
        assert_eq!(again.corrected, 0);
    }

    #[tokio::test]
    async fn test_single_subject_rewrite() {
        let store: Arc<dyn RecordStore> = Arc::new(SqliteStore::in_memory().unwrap());
        let post = store
            .insert(
                Table::Posts,
                record([("author_id", json!("a")), ("like_count", json!(3))]),
            )
            .await
            .unwrap();
        let id = post["id"].as_i64().unwrap();

        assert_eq!(reconcile_subject(&store, SubjectRef::post(id)).await.unwrap(), 0);
        let row = &store.find(Table::Posts, &Filter::by_id(id)).await.unwrap()[0];
        assert_eq!(row["like_count"], json!(0));

        let missing = reconcile_subject(&store, SubjectRef::comment(404)).await;
        assert!(missing.is_err());
    }
}
