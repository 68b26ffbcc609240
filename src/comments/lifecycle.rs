// Comment creation, deletion, and thread fetching.
//
// Creating or deleting a comment moves the post's comment_count by exactly
// one (relative, floored at zero) and feeds the author's prestige. Deleting a
// comment keeps its replies; they come back as roots from `build_tree`.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{info, warn};

use crate::db::models::{record, CommentRecord, ReputationAccount};
use crate::db::{Filter, Record, RecordStore, Table};
use crate::error::{EngineError, Result};
use crate::reputation::{ReputationLedger, ScoredAction};

use super::tree::{build_tree, CommentNode};

#[derive(Clone)]
pub struct CommentService {
    store: Arc<dyn RecordStore>,
    ledger: ReputationLedger,
}

impl CommentService {
    pub fn new(store: Arc<dyn RecordStore>, ledger: ReputationLedger) -> Self {
        Self { store, ledger }
    }

    /// Post a comment (or a reply, when `parent_id` is set) as `actor`.
    pub async fn create_comment(
        &self,
        actor: Option<&str>,
        post_id: i64,
        parent_id: Option<i64>,
        content: &str,
    ) -> Result<CommentRecord> {
        let author_id = actor
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(EngineError::unauthenticated)?;
        if content.trim().is_empty() {
            return Err(EngineError::InvalidInput("comment is empty".to_string()));
        }

        if self.store.count(Table::Posts, &Filter::by_id(post_id)).await? == 0 {
            return Err(EngineError::not_found(Table::Posts, post_id));
        }
        if let Some(parent) = parent_id {
            let same_post = Filter::by_id(parent).eq("post_id", post_id);
            if self.store.count(Table::Comments, &same_post).await? == 0 {
                return Err(EngineError::not_found(Table::Comments, parent));
            }
        }

        let row = self
            .store
            .insert(
                Table::Comments,
                record([
                    ("post_id", json!(post_id)),
                    ("parent_id", json!(parent_id)),
                    ("author_id", json!(author_id)),
                    ("content", json!(content)),
                ]),
            )
            .await?;
        let comment = CommentRecord::from_record(&row)?;

        // The comment row is what counts; a lagging counter is fixed by the
        // reconciliation sweep
        if let Err(e) = self
            .store
            .increment_counter(Table::Posts, json!(post_id), "comment_count", 1)
            .await
        {
            warn!(post_id, error = %e, "Failed to bump comment_count");
        }

        if let Err(e) = self
            .ledger
            .apply_action(author_id, ScoredAction::CreateComment, 1)
            .await
        {
            warn!(author_id, error = %e, "Failed to award comment prestige");
        }

        info!(comment_id = comment.id, post_id, "Comment created");
        Ok(comment)
    }

    /// Delete a comment. Only its author or an admin may do this.
    pub async fn delete_comment(&self, actor: Option<&str>, comment_id: i64) -> Result<()> {
        let actor = actor
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(EngineError::unauthenticated)?;

        let rows = self
            .store
            .find(Table::Comments, &Filter::by_id(comment_id))
            .await?;
        let comment = match rows.first() {
            Some(row) => CommentRecord::from_record(row)?,
            None => return Err(EngineError::not_found(Table::Comments, comment_id)),
        };

        if comment.author_id != actor && !self.is_admin(actor).await? {
            return Err(EngineError::Unauthorized(format!(
                "{actor} may not delete comment {comment_id}"
            )));
        }

        self.store
            .delete(
                Table::Likes,
                &Filter::new()
                    .eq("subject_id", comment_id)
                    .eq("subject_type", "comment"),
            )
            .await?;
        let removed = self
            .store
            .delete(Table::Comments, &Filter::by_id(comment_id))
            .await?;

        if removed > 0 {
            if let Err(e) = self
                .store
                .increment_counter(Table::Posts, json!(comment.post_id), "comment_count", -1)
                .await
            {
                warn!(post_id = comment.post_id, error = %e, "Failed to drop comment_count");
            }
        }

        info!(comment_id, post_id = comment.post_id, "Comment deleted");
        Ok(())
    }

    /// Every comment on `post_id`, assembled into reply trees.
    pub async fn fetch_thread(&self, post_id: i64) -> Result<Vec<CommentNode>> {
        let rows = self
            .store
            .find(Table::Comments, &Filter::new().eq("post_id", post_id))
            .await?;
        Ok(thread_from_rows(&rows))
    }

    async fn is_admin(&self, user_id: &str) -> Result<bool> {
        let rows = self.store.find(Table::Users, &Filter::by_id(user_id)).await?;
        Ok(match rows.first() {
            Some(row) => ReputationAccount::from_record(row)?.is_admin,
            None => false,
        })
    }
}

/// Order raw comment rows by `(created_at, id)` and build the forest.
/// Rows that don't parse as comments are logged and left out.
pub fn thread_from_rows(rows: &[Record]) -> Vec<CommentNode> {
    let mut comments: Vec<CommentRecord> = rows
        .iter()
        .filter_map(|row| match CommentRecord::from_record(row) {
            Ok(c) => Some(c),
            Err(e) => {
                let id = row.get("id").cloned().unwrap_or(serde_json::Value::Null);
                warn!(error = %e, id = %id, "Skipping malformed comment row");
                None
            }
        })
        .collect();
    comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    build_tree(comments)
}
