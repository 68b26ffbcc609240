// Post write paths that feed the reputation ledger.
//
// Post CRUD proper belongs to the forum front end; what lives here is the
// part with prestige consequences: creating, flagging, removing, and
// milestone awards.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use crate::db::models::{record, PostRecord};
use crate::db::{Filter, RecordStore, Table};
use crate::error::{EngineError, Result};
use crate::reputation::{ReputationLedger, ScoredAction};

/// Milestones a post can reach, each with its own award.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Milestone {
    Popular,
    Trending,
}

impl Milestone {
    fn action(&self) -> ScoredAction {
        match self {
            Milestone::Popular => ScoredAction::PostPopular,
            Milestone::Trending => ScoredAction::PostTrending,
        }
    }
}

#[derive(Clone)]
pub struct PostService {
    store: Arc<dyn RecordStore>,
    ledger: ReputationLedger,
}

impl PostService {
    pub fn new(store: Arc<dyn RecordStore>, ledger: ReputationLedger) -> Self {
        Self { store, ledger }
    }

    pub async fn create_post(
        &self,
        actor: Option<&str>,
        board: &str,
        title: &str,
        content: &str,
    ) -> Result<PostRecord> {
        let author_id = actor
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(EngineError::unauthenticated)?;
        if title.trim().is_empty() {
            return Err(EngineError::InvalidInput("post title is empty".to_string()));
        }

        let row = self
            .store
            .insert(
                Table::Posts,
                record([
                    ("author_id", json!(author_id)),
                    ("board", json!(board)),
                    ("title", json!(title)),
                    ("content", json!(content)),
                    ("like_count", json!(0)),
                    ("comment_count", json!(0)),
                ]),
            )
            .await?;
        let post = PostRecord::from_record(&row)?;

        if let Err(e) = self
            .ledger
            .apply_action(author_id, ScoredAction::CreatePost, 1)
            .await
        {
            warn!(author_id, error = %e, "Failed to award post prestige");
        }

        info!(post_id = post.id, board, "Post created");
        Ok(post)
    }

    pub async fn get_post(&self, post_id: i64) -> Result<PostRecord> {
        let rows = self.store.find(Table::Posts, &Filter::by_id(post_id)).await?;
        match rows.first() {
            Some(row) => Ok(PostRecord::from_record(row)?),
            None => Err(EngineError::not_found(Table::Posts, post_id)),
        }
    }

    /// A user flagged the post; the author takes the POST_FLAGGED penalty.
    /// Returns the author's new score.
    pub async fn flag_post(&self, actor: Option<&str>, post_id: i64) -> Result<i64> {
        let reporter = actor
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(EngineError::unauthenticated)?;
        let post = self.get_post(post_id).await?;

        let score = self
            .ledger
            .apply_action(&post.author_id, ScoredAction::PostFlagged, 1)
            .await?;
        info!(post_id, reporter, author_id = %post.author_id, score, "Post flagged");
        Ok(score)
    }

    /// Remove a post with its comments and likes. The author may remove
    /// their own post freely; an admin removing someone else's post applies
    /// POST_DELETED to the author.
    pub async fn remove_post(&self, actor: Option<&str>, post_id: i64) -> Result<()> {
        let actor = actor
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(EngineError::unauthenticated)?;
        let post = self.get_post(post_id).await?;

        let by_author = post.author_id == actor;
        if !by_author && !self.ledger.account(actor).await?.is_admin {
            return Err(EngineError::Unauthorized(format!(
                "{actor} may not remove post {post_id}"
            )));
        }

        // Likes on the post's comments go first, while the comment ids are
        // still readable
        let comments = self
            .store
            .find(Table::Comments, &Filter::new().eq("post_id", post_id))
            .await?;
        for comment in &comments {
            if let Some(id) = comment.get("id").and_then(|v| v.as_i64()) {
                self.store
                    .delete(
                        Table::Likes,
                        &Filter::new().eq("subject_id", id).eq("subject_type", "comment"),
                    )
                    .await?;
            }
        }
        self.store
            .delete(Table::Comments, &Filter::new().eq("post_id", post_id))
            .await?;
        self.store
            .delete(
                Table::Likes,
                &Filter::new().eq("subject_id", post_id).eq("subject_type", "post"),
            )
            .await?;
        self.store.delete(Table::Posts, &Filter::by_id(post_id)).await?;

        if !by_author {
            self.ledger
                .apply_action(&post.author_id, ScoredAction::PostDeleted, 1)
                .await?;
        }

        info!(post_id, removed_by = actor, comments = comments.len(), "Post removed");
        Ok(())
    }

    /// Award the author for a post reaching a milestone.
    pub async fn mark_milestone(&self, post_id: i64, milestone: Milestone) -> Result<i64> {
        let post = self.get_post(post_id).await?;
        let score = self
            .ledger
            .apply_action(&post.author_id, milestone.action(), 1)
            .await?;
        info!(post_id, ?milestone, score, "Post milestone awarded");
        Ok(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use crate::reputation::PointCatalog;

    fn service() -> (Arc<dyn RecordStore>, PostService, ReputationLedger) {
        let store: Arc<dyn RecordStore> = Arc::new(SqliteStore::in_memory().unwrap());
        let ledger = ReputationLedger::new(store.clone(), PointCatalog::default());
        (store.clone(), PostService::new(store, ledger.clone()), ledger)
    }

    #[tokio::test]
    async fn test_create_awards_configured_points() {
        let store: Arc<dyn RecordStore> = Arc::new(SqliteStore::in_memory().unwrap());
        let catalog = PointCatalog::default().with_override(ScoredAction::CreatePost, 5);
        let ledger = ReputationLedger::new(store.clone(), catalog);
        let posts = PostService::new(store, ledger.clone());

        let post = posts
            .create_post(Some("alice"), "general", "hello", "body")
            .await
            .unwrap();
        assert_eq!(post.like_count, 0);
        assert_eq!(ledger.account("alice").await.unwrap().score, 5);
    }

    #[tokio::test]
    async fn test_flag_penalizes_author_with_floor() {
        let (_store, posts, ledger) = service();
        let post = posts
            .create_post(Some("alice"), "general", "hello", "")
            .await
            .unwrap();
        for _ in 0..5 {
            posts.flag_post(Some("bob"), post.id).await.unwrap();
        }
        // 10 - 5*3 floors at 0
        assert_eq!(ledger.account("alice").await.unwrap().score, 0);
    }

    #[tokio::test]
    async fn test_admin_removal_penalizes_author() {
        let (store, posts, ledger) = service();
        let post = posts
            .create_post(Some("alice"), "general", "hello", "")
            .await
            .unwrap();
        ledger.apply_action("alice", ScoredAction::PostTrending, 1).await.unwrap();

        let err = posts.remove_post(Some("bob"), post.id).await.unwrap_err();
        assert!(matches!(err, EngineError::Unauthorized(_)));

        ledger.set_admin("mod", true).await.unwrap();
        posts.remove_post(Some("mod"), post.id).await.unwrap();

        // 10 + 25 - 10
        assert_eq!(ledger.account("alice").await.unwrap().score, 25);
        assert_eq!(store.count(Table::Posts, &Filter::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_milestone_awards() {
        let (_store, posts, ledger) = service();
        let post = posts
            .create_post(Some("alice"), "general", "hello", "")
            .await
            .unwrap();
        posts.mark_milestone(post.id, Milestone::Popular).await.unwrap();
        let score = posts.mark_milestone(post.id, Milestone::Trending).await.unwrap();
        assert_eq!(score, 40);
        assert_eq!(ledger.account("alice").await.unwrap().score, 40);
    }
}
