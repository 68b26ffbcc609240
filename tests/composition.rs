// Composition tests: verifying that the services chain together correctly.
//
// These tests exercise the data flow between modules through one Engine:
//   Post -> Comments -> Likes -> Ledger -> Rank
// against an in-memory SQLite store, with no filesystem side effects.

use std::sync::Arc;

use chrono::{TimeZone, Utc};

use prestige::db::{Filter, RecordStore, SqliteStore, SubjectRef, Table};
use prestige::engagement::reconcile_counters;
use prestige::posts::Milestone;
use prestige::reputation::leaderboard::leaderboard;
use prestige::reputation::{Capability, PointCatalog, RankTable, ScoredAction};
use prestige::{Engine, EngineError};

fn engine() -> Engine {
    let store: Arc<dyn RecordStore> = Arc::new(SqliteStore::in_memory().unwrap());
    Engine::new(store, PointCatalog::default(), RankTable::standard())
}

// ============================================================
// Chain: Post -> Comments -> Thread
// ============================================================

#[tokio::test]
async fn thread_reflects_comments_and_counters() {
    let engine = engine();
    let post = engine
        .posts
        .create_post(Some("alice"), "general", "First post", "hello")
        .await
        .unwrap();

    let root = engine
        .comments
        .create_comment(Some("bob"), post.id, None, "nice")
        .await
        .unwrap();
    let reply = engine
        .comments
        .create_comment(Some("alice"), post.id, Some(root.id), "thanks")
        .await
        .unwrap();
    engine
        .comments
        .create_comment(Some("carol"), post.id, None, "second thread")
        .await
        .unwrap();

    let forest = engine.comments.fetch_thread(post.id).await.unwrap();
    assert_eq!(forest.len(), 2);
    assert_eq!(forest[0].comment.id, root.id);
    assert_eq!(forest[0].replies[0].comment.id, reply.id);

    let post = engine.posts.get_post(post.id).await.unwrap();
    assert_eq!(post.comment_count, 3);

    // alice: post 10 + comment 3; bob: comment 3
    assert_eq!(engine.ledger.account("alice").await.unwrap().score, 13);
    assert_eq!(engine.ledger.account("bob").await.unwrap().score, 3);
}

#[tokio::test]
async fn reply_to_another_posts_comment_is_rejected() {
    let engine = engine();
    let a = engine.posts.create_post(Some("alice"), "general", "A", "").await.unwrap();
    let b = engine.posts.create_post(Some("alice"), "general", "B", "").await.unwrap();
    let on_a = engine
        .comments
        .create_comment(Some("bob"), a.id, None, "on a")
        .await
        .unwrap();

    let err = engine
        .comments
        .create_comment(Some("bob"), b.id, Some(on_a.id), "cross-post reply")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { .. }));
}

// ============================================================
// Chain: Likes -> Ledger -> Rank
// ============================================================

#[tokio::test]
async fn likes_move_the_author_up_the_ladder() {
    let engine = engine();
    let post = engine
        .posts
        .create_post(Some("alice"), "general", "Popular", "")
        .await
        .unwrap();

    // 10 for the post + 20 likes * 2 = 50, the Disciple threshold
    for i in 0..20 {
        let outcome = engine
            .engagement
            .toggle_like(Some(&format!("fan{i}")), SubjectRef::post(post.id))
            .await
            .unwrap();
        assert!(outcome.liked);
    }

    let rank = engine.ledger.rank_of(&engine.ranks, "alice").await.unwrap();
    assert_eq!(rank.label, "Disciple");
    assert!(rank.can_perform(Capability::UnlimitedPosting));
    assert!(!rank.can_perform(Capability::ExternalLinks));

    // One unlike drops the author back below the threshold
    engine
        .engagement
        .toggle_like(Some("fan0"), SubjectRef::post(post.id))
        .await
        .unwrap();
    let rank = engine.ledger.rank_of(&engine.ranks, "alice").await.unwrap();
    assert_eq!(rank.label, "Commoner");
}

#[tokio::test]
async fn penalties_never_push_score_below_zero() {
    let engine = engine();
    let post = engine
        .posts
        .create_post(Some("mallory"), "general", "spam", "")
        .await
        .unwrap();

    for _ in 0..3 {
        engine.posts.flag_post(Some("reader"), post.id).await.unwrap();
    }
    let score = engine
        .ledger
        .apply_action("mallory", ScoredAction::Violation, 1)
        .await
        .unwrap();
    assert_eq!(score, 0);
    assert_eq!(engine.ranks.resolve(score, false).label, "Commoner");
}

#[tokio::test]
async fn admin_removal_penalizes_author_and_clears_everything() {
    let engine = engine();
    engine.ledger.set_admin("mod", true).await.unwrap();
    let post = engine
        .posts
        .create_post(Some("alice"), "general", "Off topic", "")
        .await
        .unwrap();
    let comment = engine
        .comments
        .create_comment(Some("bob"), post.id, None, "agreed")
        .await
        .unwrap();
    engine
        .engagement
        .toggle_like(Some("carol"), SubjectRef::comment(comment.id))
        .await
        .unwrap();

    // Plain users cannot remove someone else's post
    let denied = engine.posts.remove_post(Some("bob"), post.id).await.unwrap_err();
    assert!(matches!(denied, EngineError::Unauthorized(_)));

    engine.posts.remove_post(Some("mod"), post.id).await.unwrap();
    assert!(matches!(
        engine.posts.get_post(post.id).await.unwrap_err(),
        EngineError::NotFound { .. }
    ));
    assert!(engine.comments.fetch_thread(post.id).await.unwrap().is_empty());
    assert_eq!(engine.store.count(Table::Likes, &Filter::new()).await.unwrap(), 0);

    // 10 for posting, -10 for the admin removal
    assert_eq!(engine.ledger.account("alice").await.unwrap().score, 0);
    assert_eq!(engine.ranks.resolve(0, true).label, "Court Official");
}

#[tokio::test]
async fn milestones_and_daily_login_feed_the_leaderboard() {
    let engine = engine();
    let post = engine
        .posts
        .create_post(Some("alice"), "general", "Viral", "")
        .await
        .unwrap();
    engine.posts.mark_milestone(post.id, Milestone::Popular).await.unwrap();
    engine.posts.mark_milestone(post.id, Milestone::Trending).await.unwrap();
    // 10 + 5 + 25 = 40, then straight to Grandmaster
    engine
        .ledger
        .apply_action("alice", ScoredAction::PostTrending, 39)
        .await
        .unwrap();

    let day = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
    let first = engine.ledger.record_login("alice", day).await.unwrap();
    let again = engine
        .ledger
        .record_login("alice", day + chrono::Duration::hours(6))
        .await
        .unwrap();
    assert_eq!(first, Some(40 + 39 * 25 + 1));
    assert_eq!(again, None);

    engine.ledger.apply_action("bob", ScoredAction::CreatePost, 1).await.unwrap();

    let board = leaderboard(&engine.store, &engine.ranks, 10).await.unwrap();
    assert_eq!(board.len(), 1);
    assert_eq!(board[0].account.user_id, "alice");
    assert_eq!(board[0].rank_label, "Grandmaster");
}

#[tokio::test]
async fn reconcile_after_normal_traffic_changes_nothing() {
    let engine = engine();
    let post = engine
        .posts
        .create_post(Some("alice"), "general", "Quiet", "")
        .await
        .unwrap();
    let comment = engine
        .comments
        .create_comment(Some("bob"), post.id, None, "hi")
        .await
        .unwrap();
    engine
        .engagement
        .toggle_like(Some("carol"), SubjectRef::post(post.id))
        .await
        .unwrap();
    engine
        .engagement
        .toggle_like(Some("carol"), SubjectRef::comment(comment.id))
        .await
        .unwrap();
    engine.comments.delete_comment(Some("bob"), comment.id).await.unwrap();

    let report = reconcile_counters(&engine.store, 4).await.unwrap();
    assert_eq!(report.checked, 1);
    assert_eq!(report.corrected, 0);
    assert_eq!(report.failed, 0);
}
