// Prestige: the engagement-and-reputation engine behind the forum.
//
// This is the library root. Each module corresponds to one part of the
// engine; the record store is handed in from outside (see `db`).

pub mod comments;
pub mod config;
pub mod db;
pub mod engagement;
pub mod error;
pub mod output;
pub mod posts;
pub mod reputation;
pub mod status;

pub use error::{EngineError, Result};

use std::sync::Arc;

use db::RecordStore;
use reputation::{PointCatalog, RankTable, ReputationLedger};

/// Every service wired to one store, for callers that want all of them.
#[derive(Clone)]
pub struct Engine {
    pub store: Arc<dyn RecordStore>,
    pub ledger: ReputationLedger,
    pub engagement: engagement::EngagementService,
    pub comments: comments::CommentService,
    pub posts: posts::PostService,
    pub ranks: Arc<RankTable>,
}

impl Engine {
    pub fn new(store: Arc<dyn RecordStore>, catalog: PointCatalog, ranks: RankTable) -> Self {
        let ledger = ReputationLedger::new(store.clone(), catalog);
        Self {
            engagement: engagement::EngagementService::new(store.clone(), ledger.clone()),
            comments: comments::CommentService::new(store.clone(), ledger.clone()),
            posts: posts::PostService::new(store.clone(), ledger.clone()),
            ledger,
            store,
            ranks: Arc::new(ranks),
        }
    }
}
