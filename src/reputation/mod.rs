// Reputation: the scorable-action catalog, the prestige ledger, and the
// rank ladder that gates features by score.

pub mod catalog;
pub mod leaderboard;
pub mod ledger;
pub mod rank;

pub use catalog::{PointCatalog, ScoredAction};
pub use ledger::ReputationLedger;
pub use rank::{can_perform, Capability, Rank, RankTable, Threshold};
