// Scorable actions and the point catalog.
//
// Every prestige change in the product goes through one of these actions.
// The point values live in a single `PointCatalog` (defaults below, optionally
// overridden from the environment) so call sites never carry literals.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// The closed set of actions that move a user's prestige.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScoredAction {
    CreatePost,
    CreateComment,
    PostLike,
    CommentLike,
    PostPopular,
    PostTrending,
    PostFlagged,
    PostDeleted,
    Violation,
    DailyLogin,
}

impl ScoredAction {
    pub const ALL: [ScoredAction; 10] = [
        ScoredAction::CreatePost,
        ScoredAction::CreateComment,
        ScoredAction::PostLike,
        ScoredAction::CommentLike,
        ScoredAction::PostPopular,
        ScoredAction::PostTrending,
        ScoredAction::PostFlagged,
        ScoredAction::PostDeleted,
        ScoredAction::Violation,
        ScoredAction::DailyLogin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScoredAction::CreatePost => "CREATE_POST",
            ScoredAction::CreateComment => "CREATE_COMMENT",
            ScoredAction::PostLike => "POST_LIKE",
            ScoredAction::CommentLike => "COMMENT_LIKE",
            ScoredAction::PostPopular => "POST_POPULAR",
            ScoredAction::PostTrending => "POST_TRENDING",
            ScoredAction::PostFlagged => "POST_FLAGGED",
            ScoredAction::PostDeleted => "POST_DELETED",
            ScoredAction::Violation => "VIOLATION",
            ScoredAction::DailyLogin => "DAILY_LOGIN",
        }
    }

    /// Canonical point value before any configured override.
    pub fn default_points(&self) -> i64 {
        match self {
            ScoredAction::CreatePost => 10,
            ScoredAction::CreateComment => 3,
            ScoredAction::PostLike => 2,
            ScoredAction::CommentLike => 1,
            ScoredAction::PostPopular => 5,
            ScoredAction::PostTrending => 25,
            ScoredAction::PostFlagged => -3,
            ScoredAction::PostDeleted => -10,
            ScoredAction::Violation => -30,
            ScoredAction::DailyLogin => 1,
        }
    }
}

impl fmt::Display for ScoredAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ScoredAction {
    type Err = EngineError;

    /// Accepts the catalog name in any case, with `-` or `_` separators.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('-', "_").to_ascii_uppercase();
        ScoredAction::ALL
            .into_iter()
            .find(|a| a.as_str() == normalized)
            .ok_or_else(|| EngineError::InvalidInput(format!("unknown action type: {s}")))
    }
}

/// Point value per action. Cheap to clone; built once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointCatalog {
    points: HashMap<ScoredAction, i64>,
}

impl Default for PointCatalog {
    fn default() -> Self {
        Self {
            points: ScoredAction::ALL
                .into_iter()
                .map(|a| (a, a.default_points()))
                .collect(),
        }
    }
}

impl PointCatalog {
    /// Replace the point value for one action.
    pub fn with_override(mut self, action: ScoredAction, points: i64) -> Self {
        self.points.insert(action, points);
        self
    }

    pub fn points(&self, action: ScoredAction) -> i64 {
        self.points
            .get(&action)
            .copied()
            .unwrap_or_else(|| action.default_points())
    }

    /// Signed delta for applying `action` `multiplier` times.
    pub fn delta(&self, action: ScoredAction, multiplier: i64) -> i64 {
        self.points(action).saturating_mul(multiplier)
    }

    /// All entries in declaration order, for display.
    pub fn entries(&self) -> Vec<(ScoredAction, i64)> {
        ScoredAction::ALL
            .into_iter()
            .map(|a| (a, self.points(a)))
            .collect()
    }
}
