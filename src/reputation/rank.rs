// Rank resolution: maps a prestige score to a named tier and answers
// capability checks against it.
//
// Ranks are an ascending threshold table. The admin rank is not part of the
// table: it is reached only through the admin flag, never by score.
// Resolution and capability checks are pure; nothing here touches the store.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// A named permission that ranks grant or deny.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    CreatePost,
    Comment,
    Like,
    /// Posting beyond one post per rolling 24h window
    UnlimitedPosting,
    ExternalLinks,
    InviteOnlyThreads,
    AnalyticsPreview,
    HighlightedComments,
    DistinguishedName,
    LeaderboardListing,
    Moderate,
    ManageBoards,
    ManageAds,
}

impl Capability {
    pub const ALL: [Capability; 13] = [
        Capability::CreatePost,
        Capability::Comment,
        Capability::Like,
        Capability::UnlimitedPosting,
        Capability::ExternalLinks,
        Capability::InviteOnlyThreads,
        Capability::AnalyticsPreview,
        Capability::HighlightedComments,
        Capability::DistinguishedName,
        Capability::LeaderboardListing,
        Capability::Moderate,
        Capability::ManageBoards,
        Capability::ManageAds,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::CreatePost => "create-post",
            Capability::Comment => "comment",
            Capability::Like => "like",
            Capability::UnlimitedPosting => "unlimited-posting",
            Capability::ExternalLinks => "external-links",
            Capability::InviteOnlyThreads => "invite-only-threads",
            Capability::AnalyticsPreview => "analytics-preview",
            Capability::HighlightedComments => "highlighted-comments",
            Capability::DistinguishedName => "distinguished-name",
            Capability::LeaderboardListing => "leaderboard-listing",
            Capability::Moderate => "moderate",
            Capability::ManageBoards => "manage-boards",
            Capability::ManageAds => "manage-ads",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Capability {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('_', "-").to_ascii_lowercase();
        Capability::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| EngineError::InvalidInput(format!("unknown capability: {s}")))
    }
}

/// Where a rank starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Threshold {
    Score(i64),
    AdminOnly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rank {
    pub threshold: Threshold,
    pub label: String,
    /// Color name for badge rendering ("green", "bright red", ...)
    pub color_hint: String,
    pub capabilities: BTreeSet<Capability>,
    /// Explicit denials; these win over anything in `capabilities`
    pub restrictions: BTreeSet<Capability>,
}

impl Rank {
    /// Score at which the rank starts. The admin rank reports `None`.
    pub fn min_score(&self) -> Option<i64> {
        match self.threshold {
            Threshold::Score(s) => Some(s),
            Threshold::AdminOnly => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.threshold == Threshold::AdminOnly
    }

    pub fn can_perform(&self, capability: Capability) -> bool {
        can_perform(capability, self)
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}

/// Whether `rank` allows `capability`. Denials win over grants.
pub fn can_perform(capability: Capability, rank: &Rank) -> bool {
    !rank.restrictions.contains(&capability) && rank.capabilities.contains(&capability)
}

/// The ordered rank table plus the side-channel admin rank.
///
/// Deserialized tables go through [`RankTable::new`], so a loaded table is
/// always total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRankTable")]
pub struct RankTable {
    ranks: Vec<Rank>,
    admin: Rank,
}

#[derive(Deserialize)]
struct RawRankTable {
    ranks: Vec<Rank>,
    admin: Rank,
}

impl TryFrom<RawRankTable> for RankTable {
    type Error = EngineError;

    fn try_from(raw: RawRankTable) -> Result<Self, Self::Error> {
        Self::new(raw.ranks, raw.admin)
    }
}

impl Default for RankTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl RankTable {
    /// Build a table, checking that it is total and strictly ascending.
    pub fn new(ranks: Vec<Rank>, admin: Rank) -> Result<Self, EngineError> {
        match ranks.first().map(|r| r.threshold) {
            Some(Threshold::Score(0)) => {}
            _ => {
                return Err(EngineError::InvalidInput(
                    "rank table must start with a rank at score 0".to_string(),
                ))
            }
        }

        let mut previous = None;
        for rank in &ranks {
            let Some(min) = rank.min_score() else {
                return Err(EngineError::InvalidInput(format!(
                    "rank {} is admin-only and cannot sit in the score table",
                    rank.label
                )));
            };
            if previous.is_some_and(|p| p >= min) {
                return Err(EngineError::InvalidInput(format!(
                    "rank {} is out of order (min score {min})",
                    rank.label
                )));
            }
            previous = Some(min);
        }

        if !admin.is_admin() {
            return Err(EngineError::InvalidInput(format!(
                "admin rank {} must use the admin-only threshold",
                admin.label
            )));
        }

        Ok(Self { ranks, admin })
    }

    /// The product's rank ladder.
    pub fn standard() -> Self {
        use Capability::*;

        let tiers: [(i64, &str, &str, &[Capability], &[Capability]); 7] = [
            (
                0,
                "Commoner",
                "white",
                &[CreatePost, Comment, Like],
                &[UnlimitedPosting, ExternalLinks],
            ),
            (50, "Disciple", "green", &[UnlimitedPosting], &[ExternalLinks]),
            (100, "Inner-Gate Disciple", "cyan", &[ExternalLinks], &[]),
            (200, "Steward", "blue", &[InviteOnlyThreads], &[]),
            (400, "Elder", "magenta", &[AnalyticsPreview], &[]),
            (700, "Advisor", "yellow", &[HighlightedComments], &[]),
            (
                1000,
                "Grandmaster",
                "red",
                &[DistinguishedName, LeaderboardListing],
                &[],
            ),
        ];

        // Each rank keeps everything granted below it
        let mut granted = BTreeSet::new();
        let ranks = tiers
            .into_iter()
            .map(|(min, label, color, grants, restricts)| {
                granted.extend(grants.iter().copied());
                Rank {
                    threshold: Threshold::Score(min),
                    label: label.to_string(),
                    color_hint: color.to_string(),
                    capabilities: granted.clone(),
                    restrictions: restricts.iter().copied().collect(),
                }
            })
            .collect();

        let admin = Rank {
            threshold: Threshold::AdminOnly,
            label: "Court Official".to_string(),
            color_hint: "bright red".to_string(),
            capabilities: Capability::ALL.into_iter().collect(),
            restrictions: BTreeSet::new(),
        };

        Self { ranks, admin }
    }

    /// Highest rank whose threshold the score meets; the admin rank whenever
    /// `is_admin` is set.
    pub fn resolve(&self, score: i64, is_admin: bool) -> &Rank {
        if is_admin {
            return &self.admin;
        }
        self.ranks
            .iter()
            .rev()
            .find(|r| r.min_score().is_some_and(|min| min <= score))
            // Only reachable for negative scores, which the ledger never
            // stores; `new` guarantees a rank at score 0
            .unwrap_or(&self.ranks[0])
    }

    /// The next rank up and how many points it takes to get there.
    pub fn next_rank(&self, score: i64) -> Option<(&Rank, i64)> {
        self.ranks.iter().find_map(|r| match r.min_score() {
            Some(min) if min > score => Some((r, min - score)),
            _ => None,
        })
    }

    /// Score-reachable ranks, ascending.
    pub fn ranks(&self) -> &[Rank] {
        &self.ranks
    }

    pub fn admin(&self) -> &Rank {
        &self.admin
    }
}
