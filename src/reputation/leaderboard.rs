// Leaderboard: accounts whose rank earns them a public listing.

use std::sync::Arc;

use serde::Serialize;

use crate::db::models::ReputationAccount;
use crate::db::{Filter, RecordStore, Table};
use crate::error::Result;

use super::rank::{Capability, RankTable};

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    pub account: ReputationAccount,
    pub rank_label: String,
    pub color_hint: String,
}

/// Top `limit` accounts by score among those whose resolved rank grants
/// `LeaderboardListing`. Admins are listed by their score like everyone else
/// only if their score alone would qualify.
pub async fn leaderboard(
    store: &Arc<dyn RecordStore>,
    ranks: &RankTable,
    limit: usize,
) -> Result<Vec<LeaderboardEntry>> {
    let rows = store.find(Table::Users, &Filter::new()).await?;

    let mut accounts = Vec::with_capacity(rows.len());
    for row in &rows {
        accounts.push(ReputationAccount::from_record(row)?);
    }

    accounts.retain(|a| {
        ranks
            .resolve(a.score, false)
            .can_perform(Capability::LeaderboardListing)
    });
    // Ties break by user id so the listing is stable between calls
    accounts.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.user_id.cmp(&b.user_id)));
    accounts.truncate(limit);

    Ok(accounts
        .into_iter()
        .map(|account| {
            let rank = ranks.resolve(account.score, account.is_admin);
            LeaderboardEntry {
                rank_label: rank.label.clone(),
                color_hint: rank.color_hint.clone(),
                account,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use crate::reputation::{PointCatalog, ReputationLedger, ScoredAction};

    #[tokio::test]
    async fn test_only_grandmasters_listed_in_order() {
        let store: Arc<dyn RecordStore> = Arc::new(SqliteStore::in_memory().unwrap());
        let ledger = ReputationLedger::new(store.clone(), PointCatalog::default());

        // 40 * 25 = 1000, 50 * 25 = 1250, 10 * 25 = 250
        ledger.apply_action("a", ScoredAction::PostTrending, 40).await.unwrap();
        ledger.apply_action("b", ScoredAction::PostTrending, 50).await.unwrap();
        ledger.apply_action("c", ScoredAction::PostTrending, 10).await.unwrap();

        let board = leaderboard(&store, &RankTable::standard(), 10).await.unwrap();
        let ids: Vec<&str> = board.iter().map(|e| e.account.user_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(board[0].rank_label, "Grandmaster");
    }
}
