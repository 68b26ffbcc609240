// System status display: shows store size, row counts, and rank spread.

use anyhow::Result;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::db::models::ReputationAccount;
use crate::db::{Filter, RecordStore, Table};
use crate::reputation::RankTable;

/// Display system status to the terminal.
pub async fn show(store: &Arc<dyn RecordStore>, db_display_path: &str, ranks: &RankTable) -> Result<()> {
    if !Path::new(db_display_path).exists() {
        println!("Database: not initialized");
        println!("\nRun `prestige init` to set up the database.");
        return Ok(());
    }

    let file_size = std::fs::metadata(db_display_path)
        .map(|m| format_bytes(m.len()))
        .unwrap_or_else(|_| "unknown".to_string());
    println!("Database: {} ({})", db_display_path, file_size);

    for table in Table::ALL {
        let rows = store.count(table, &Filter::new()).await?;
        println!("  {:<10} {:>8} rows", table.as_str(), rows);
    }

    // How many accounts sit at each rank
    let users = store.find(Table::Users, &Filter::new()).await?;
    let mut spread: BTreeMap<(i64, String), usize> = BTreeMap::new();
    for row in &users {
        let account = ReputationAccount::from_record(row)?;
        let rank = ranks.resolve(account.score, account.is_admin);
        // Admin rank sorts after every score rank
        let order = rank.min_score().unwrap_or(i64::MAX);
        *spread.entry((order, rank.label.clone())).or_default() += 1;
    }

    if spread.is_empty() {
        println!("Accounts: none yet");
    } else {
        println!("Accounts by rank:");
        for ((_, label), n) in &spread {
            println!("  {:<22} {:>6}", label, n);
        }
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
