// Record store trait: backend-agnostic async interface for all row access.
//
// Implementors: SqliteStore (wraps rusqlite). The engine only ever sees
// `Arc<dyn RecordStore>`, handed to it at construction time, so tests can
// swap in an in-memory database or a wrapper that injects failures.
//
// Every single call is atomic at the row level. Nothing here spans rows
// transactionally; callers that touch two rows (membership + counter) must
// tolerate the second write failing.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use super::models::{Filter, Record, Table};

#[async_trait]
pub trait RecordStore: Send + Sync {
    // --- Lifecycle ---

    /// Count the number of user-created tables in the store.
    async fn table_count(&self) -> Result<i64>;

    // --- Rows ---

    /// Read every row in `table` matching `filter`, in insertion order.
    async fn find(&self, table: Table, filter: &Filter) -> Result<Vec<Record>>;

    /// Count rows matching `filter` without materializing them.
    async fn count(&self, table: Table, filter: &Filter) -> Result<i64>;

    /// Insert a row and return it as stored (including generated id and
    /// defaulted columns).
    async fn insert(&self, table: Table, row: Record) -> Result<Record>;

    /// Apply `patch` to the single row matching `filter` and return it.
    /// Fails if no row matches.
    async fn update(&self, table: Table, filter: &Filter, patch: Record) -> Result<Record>;

    /// Delete all rows matching `filter`. Returns how many were removed.
    async fn delete(&self, table: Table, filter: &Filter) -> Result<u64>;

    // --- Counters ---

    /// Add `delta` to an integer column of the row with the given id, floored
    /// at zero, and return the stored value after the update.
    ///
    /// Fails if the row is missing or the column is NULL / non-numeric.
    async fn increment_counter(&self, table: Table, id: Value, field: &str, delta: i64)
        -> Result<i64>;
}
