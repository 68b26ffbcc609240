// SqliteStore: rusqlite backend implementing the RecordStore trait.
//
// The Connection is wrapped in tokio::sync::Mutex because Connection is !Send.
// Trait methods lock the mutex, do synchronous rusqlite work, and return.
// The lock is never held across .await points.

use anyhow::Result;
use async_trait::async_trait;
use rusqlite::Connection;
use serde_json::Value;
use tokio::sync::Mutex;

use super::models::{Filter, Record, Table};
use super::traits::RecordStore;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Wrap an already-opened rusqlite Connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Fresh in-memory store with the schema applied. Used by tests and by
    /// dry runs of the CLI.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        super::schema::create_tables(&conn)?;
        Ok(Self::new(conn))
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn table_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::schema::table_count(&conn)
    }

    async fn find(&self, table: Table, filter: &Filter) -> Result<Vec<Record>> {
        let conn = self.conn.lock().await;
        super::queries::find(&conn, table, filter)
    }

    async fn count(&self, table: Table, filter: &Filter) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::queries::count(&conn, table, filter)
    }

    async fn insert(&self, table: Table, row: Record) -> Result<Record> {
        let conn = self.conn.lock().await;
        super::queries::insert(&conn, table, &row)
    }

    async fn update(&self, table: Table, filter: &Filter, patch: Record) -> Result<Record> {
        let conn = self.conn.lock().await;
        super::queries::update(&conn, table, filter, &patch)
    }

    async fn delete(&self, table: Table, filter: &Filter) -> Result<u64> {
        let conn = self.conn.lock().await;
        super::queries::delete(&conn, table, filter)
    }

    async fn increment_counter(
        &self,
        table: Table,
        id: Value,
        field: &str,
        delta: i64,
    ) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::queries::increment_counter(&conn, table, &id, field, delta)
    }
}
