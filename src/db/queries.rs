// Database queries: generic row access for every table.
//
// Every SQL statement the store issues is built here. Table names come from
// the `Table` enum and column names are checked against its whitelist, so
// the only caller-controlled text that reaches SQL travels as bound
// parameters.

use anyhow::{bail, Context, Result};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use serde_json::{Number, Value};

use super::models::{Filter, Record, Table};

// --- Value conversion ---

/// Convert a JSON value into something SQLite can bind.
fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or(0.0)),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        // Nested structures are stored as JSON text
        other => SqlValue::Text(other.to_string()),
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(i.into()),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(_) => Value::Null,
    }
}

fn row_to_record(row: &Row<'_>, columns: &[String]) -> rusqlite::Result<Record> {
    let mut record = Record::new();
    for (i, name) in columns.iter().enumerate() {
        record.insert(name.clone(), from_sql(row.get_ref(i)?));
    }
    Ok(record)
}

// --- SQL building ---

fn check_column(table: Table, column: &str) -> Result<()> {
    if !table.has_column(column) {
        bail!("unknown column {column:?} for table {table}");
    }
    Ok(())
}

/// Render `filter` as a WHERE clause, pushing bound values onto `params`.
fn where_clause(table: Table, filter: &Filter, params: &mut Vec<SqlValue>) -> Result<String> {
    if filter.is_empty() {
        return Ok(String::new());
    }
    let mut parts = Vec::with_capacity(filter.clauses().len());
    for (column, value) in filter.clauses() {
        check_column(table, column)?;
        if value.is_null() {
            parts.push(format!("{column} IS NULL"));
        } else {
            params.push(to_sql(value));
            parts.push(format!("{column} = ?{}", params.len()));
        }
    }
    Ok(format!(" WHERE {}", parts.join(" AND ")))
}

fn query_records(conn: &Connection, sql: &str, params: Vec<SqlValue>) -> Result<Vec<Record>> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let rows = stmt.query_map(params_from_iter(params), |row| row_to_record(row, &columns))?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row?);
    }
    Ok(records)
}

// --- Rows ---

/// Read all rows matching `filter`, oldest first.
pub fn find(conn: &Connection, table: Table, filter: &Filter) -> Result<Vec<Record>> {
    let mut params = Vec::new();
    let sql = format!(
        "SELECT * FROM {table}{} ORDER BY rowid",
        where_clause(table, filter, &mut params)?
    );
    query_records(conn, &sql, params).with_context(|| format!("find on {table} failed"))
}

pub fn count(conn: &Connection, table: Table, filter: &Filter) -> Result<i64> {
    let mut params = Vec::new();
    let sql = format!(
        "SELECT COUNT(*) FROM {table}{}",
        where_clause(table, filter, &mut params)?
    );
    let n: i64 = conn
        .query_row(&sql, params_from_iter(params), |row| row.get(0))
        .with_context(|| format!("count on {table} failed"))?;
    Ok(n)
}

/// Insert a row and return it as stored.
pub fn insert(conn: &Connection, table: Table, row: &Record) -> Result<Record> {
    let sql;
    let mut params = Vec::with_capacity(row.len());
    if row.is_empty() {
        sql = format!("INSERT INTO {table} DEFAULT VALUES RETURNING *");
    } else {
        let mut columns = Vec::with_capacity(row.len());
        let mut placeholders = Vec::with_capacity(row.len());
        for (column, value) in row {
            check_column(table, column)?;
            params.push(to_sql(value));
            columns.push(column.as_str());
            placeholders.push(format!("?{}", params.len()));
        }
        sql = format!(
            "INSERT INTO {table} ({}) VALUES ({}) RETURNING *",
            columns.join(", "),
            placeholders.join(", ")
        );
    }

    query_records(conn, &sql, params)
        .with_context(|| format!("insert into {table} failed"))?
        .into_iter()
        .next()
        .with_context(|| format!("insert into {table} returned no row"))
}

/// Patch the row matching `filter` and return it.
pub fn update(conn: &Connection, table: Table, filter: &Filter, patch: &Record) -> Result<Record> {
    if patch.is_empty() {
        bail!("empty patch for {table}");
    }
    if filter.is_empty() {
        bail!("refusing unfiltered update on {table}");
    }

    let mut params = Vec::with_capacity(patch.len());
    let mut sets = Vec::with_capacity(patch.len());
    for (column, value) in patch {
        check_column(table, column)?;
        params.push(to_sql(value));
        sets.push(format!("{column} = ?{}", params.len()));
    }
    let sql = format!(
        "UPDATE {table} SET {}{} RETURNING *",
        sets.join(", "),
        where_clause(table, filter, &mut params)?
    );

    query_records(conn, &sql, params)
        .with_context(|| format!("update on {table} failed"))?
        .into_iter()
        .next()
        .with_context(|| format!("update on {table} matched no row"))
}

pub fn delete(conn: &Connection, table: Table, filter: &Filter) -> Result<u64> {
    let mut params = Vec::new();
    let sql = format!(
        "DELETE FROM {table}{}",
        where_clause(table, filter, &mut params)?
    );
    let removed = conn
        .execute(&sql, params_from_iter(params))
        .with_context(|| format!("delete on {table} failed"))?;
    Ok(removed as u64)
}

// --- Counters ---

/// Relative, floored-at-zero update of a single integer column.
///
/// The read-modify-write happens inside one UPDATE statement, so concurrent
/// deltas against the same row commute.
pub fn increment_counter(
    conn: &Connection,
    table: Table,
    id: &Value,
    field: &str,
    delta: i64,
) -> Result<i64> {
    check_column(table, field)?;
    if field == "id" {
        bail!("id is not a counter");
    }

    let sql = format!(
        "UPDATE {table} SET {field} = MAX(0, {field} + ?1) WHERE id = ?2 RETURNING {field}"
    );
    let stored: Option<Option<i64>> = conn
        .query_row(&sql, [SqlValue::Integer(delta), to_sql(id)], |row| {
            Ok(match row.get_ref(0)? {
                ValueRef::Integer(n) => Some(n),
                _ => None,
            })
        })
        .optional()
        .with_context(|| format!("increment of {table}.{field} failed"))?;

    match stored {
        None => bail!("no {table} row with id {id}"),
        Some(None) => bail!("{table}.{field} for id {id} is not a number"),
        Some(Some(n)) => Ok(n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::record;
    use crate::db::schema::create_tables;
    use serde_json::json;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        conn
    }

    fn seed_post(conn: &Connection, like_count: i64) -> i64 {
        let row = insert(
            conn,
            Table::Posts,
            &record([
                ("author_id", json!("alice")),
                ("title", json!("hello")),
                ("like_count", json!(like_count)),
            ]),
        )
        .unwrap();
        row["id"].as_i64().unwrap()
    }

    #[test]
    fn test_insert_returns_defaults() {
        let conn = test_conn();
        let row = insert(&conn, Table::Posts, &record([("author_id", "alice")])).unwrap();
        assert_eq!(row["like_count"], json!(0));
        assert_eq!(row["comment_count"], json!(0));
        assert!(row["created_at"].is_string());
    }

    #[test]
    fn test_find_with_null_filter() {
        let conn = test_conn();
        insert(
            &conn,
            Table::Comments,
            &record([("post_id", json!(1)), ("author_id", json!("a"))]),
        )
        .unwrap();
        insert(
            &conn,
            Table::Comments,
            &record([
                ("post_id", json!(1)),
                ("author_id", json!("b")),
                ("parent_id", json!(1)),
            ]),
        )
        .unwrap();

        let roots = find(&conn, Table::Comments, &Filter::new().eq("parent_id", Value::Null)).unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0]["author_id"], json!("a"));

        let all = find(&conn, Table::Comments, &Filter::new().eq("post_id", 1)).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_unknown_column_rejected() {
        let conn = test_conn();
        let err = find(&conn, Table::Posts, &Filter::new().eq("1=1 OR id", 1)).unwrap_err();
        assert!(err.to_string().contains("unknown column"));
    }

    #[test]
    fn test_update_returns_patched_row() {
        let conn = test_conn();
        let id = seed_post(&conn, 0);
        let row = update(
            &conn,
            Table::Posts,
            &Filter::by_id(id),
            &record([("title", "edited")]),
        )
        .unwrap();
        assert_eq!(row["title"], json!("edited"));
    }

    #[test]
    fn test_update_missing_row_is_error() {
        let conn = test_conn();
        let result = update(
            &conn,
            Table::Posts,
            &Filter::by_id(404),
            &record([("title", "x")]),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_increment_and_floor() {
        let conn = test_conn();
        let id = seed_post(&conn, 5);
        assert_eq!(increment_counter(&conn, Table::Posts, &json!(id), "like_count", 1).unwrap(), 6);
        assert_eq!(
            increment_counter(&conn, Table::Posts, &json!(id), "like_count", -10).unwrap(),
            0
        );
    }

    #[test]
    fn test_increment_missing_row_is_error() {
        let conn = test_conn();
        assert!(increment_counter(&conn, Table::Posts, &json!(99), "like_count", 1).is_err());
    }

    #[test]
    fn test_delete_counts_rows() {
        let conn = test_conn();
        let id = seed_post(&conn, 0);
        assert_eq!(delete(&conn, Table::Posts, &Filter::by_id(id)).unwrap(), 1);
        assert_eq!(delete(&conn, Table::Posts, &Filter::by_id(id)).unwrap(), 0);
        assert_eq!(count(&conn, Table::Posts, &Filter::new()).unwrap(), 0);
    }
}
