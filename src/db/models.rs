// Data models: Rust structs that map to record store rows.
//
// The store itself is generic (rows are JSON maps keyed by column name), so
// this module owns the typed views the engine works with and the
// conversions in and out of `Record`.

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single row as the record store sees it: column name -> value.
pub type Record = Map<String, Value>;

/// The tables the engine reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Posts,
    Comments,
    Users,
    Likes,
}

impl Table {
    pub const ALL: [Table; 4] = [Table::Posts, Table::Comments, Table::Users, Table::Likes];

    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Posts => "posts",
            Table::Comments => "comments",
            Table::Users => "users",
            Table::Likes => "likes",
        }
    }

    /// Columns a filter, insert, or patch may name. Anything else is rejected
    /// before SQL is built.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Table::Posts => &[
                "id",
                "author_id",
                "board",
                "title",
                "content",
                "like_count",
                "comment_count",
                "created_at",
            ],
            Table::Comments => &[
                "id",
                "post_id",
                "parent_id",
                "author_id",
                "content",
                "like_count",
                "created_at",
            ],
            Table::Users => &[
                "id",
                "username",
                "prestige",
                "is_admin",
                "last_login_at",
                "created_at",
            ],
            Table::Likes => &["id", "subject_id", "subject_type", "user_id", "created_at"],
        }
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns().contains(&column)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A conjunction of column equalities. An empty filter matches every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match rows where `column` equals `value`. `Value::Null` matches NULL.
    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.clauses.push((column.to_string(), value.into()));
        self
    }

    pub fn by_id(id: impl Into<Value>) -> Self {
        Self::new().eq("id", id)
    }

    pub fn clauses(&self) -> &[(String, Value)] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

/// What kind of item a like (and a like counter) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectType {
    Post,
    Comment,
}

impl SubjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectType::Post => "post",
            SubjectType::Comment => "comment",
        }
    }

    /// The table holding the subject row and its denormalized counters.
    pub fn table(&self) -> Table {
        match self {
            SubjectType::Post => Table::Posts,
            SubjectType::Comment => Table::Comments,
        }
    }
}

impl fmt::Display for SubjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SubjectType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "post" => Ok(SubjectType::Post),
            "comment" => Ok(SubjectType::Comment),
            other => Err(anyhow!("unknown subject type: {other}")),
        }
    }
}

/// A post or comment, identified by row id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectRef {
    pub id: i64,
    pub kind: SubjectType,
}

impl SubjectRef {
    pub fn post(id: i64) -> Self {
        Self {
            id,
            kind: SubjectType::Post,
        }
    }

    pub fn comment(id: i64) -> Self {
        Self {
            id,
            kind: SubjectType::Comment,
        }
    }

    /// Filter selecting the membership rows for this subject.
    pub fn likes_filter(&self) -> Filter {
        Filter::new()
            .eq("subject_id", self.id)
            .eq("subject_type", self.kind.as_str())
    }
}

impl fmt::Display for SubjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

/// A forum post with its denormalized engagement counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: i64,
    pub author_id: String,
    pub board: String,
    pub title: String,
    pub content: String,
    pub like_count: i64,
    pub comment_count: i64,
    pub created_at: String,
}

/// A comment row. `parent_id == None` means a root comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: i64,
    pub post_id: i64,
    pub parent_id: Option<i64>,
    pub author_id: String,
    pub content: String,
    pub like_count: i64,
    pub created_at: String,
}

/// A user's reputation account (a view over the users table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReputationAccount {
    pub user_id: String,
    pub username: Option<String>,
    pub score: i64,
    pub is_admin: bool,
    pub last_login_at: Option<String>,
}

/// "User U likes item I". Existence of the row is the liked state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LikeMembership {
    pub subject: SubjectRef,
    pub user_id: String,
    pub created_at: String,
}

// --- Record conversions ---

fn field<'a>(record: &'a Record, column: &str) -> Option<&'a Value> {
    record.get(column).filter(|v| !v.is_null())
}

fn req_i64(record: &Record, column: &str) -> Result<i64> {
    field(record, column)
        .and_then(Value::as_i64)
        .with_context(|| format!("column {column} missing or not an integer"))
}

fn req_str(record: &Record, column: &str) -> Result<String> {
    field(record, column)
        .and_then(Value::as_str)
        .map(str::to_string)
        .with_context(|| format!("column {column} missing or not text"))
}

fn opt_str(record: &Record, column: &str) -> Option<String> {
    field(record, column)
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// SQLite has no boolean type, so flags come back as 0/1.
fn flag(record: &Record, column: &str) -> bool {
    match field(record, column) {
        Some(Value::Bool(b)) => *b,
        Some(v) => v.as_i64().is_some_and(|n| n != 0),
        None => false,
    }
}

impl PostRecord {
    pub fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            id: req_i64(record, "id")?,
            author_id: req_str(record, "author_id")?,
            board: opt_str(record, "board").unwrap_or_default(),
            title: opt_str(record, "title").unwrap_or_default(),
            content: opt_str(record, "content").unwrap_or_default(),
            like_count: req_i64(record, "like_count").unwrap_or(0),
            comment_count: req_i64(record, "comment_count").unwrap_or(0),
            created_at: opt_str(record, "created_at").unwrap_or_default(),
        })
    }
}

impl CommentRecord {
    pub fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            id: req_i64(record, "id")?,
            post_id: req_i64(record, "post_id")?,
            parent_id: field(record, "parent_id").and_then(Value::as_i64),
            author_id: req_str(record, "author_id")?,
            content: opt_str(record, "content").unwrap_or_default(),
            like_count: req_i64(record, "like_count").unwrap_or(0),
            created_at: opt_str(record, "created_at").unwrap_or_default(),
        })
    }
}

impl ReputationAccount {
    pub fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            user_id: req_str(record, "id")?,
            username: opt_str(record, "username"),
            score: req_i64(record, "prestige").unwrap_or(0),
            is_admin: flag(record, "is_admin"),
            last_login_at: opt_str(record, "last_login_at"),
        })
    }
}

impl LikeMembership {
    pub fn from_record(record: &Record) -> Result<Self> {
        let kind: SubjectType = req_str(record, "subject_type")?.parse()?;
        Ok(Self {
            subject: SubjectRef {
                id: req_i64(record, "subject_id")?,
                kind,
            },
            user_id: req_str(record, "user_id")?,
            created_at: opt_str(record, "created_at").unwrap_or_default(),
        })
    }
}

/// Build a `Record` from `(column, value)` pairs.
pub fn record<I, K, V>(pairs: I) -> Record
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
