//! Remote record store interface.
//!
//! The engine only needs filtered CRUD over three tables. Rows travel as JSON
//! objects so any backend offering equality filters and a sort column fits.

mod memory;

pub use memory::{MemoryStore, WriteKind, WriteRecord};

use std::cmp::Ordering;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::model::ListScope;

pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Tasks,
    Groups,
    RewardLog,
}

impl Table {
    pub fn as_str(self) -> &'static str {
        match self {
            Table::Tasks => "tasks",
            Table::Groups => "groups",
            Table::RewardLog => "reward_log",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by a remote store call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("{table} write rejected: {message}")]
    Rejected { table: Table, message: String },

    #[error("malformed row in {table}: {message}")]
    Malformed { table: Table, message: String },
}

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Result of an insert. A uniqueness violation is an outcome, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Inserted(Row),
    Conflict,
}

/// Conjunction of column equality filters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters {
    clauses: Vec<(String, Value)>,
}

impl Filters {
    /// Filters restricted to one owner's list.
    pub fn scoped(scope: &ListScope) -> Self {
        Self::default()
            .eq("owner_id", scope.owner_id.as_str())
            .eq("list_id", scope.list_id.as_str())
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.clauses.push((column.to_string(), value.into()));
        self
    }

    pub fn clauses(&self) -> &[(String, Value)] {
        &self.clauses
    }

    /// A missing column matches a `null` filter value.
    pub fn matches(&self, row: &Row) -> bool {
        self.clauses.iter().all(|(column, expected)| {
            row.get(column).unwrap_or(&Value::Null) == expected
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub descending: bool,
}

impl OrderBy {
    pub fn asc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            descending: false,
        }
    }

    pub fn desc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            descending: true,
        }
    }

    pub fn compare(&self, left: &Row, right: &Row) -> Ordering {
        let ordering = compare_values(
            left.get(&self.column).unwrap_or(&Value::Null),
            right.get(&self.column).unwrap_or(&Value::Null),
        );
        if self.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

fn compare_values(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(left), Value::Number(right)) => left
            .as_f64()
            .partial_cmp(&right.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(left), Value::String(right)) => left.cmp(right),
        (Value::Bool(left), Value::Bool(right)) => left.cmp(right),
        _ => Ordering::Equal,
    }
}

/// Filtered CRUD against the remote record store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn select(
        &self,
        table: Table,
        filters: &Filters,
        order: Option<&OrderBy>,
    ) -> RemoteResult<Vec<Row>>;

    async fn insert(&self, table: Table, row: Row) -> RemoteResult<InsertOutcome>;

    /// Apply `patch` to every matching row; returns the number of rows touched.
    async fn update(&self, table: Table, patch: Row, filters: &Filters) -> RemoteResult<u64>;

    /// Delete every matching row; returns the number of rows removed.
    async fn delete(&self, table: Table, filters: &Filters) -> RemoteResult<u64>;
}
