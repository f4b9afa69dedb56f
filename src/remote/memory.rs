//! In-process [`RemoteStore`] with a write journal, latency and one-shot failure injection.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{Filters, InsertOutcome, OrderBy, RemoteError, RemoteResult, RemoteStore, Row, Table};
use crate::sync::lock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteKind {
    Insert,
    Update,
    Delete,
}

/// One write that reached the store, successful or not.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRecord {
    pub kind: WriteKind,
    pub table: Table,
    pub affected: u64,
    pub failed: bool,
}

#[derive(Default)]
struct MemoryState {
    tables: HashMap<Table, Vec<Row>>,
    journal: Vec<WriteRecord>,
    failures: Vec<(Table, WriteKind)>,
}

/// In-process `RemoteStore` with per-table unique columns.
///
/// Every table is unique on `id`; the reward log is also unique on `task_id`.
/// Writes are journaled, failures can be injected one call at a time, and an
/// optional latency suspends each call so in-flight states are observable.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    latency: Mutex<Option<Duration>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Suspend every call for `latency` before it touches the tables.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *lock(&self.latency) = latency;
    }

    /// Make the next `kind` write against `table` fail with `Unavailable`.
    pub fn fail_next(&self, table: Table, kind: WriteKind) {
        lock(&self.state).failures.push((table, kind));
    }

    /// Seed rows without journaling them.
    pub fn seed(&self, table: Table, rows: Vec<Row>) {
        lock(&self.state)
            .tables
            .entry(table)
            .or_default()
            .extend(rows);
    }

    pub fn rows(&self, table: Table) -> Vec<Row> {
        lock(&self.state)
            .tables
            .get(&table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn writes(&self) -> Vec<WriteRecord> {
        lock(&self.state).journal.clone()
    }

    pub fn write_count(&self) -> usize {
        lock(&self.state).journal.len()
    }

    fn unique_columns(table: Table) -> &'static [&'static str] {
        match table {
            Table::RewardLog => &["id", "task_id"],
            Table::Tasks | Table::Groups => &["id"],
        }
    }

    async fn pause(&self) {
        let latency = *lock(&self.latency);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl MemoryState {
    fn take_failure(&mut self, table: Table, kind: WriteKind) -> bool {
        match self
            .failures
            .iter()
            .position(|entry| *entry == (table, kind))
        {
            Some(index) => {
                self.failures.remove(index);
                true
            }
            None => false,
        }
    }

    fn record(&mut self, kind: WriteKind, table: Table, affected: u64, failed: bool) {
        self.journal.push(WriteRecord {
            kind,
            table,
            affected,
            failed,
        });
    }

    fn fail(&mut self, kind: WriteKind, table: Table) -> RemoteError {
        self.record(kind, table, 0, true);
        RemoteError::Unavailable(format!("injected {kind:?} failure on {table}"))
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn select(
        &self,
        table: Table,
        filters: &Filters,
        order: Option<&OrderBy>,
    ) -> RemoteResult<Vec<Row>> {
        self.pause().await;
        let state = lock(&self.state);
        let mut rows: Vec<Row> = state
            .tables
            .get(&table)
            .map(|rows| rows.iter().filter(|row| filters.matches(row)).cloned().collect())
            .unwrap_or_default();
        if let Some(order) = order {
            rows.sort_by(|left, right| order.compare(left, right));
        }
        Ok(rows)
    }

    async fn insert(&self, table: Table, row: Row) -> RemoteResult<InsertOutcome> {
        self.pause().await;
        let mut state = lock(&self.state);
        if state.take_failure(table, WriteKind::Insert) {
            return Err(state.fail(WriteKind::Insert, table));
        }

        let existing = state.tables.entry(table).or_default();
        let conflict = Self::unique_columns(table).iter().any(|column| {
            let Some(value) = row.get(*column).filter(|value| !value.is_null()) else {
                return false;
            };
            existing.iter().any(|other| other.get(*column) == Some(value))
        });
        if conflict {
            state.record(WriteKind::Insert, table, 0, false);
            return Ok(InsertOutcome::Conflict);
        }

        existing.push(row.clone());
        state.record(WriteKind::Insert, table, 1, false);
        Ok(InsertOutcome::Inserted(row))
    }

    async fn update(&self, table: Table, patch: Row, filters: &Filters) -> RemoteResult<u64> {
        self.pause().await;
        let mut state = lock(&self.state);
        if state.take_failure(table, WriteKind::Update) {
            return Err(state.fail(WriteKind::Update, table));
        }
        if patch.contains_key("id") {
            state.record(WriteKind::Update, table, 0, true);
            return Err(RemoteError::Rejected {
                table,
                message: "id column is immutable".to_string(),
            });
        }

        let mut affected = 0;
        for row in state.tables.entry(table).or_default().iter_mut() {
            if !filters.matches(row) {
                continue;
            }
            for (column, value) in &patch {
                row.insert(column.clone(), value.clone());
            }
            affected += 1;
        }
        state.record(WriteKind::Update, table, affected, false);
        Ok(affected)
    }

    async fn delete(&self, table: Table, filters: &Filters) -> RemoteResult<u64> {
        self.pause().await;
        let mut state = lock(&self.state);
        if state.take_failure(table, WriteKind::Delete) {
            return Err(state.fail(WriteKind::Delete, table));
        }

        let rows = state.tables.entry(table).or_default();
        let before = rows.len();
        rows.retain(|row| !filters.matches(row));
        let affected = (before - rows.len()) as u64;
        state.record(WriteKind::Delete, table, affected, false);
        Ok(affected)
    }
}
