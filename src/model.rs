//! Durable record types and the owner/list scope every remote call runs under.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::remote::Row;

/// Task progress state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    NotStarted,
    InProgress,
    Done,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "not-started",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Done => "done",
        }
    }

    pub fn is_done(self) -> bool {
        self == TaskStatus::Done
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
    None,
}

impl Priority {
    /// Rank used for ordering; `None` and a missing priority share the last rank.
    pub fn rank(priority: Option<Priority>) -> u8 {
        match priority {
            Some(Priority::High) => 0,
            Some(Priority::Medium) => 1,
            Some(Priority::Low) => 2,
            Some(Priority::None) | None => 3,
        }
    }
}

/// Owner and list identity; every query and write filters on both.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListScope {
    pub owner_id: String,
    pub list_id: String,
}

impl ListScope {
    pub fn new(owner_id: impl Into<String>, list_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            list_id: list_id.into(),
        }
    }
}

pub(crate) fn new_record_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub owner_id: String,
    pub list_id: String,
    pub title: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub done_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRecord {
    /// Build a new record from a validated draft.
    pub fn from_draft(scope: &ListScope, draft: &TaskDraft, now: DateTime<Utc>) -> Result<Self> {
        let title = draft.title.trim();
        if title.is_empty() {
            return Err(Error::Validation("title cannot be empty".to_string()));
        }
        Ok(Self {
            id: new_record_id(),
            owner_id: scope.owner_id.clone(),
            list_id: scope.list_id.clone(),
            title: title.to_string(),
            status: draft.status,
            priority: draft.priority,
            group_id: draft.group_id.clone(),
            tags: normalize_tags(&draft.tags),
            note: normalize_note(draft.note.as_deref()),
            done_date: draft.status.is_done().then_some(now),
            created_at: now,
            updated_at: now,
        })
    }

    /// Return a copy with `patch` applied, keeping `done_date` in step with `status`.
    pub fn patched(&self, patch: &TaskPatch, now: DateTime<Utc>) -> Result<Self> {
        let mut next = self.clone();
        if let Some(title) = patch.title.as_deref() {
            let title = title.trim();
            if title.is_empty() {
                return Err(Error::Validation("title cannot be empty".to_string()));
            }
            next.title = title.to_string();
        }
        if let Some(status) = patch.status {
            next.status = status;
            next.done_date = match (self.status.is_done(), status.is_done()) {
                (false, true) => Some(now),
                (true, true) => self.done_date.or(Some(now)),
                (_, false) => None,
            };
        }
        if let Some(priority) = patch.priority {
            next.priority = priority;
        }
        if let Some(group_id) = patch.group_id.as_ref() {
            next.group_id = group_id.clone();
        }
        if let Some(tags) = patch.tags.as_ref() {
            next.tags = normalize_tags(tags);
        }
        if let Some(note) = patch.note.as_ref() {
            next.note = normalize_note(note.as_deref());
        }
        next.updated_at = now;
        Ok(next)
    }

    pub fn to_row(&self) -> Result<Row> {
        to_row(self)
    }

    pub fn from_row(row: Row) -> Result<Self> {
        from_row(row)
    }
}

/// Values for a task that does not exist yet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskDraft {
    pub title: String,
    pub status: TaskStatus,
    pub priority: Option<Priority>,
    pub group_id: Option<String>,
    pub tags: Vec<String>,
    pub note: Option<String>,
}

impl TaskDraft {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// A partial change to a task. Nullable fields use `Some(None)` to clear.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Option<Priority>>,
    pub group_id: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub note: Option<Option<String>>,
}

impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.group_id.is_none()
            && self.tags.is_none()
            && self.note.is_none()
    }

    /// Columns that differ between `current` and `next`, ready for a remote update.
    pub(crate) fn changed_columns(current: &TaskRecord, next: &TaskRecord) -> Result<Row> {
        let before = current.to_row()?;
        let after = next.to_row()?;
        let mut changed = Map::new();
        for (column, value) in after {
            if before.get(&column) != Some(&value) {
                changed.insert(column, value);
            }
        }
        Ok(changed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub id: String,
    pub owner_id: String,
    pub list_id: String,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub emoji: Option<String>,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

impl GroupRecord {
    pub fn to_row(&self) -> Result<Row> {
        to_row(self)
    }

    pub fn from_row(row: Row) -> Result<Self> {
        from_row(row)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardLogEntry {
    pub id: String,
    pub owner_id: String,
    pub list_id: String,
    pub task_id: String,
    pub amount: u32,
    pub created_at: DateTime<Utc>,
}

impl RewardLogEntry {
    pub fn to_row(&self) -> Result<Row> {
        to_row(self)
    }

    pub fn from_row(row: Row) -> Result<Self> {
        from_row(row)
    }
}

/// Trim tags, drop empties and duplicates, keep first-seen order.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let trimmed = tag.trim();
        if trimmed.is_empty() || normalized.iter().any(|seen| seen == trimmed) {
            continue;
        }
        normalized.push(trimmed.to_string());
    }
    normalized
}

pub fn normalize_note(note: Option<&str>) -> Option<String> {
    note.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn to_row<T: Serialize>(record: &T) -> Result<Row> {
    match serde_json::to_value(record)? {
        Value::Object(row) => Ok(row),
        other => Err(Error::Malformed(format!("expected object, got {other}"))),
    }
}

fn from_row<T: for<'de> Deserialize<'de>>(row: Row) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(row))?)
}
