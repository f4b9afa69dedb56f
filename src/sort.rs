//! Presentation order for a task list.
//!
//! Ordering is a pure function of the records, the group positions and the
//! frozen snapshots of tasks that are mid-exit. A task in the disappearing
//! set sorts by its snapshot so it stays in place until the exit finishes.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Priority, TaskRecord, TaskStatus};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    /// Status, group, priority, tags, creation time, title
    #[default]
    Smart,
    Title,
    Status,
    Priority,
    Group,
    Tags,
    CreatedAt,
    DoneDate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn by(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }
}

/// Sort-relevant fields of a task, frozen when its exit transition starts.
#[derive(Debug, Clone, PartialEq)]
pub struct SortSnapshot {
    pub status: TaskStatus,
    pub group_id: Option<String>,
    pub priority: Option<Priority>,
    pub tags: Vec<String>,
}

impl SortSnapshot {
    pub fn capture(task: &TaskRecord) -> Self {
        Self {
            status: task.status,
            group_id: task.group_id.clone(),
            priority: task.priority,
            tags: task.tags.clone(),
        }
    }
}

struct SortKey<'a> {
    task: &'a TaskRecord,
    status: TaskStatus,
    group_position: Option<i32>,
    priority: Option<Priority>,
    tag_key: String,
}

impl<'a> SortKey<'a> {
    fn new(
        task: &'a TaskRecord,
        snapshot: Option<&SortSnapshot>,
        group_index: &HashMap<String, i32>,
    ) -> Self {
        let (status, group_id, priority, tags) = match snapshot {
            Some(frozen) => (
                frozen.status,
                frozen.group_id.as_deref(),
                frozen.priority,
                frozen.tags.as_slice(),
            ),
            None => (
                task.status,
                task.group_id.as_deref(),
                task.priority,
                task.tags.as_slice(),
            ),
        };
        Self {
            task,
            status,
            group_position: group_id.and_then(|id| group_index.get(id).copied()),
            priority,
            tag_key: tags.join(",").to_lowercase(),
        }
    }
}

/// Order `records` for display.
pub fn order<'a>(
    records: &'a [TaskRecord],
    snapshots: &HashMap<String, SortSnapshot>,
    group_index: &HashMap<String, i32>,
    spec: SortSpec,
) -> Vec<&'a TaskRecord> {
    let mut keys: Vec<SortKey<'a>> = records
        .iter()
        .map(|task| SortKey::new(task, snapshots.get(&task.id), group_index))
        .collect();
    keys.sort_by(|left, right| compare(left, right, spec));
    keys.into_iter().map(|key| key.task).collect()
}

/// Filter and order `records` for display.
///
/// With `show_completed` off, done tasks are hidden unless they are still
/// disappearing (present in `snapshots`).
pub fn present(
    records: &[TaskRecord],
    snapshots: &HashMap<String, SortSnapshot>,
    group_index: &HashMap<String, i32>,
    spec: SortSpec,
    show_completed: bool,
) -> Vec<TaskRecord> {
    let visible: Vec<TaskRecord> = records
        .iter()
        .filter(|task| {
            show_completed || !task.status.is_done() || snapshots.contains_key(&task.id)
        })
        .cloned()
        .collect();
    order(&visible, snapshots, group_index, spec)
        .into_iter()
        .cloned()
        .collect()
}

fn compare(left: &SortKey<'_>, right: &SortKey<'_>, spec: SortSpec) -> Ordering {
    let primary = match spec.field {
        SortField::Smart => Ordering::Equal,
        SortField::Title => directed(
            collate(&left.task.title, &right.task.title),
            spec.direction,
        ),
        SortField::Status => directed(
            status_rank(left.status).cmp(&status_rank(right.status)),
            spec.direction,
        ),
        SortField::Priority => missing_last(
            present_priority(left.priority),
            present_priority(right.priority),
            spec.direction,
            |l, r| Priority::rank(Some(*l)).cmp(&Priority::rank(Some(*r))),
        ),
        SortField::Group => missing_last(
            left.group_position.as_ref(),
            right.group_position.as_ref(),
            spec.direction,
            |l, r| l.cmp(r),
        ),
        SortField::Tags => missing_last(
            non_empty(&left.tag_key),
            non_empty(&right.tag_key),
            spec.direction,
            |l, r| collate(l, r),
        ),
        SortField::CreatedAt => directed(
            left.task.created_at.cmp(&right.task.created_at),
            spec.direction,
        ),
        SortField::DoneDate => missing_last(
            left.task.done_date.as_ref(),
            right.task.done_date.as_ref(),
            spec.direction,
            |l: &&DateTime<Utc>, r: &&DateTime<Utc>| l.cmp(r),
        ),
    };
    primary.then_with(|| smart(left, right))
}

/// The default comparator chain; ends on id so the order is total.
fn smart(left: &SortKey<'_>, right: &SortKey<'_>) -> Ordering {
    smart_status_rank(left.status)
        .cmp(&smart_status_rank(right.status))
        .then_with(|| {
            missing_last(
                left.group_position.as_ref(),
                right.group_position.as_ref(),
                SortDirection::Asc,
                |l, r| l.cmp(r),
            )
        })
        .then_with(|| Priority::rank(left.priority).cmp(&Priority::rank(right.priority)))
        .then_with(|| {
            missing_last(
                non_empty(&left.tag_key),
                non_empty(&right.tag_key),
                SortDirection::Asc,
                |l, r| collate(l, r),
            )
        })
        .then_with(|| left.task.created_at.cmp(&right.task.created_at))
        .then_with(|| collate(&left.task.title, &right.task.title))
        .then_with(|| left.task.id.cmp(&right.task.id))
}

fn smart_status_rank(status: TaskStatus) -> u8 {
    match status {
        TaskStatus::NotStarted | TaskStatus::InProgress => 0,
        TaskStatus::Done => 1,
    }
}

fn status_rank(status: TaskStatus) -> u8 {
    match status {
        TaskStatus::NotStarted => 0,
        TaskStatus::InProgress => 1,
        TaskStatus::Done => 2,
    }
}

fn present_priority(priority: Option<Priority>) -> Option<Priority> {
    priority.filter(|value| *value != Priority::None)
}

fn non_empty(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn directed(ordering: Ordering, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

/// Present values ordered by `cmp` in `direction`; missing values last either way.
fn missing_last<T>(
    left: Option<T>,
    right: Option<T>,
    direction: SortDirection,
    cmp: impl Fn(&T, &T) -> Ordering,
) -> Ordering {
    match (left, right) {
        (Some(left), Some(right)) => directed(cmp(&left, &right), direction),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Case-insensitive comparison with a raw tie-break.
pub fn collate(left: &str, right: &str) -> Ordering {
    left.chars()
        .flat_map(char::to_lowercase)
        .cmp(right.chars().flat_map(char::to_lowercase))
        .then_with(|| left.cmp(right))
}
