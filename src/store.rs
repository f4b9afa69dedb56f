//! Authoritative in-memory task list backed by a remote store.
//!
//! Every mutation runs under one global single-flight guard: while a write is
//! in flight any further mutation request is ignored and reported as
//! [`Outcome::Busy`]. Writes go to the remote store first and are merged into
//! memory only once they succeed, so a failure leaves the collection exactly
//! as it was and there is nothing to roll back.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde_json::json;
use tokio::sync::broadcast;

use crate::animation::AnimationCoordinator;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::events::{EngineEvent, EventBus, EventKind};
use crate::group::{Continuation, GroupRegistry};
use crate::model::{GroupRecord, ListScope, TaskDraft, TaskPatch, TaskRecord, TaskStatus};
use crate::remote::{Filters, InsertOutcome, OrderBy, RemoteStore, Table};
use crate::reward::RewardLedger;
use crate::sort::{self, SortSnapshot, SortSpec};
use crate::sync::lock;

/// What currently holds the single-flight guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Busy {
    Task(String),
    /// Any group operation
    Groups,
}

/// Result of a guarded mutation.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub enum Outcome<T> {
    Applied(T),
    /// Ignored because another mutation was in flight.
    Busy,
}

impl<T> Outcome<T> {
    pub fn applied(self) -> Option<T> {
        match self {
            Outcome::Applied(value) => Some(value),
            Outcome::Busy => None,
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, Outcome::Busy)
    }
}

struct StoreState {
    tasks: Vec<TaskRecord>,
    in_flight: Option<Busy>,
    show_completed: bool,
    sort: SortSpec,
}

/// Clears the guard on every exit path, including a dropped future.
struct FlightGuard<'a> {
    state: &'a Mutex<StoreState>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        lock(self.state).in_flight = None;
    }
}

pub struct TaskStore {
    remote: Arc<dyn RemoteStore>,
    scope: ListScope,
    events: EventBus,
    groups: GroupRegistry,
    rewards: RewardLedger,
    animations: AnimationCoordinator,
    state: Mutex<StoreState>,
}

impl TaskStore {
    /// Build a store for one list. The config is validated first, so an
    /// inverted reward range is rejected here instead of on a completion.
    pub fn new(remote: Arc<dyn RemoteStore>, scope: ListScope, config: Config) -> Result<Self> {
        config.validate()?;
        let events = EventBus::new();
        let groups = GroupRegistry::new(remote.clone(), scope.clone(), events.clone());
        let rewards = RewardLedger::new(
            remote.clone(),
            scope.clone(),
            config.rewards.clone(),
            config.transitions.recent_gain(),
            events.clone(),
        )?;
        let animations = AnimationCoordinator::new(config.transitions.clone(), events.clone());
        Ok(Self {
            remote,
            scope,
            events,
            groups,
            rewards,
            animations,
            state: Mutex::new(StoreState {
                tasks: Vec::new(),
                in_flight: None,
                show_completed: config.view.show_completed,
                sort: config.view.sort(),
            }),
        })
    }

    /// Fetch tasks, groups and the reward log for this list.
    ///
    /// Replaces whatever was held before; call it before issuing mutations.
    pub async fn load(&self) -> Result<()> {
        let rows = self
            .remote
            .select(
                Table::Tasks,
                &Filters::scoped(&self.scope),
                Some(&OrderBy::asc("created_at")),
            )
            .await?;
        let tasks = rows
            .into_iter()
            .map(TaskRecord::from_row)
            .collect::<Result<Vec<_>>>()?;
        self.groups.load().await?;
        self.rewards.load().await?;

        let count = tasks.len();
        lock(&self.state).tasks = tasks;
        tracing::info!(
            owner_id = %self.scope.owner_id,
            list_id = %self.scope.list_id,
            tasks = count,
            "task list loaded"
        );
        Ok(())
    }

    pub async fn create(&self, draft: TaskDraft) -> Result<Outcome<TaskRecord>> {
        let task = TaskRecord::from_draft(&self.scope, &draft, Utc::now())?;
        self.ensure_group(task.group_id.as_deref())?;
        let Some(_flight) = self.begin(Busy::Task(task.id.clone())) else {
            return Ok(Outcome::Busy);
        };

        let row = task.to_row()?;
        match self.remote.insert(Table::Tasks, row).await {
            Ok(InsertOutcome::Inserted(_)) => {}
            Ok(InsertOutcome::Conflict) => {
                let err = Error::DuplicateRecord {
                    table: Table::Tasks.to_string(),
                    id: task.id.clone(),
                };
                return Err(self.failed("create", Some(&task.id), err));
            }
            Err(err) => return Err(self.failed("create", Some(&task.id), err.into())),
        }

        lock(&self.state).tasks.push(task.clone());
        self.animations.mark_created(&task.id);
        tracing::info!(task_id = %task.id, title = %task.title, "task created");
        self.events
            .emit(EngineEvent::for_task(EventKind::TaskCreated, task.id.as_str()));
        if task.status.is_done() {
            self.issue_reward(&task.id).await;
        }
        Ok(Outcome::Applied(task))
    }

    /// Apply an edit. Marks the task as recently moved.
    pub async fn update(&self, id: &str, patch: TaskPatch) -> Result<Outcome<TaskRecord>> {
        let Some(_flight) = self.begin(Busy::Task(id.to_string())) else {
            return Ok(Outcome::Busy);
        };
        let current = self.require(id)?;
        if let Some(group_id) = patch.group_id.as_ref() {
            self.ensure_group(group_id.as_deref())?;
        }
        let next = current.patched(&patch, Utc::now())?;
        let Some(next) = self.write_changes("update", &current, next).await? else {
            return Ok(Outcome::Applied(current));
        };

        self.after_status_change(&current, &next).await;
        self.animations.mark_moved(id);
        tracing::info!(task_id = %id, "task updated");
        self.events
            .emit(EngineEvent::for_task(EventKind::TaskUpdated, id));
        Ok(Outcome::Applied(next))
    }

    /// Move a task to `target`. Entering done pays the completion reward.
    pub async fn toggle_status(
        &self,
        id: &str,
        target: TaskStatus,
    ) -> Result<Outcome<TaskRecord>> {
        let Some(_flight) = self.begin(Busy::Task(id.to_string())) else {
            return Ok(Outcome::Busy);
        };
        let current = self.require(id)?;
        if current.status == target {
            return Ok(Outcome::Applied(current));
        }
        let next = current.patched(&TaskPatch::status(target), Utc::now())?;
        let Some(next) = self.write_changes("toggle_status", &current, next).await? else {
            return Ok(Outcome::Applied(current));
        };

        self.after_status_change(&current, &next).await;
        Ok(Outcome::Applied(next))
    }

    /// Delete a task, then drop its group if nothing else references it.
    pub async fn delete(&self, id: &str) -> Result<Outcome<()>> {
        let Some(_flight) = self.begin(Busy::Task(id.to_string())) else {
            return Ok(Outcome::Busy);
        };
        let current = self.require(id)?;

        match self.remote.delete(Table::Tasks, &self.by_id(id)).await {
            Ok(0) => return Err(self.failed("delete", Some(id), Error::TaskNotFound(id.to_string()))),
            Ok(_) => {}
            Err(err) => return Err(self.failed("delete", Some(id), err.into())),
        }

        let remaining = {
            let mut state = lock(&self.state);
            state.tasks.retain(|task| task.id != id);
            state.tasks.clone()
        };
        self.animations.forget(id);
        tracing::info!(task_id = %id, "task deleted");
        self.events
            .emit(EngineEvent::for_task(EventKind::TaskDeleted, id));

        if let Some(group_id) = current.group_id.as_deref() {
            if let Err(err) = self.groups.prune_if_empty(group_id, &remaining).await {
                let err = Error::cascade(format!("deleting task {id}"), err);
                return Err(self.failed("delete", Some(id), err));
            }
        }
        Ok(Outcome::Applied(()))
    }

    pub async fn create_group(
        &self,
        name: &str,
        color: Option<&str>,
        emoji: Option<&str>,
    ) -> Result<Outcome<GroupRecord>> {
        let Some(_flight) = self.begin(Busy::Groups) else {
            return Ok(Outcome::Busy);
        };
        match self.groups.create(name, color, emoji).await {
            Ok(group) => Ok(Outcome::Applied(group)),
            Err(err) => Err(self.failed("create_group", None, err)),
        }
    }

    pub async fn update_group(
        &self,
        id: &str,
        name: &str,
        color: Option<&str>,
        emoji: Option<&str>,
    ) -> Result<Outcome<GroupRecord>> {
        let Some(_flight) = self.begin(Busy::Groups) else {
            return Ok(Outcome::Busy);
        };
        match self.groups.update(id, name, color, emoji).await {
            Ok(group) => Ok(Outcome::Applied(group)),
            Err(err) => Err(self.failed("update_group", None, err)),
        }
    }

    /// Delete a group, leaving its tasks ungrouped. Returns how many tasks
    /// were reassigned.
    pub async fn delete_group(&self, id: &str) -> Result<Outcome<u64>> {
        let Some(_flight) = self.begin(Busy::Groups) else {
            return Ok(Outcome::Busy);
        };
        let reassigned = match self.groups.delete(id).await {
            Ok(reassigned) => reassigned,
            Err(err) => return Err(self.failed("delete_group", None, err)),
        };
        for task in lock(&self.state).tasks.iter_mut() {
            if task.group_id.as_deref() == Some(id) {
                task.group_id = None;
            }
        }
        Ok(Outcome::Applied(reassigned))
    }

    pub async fn reorder_groups(&self, ids: &[String]) -> Result<Outcome<()>> {
        let Some(_flight) = self.begin(Busy::Groups) else {
            return Ok(Outcome::Busy);
        };
        match self.groups.reorder(ids).await {
            Ok(()) => Ok(Outcome::Applied(())),
            Err(err) => Err(self.failed("reorder_groups", None, err)),
        }
    }

    /// Run `continuation` with the next group created.
    pub fn request_group_then(&self, continuation: Continuation) {
        self.groups.request_create_then(continuation);
    }

    pub fn set_show_completed(&self, show_completed: bool) {
        lock(&self.state).show_completed = show_completed;
    }

    pub fn show_completed(&self) -> bool {
        lock(&self.state).show_completed
    }

    pub fn set_sort(&self, spec: SortSpec) {
        lock(&self.state).sort = spec;
    }

    pub fn sort(&self) -> SortSpec {
        lock(&self.state).sort
    }

    /// Visible tasks in presentation order.
    pub fn view(&self) -> Vec<TaskRecord> {
        let snapshots = self.animations.snapshots();
        let group_index = self.groups.position_index();
        let state = lock(&self.state);
        sort::present(
            &state.tasks,
            &snapshots,
            &group_index,
            state.sort,
            state.show_completed,
        )
    }

    /// Every loaded task, in load order.
    pub fn tasks(&self) -> Vec<TaskRecord> {
        lock(&self.state).tasks.clone()
    }

    pub fn task(&self, id: &str) -> Option<TaskRecord> {
        lock(&self.state)
            .tasks
            .iter()
            .find(|task| task.id == id)
            .cloned()
    }

    pub fn is_busy(&self) -> bool {
        lock(&self.state).in_flight.is_some()
    }

    /// Whether the in-flight mutation targets task `id`.
    pub fn busy_with(&self, id: &str) -> bool {
        matches!(&lock(&self.state).in_flight, Some(Busy::Task(busy)) if busy == id)
    }

    pub fn in_flight(&self) -> Option<Busy> {
        lock(&self.state).in_flight.clone()
    }

    pub fn scope(&self) -> &ListScope {
        &self.scope
    }

    pub fn groups(&self) -> &GroupRegistry {
        &self.groups
    }

    pub fn rewards(&self) -> &RewardLedger {
        &self.rewards
    }

    pub fn animations(&self) -> &AnimationCoordinator {
        &self.animations
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Sweep every pending timer. Transitions requested afterwards are ignored.
    pub fn dispose(&self) {
        self.animations.dispose();
        self.rewards.dispose();
        tracing::debug!("task store disposed");
    }

    fn begin(&self, busy: Busy) -> Option<FlightGuard<'_>> {
        let mut state = lock(&self.state);
        if let Some(holder) = state.in_flight.as_ref() {
            tracing::debug!(requested = ?busy, holder = ?holder, "mutation ignored while another is in flight");
            return None;
        }
        state.in_flight = Some(busy);
        Some(FlightGuard { state: &self.state })
    }

    fn require(&self, id: &str) -> Result<TaskRecord> {
        self.task(id)
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))
    }

    fn ensure_group(&self, group_id: Option<&str>) -> Result<()> {
        match group_id {
            Some(group_id) if !self.groups.contains(group_id) => {
                Err(Error::GroupNotFound(group_id.to_string()))
            }
            _ => Ok(()),
        }
    }

    fn by_id(&self, id: &str) -> Filters {
        Filters::scoped(&self.scope).eq("id", id)
    }

    /// Write the columns that differ between `current` and `next`, then merge
    /// `next` into memory. `None` when nothing but the timestamp would change.
    async fn write_changes(
        &self,
        operation: &'static str,
        current: &TaskRecord,
        next: TaskRecord,
    ) -> Result<Option<TaskRecord>> {
        let changed = TaskPatch::changed_columns(current, &next)?;
        if changed.keys().all(|column| column == "updated_at") {
            tracing::debug!(task_id = %current.id, "no columns changed; skipping write");
            return Ok(None);
        }

        match self
            .remote
            .update(Table::Tasks, changed, &self.by_id(&current.id))
            .await
        {
            Ok(0) => {
                let err = Error::TaskNotFound(current.id.clone());
                return Err(self.failed(operation, Some(&current.id), err));
            }
            Ok(_) => {}
            Err(err) => return Err(self.failed(operation, Some(&current.id), err.into())),
        }

        let mut state = lock(&self.state);
        if let Some(task) = state.tasks.iter_mut().find(|task| task.id == next.id) {
            *task = next.clone();
        }
        Ok(Some(next))
    }

    async fn after_status_change(&self, before: &TaskRecord, after: &TaskRecord) {
        if before.status == after.status {
            return;
        }
        match (before.status.is_done(), after.status.is_done()) {
            (false, true) => {
                if !self.show_completed() {
                    self.animations
                        .begin_disappearing(&after.id, SortSnapshot::capture(before));
                }
                self.issue_reward(&after.id).await;
            }
            (true, false) => self.animations.mark_reappearing(&after.id),
            _ => {}
        }
        tracing::info!(
            task_id = %after.id,
            from = before.status.as_str(),
            to = after.status.as_str(),
            "task status changed"
        );
        self.events.emit(
            EngineEvent::for_task(EventKind::TaskStatusChanged, after.id.as_str()).with_data(
                json!({ "from": before.status, "to": after.status }),
            ),
        );
    }

    /// The status write already landed, so a reward failure is reported but
    /// does not fail the mutation. The next completion retries it.
    async fn issue_reward(&self, task_id: &str) {
        if let Err(err) = self.rewards.award(task_id).await {
            self.failed("award", Some(task_id), err);
        }
    }

    fn failed(&self, operation: &'static str, task_id: Option<&str>, err: Error) -> Error {
        tracing::warn!(operation, task_id = ?task_id, error = %err, "mutation failed");
        let mut event = EngineEvent::new(EventKind::MutationFailed).with_data(json!({
            "operation": operation,
            "message": err.user_message(),
        }));
        event.task_id = task_id.map(str::to_string);
        self.events.emit(event);
        err
    }
}

impl Drop for TaskStore {
    fn drop(&mut self) {
        self.dispose();
    }
}
