//! Task groups: create, restyle, reorder and cascade-delete.
//!
//! In-memory state changes only after every remote write for an operation
//! has succeeded. Deleting a group first clears the reference on each of its
//! tasks, then removes the group row; the two writes are not atomic.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde_json::{json, Map, Value};

use crate::error::{Error, Result};
use crate::events::{EngineEvent, EventBus, EventKind};
use crate::model::{new_record_id, GroupRecord, ListScope, TaskRecord};
use crate::remote::{Filters, InsertOutcome, OrderBy, RemoteStore, Table};
use crate::sync::lock;

/// Fired once with the group created by the next successful [`GroupRegistry::create`].
pub type Continuation = Box<dyn FnOnce(&GroupRecord) + Send>;

#[derive(Default)]
struct RegistryState {
    groups: Vec<GroupRecord>,
    pending: Option<Continuation>,
}

impl RegistryState {
    fn sort(&mut self) {
        self.groups.sort_by(|left, right| {
            left.position
                .cmp(&right.position)
                .then_with(|| left.created_at.cmp(&right.created_at))
                .then_with(|| left.id.cmp(&right.id))
        });
    }
}

pub struct GroupRegistry {
    remote: Arc<dyn RemoteStore>,
    scope: ListScope,
    events: EventBus,
    state: Mutex<RegistryState>,
}

impl GroupRegistry {
    pub fn new(remote: Arc<dyn RemoteStore>, scope: ListScope, events: EventBus) -> Self {
        Self {
            remote,
            scope,
            events,
            state: Mutex::new(RegistryState::default()),
        }
    }

    pub async fn load(&self) -> Result<()> {
        let rows = self
            .remote
            .select(
                Table::Groups,
                &Filters::scoped(&self.scope),
                Some(&OrderBy::asc("position")),
            )
            .await?;
        let groups = rows
            .into_iter()
            .map(GroupRecord::from_row)
            .collect::<Result<Vec<_>>>()?;

        let mut state = lock(&self.state);
        state.groups = groups;
        state.sort();
        tracing::debug!(groups = state.groups.len(), "groups loaded");
        Ok(())
    }

    /// Groups in display order.
    pub fn groups(&self) -> Vec<GroupRecord> {
        lock(&self.state).groups.clone()
    }

    pub fn get(&self, id: &str) -> Option<GroupRecord> {
        lock(&self.state)
            .groups
            .iter()
            .find(|group| group.id == id)
            .cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        lock(&self.state).groups.iter().any(|group| group.id == id)
    }

    /// Group id to sort position.
    pub fn position_index(&self) -> HashMap<String, i32> {
        lock(&self.state)
            .groups
            .iter()
            .map(|group| (group.id.clone(), group.position))
            .collect()
    }

    /// Hold `continuation` until the next group is created. Replaces any
    /// continuation already waiting.
    pub fn request_create_then(&self, continuation: Continuation) {
        if lock(&self.state).pending.replace(continuation).is_some() {
            tracing::debug!("pending group continuation replaced");
        }
    }

    pub fn has_pending(&self) -> bool {
        lock(&self.state).pending.is_some()
    }

    pub fn cancel_pending(&self) {
        lock(&self.state).pending = None;
    }

    pub async fn create(
        &self,
        name: &str,
        color: Option<&str>,
        emoji: Option<&str>,
    ) -> Result<GroupRecord> {
        let name = validate_name(name)?;
        let position = lock(&self.state)
            .groups
            .iter()
            .map(|group| group.position)
            .max()
            .map_or(0, |max| max + 1);
        let group = GroupRecord {
            id: new_record_id(),
            owner_id: self.scope.owner_id.clone(),
            list_id: self.scope.list_id.clone(),
            name,
            color: color.and_then(non_empty),
            emoji: emoji.and_then(non_empty),
            position,
            created_at: Utc::now(),
        };

        match self.remote.insert(Table::Groups, group.to_row()?).await? {
            InsertOutcome::Inserted(_) => {}
            InsertOutcome::Conflict => {
                return Err(Error::DuplicateRecord {
                    table: Table::Groups.to_string(),
                    id: group.id,
                })
            }
        }

        let continuation = {
            let mut state = lock(&self.state);
            state.groups.push(group.clone());
            state.sort();
            state.pending.take()
        };
        if let Some(continuation) = continuation {
            tracing::debug!(group_id = %group.id, "firing pending group continuation");
            continuation(&group);
        }

        tracing::info!(group_id = %group.id, name = %group.name, position, "group created");
        self.events
            .emit(EngineEvent::for_group(EventKind::GroupCreated, group.id.as_str()));
        Ok(group)
    }

    /// Rename or restyle a group.
    pub async fn update(
        &self,
        id: &str,
        name: &str,
        color: Option<&str>,
        emoji: Option<&str>,
    ) -> Result<GroupRecord> {
        let name = validate_name(name)?;
        let mut updated = self
            .get(id)
            .ok_or_else(|| Error::GroupNotFound(id.to_string()))?;
        updated.name = name;
        updated.color = color.and_then(non_empty);
        updated.emoji = emoji.and_then(non_empty);

        let mut patch = Map::new();
        patch.insert("name".to_string(), Value::from(updated.name.as_str()));
        patch.insert("color".to_string(), json!(updated.color));
        patch.insert("emoji".to_string(), json!(updated.emoji));
        let affected = self
            .remote
            .update(Table::Groups, patch, &self.by_id(id))
            .await?;
        if affected == 0 {
            return Err(Error::GroupNotFound(id.to_string()));
        }

        let mut state = lock(&self.state);
        if let Some(group) = state.groups.iter_mut().find(|group| group.id == id) {
            *group = updated.clone();
        }
        drop(state);

        tracing::info!(group_id = %id, "group updated");
        self.events
            .emit(EngineEvent::for_group(EventKind::GroupUpdated, id));
        Ok(updated)
    }

    /// Clear the group from its tasks, then delete it.
    ///
    /// Returns how many task rows were reassigned. If the group row cannot be
    /// removed after the tasks were reassigned, the error is a partial
    /// cascade and local state is left as it was.
    pub async fn delete(&self, id: &str) -> Result<u64> {
        if !self.contains(id) {
            return Err(Error::GroupNotFound(id.to_string()));
        }

        let mut clear = Map::new();
        clear.insert("group_id".to_string(), Value::Null);
        let reassigned = self
            .remote
            .update(
                Table::Tasks,
                clear,
                &Filters::scoped(&self.scope).eq("group_id", id),
            )
            .await?;

        if let Err(err) = self.remote.delete(Table::Groups, &self.by_id(id)).await {
            tracing::warn!(group_id = %id, reassigned, error = %err, "group delete stopped after reassigning tasks");
            return Err(Error::cascade(
                format!("reassigning {reassigned} task(s) from group {id}"),
                err.into(),
            ));
        }

        lock(&self.state).groups.retain(|group| group.id != id);
        tracing::info!(group_id = %id, reassigned, "group deleted");
        self.events.emit(
            EngineEvent::for_group(EventKind::GroupDeleted, id)
                .with_data(json!({ "reassigned": reassigned })),
        );
        Ok(reassigned)
    }

    /// Write positions `0..n` in the order of `ids`, one group at a time.
    ///
    /// `ids` must name every group exactly once.
    pub async fn reorder(&self, ids: &[String]) -> Result<()> {
        {
            let state = lock(&self.state);
            if let Some(missing) = ids
                .iter()
                .find(|id| !state.groups.iter().any(|group| &group.id == *id))
            {
                return Err(Error::GroupNotFound(missing.clone()));
            }
            let distinct: HashSet<&String> = ids.iter().collect();
            if distinct.len() != ids.len() || ids.len() != state.groups.len() {
                return Err(Error::Validation(format!(
                    "reorder must list each of the {} groups once",
                    state.groups.len()
                )));
            }
        }

        for (index, id) in ids.iter().enumerate() {
            let position = i32::try_from(index)
                .map_err(|_| Error::Validation("too many groups to reorder".to_string()))?;
            let mut patch = Map::new();
            patch.insert("position".to_string(), Value::from(position));
            self.remote
                .update(Table::Groups, patch, &self.by_id(id))
                .await?;
        }

        let mut state = lock(&self.state);
        for (index, id) in ids.iter().enumerate() {
            if let Some(group) = state.groups.iter_mut().find(|group| &group.id == id) {
                group.position = index as i32;
            }
        }
        state.sort();
        drop(state);

        tracing::info!(groups = ids.len(), "groups reordered");
        self.events.emit(EngineEvent::new(EventKind::GroupsReordered));
        Ok(())
    }

    /// Delete group `id` if no task in `tasks` still references it.
    pub async fn prune_if_empty(&self, id: &str, tasks: &[TaskRecord]) -> Result<bool> {
        if !self.contains(id) {
            return Ok(false);
        }
        if tasks.iter().any(|task| task.group_id.as_deref() == Some(id)) {
            return Ok(false);
        }
        tracing::debug!(group_id = %id, "pruning empty group");
        self.delete(id).await?;
        Ok(true)
    }

    fn by_id(&self, id: &str) -> Filters {
        Filters::scoped(&self.scope).eq("id", id)
    }
}

fn validate_name(name: &str) -> Result<String> {
    non_empty(name).ok_or_else(|| Error::Validation("group name cannot be empty".to_string()))
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
