//! Engine notifications for presentation shells.
//!
//! Events are broadcast to every subscriber; a shell re-renders its view when
//! one arrives. Sending with no subscribers is not an error.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

pub const EVENT_SCHEMA_VERSION: &str = "listkeep.event.v1";

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// High-level event kinds emitted by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TaskCreated,
    TaskUpdated,
    TaskStatusChanged,
    TaskDeleted,
    GroupCreated,
    GroupUpdated,
    GroupDeleted,
    GroupsReordered,
    RewardIssued,
    TransientExpired,
    MutationFailed,
}

/// A structured event with optional payload.
#[derive(Debug, Clone, Serialize)]
pub struct EngineEvent {
    pub schema_version: &'static str,
    pub event: EventKind,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl EngineEvent {
    pub fn new(event: EventKind) -> Self {
        Self {
            schema_version: EVENT_SCHEMA_VERSION,
            event,
            timestamp: Utc::now(),
            task_id: None,
            group_id: None,
            data: None,
        }
    }

    pub fn for_task(event: EventKind, task_id: impl Into<String>) -> Self {
        let mut built = Self::new(event);
        built.task_id = Some(task_id.into());
        built
    }

    pub fn for_group(event: EventKind, group_id: impl Into<String>) -> Self {
        let mut built = Self::new(event);
        built.group_id = Some(group_id.into());
        built
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Cloneable broadcast handle shared by the engine components.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: EngineEvent) {
        tracing::trace!(event = ?event.event, task_id = ?event.task_id, "engine event");
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
