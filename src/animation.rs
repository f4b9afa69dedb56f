//! Transient per-task visual states and their expiry timers.
//!
//! None of this is persisted. A task is in at most one of newly-created,
//! disappearing or reappearing at a time; the recently-moved highlight is a
//! single slot shared by all tasks and tracked separately.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::TransitionConfig;
use crate::events::{EngineEvent, EventBus, EventKind};
use crate::sort::SortSnapshot;
use crate::sync::lock;
use crate::timers::{arm, TimerHost, Timers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientState {
    Idle,
    NewlyCreated,
    Disappearing,
    Reappearing,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum TimerKey {
    Task(String),
    Moved,
}

struct AnimationState {
    newly_created: HashSet<String>,
    disappearing: HashMap<String, SortSnapshot>,
    reappearing: HashSet<String>,
    recently_moved: Option<String>,
    timers: Timers<TimerKey>,
    disposed: bool,
}

impl TimerHost<TimerKey> for AnimationState {
    fn timers(&mut self) -> &mut Timers<TimerKey> {
        &mut self.timers
    }
}

impl AnimationState {
    fn clear_task(&mut self, id: &str) {
        self.newly_created.remove(id);
        self.disappearing.remove(id);
        self.reappearing.remove(id);
    }
}

pub struct AnimationCoordinator {
    state: Arc<Mutex<AnimationState>>,
    delays: TransitionConfig,
    events: EventBus,
}

impl AnimationCoordinator {
    pub fn new(delays: TransitionConfig, events: EventBus) -> Self {
        Self {
            state: Arc::new(Mutex::new(AnimationState {
                newly_created: HashSet::new(),
                disappearing: HashMap::new(),
                reappearing: HashSet::new(),
                recently_moved: None,
                timers: Timers::new(),
                disposed: false,
            })),
            delays,
            events,
        }
    }

    /// idle -> newly created
    pub fn mark_created(&self, id: &str) {
        let delay = self.delays.newly_created();
        self.enter(
            id,
            delay,
            TransientState::NewlyCreated,
            |state, id| {
                state.newly_created.insert(id.to_string());
            },
            |state, id| state.newly_created.remove(id),
        );
    }

    /// idle -> disappearing, sorting by `snapshot` until the task leaves the view
    pub fn begin_disappearing(&self, id: &str, snapshot: SortSnapshot) {
        let delay = self.delays.disappear();
        self.enter(
            id,
            delay,
            TransientState::Disappearing,
            move |state, id| {
                state.disappearing.insert(id.to_string(), snapshot);
            },
            |state, id| state.disappearing.remove(id).is_some(),
        );
    }

    /// idle -> reappearing
    pub fn mark_reappearing(&self, id: &str) {
        let delay = self.delays.reappear();
        self.enter(
            id,
            delay,
            TransientState::Reappearing,
            |state, id| {
                state.reappearing.insert(id.to_string());
            },
            |state, id| state.reappearing.remove(id),
        );
    }

    /// Move the single highlight to `id`, cancelling the previous holder's expiry.
    pub fn mark_moved(&self, id: &str) {
        let mut state = lock(&self.state);
        if state.disposed {
            return;
        }
        if let Some(previous) = state.recently_moved.replace(id.to_string()) {
            if previous != id {
                tracing::debug!(task_id = %previous, "moved highlight replaced");
            }
        }
        let events = self.events.clone();
        let expected = id.to_string();
        arm(
            &self.state,
            &mut *state,
            TimerKey::Moved,
            self.delays.moved(),
            move |state: &mut AnimationState| {
                if state.recently_moved.as_deref() == Some(expected.as_str()) {
                    state.recently_moved = None;
                    events.emit(EngineEvent::for_task(EventKind::TransientExpired, expected));
                }
            },
        );
    }

    /// Drop all transient state for a task that no longer exists.
    pub fn forget(&self, id: &str) {
        let mut state = lock(&self.state);
        state.timers.cancel(&TimerKey::Task(id.to_string()));
        state.clear_task(id);
        if state.recently_moved.as_deref() == Some(id) {
            state.recently_moved = None;
            state.timers.cancel(&TimerKey::Moved);
        }
    }

    pub fn state_of(&self, id: &str) -> TransientState {
        let state = lock(&self.state);
        if state.newly_created.contains(id) {
            TransientState::NewlyCreated
        } else if state.disappearing.contains_key(id) {
            TransientState::Disappearing
        } else if state.reappearing.contains(id) {
            TransientState::Reappearing
        } else {
            TransientState::Idle
        }
    }

    pub fn is_newly_created(&self, id: &str) -> bool {
        lock(&self.state).newly_created.contains(id)
    }

    pub fn is_disappearing(&self, id: &str) -> bool {
        lock(&self.state).disappearing.contains_key(id)
    }

    pub fn is_reappearing(&self, id: &str) -> bool {
        lock(&self.state).reappearing.contains(id)
    }

    pub fn recently_moved(&self) -> Option<String> {
        lock(&self.state).recently_moved.clone()
    }

    /// Frozen sort fields of every disappearing task.
    pub fn snapshots(&self) -> HashMap<String, SortSnapshot> {
        lock(&self.state).disappearing.clone()
    }

    pub fn pending_timers(&self) -> usize {
        lock(&self.state).timers.len()
    }

    /// Cancel every timer and stop recording transitions.
    pub fn dispose(&self) {
        let mut state = lock(&self.state);
        state.disposed = true;
        state.timers.cancel_all();
        state.newly_created.clear();
        state.disappearing.clear();
        state.reappearing.clear();
        state.recently_moved = None;
    }

    fn enter<I, X>(
        &self,
        id: &str,
        delay: Duration,
        entered: TransientState,
        insert: I,
        expire: X,
    ) where
        I: FnOnce(&mut AnimationState, &str),
        X: FnOnce(&mut AnimationState, &str) -> bool + Send + 'static,
    {
        let mut state = lock(&self.state);
        if state.disposed {
            return;
        }
        // One transient state per task: the new transition supersedes the old one.
        state.timers.cancel(&TimerKey::Task(id.to_string()));
        state.clear_task(id);
        insert(&mut *state, id);
        tracing::debug!(task_id = %id, state = ?entered, "transient state entered");

        let events = self.events.clone();
        let expiring = id.to_string();
        arm(
            &self.state,
            &mut *state,
            TimerKey::Task(id.to_string()),
            delay,
            move |state: &mut AnimationState| {
                if expire(state, &expiring) {
                    tracing::debug!(task_id = %expiring, state = ?entered, "transient state expired");
                    events.emit(EngineEvent::for_task(EventKind::TransientExpired, expiring));
                }
            },
        );
    }
}

impl Drop for AnimationCoordinator {
    fn drop(&mut self) {
        lock(&self.state).timers.cancel_all();
    }
}
