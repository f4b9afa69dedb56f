//! Id-keyed cancellable timers.
//!
//! Each key owns at most one pending expiry. Arming a key aborts whatever was
//! pending for it, and every armed timer carries a generation so an expiry
//! that raced its own cancellation is discarded instead of applied.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::AbortHandle;

use crate::sync::lock;

struct Armed {
    generation: u64,
    handle: AbortHandle,
}

pub(crate) struct Timers<K> {
    armed: HashMap<K, Armed>,
    next_generation: u64,
}

impl<K: Eq + Hash + Clone> Timers<K> {
    pub(crate) fn new() -> Self {
        Self {
            armed: HashMap::new(),
            next_generation: 0,
        }
    }

    pub(crate) fn cancel(&mut self, key: &K) {
        if let Some(armed) = self.armed.remove(key) {
            armed.handle.abort();
        }
    }

    pub(crate) fn cancel_all(&mut self) {
        for (_, armed) in self.armed.drain() {
            armed.handle.abort();
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.armed.len()
    }

    fn reserve(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    fn install(&mut self, key: K, generation: u64, handle: AbortHandle) {
        if let Some(previous) = self.armed.insert(key, Armed { generation, handle }) {
            previous.handle.abort();
        }
    }

    /// Disarm `key` if `generation` is still the one armed for it.
    fn settle(&mut self, key: &K, generation: u64) -> bool {
        match self.armed.get(key) {
            Some(armed) if armed.generation == generation => {
                self.armed.remove(key);
                true
            }
            _ => false,
        }
    }
}

impl<K> Drop for Timers<K> {
    fn drop(&mut self) {
        for armed in self.armed.values() {
            armed.handle.abort();
        }
    }
}

/// State that owns a timer map.
pub(crate) trait TimerHost<K> {
    fn timers(&mut self) -> &mut Timers<K>;
}

/// Arm `key` on `state` (the locked contents of `owner`) to run `on_expire`
/// after `delay`, replacing any pending timer for the same key.
///
/// Must run inside a tokio runtime. The spawned task only holds a weak
/// reference, so dropping the owner lets pending timers fall through.
pub(crate) fn arm<S, K, F>(
    owner: &Arc<Mutex<S>>,
    state: &mut S,
    key: K,
    delay: Duration,
    on_expire: F,
) where
    S: TimerHost<K> + Send + 'static,
    K: Eq + Hash + Clone + Send + 'static,
    F: FnOnce(&mut S) + Send + 'static,
{
    let generation = state.timers().reserve();
    let weak = Arc::downgrade(owner);
    let expiring = key.clone();
    let task = tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let Some(owner) = weak.upgrade() else {
            return;
        };
        let mut state = lock(&owner);
        if state.timers().settle(&expiring, generation) {
            on_expire(&mut *state);
        }
    });
    state.timers().install(key, generation, task.abort_handle());
}
