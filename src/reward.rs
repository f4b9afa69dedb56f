//! Completion rewards and level progress.
//!
//! Each task earns at most one reward. The remote log is unique on
//! `task_id`, so an insert conflict means another session already paid out
//! and is reported as [`AwardOutcome::AlreadyRewarded`] rather than an error.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use serde_json::json;

use crate::config::RewardConfig;
use crate::error::Result;
use crate::events::{EngineEvent, EventBus, EventKind};
use crate::model::{new_record_id, ListScope, RewardLogEntry};
use crate::remote::{Filters, InsertOutcome, OrderBy, RemoteStore, Table};
use crate::sync::lock;
use crate::timers::{arm, TimerHost, Timers};

/// Level derived from a cumulative reward total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelProgress {
    pub level: u32,
    pub total: u64,
    /// Points earned inside the current level
    pub into_level: u64,
    /// Points the current level takes to clear
    pub next_threshold: u64,
}

impl LevelProgress {
    /// Fraction of the current level already earned, in `[0, 1)`.
    pub fn progress_to_next(&self) -> f64 {
        if self.next_threshold == 0 {
            return 0.0;
        }
        self.into_level as f64 / self.next_threshold as f64
    }
}

/// Points needed to clear `level`: `base * growth^(level - 1)`, never below `base`.
pub fn threshold(level: u32, base: u64, growth: f64) -> u64 {
    let exponent = i32::try_from(level.saturating_sub(1)).unwrap_or(i32::MAX);
    let scaled = (base as f64 * growth.powi(exponent)).floor();
    if !scaled.is_finite() || scaled >= u64::MAX as f64 {
        return u64::MAX;
    }
    (scaled as u64).max(base)
}

pub fn level_progress(total: u64, config: &RewardConfig) -> LevelProgress {
    let mut level = 1;
    let mut remaining = total;
    loop {
        let needed = threshold(level, config.level_base, config.level_growth);
        if needed == 0 || remaining < needed {
            return LevelProgress {
                level,
                total,
                into_level: remaining,
                next_threshold: needed,
            };
        }
        remaining -= needed;
        level += 1;
    }
}

/// Most recent payout, shown briefly after a completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecentGain {
    pub task_id: String,
    pub amount: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AwardOutcome {
    Awarded { amount: u32, progress: LevelProgress },
    AlreadyRewarded,
}

struct LedgerState {
    rewarded: HashSet<String>,
    pending: HashSet<String>,
    total: u64,
    recent_gain: Option<RecentGain>,
    timers: Timers<()>,
    disposed: bool,
}

impl TimerHost<()> for LedgerState {
    fn timers(&mut self) -> &mut Timers<()> {
        &mut self.timers
    }
}

pub struct RewardLedger {
    remote: Arc<dyn RemoteStore>,
    scope: ListScope,
    config: RewardConfig,
    recent_gain_delay: Duration,
    events: EventBus,
    state: Arc<Mutex<LedgerState>>,
}

impl RewardLedger {
    /// Fails with [`crate::Error::InvalidConfig`] when the reward range is empty
    /// or the level curve is degenerate.
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        scope: ListScope,
        config: RewardConfig,
        recent_gain_delay: Duration,
        events: EventBus,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            remote,
            scope,
            config,
            recent_gain_delay,
            events,
            state: Arc::new(Mutex::new(LedgerState {
                rewarded: HashSet::new(),
                pending: HashSet::new(),
                total: 0,
                recent_gain: None,
                timers: Timers::new(),
                disposed: false,
            })),
        })
    }

    /// Replace the local cache with the remote log for this list.
    pub async fn load(&self) -> Result<()> {
        let rows = self
            .remote
            .select(
                Table::RewardLog,
                &Filters::scoped(&self.scope),
                Some(&OrderBy::asc("created_at")),
            )
            .await?;
        let entries = rows
            .into_iter()
            .map(RewardLogEntry::from_row)
            .collect::<Result<Vec<_>>>()?;

        let mut state = lock(&self.state);
        state.rewarded = entries.iter().map(|entry| entry.task_id.clone()).collect();
        state.total = entries.iter().map(|entry| u64::from(entry.amount)).sum();
        tracing::debug!(entries = entries.len(), total = state.total, "reward log loaded");
        Ok(())
    }

    /// Pay out for a completed task, at most once per task.
    pub async fn award(&self, task_id: &str) -> Result<AwardOutcome> {
        {
            let mut state = lock(&self.state);
            if state.rewarded.contains(task_id) || !state.pending.insert(task_id.to_string()) {
                tracing::debug!(task_id = %task_id, "reward already issued");
                return Ok(AwardOutcome::AlreadyRewarded);
            }
        }

        let amount = rand::thread_rng().gen_range(self.config.min_amount..=self.config.max_amount);
        let entry = RewardLogEntry {
            id: new_record_id(),
            owner_id: self.scope.owner_id.clone(),
            list_id: self.scope.list_id.clone(),
            task_id: task_id.to_string(),
            amount,
            created_at: Utc::now(),
        };
        let inserted = self.insert(&entry).await;

        let mut state = lock(&self.state);
        state.pending.remove(task_id);
        match inserted? {
            InsertOutcome::Conflict => {
                state.rewarded.insert(task_id.to_string());
                tracing::info!(task_id = %task_id, "reward log already holds this task");
                Ok(AwardOutcome::AlreadyRewarded)
            }
            InsertOutcome::Inserted(_) => {
                state.rewarded.insert(task_id.to_string());
                state.total += u64::from(amount);
                let progress = level_progress(state.total, &self.config);
                self.show_gain(&mut state, task_id, amount);
                tracing::info!(
                    task_id = %task_id,
                    amount,
                    total = progress.total,
                    level = progress.level,
                    "reward issued"
                );
                self.events.emit(
                    EngineEvent::for_task(EventKind::RewardIssued, task_id).with_data(json!({
                        "amount": amount,
                        "total": progress.total,
                        "level": progress.level,
                    })),
                );
                Ok(AwardOutcome::Awarded { amount, progress })
            }
        }
    }

    pub fn progress(&self) -> LevelProgress {
        level_progress(lock(&self.state).total, &self.config)
    }

    pub fn total(&self) -> u64 {
        lock(&self.state).total
    }

    pub fn is_rewarded(&self, task_id: &str) -> bool {
        lock(&self.state).rewarded.contains(task_id)
    }

    pub fn recent_gain(&self) -> Option<RecentGain> {
        lock(&self.state).recent_gain.clone()
    }

    pub fn pending_timers(&self) -> usize {
        lock(&self.state).timers.len()
    }

    pub fn dispose(&self) {
        let mut state = lock(&self.state);
        state.disposed = true;
        state.timers.cancel_all();
        state.recent_gain = None;
    }

    async fn insert(&self, entry: &RewardLogEntry) -> Result<InsertOutcome> {
        let row = entry.to_row()?;
        Ok(self.remote.insert(Table::RewardLog, row).await?)
    }

    fn show_gain(&self, state: &mut LedgerState, task_id: &str, amount: u32) {
        if state.disposed {
            return;
        }
        state.recent_gain = Some(RecentGain {
            task_id: task_id.to_string(),
            amount,
        });
        arm(
            &self.state,
            state,
            (),
            self.recent_gain_delay,
            |state: &mut LedgerState| state.recent_gain = None,
        );
    }
}

impl Drop for RewardLedger {
    fn drop(&mut self) {
        lock(&self.state).timers.cancel_all();
    }
}
