//! listkeep - task-list reconciliation engine
//!
//! Holds the authoritative in-memory view of one owner's task list, applies
//! mutations against an asynchronous remote record store, derives the
//! presentation order, and drives the timed visual transitions around each
//! change. Completing a task pays a one-time reward.
//!
//! # Core Concepts
//!
//! - **Single-flight guard**: one mutation in flight at a time; others are ignored
//! - **Write-then-merge**: memory changes only after the remote write succeeds
//! - **Transient states**: newly created, disappearing, reappearing, recently moved
//! - **Frozen snapshots**: a disappearing task keeps its old sort position
//!
//! # Module Organization
//!
//! - `store`: `TaskStore`, the entry point owning everything below
//! - `group`: group CRUD, reordering and cascade delete
//! - `reward`: idempotent completion rewards and level progress
//! - `animation`: transient per-task states and their timers
//! - `sort`: presentation ordering and filtering
//! - `edit`: create/edit form state with a dirty check
//! - `remote`: remote store trait and an in-memory implementation
//! - `model`: record types
//! - `config`: configuration loading from `listkeep.toml`
//! - `events`: broadcast notifications for shells
//! - `error`: error types and result aliases
//! - `logging`: opt-in tracing output

pub mod animation;
pub mod config;
pub mod edit;
pub mod error;
pub mod events;
pub mod group;
pub mod logging;
pub mod model;
pub mod remote;
pub mod reward;
pub mod sort;
pub mod store;

mod sync;
mod timers;

pub use error::{Error, Result};
pub use store::{Busy, Outcome, TaskStore};
