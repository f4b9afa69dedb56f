//! Create/edit form state with a dirty check.
//!
//! The draft is plain form data. It becomes a record only through
//! [`EditSession::save`], which writes nothing when an edit changed no
//! persisted field.

use crate::error::{Error, Result};
use crate::model::{
    normalize_note, normalize_tags, Priority, TaskDraft, TaskPatch, TaskRecord, TaskStatus,
};
use crate::store::{Outcome, TaskStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditMode {
    Closed,
    Creating,
    /// Editing the task with this id
    Editing(String),
}

/// Form values as typed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditDraft {
    pub title: String,
    pub status: TaskStatus,
    pub priority: Option<Priority>,
    pub group_id: Option<String>,
    pub tags: Vec<String>,
    pub note: String,
}

impl EditDraft {
    fn from_record(task: &TaskRecord) -> Self {
        Self {
            title: task.title.clone(),
            status: task.status,
            priority: task.priority,
            group_id: task.group_id.clone(),
            tags: task.tags.clone(),
            note: task.note.clone().unwrap_or_default(),
        }
    }

    fn to_task_draft(&self) -> TaskDraft {
        TaskDraft {
            title: self.title.trim().to_string(),
            status: self.status,
            priority: self.priority,
            group_id: self.group_id.clone(),
            tags: normalize_tags(&self.tags),
            note: normalize_note(Some(&self.note)),
        }
    }
}

/// Partial form change; `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DraftUpdate {
    pub title: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Option<Priority>>,
    pub group_id: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Created(TaskRecord),
    Updated(TaskRecord),
    /// Nothing persisted changed; the session closed without writing.
    Unchanged,
    /// The store was busy; the session stays open.
    Busy,
}

#[derive(Debug, Clone)]
pub struct EditSession {
    mode: EditMode,
    draft: EditDraft,
    source: Option<TaskRecord>,
    error: Option<String>,
}

impl Default for EditSession {
    fn default() -> Self {
        Self::new()
    }
}

impl EditSession {
    pub fn new() -> Self {
        Self {
            mode: EditMode::Closed,
            draft: EditDraft::default(),
            source: None,
            error: None,
        }
    }

    /// Open the form on an existing task.
    pub fn start(&mut self, task: &TaskRecord) {
        self.mode = EditMode::Editing(task.id.clone());
        self.draft = EditDraft::from_record(task);
        self.source = Some(task.clone());
        self.error = None;
    }

    pub fn start_create(&mut self) {
        self.mode = EditMode::Creating;
        self.draft = EditDraft::default();
        self.source = None;
        self.error = None;
    }

    pub fn update(&mut self, update: DraftUpdate) {
        if let Some(title) = update.title {
            self.draft.title = title;
        }
        if let Some(status) = update.status {
            self.draft.status = status;
        }
        if let Some(priority) = update.priority {
            self.draft.priority = priority;
        }
        if let Some(group_id) = update.group_id {
            self.draft.group_id = group_id;
        }
        if let Some(tags) = update.tags {
            self.draft.tags = tags;
        }
        if let Some(note) = update.note {
            self.draft.note = note;
        }
    }

    pub fn assign_group(&mut self, group_id: Option<String>) {
        self.draft.group_id = group_id;
    }

    /// Close and reset to defaults.
    pub fn cancel(&mut self) {
        *self = Self::new();
    }

    pub fn mode(&self) -> &EditMode {
        &self.mode
    }

    pub fn is_open(&self) -> bool {
        self.mode != EditMode::Closed
    }

    pub fn draft(&self) -> &EditDraft {
        &self.draft
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_dirty(&self) -> bool {
        match (&self.mode, self.source.as_ref()) {
            (EditMode::Editing(_), Some(source)) => !self.changes(source).is_empty(),
            (EditMode::Creating, _) => self.draft != EditDraft::default(),
            _ => false,
        }
    }

    /// Persist the draft through `store`.
    pub async fn save(&mut self, store: &TaskStore) -> Result<SaveOutcome> {
        if self.draft.title.trim().is_empty() && self.is_open() {
            let err = Error::Validation("title cannot be empty".to_string());
            self.error = Some(err.user_message());
            return Err(err);
        }

        match self.mode.clone() {
            EditMode::Closed => Ok(SaveOutcome::Unchanged),
            EditMode::Creating => {
                let outcome = store.create(self.draft.to_task_draft()).await;
                self.finish(outcome, SaveOutcome::Created)
            }
            EditMode::Editing(id) => {
                let Some(source) = self.source.as_ref() else {
                    return Err(Error::TaskNotFound(id));
                };
                let patch = self.changes(source);
                if patch.is_empty() {
                    tracing::debug!(task_id = %id, "edit closed without changes");
                    self.cancel();
                    return Ok(SaveOutcome::Unchanged);
                }
                let outcome = store.update(&id, patch).await;
                self.finish(outcome, SaveOutcome::Updated)
            }
        }
    }

    fn finish(
        &mut self,
        outcome: Result<Outcome<TaskRecord>>,
        saved: fn(TaskRecord) -> SaveOutcome,
    ) -> Result<SaveOutcome> {
        match outcome {
            Ok(Outcome::Applied(task)) => {
                self.cancel();
                Ok(saved(task))
            }
            Ok(Outcome::Busy) => Ok(SaveOutcome::Busy),
            Err(err) => {
                self.error = Some(err.user_message());
                Err(err)
            }
        }
    }

    /// Only the persisted fields that differ from `source`.
    fn changes(&self, source: &TaskRecord) -> TaskPatch {
        let draft = &self.draft;
        let title = draft.title.trim();
        let tags = normalize_tags(&draft.tags);
        let note = normalize_note(Some(&draft.note));

        TaskPatch {
            title: (title != source.title).then(|| title.to_string()),
            status: (draft.status != source.status).then_some(draft.status),
            priority: (draft.priority != source.priority).then_some(draft.priority),
            group_id: (draft.group_id != source.group_id).then(|| draft.group_id.clone()),
            tags: (tags != normalize_tags(&source.tags)).then_some(tags),
            note: (note != normalize_note(source.note.as_deref())).then_some(note),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::model::ListScope;
    use crate::remote::{MemoryStore, Table, WriteKind};
    use std::sync::Arc;

    fn store() -> (Arc<MemoryStore>, TaskStore) {
        let remote = Arc::new(MemoryStore::new());
        let store = TaskStore::new(
            remote.clone(),
            ListScope::new("owner-1", "list-1"),
            Config::default(),
        )
        .expect("default config");
        (remote, store)
    }

    async fn seeded(store: &TaskStore) -> TaskRecord {
        let draft = TaskDraft {
            tags: vec!["home".to_string()],
            note: Some("whole milk".to_string()),
            ..TaskDraft::titled("Buy milk")
        };
        store
            .create(draft)
            .await
            .expect("create")
            .applied()
            .expect("not busy")
    }

    #[tokio::test(start_paused = true)]
    async fn whitespace_only_edits_write_nothing() {
        let (remote, store) = store();
        let task = seeded(&store).await;
        let writes = remote.write_count();

        let mut session = EditSession::new();
        session.start(&task);
        session.update(DraftUpdate {
            title: Some("  Buy milk  ".to_string()),
            tags: Some(vec![" home".to_string(), "home".to_string(), String::new()]),
            note: Some("whole milk\n".to_string()),
            ..DraftUpdate::default()
        });
        assert!(!session.is_dirty());

        assert_eq!(session.save(&store).await.expect("save"), SaveOutcome::Unchanged);
        assert_eq!(remote.write_count(), writes);
        assert!(!session.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn edit_patches_only_changed_fields() {
        let (remote, store) = store();
        let task = seeded(&store).await;

        let mut session = EditSession::new();
        session.start(&task);
        session.update(DraftUpdate {
            priority: Some(Some(Priority::High)),
            ..DraftUpdate::default()
        });
        let patch = session.changes(&task);
        assert_eq!(
            patch,
            TaskPatch {
                priority: Some(Some(Priority::High)),
                ..TaskPatch::default()
            }
        );

        let SaveOutcome::Updated(saved) = session.save(&store).await.expect("save") else {
            panic!("expected an update");
        };
        assert_eq!(saved.priority, Some(Priority::High));
        assert_eq!(saved.title, task.title);
        assert_eq!(store.animations().recently_moved(), Some(task.id.clone()));
        assert_eq!(remote.rows(Table::Tasks)[0]["priority"], "high");
    }

    #[tokio::test(start_paused = true)]
    async fn create_materializes_normalized_draft() {
        let (_remote, store) = store();
        let mut session = EditSession::new();
        session.start_create();
        assert!(!session.is_dirty());
        session.update(DraftUpdate {
            title: Some(" Call mom ".to_string()),
            note: Some("   ".to_string()),
            ..DraftUpdate::default()
        });
        assert!(session.is_dirty());

        let SaveOutcome::Created(task) = session.save(&store).await.expect("save") else {
            panic!("expected a create");
        };
        assert_eq!(task.title, "Call mom");
        assert_eq!(task.note, None);
        assert_eq!(session.mode(), &EditMode::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn blank_title_is_rejected_and_session_stays_open() {
        let (remote, store) = store();
        let mut session = EditSession::new();
        session.start_create();
        session.update(DraftUpdate {
            title: Some("   ".to_string()),
            ..DraftUpdate::default()
        });

        assert!(session.save(&store).await.is_err());
        assert!(session.is_open());
        assert!(session.error().is_some());
        assert_eq!(remote.write_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_write_keeps_draft_for_retry() {
        let (remote, store) = store();
        let task = seeded(&store).await;
        let mut session = EditSession::new();
        session.start(&task);
        session.update(DraftUpdate {
            title: Some("Buy oat milk".to_string()),
            ..DraftUpdate::default()
        });

        remote.fail_next(Table::Tasks, WriteKind::Update);
        assert!(session.save(&store).await.is_err());
        assert_eq!(session.mode(), &EditMode::Editing(task.id.clone()));
        assert_eq!(session.draft().title, "Buy oat milk");
        assert_eq!(session.error(), Some("Couldn't save. Please try again."));

        assert!(matches!(
            session.save(&store).await.expect("retry"),
            SaveOutcome::Updated(_)
        ));
    }

    #[test]
    fn cancel_resets_to_defaults() {
        let mut session = EditSession::new();
        session.start_create();
        session.assign_group(Some("g1".to_string()));
        session.cancel();
        assert_eq!(session.draft(), &EditDraft::default());
        assert!(!session.is_open());
    }
}
