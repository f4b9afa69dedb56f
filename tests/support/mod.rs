use std::sync::Arc;
use std::time::Duration;

use listkeep::config::Config;
use listkeep::model::{GroupRecord, ListScope, TaskDraft, TaskRecord};
use listkeep::remote::MemoryStore;
use listkeep::TaskStore;

pub struct TestList {
    pub remote: Arc<MemoryStore>,
    pub store: TaskStore,
}

impl TestList {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let remote = Arc::new(MemoryStore::new());
        let store = TaskStore::new(remote.clone(), scope(), config).expect("valid config");
        Self { remote, store }
    }

    pub async fn add(&self, title: &str) -> TaskRecord {
        self.add_draft(TaskDraft::titled(title)).await
    }

    pub async fn add_draft(&self, draft: TaskDraft) -> TaskRecord {
        self.store
            .create(draft)
            .await
            .expect("create task")
            .applied()
            .expect("store was busy")
    }

    pub async fn add_group(&self, name: &str) -> GroupRecord {
        self.store
            .create_group(name, None, None)
            .await
            .expect("create group")
            .applied()
            .expect("store was busy")
    }

    pub fn visible_titles(&self) -> Vec<String> {
        self.store.view().into_iter().map(|task| task.title).collect()
    }
}

pub fn scope() -> ListScope {
    ListScope::new("owner-1", "list-1")
}

pub async fn wait_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
