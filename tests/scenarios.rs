mod support;

use listkeep::animation::TransientState;
use listkeep::config::Config;
use listkeep::edit::{DraftUpdate, EditSession, SaveOutcome};
use listkeep::events::EventKind;
use listkeep::model::{TaskDraft, TaskStatus};
use listkeep::remote::Table;
use listkeep::Outcome;

use support::{wait_ms, TestList};

fn showing_completed() -> Config {
    let mut config = Config::default();
    config.view.show_completed = true;
    config
}

#[tokio::test(start_paused = true)]
async fn created_task_joins_active_list_and_settles() {
    let list = TestList::new();
    list.add("Answer email").await;

    let task = list.add("Buy milk").await;
    // Open tasks keep creation order; the newest sits below older open ones.
    assert_eq!(list.visible_titles(), vec!["Answer email", "Buy milk"]);
    assert_eq!(
        list.store.animations().state_of(&task.id),
        TransientState::NewlyCreated
    );

    wait_ms(499).await;
    assert!(list.store.animations().is_newly_created(&task.id));
    wait_ms(2).await;
    assert_eq!(list.store.animations().state_of(&task.id), TransientState::Idle);
}

#[tokio::test(start_paused = true)]
async fn created_task_ranks_above_completed_ones() {
    let list = TestList::with_config(showing_completed());
    let old = list.add("Water plants").await;
    let done = list
        .store
        .toggle_status(&old.id, TaskStatus::Done)
        .await
        .expect("complete");
    assert!(matches!(done, Outcome::Applied(_)));

    list.add("Buy milk").await;
    assert_eq!(list.visible_titles(), vec!["Buy milk", "Water plants"]);
}

#[tokio::test(start_paused = true)]
async fn completing_pays_once_and_exits_from_frozen_position() {
    let list = TestList::new();
    let mut events = list.store.subscribe();
    let milk = list.add("Buy milk").await;
    list.add("Walk dog").await;

    list.store
        .toggle_status(&milk.id, TaskStatus::Done)
        .await
        .expect("complete");

    assert_eq!(list.remote.rows(Table::RewardLog).len(), 1);
    assert!(list.store.rewards().total() >= 10);
    assert!(list.store.animations().is_disappearing(&milk.id));
    let snapshot = list.store.animations().snapshots()[&milk.id].clone();
    assert_eq!(snapshot.status, TaskStatus::NotStarted);

    // Still shown where it was, not sunk below the open task.
    assert_eq!(list.visible_titles(), vec!["Buy milk", "Walk dog"]);

    wait_ms(501).await;
    assert_eq!(list.visible_titles(), vec!["Walk dog"]);
    assert!(list.store.animations().snapshots().is_empty());

    let mut rewards = 0;
    while let Ok(event) = events.try_recv() {
        if event.event == EventKind::RewardIssued {
            rewards += 1;
        }
    }
    assert_eq!(rewards, 1);
}

#[tokio::test(start_paused = true)]
async fn reopening_reappears_without_second_reward() {
    let list = TestList::new();
    let milk = list.add("Buy milk").await;
    list.store
        .toggle_status(&milk.id, TaskStatus::Done)
        .await
        .expect("complete");
    let total = list.store.rewards().total();
    wait_ms(600).await;

    list.store
        .toggle_status(&milk.id, TaskStatus::NotStarted)
        .await
        .expect("reopen");
    assert_eq!(list.store.animations().state_of(&milk.id), TransientState::Reappearing);
    assert_eq!(list.visible_titles(), vec!["Buy milk"]);
    assert_eq!(list.store.task(&milk.id).and_then(|t| t.done_date), None);

    wait_ms(1499).await;
    assert!(list.store.animations().is_reappearing(&milk.id));
    wait_ms(2).await;
    assert_eq!(list.store.animations().state_of(&milk.id), TransientState::Idle);

    list.store
        .toggle_status(&milk.id, TaskStatus::Done)
        .await
        .expect("complete again");
    assert_eq!(list.remote.rows(Table::RewardLog).len(), 1);
    assert_eq!(list.store.rewards().total(), total);
}

#[tokio::test(start_paused = true)]
async fn deleting_last_task_of_group_removes_group() {
    let list = TestList::new();
    let sprint = list.add_group("Sprint 1").await;
    let task = list
        .add_draft(TaskDraft {
            group_id: Some(sprint.id.clone()),
            ..TaskDraft::titled("Write report")
        })
        .await;

    list.store.delete(&task.id).await.expect("delete");

    assert!(list.store.task(&task.id).is_none());
    assert!(list.store.groups().get(&sprint.id).is_none());
    assert!(list.remote.rows(Table::Groups).is_empty());
}

#[tokio::test(start_paused = true)]
async fn whitespace_title_edit_issues_no_write() {
    let list = TestList::new();
    let task = list.add("Buy milk").await;
    let writes = list.remote.write_count();

    let mut session = EditSession::new();
    session.start(&task);
    session.update(DraftUpdate {
        title: Some("   Buy milk ".to_string()),
        ..DraftUpdate::default()
    });
    let outcome = session.save(&list.store).await.expect("save");

    assert_eq!(outcome, SaveOutcome::Unchanged);
    assert_eq!(list.remote.write_count(), writes);
    assert_eq!(list.store.animations().recently_moved(), None);
}
