mod support;

use std::sync::{Arc, Mutex};

use listkeep::edit::{DraftUpdate, EditSession, SaveOutcome};
use listkeep::error::ErrorCategory;
use listkeep::model::{GroupRecord, TaskDraft};
use listkeep::remote::{Table, WriteKind, WriteRecord};
use listkeep::Outcome;
use serde_json::Value;

use support::TestList;

fn grouped(title: &str, group: &GroupRecord) -> TaskDraft {
    TaskDraft {
        group_id: Some(group.id.clone()),
        ..TaskDraft::titled(title)
    }
}

#[tokio::test(start_paused = true)]
async fn delete_reassigns_tasks_before_removing_group() {
    let list = TestList::new();
    let sprint = list.add_group("Sprint 1").await;
    for title in ["Plan", "Build", "Ship"] {
        list.add_draft(grouped(title, &sprint)).await;
    }
    let before = list.remote.write_count();

    let outcome = list.store.delete_group(&sprint.id).await.expect("delete group");
    assert_eq!(outcome, Outcome::Applied(3));

    let writes = list.remote.writes();
    assert_eq!(
        writes[before..].to_vec(),
        vec![
            WriteRecord {
                kind: WriteKind::Update,
                table: Table::Tasks,
                affected: 3,
                failed: false,
            },
            WriteRecord {
                kind: WriteKind::Delete,
                table: Table::Groups,
                affected: 1,
                failed: false,
            },
        ]
    );
    assert!(list
        .remote
        .rows(Table::Tasks)
        .iter()
        .all(|row| row.get("group_id") == Some(&Value::Null)));
    assert!(list.store.tasks().iter().all(|task| task.group_id.is_none()));
    assert!(list.store.groups().groups().is_empty());
}

#[tokio::test(start_paused = true)]
async fn failure_after_reassignment_is_a_partial_cascade() {
    let list = TestList::new();
    let sprint = list.add_group("Sprint 1").await;
    let task = list.add_draft(grouped("Plan", &sprint)).await;
    list.remote.fail_next(Table::Groups, WriteKind::Delete);

    let err = list
        .store
        .delete_group(&sprint.id)
        .await
        .expect_err("group delete fails");
    assert_eq!(err.category(), ErrorCategory::PartialCascade);
    assert_eq!(err.user_message(), "Something went wrong. Please try again.");

    // Remote reassignment stands; local state waits for a full success.
    assert_eq!(list.remote.rows(Table::Tasks)[0]["group_id"], Value::Null);
    assert!(list.store.groups().get(&sprint.id).is_some());
    assert_eq!(
        list.store.task(&task.id).and_then(|t| t.group_id),
        Some(sprint.id.clone())
    );
    assert!(!list.store.is_busy());
}

#[tokio::test(start_paused = true)]
async fn failed_reassignment_stops_before_delete() {
    let list = TestList::new();
    let sprint = list.add_group("Sprint 1").await;
    list.add_draft(grouped("Plan", &sprint)).await;
    list.remote.fail_next(Table::Tasks, WriteKind::Update);
    let before = list.remote.write_count();

    let err = list.store.delete_group(&sprint.id).await.expect_err("reassign fails");
    assert_eq!(err.category(), ErrorCategory::RemoteWrite);
    assert_eq!(list.remote.write_count(), before + 1);
    assert_eq!(list.remote.rows(Table::Groups).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn group_survives_while_other_tasks_reference_it() {
    let list = TestList::new();
    let sprint = list.add_group("Sprint 1").await;
    let plan = list.add_draft(grouped("Plan", &sprint)).await;
    let ship = list.add_draft(grouped("Ship", &sprint)).await;

    list.store.delete(&plan.id).await.expect("delete plan");
    assert!(list.store.groups().get(&sprint.id).is_some());

    list.store.delete(&ship.id).await.expect("delete ship");
    assert!(list.store.groups().get(&sprint.id).is_none());
}

#[tokio::test(start_paused = true)]
async fn failed_prune_reports_partial_cascade_but_keeps_delete() {
    let list = TestList::new();
    let sprint = list.add_group("Sprint 1").await;
    let plan = list.add_draft(grouped("Plan", &sprint)).await;
    list.remote.fail_next(Table::Groups, WriteKind::Delete);

    let err = list.store.delete(&plan.id).await.expect_err("prune fails");
    assert_eq!(err.category(), ErrorCategory::PartialCascade);
    assert!(list.store.task(&plan.id).is_none());
    assert!(list.store.groups().get(&sprint.id).is_some());
}

#[tokio::test(start_paused = true)]
async fn deferred_group_creation_assigns_the_new_group() {
    let list = TestList::new();
    let task = list.add("Plan").await;

    let mut session = EditSession::new();
    session.start(&task);

    let chosen = Arc::new(Mutex::new(None));
    let slot = chosen.clone();
    list.store.request_group_then(Box::new(move |group: &GroupRecord| {
        *slot.lock().expect("slot") = Some(group.id.clone());
    }));
    assert!(list.store.groups().has_pending());

    let sprint = list.add_group("Sprint 1").await;
    assert!(!list.store.groups().has_pending());
    let assigned = chosen.lock().expect("slot").take();
    assert_eq!(assigned.as_deref(), Some(sprint.id.as_str()));

    session.update(DraftUpdate {
        group_id: Some(assigned),
        ..DraftUpdate::default()
    });
    let SaveOutcome::Updated(saved) = session.save(&list.store).await.expect("save") else {
        panic!("expected an update");
    };
    assert_eq!(saved.group_id, Some(sprint.id));
}

#[tokio::test(start_paused = true)]
async fn blank_group_name_never_reaches_the_store() {
    let list = TestList::new();
    let err = list
        .store
        .create_group("   ", None, None)
        .await
        .expect_err("blank name");
    assert_eq!(err.category(), ErrorCategory::Validation);
    assert_eq!(list.remote.write_count(), 0);
}
