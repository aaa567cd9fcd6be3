use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use agent_exchange::models::{Message, Task, TaskState};
use agent_exchange::registry::TaskRegistry;
use agent_exchange::AppError;

fn task(id: &str) -> Task {
    Task::new(
        id.into(),
        "default".into(),
        Message::user_text("hi"),
        None,
        None,
    )
}

#[test]
fn create_and_get_round_trip() {
    let registry = TaskRegistry::new();
    assert!(registry.is_empty());

    registry.create(task("t1")).expect("create succeeds");

    let fetched = registry.get("t1").expect("task present");
    assert_eq!(fetched.state, TaskState::Pending);
    assert_eq!(registry.len(), 1);
    assert!(registry.get("t2").is_none());
}

#[test]
fn duplicate_id_is_rejected() {
    let registry = TaskRegistry::new();
    registry.create(task("t1")).expect("first create succeeds");

    match registry.create(task("t1")) {
        Err(AppError::InvalidTaskState(msg)) => assert!(msg.contains("already exists")),
        other => panic!("expected invalid task state, got {other:?}"),
    }
    assert_eq!(registry.len(), 1);
}

#[test]
fn lifecycle_follows_the_transition_table() {
    let registry = TaskRegistry::new();
    registry.create(task("t1")).expect("create succeeds");

    let working = registry
        .transition("t1", TaskState::Working)
        .expect("pending -> working");
    assert_eq!(working.state, TaskState::Working);

    let done = registry
        .transition("t1", TaskState::Completed)
        .expect("working -> completed");
    assert_eq!(done.state, TaskState::Completed);
}

#[test]
fn pending_cannot_jump_straight_to_completed() {
    let registry = TaskRegistry::new();
    registry.create(task("t1")).expect("create succeeds");

    match registry.transition("t1", TaskState::Completed) {
        Err(AppError::InvalidTaskState(_)) => {}
        other => panic!("expected invalid transition, got {other:?}"),
    }
    // The failed attempt must not have moved the task.
    assert_eq!(registry.get("t1").expect("present").state, TaskState::Pending);
}

#[test]
fn terminal_states_reject_further_transitions() {
    let registry = TaskRegistry::new();
    registry.create(task("t1")).expect("create succeeds");
    registry.transition("t1", TaskState::Working).expect("working");
    registry.transition("t1", TaskState::Failed).expect("failed");

    for next in [TaskState::Working, TaskState::Completed, TaskState::Pending] {
        assert!(
            registry.transition("t1", next).is_err(),
            "failed -> {next} must be rejected"
        );
    }
}

#[test]
fn input_required_reenters_working() {
    let registry = TaskRegistry::new();
    registry.create(task("t1")).expect("create succeeds");
    registry.transition("t1", TaskState::Working).expect("working");
    registry
        .transition("t1", TaskState::InputRequired)
        .expect("pause");

    let resumed = registry
        .transition("t1", TaskState::Working)
        .expect("resume");
    assert_eq!(resumed.state, TaskState::Working);
}

#[test]
fn unknown_task_transition_fails() {
    let registry = TaskRegistry::new();
    match registry.transition("ghost", TaskState::Working) {
        Err(AppError::TaskNotFound(_)) => {}
        other => panic!("expected task not found, got {other:?}"),
    }
}

#[test]
fn transition_if_applies_only_from_expected_state() {
    let registry = TaskRegistry::new();
    registry.create(task("t1")).expect("create succeeds");
    registry.transition("t1", TaskState::Working).expect("working");

    let applied = registry
        .transition_if("t1", TaskState::Working, TaskState::Cancelled)
        .expect("cas succeeds");
    assert!(applied);

    // A second writer racing for the same edge loses quietly.
    let applied = registry
        .transition_if("t1", TaskState::Working, TaskState::Completed)
        .expect("cas reports mismatch");
    assert!(!applied);
    assert_eq!(
        registry.get("t1").expect("present").state,
        TaskState::Cancelled
    );
}

#[test]
fn transition_if_rejects_illegal_edges() {
    let registry = TaskRegistry::new();
    registry.create(task("t1")).expect("create succeeds");

    match registry.transition_if("t1", TaskState::Pending, TaskState::Completed) {
        Err(AppError::InvalidTaskState(_)) => {}
        other => panic!("expected invalid transition, got {other:?}"),
    }
}

#[test]
fn racing_writers_settle_on_exactly_one_winner() {
    let registry = Arc::new(TaskRegistry::new());
    registry.create(task("t1")).expect("create succeeds");
    registry.transition("t1", TaskState::Working).expect("working");

    let wins = AtomicUsize::new(0);
    std::thread::scope(|scope| {
        for outcome in [
            TaskState::Completed,
            TaskState::Failed,
            TaskState::Cancelled,
            TaskState::Completed,
        ] {
            let registry = Arc::clone(&registry);
            let wins = &wins;
            scope.spawn(move || {
                if registry
                    .transition_if("t1", TaskState::Working, outcome)
                    .expect("cas never errors here")
                {
                    wins.fetch_add(1, Ordering::SeqCst);
                }
            });
        }
    });

    assert_eq!(wins.load(Ordering::SeqCst), 1);
    assert!(registry.get("t1").expect("present").state.is_terminal());
}

#[test]
fn remove_returns_the_entry_once() {
    let registry = TaskRegistry::new();
    registry.create(task("t1")).expect("create succeeds");

    assert!(registry.remove("t1").is_some());
    assert!(registry.remove("t1").is_none());
    assert!(registry.is_empty());
}

#[test]
fn snapshot_copies_every_live_task() {
    let registry = TaskRegistry::new();
    registry.create(task("t1")).expect("create succeeds");
    registry.create(task("t2")).expect("create succeeds");

    let snapshot = registry.snapshot();
    assert_eq!(snapshot.len(), 2);
    let mut ids: Vec<_> = snapshot.iter().map(|t| t.id.as_str()).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec!["t1", "t2"]);
}

#[test]
fn sweep_evicts_only_aged_terminal_tasks() {
    let registry = TaskRegistry::new();
    registry.create(task("live")).expect("create succeeds");
    registry.create(task("done")).expect("create succeeds");
    registry.transition("done", TaskState::Working).expect("working");
    registry.transition("done", TaskState::Completed).expect("completed");

    // Zero grace evicts terminal entries immediately; the live entry stays.
    let evicted = registry.sweep_expired(Duration::ZERO);
    assert_eq!(evicted, 1);
    assert!(registry.get("done").is_none());
    assert!(registry.get("live").is_some());

    // A long grace keeps freshly terminal entries around.
    registry.create(task("recent")).expect("create succeeds");
    registry.transition("recent", TaskState::Working).expect("working");
    registry.transition("recent", TaskState::Cancelled).expect("cancelled");
    assert_eq!(registry.sweep_expired(Duration::from_secs(3600)), 0);
    assert!(registry.get("recent").is_some());
}

#[test]
fn sweep_evicts_abandoned_non_terminal_entries() {
    let registry = TaskRegistry::new();

    // A task registered but never started, as when the client goes away
    // before its stream body is first polled.
    let mut orphan = task("orphan");
    orphan.updated_at = chrono::Utc::now() - chrono::Duration::hours(2);
    registry.create(orphan).expect("create succeeds");

    // A paused conversation whose continuation never arrived.
    let mut stalled = task("stalled");
    stalled.state = TaskState::InputRequired;
    stalled.updated_at = chrono::Utc::now() - chrono::Duration::hours(2);
    registry.create(stalled).expect("create succeeds");

    registry.create(task("fresh")).expect("create succeeds");

    // Grace of 300 s puts the stale horizon at an hour; both aged
    // entries are well past it while the fresh one is untouched.
    let evicted = registry.sweep_expired(Duration::from_secs(300));
    assert_eq!(evicted, 2);
    assert!(registry.get("orphan").is_none());
    assert!(registry.get("stalled").is_none());
    assert!(registry.get("fresh").is_some());
}
