use std::time::Duration;

use wiggum::board::TaskId;
use wiggum::error::WiggumError;
use wiggum::pool::WorkerPool;
use wiggum::worker::{
    BatchCoordinator, BatchRecord, BatchStatus, GitState, WorkerDir, WorkerKind, WorkerOutcome,
    WorkerResult,
};

#[test]
fn directory_names_encode_task_kind_and_epoch() {
    let root = std::path::Path::new("/repo/.ralph/workers");
    let id: TaskId = "AUTH-1".parse().unwrap();

    let main = WorkerDir::allocate(root, &id, WorkerKind::Main, 1_700_000_000);
    assert_eq!(main.name(), "worker-AUTH-1-1700000000");

    let parsed = WorkerDir::parse(main.path()).unwrap();
    assert_eq!(parsed.task_id, id);
    assert_eq!(parsed.kind, WorkerKind::Main);
    assert_eq!(parsed.epoch, 1_700_000_000);

    let fix = WorkerDir::allocate(root, &id, WorkerKind::Fix, 1);
    assert_eq!(WorkerDir::parse(fix.path()).unwrap().kind, WorkerKind::Fix);

    let resolve = WorkerDir::allocate(root, &id, WorkerKind::Resolve, 1);
    assert_eq!(
        WorkerDir::parse(resolve.path()).unwrap().kind,
        WorkerKind::Resolve
    );
}

#[tokio::test]
async fn pool_size_matches_live_workers_on_disk() {
    // After restore, the pool holds exactly the live PIDs recorded
    // under the workers root.
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();

    let live = WorkerDir::allocate(root, &"AUTH-1".parse().unwrap(), WorkerKind::Main, 1);
    tokio::fs::create_dir_all(live.path()).await.unwrap();
    live.write_pid(std::process::id()).await.unwrap();

    let dead = WorkerDir::allocate(root, &"UI-1".parse().unwrap(), WorkerKind::Main, 2);
    tokio::fs::create_dir_all(dead.path()).await.unwrap();
    dead.write_pid(4_190_000).await.unwrap();

    let no_pid = WorkerDir::allocate(root, &"DB-1".parse().unwrap(), WorkerKind::Main, 3);
    tokio::fs::create_dir_all(no_pid.path()).await.unwrap();

    let pool = WorkerPool::new();
    let adopted = pool.restore_from_disk(root).await.unwrap();

    assert_eq!(adopted, 1);
    assert_eq!(pool.count(None), 1);
    assert!(pool.has_worker_for(&"AUTH-1".parse().unwrap(), Some(WorkerKind::Main)));
}

#[tokio::test]
async fn worker_result_reflects_violation() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = WorkerDir::allocate(
        tmp.path(),
        &"AUTH-1".parse().unwrap(),
        WorkerKind::Main,
        1,
    );
    tokio::fs::create_dir_all(dir.path()).await.unwrap();

    // A violation converts the published outcome to failed regardless
    // of the pipeline's own gates.
    let mut result = WorkerResult::failed(
        dir.task_id.clone(),
        None,
        vec!["workspace boundary violation".to_string()],
    );
    result.violation = true;
    dir.write_result(&result).await.unwrap();

    let read = dir.read_result().await.unwrap();
    assert_eq!(read.outcome, WorkerOutcome::Failed);
    assert!(read.violation);
}

#[tokio::test]
async fn git_state_drives_follow_up_decisions() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = WorkerDir::allocate(
        tmp.path(),
        &"AUTH-1".parse().unwrap(),
        WorkerKind::Main,
        1,
    );
    tokio::fs::create_dir_all(dir.path()).await.unwrap();

    // Absent file reads as all-clear.
    let state = dir.read_git_state().await;
    assert!(!state.needs_fix && !state.needs_resolve);

    dir.write_git_state(&GitState {
        needs_fix: true,
        needs_resolve: false,
    })
    .await
    .unwrap();
    assert!(dir.read_git_state().await.needs_fix);
}

#[tokio::test]
async fn batch_runs_members_strictly_in_order() {
    let tmp = tempfile::tempdir().unwrap();
    let record_path = tmp.path().join("batch-7.json");
    let coordinator = BatchCoordinator::new(&record_path, Duration::from_millis(10));

    let record = BatchRecord::new(
        "batch-7",
        vec!["AA-1".parse().unwrap(), "AA-2".parse().unwrap()],
    );
    coordinator.write(&record).await.unwrap();

    // AA-2 cannot pass while AA-1 holds the position.
    let second = BatchCoordinator::new(&record_path, Duration::from_millis(10));
    let waiter = tokio::spawn(async move {
        second.wait_for_turn(&"AA-2".parse().unwrap()).await
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!waiter.is_finished());

    coordinator
        .wait_for_turn(&"AA-1".parse().unwrap())
        .await
        .unwrap();
    coordinator.advance(&"AA-1".parse().unwrap()).await.unwrap();

    tokio::time::timeout(Duration::from_secs(2), waiter)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn batch_failure_propagates_to_waiting_members() {
    let tmp = tempfile::tempdir().unwrap();
    let record_path = tmp.path().join("batch-9.json");
    let coordinator = BatchCoordinator::new(&record_path, Duration::from_millis(10));

    coordinator
        .write(&BatchRecord::new(
            "batch-9",
            vec!["AA-1".parse().unwrap(), "AA-2".parse().unwrap()],
        ))
        .await
        .unwrap();

    coordinator.fail(&"AA-1".parse().unwrap()).await.unwrap();

    let record = coordinator.read().await.unwrap();
    assert_eq!(record.status, BatchStatus::Failed);

    let err = coordinator
        .wait_for_turn(&"AA-2".parse().unwrap())
        .await
        .unwrap_err();
    match err {
        WiggumError::BatchFailed {
            batch_id,
            failed_task,
        } => {
            assert_eq!(batch_id, "batch-9");
            assert_eq!(failed_task, "AA-1");
        }
        other => panic!("unexpected error: {}", other),
    }
}
