use wiggum::board::{Board, StatusMarker, TaskId};
use wiggum::error::WiggumError;

fn board_fixture(content: &str) -> (tempfile::TempDir, Board) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kanban.md");
    std::fs::write(&path, content).unwrap();
    let board = Board::new(path, dir.path().join("kanban.lock"));
    (dir, board)
}

const CHAIN: &str = "\
# Board

## TASKS

- [ ] [AA-1] First
  - Priority: MEDIUM
  - Dependencies: none

- [ ] [AA-2] Second
  - Priority: MEDIUM
  - Dependencies: AA-1

- [ ] [AA-3] Third
  - Priority: MEDIUM
  - Dependencies: AA-2
";

#[tokio::test]
async fn linear_chain_releases_one_task_at_a_time() {
    let (_dir, board) = board_fixture(CHAIN);

    // Only the head of the chain is ready.
    let ready = board.ready().await.unwrap();
    assert_eq!(ready.len(), 1);
    assert_eq!(ready[0].id.as_str(), "AA-1");
    assert_eq!(board.blocked().await.unwrap().len(), 2);

    // Completing each link releases exactly the next one.
    let a1: TaskId = "AA-1".parse().unwrap();
    board.set_status(&a1, StatusMarker::Done).await.unwrap();
    let ready = board.ready().await.unwrap();
    assert_eq!(ready.len(), 1);
    assert_eq!(ready[0].id.as_str(), "AA-2");

    let a2: TaskId = "AA-2".parse().unwrap();
    board.set_status(&a2, StatusMarker::Done).await.unwrap();
    let ready = board.ready().await.unwrap();
    assert_eq!(ready.len(), 1);
    assert_eq!(ready[0].id.as_str(), "AA-3");
}

#[tokio::test]
async fn ready_and_blocked_never_intersect() {
    let content = "\
## TASKS

- [ ] [AA-1] a
  - Dependencies: none
- [ ] [AA-2] b
  - Dependencies: AA-1
- [x] [BB-1] c
  - Dependencies: none
- [ ] [BB-2] d
  - Dependencies: BB-1
- [*] [CC-1] e
  - Dependencies: none
- [ ] [CC-2] f
  - Dependencies: CC-1
";
    let (_dir, board) = board_fixture(content);

    let ready: Vec<String> = board
        .ready()
        .await
        .unwrap()
        .iter()
        .map(|t| t.id.to_string())
        .collect();
    let blocked: Vec<String> = board
        .blocked()
        .await
        .unwrap()
        .iter()
        .map(|t| t.id.to_string())
        .collect();

    // Every ready task has all dependencies done; no blocked task does.
    assert_eq!(ready, vec!["AA-1", "BB-2"]);
    assert_eq!(blocked, vec!["AA-2", "CC-2"]);
    assert!(ready.iter().all(|id| !blocked.contains(id)));
}

#[tokio::test]
async fn cycle_members_are_reported_and_everything_else_drains() {
    let content = "\
## TASKS

- [ ] [XX-1] one half of the knot
  - Dependencies: YY-1

- [ ] [YY-1] other half
  - Dependencies: XX-1

- [ ] [ZZ-1] independent
  - Dependencies: none
";
    let (_dir, board) = board_fixture(content);

    let report = board.detect_cycles().await.unwrap();
    assert_eq!(report.components.len(), 1);
    let cyclic = report.cyclic_ids();
    assert!(cyclic.contains(&"XX-1".parse().unwrap()));
    assert!(cyclic.contains(&"YY-1".parse().unwrap()));
    assert!(!cyclic.contains(&"ZZ-1".parse().unwrap()));

    // Neither cycle member is excluded from parsing; they are simply never
    // spawned. The independent task is still schedulable.
    let ready = board.ready().await.unwrap();
    assert!(ready.iter().any(|t| t.id.as_str() == "ZZ-1"));
}

#[tokio::test]
async fn status_write_collision_is_transient() {
    let (_dir, board) = board_fixture(CHAIN);
    let id: TaskId = "AA-1".parse().unwrap();

    board
        .set_status_checked(&id, StatusMarker::Pending, StatusMarker::InProgress)
        .await
        .unwrap();

    // A second writer that read the task as pending loses.
    let err = board
        .set_status_checked(&id, StatusMarker::Pending, StatusMarker::InProgress)
        .await
        .unwrap_err();
    assert!(matches!(err, WiggumError::ConcurrentEdit));
    assert!(err.is_transient());
}

#[tokio::test]
async fn invalid_entries_are_excluded_not_fatal() {
    let content = "\
## TASKS

- [ ] [TOOLONGPREFIX-1] rejected
- [ ] [AA-12345] rejected too
- [ ] [GOOD-1] kept
  - Dependencies: none
";
    let (_dir, board) = board_fixture(content);

    let tasks = board.list(None).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].id.as_str(), "GOOD-1");
}

#[tokio::test]
async fn pending_approval_blocks_dependents() {
    let content = "\
## TASKS

- [P] [AA-1] waiting on a human
  - Dependencies: none
- [ ] [AA-2] depends on it
  - Dependencies: AA-1
";
    let (_dir, board) = board_fixture(content);

    assert!(board.ready().await.unwrap().is_empty());
    let blocked = board.blocked().await.unwrap();
    assert_eq!(blocked.len(), 1);
    assert_eq!(blocked[0].id.as_str(), "AA-2");
}
