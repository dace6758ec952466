use assert_cmd::Command;
use predicates::prelude::*;

fn git_project() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::process::Command::new("git")
        .args(["init", "-q"])
        .current_dir(dir.path())
        .status()
        .expect("git init");
    dir
}

fn wiggum(dir: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("wiggum").unwrap();
    cmd.current_dir(dir.path());
    cmd
}

#[test]
fn init_scaffolds_the_metadata_directory() {
    let dir = git_project();

    wiggum(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized wiggum"));

    assert!(dir.path().join(".ralph/kanban.md").exists());
    assert!(dir.path().join(".ralph/config.toml").exists());
    assert!(dir.path().join(".ralph/pipeline.json").exists());
    assert!(dir.path().join(".ralph/workers").is_dir());

    // Second init is a friendly no-op.
    wiggum(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already initialized"));
}

#[test]
fn status_before_init_is_an_environment_error() {
    let dir = git_project();

    wiggum(&dir).arg("status").assert().code(2);
}

#[test]
fn status_reports_board_counts() {
    let dir = git_project();
    wiggum(&dir).arg("init").assert().success();

    std::fs::write(
        dir.path().join(".ralph/kanban.md"),
        "## TASKS\n\n- [ ] [AA-1] First\n  - Dependencies: none\n\n- [x] [BB-1] Done\n  - Dependencies: none\n",
    )
    .unwrap();

    wiggum(&dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("2 total"))
        .stdout(predicate::str::contains("AA-1"));
}

#[test]
fn run_without_agent_bindings_is_a_config_error() {
    let dir = git_project();
    wiggum(&dir).arg("init").assert().success();

    // The default pipeline references agent types, but no [agents.agents]
    // entries exist yet; that must surface as exit code 2, not a run.
    wiggum(&dir)
        .arg("run")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Unknown agent type"));
}

#[test]
fn outside_a_repository_is_an_environment_error() {
    let dir = tempfile::tempdir().unwrap();

    let mut cmd = Command::cargo_bin("wiggum").unwrap();
    cmd.current_dir(dir.path());
    cmd.arg("status").assert().code(2);
}
