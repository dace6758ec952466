use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use wiggum::activity::ActivityLog;
use wiggum::agent::{AgentInvoker, AgentRegistry, StepContext};
use wiggum::error::Result;
use wiggum::pipeline::{
    GateResult, Pipeline, PipelineOutcome, PipelineRunner, ResultStore, RetryPolicy, Step,
    StepResult,
};
use wiggum::worker::{WorkerDir, WorkerKind};

/// Test agent that reports a fixed gate per invocation, in order.
struct ScriptedAgent {
    script: Mutex<Vec<StepResult>>,
    calls: AtomicUsize,
}

impl ScriptedAgent {
    fn always(result: StepResult) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(vec![result]),
            calls: AtomicUsize::new(0),
        })
    }

    fn sequence(results: Vec<StepResult>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(results),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentInvoker for ScriptedAgent {
    async fn invoke(&self, ctx: &StepContext) -> Result<()> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        let result = {
            let script = self.script.lock().unwrap();
            script
                .get(index.min(script.len().saturating_sub(1)))
                .cloned()
                .expect("script must not be empty")
        };
        let store = ResultStore::new(ctx.worker_dir.join("results"));
        store.write(&ctx.step_id, ctx.epoch, &result).await
    }
}

/// Test agent that exits without writing any result file.
struct SilentAgent;

#[async_trait]
impl AgentInvoker for SilentAgent {
    async fn invoke(&self, _ctx: &StepContext) -> Result<()> {
        Ok(())
    }
}

/// Test agent that records the resume decision.
struct ResumeAgent {
    decision: String,
}

#[async_trait]
impl AgentInvoker for ResumeAgent {
    async fn invoke(&self, ctx: &StepContext) -> Result<()> {
        tokio::fs::write(ctx.worker_dir.join("resume-step.txt"), &self.decision).await?;
        Ok(())
    }
}

fn worker_fixture(root: &Path) -> WorkerDir {
    let dir = WorkerDir::allocate(
        &root.join("workers"),
        &"AUTH-1".parse().unwrap(),
        WorkerKind::Main,
        1,
    );
    std::fs::create_dir_all(dir.path()).unwrap();
    dir
}

fn runner(root: &Path, pipeline: Pipeline, registry: AgentRegistry) -> PipelineRunner {
    PipelineRunner::new(
        pipeline,
        registry,
        ActivityLog::new(root.join("activity.jsonl")),
        root,
        Duration::from_secs(30),
        10,
    )
    .unwrap()
}

fn gates(report: &wiggum::pipeline::PipelineReport) -> Vec<(String, Option<GateResult>)> {
    report
        .steps
        .iter()
        .map(|run| {
            let gate = match run.state {
                wiggum::pipeline::StepState::Completed(g) => Some(g),
                _ => None,
            };
            (run.id.clone(), gate)
        })
        .collect()
}

#[tokio::test]
async fn soft_failure_does_not_halt_the_pipeline() {
    // A non-blocking FAIL is logged and the remaining steps still run.
    let tmp = tempfile::tempdir().unwrap();
    let worker = worker_fixture(tmp.path());

    let pipeline = Pipeline {
        name: "s3".into(),
        steps: vec![
            Step::new("plan", "planner").readonly(),
            Step::new("audit", "auditor").readonly().non_blocking(),
            Step::new("test", "tester"),
        ],
        config: None,
    };

    let audit = ScriptedAgent::always(StepResult::fail(vec!["style drift".into()]));
    let test = ScriptedAgent::always(StepResult::pass());
    let mut registry = AgentRegistry::new();
    registry.register("planner", ScriptedAgent::always(StepResult::pass()));
    registry.register("auditor", audit.clone());
    registry.register("tester", test.clone());

    let report = runner(tmp.path(), pipeline, registry)
        .run_all(&worker, None)
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.outcome, PipelineOutcome::CompletedAll);
    assert_eq!(audit.calls(), 1);
    assert_eq!(test.calls(), 1);
    assert_eq!(
        gates(&report),
        vec![
            ("plan".to_string(), Some(GateResult::Pass)),
            ("audit".to_string(), Some(GateResult::Fail)),
            ("test".to_string(), Some(GateResult::Pass)),
        ]
    );
}

#[tokio::test]
async fn failed_dependency_skips_downstream_step() {
    // validate FAILs (non-blocking); docs depends on validate, so it is
    // skipped and its result file records the SKIP gate.
    let tmp = tempfile::tempdir().unwrap();
    let worker = worker_fixture(tmp.path());

    let pipeline = Pipeline {
        name: "s4".into(),
        steps: vec![
            Step::new("validate", "validator").readonly().non_blocking(),
            Step::new("docs", "writer").readonly().depends_on("validate"),
        ],
        config: None,
    };

    let writer = ScriptedAgent::always(StepResult::pass());
    let mut registry = AgentRegistry::new();
    registry.register("validator", ScriptedAgent::always(StepResult::fail(vec![])));
    registry.register("writer", writer.clone());

    let report = runner(tmp.path(), pipeline, registry)
        .run_all(&worker, None)
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(writer.calls(), 0);

    let store = ResultStore::new(worker.results_dir());
    let (_, docs_result) = store.latest("docs").await.unwrap();
    assert_eq!(docs_result.gate_result, GateResult::Skip);
}

#[tokio::test]
async fn blocking_failure_halts_and_reports_the_step() {
    let tmp = tempfile::tempdir().unwrap();
    let worker = worker_fixture(tmp.path());

    let pipeline = Pipeline {
        name: "halt".into(),
        steps: vec![
            Step::new("implement", "coder"),
            Step::new("test", "tester"),
        ],
        config: None,
    };

    let tester = ScriptedAgent::always(StepResult::pass());
    let mut registry = AgentRegistry::new();
    registry.register("coder", ScriptedAgent::always(StepResult::fail(vec!["boom".into()])));
    registry.register("tester", tester.clone());

    let report = runner(tmp.path(), pipeline, registry)
        .run_all(&worker, None)
        .await
        .unwrap();

    assert!(!report.is_success());
    assert_eq!(report.failed_step().as_deref(), Some("implement"));
    assert_eq!(tester.calls(), 0);
    assert!(report.step_errors().contains(&"boom".to_string()));
}

#[tokio::test]
async fn missing_output_synthesizes_fail() {
    let tmp = tempfile::tempdir().unwrap();
    let worker = worker_fixture(tmp.path());

    let pipeline = Pipeline {
        name: "silent".into(),
        steps: vec![Step::new("implement", "coder")],
        config: None,
    };

    let mut registry = AgentRegistry::new();
    registry.register("coder", Arc::new(SilentAgent));

    let report = runner(tmp.path(), pipeline, registry)
        .run_all(&worker, None)
        .await
        .unwrap();

    assert!(!report.is_success());
    assert!(report
        .step_errors()
        .contains(&"missing output".to_string()));

    let store = ResultStore::new(worker.results_dir());
    let (_, result) = store.latest("implement").await.unwrap();
    assert_eq!(result.gate_result, GateResult::Fail);
}

#[tokio::test]
async fn stop_gate_finishes_early_as_success() {
    let tmp = tempfile::tempdir().unwrap();
    let worker = worker_fixture(tmp.path());

    let pipeline = Pipeline {
        name: "stop".into(),
        steps: vec![
            Step::new("plan", "planner").readonly(),
            Step::new("implement", "coder"),
        ],
        config: None,
    };

    let mut stop = StepResult::pass();
    stop.gate_result = GateResult::Stop;

    let coder = ScriptedAgent::always(StepResult::pass());
    let mut registry = AgentRegistry::new();
    registry.register("planner", ScriptedAgent::always(stop));
    registry.register("coder", coder.clone());

    let report = runner(tmp.path(), pipeline, registry)
        .run_all(&worker, None)
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(
        report.outcome,
        PipelineOutcome::HaltedByAgent {
            step: "plan".to_string()
        }
    );
    assert_eq!(coder.calls(), 0);
}

#[tokio::test]
async fn fix_gate_retries_through_the_fix_agent() {
    let tmp = tempfile::tempdir().unwrap();
    let worker = worker_fixture(tmp.path());

    let mut fix = StepResult::pass();
    fix.gate_result = GateResult::Fix;
    fix.errors = vec!["two tests failing".into()];

    let pipeline = Pipeline {
        name: "retry".into(),
        steps: vec![Step::new("test", "tester").with_retry(RetryPolicy {
            on: GateResult::Fix,
            max: 2,
            fix_agent: Some("fixer".to_string()),
        })],
        config: None,
    };

    let tester = ScriptedAgent::sequence(vec![fix, StepResult::pass()]);
    let fixer = ScriptedAgent::always(StepResult::pass());
    let mut registry = AgentRegistry::new();
    registry.register("tester", tester.clone());
    registry.register("fixer", fixer.clone());

    let report = runner(tmp.path(), pipeline, registry)
        .run_all(&worker, None)
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(tester.calls(), 2);
    assert_eq!(fixer.calls(), 1);
    assert!(!report.fix_requested());
}

#[tokio::test]
async fn exhausted_fix_budget_reports_fix_requested() {
    let tmp = tempfile::tempdir().unwrap();
    let worker = worker_fixture(tmp.path());

    let mut fix = StepResult::pass();
    fix.gate_result = GateResult::Fix;
    fix.errors = vec!["still failing".into()];

    let pipeline = Pipeline {
        name: "budget".into(),
        steps: vec![Step::new("test", "tester").with_retry(RetryPolicy {
            on: GateResult::Fix,
            max: 1,
            fix_agent: Some("fixer".to_string()),
        })],
        config: None,
    };

    let tester = ScriptedAgent::sequence(vec![fix.clone(), fix]);
    let mut registry = AgentRegistry::new();
    registry.register("tester", tester.clone());
    registry.register("fixer", ScriptedAgent::always(StepResult::pass()));

    let report = runner(tmp.path(), pipeline, registry)
        .run_all(&worker, None)
        .await
        .unwrap();

    assert!(!report.is_success());
    assert_eq!(tester.calls(), 2);
    assert!(report.fix_requested());
}

#[tokio::test]
async fn gated_step_skips_unless_env_is_literal_true() {
    let tmp = tempfile::tempdir().unwrap();
    let worker = worker_fixture(tmp.path());

    let pipeline = Pipeline {
        name: "gated".into(),
        steps: vec![
            Step::new("docs", "writer")
                .readonly()
                .enabled_by("WIGGUM_TEST_DOCS_GATE_OFF"),
        ],
        config: None,
    };

    std::env::set_var("WIGGUM_TEST_DOCS_GATE_OFF", "yes");

    let writer = ScriptedAgent::always(StepResult::pass());
    let mut registry = AgentRegistry::new();
    registry.register("writer", writer.clone());

    let report = runner(tmp.path(), pipeline, registry)
        .run_all(&worker, None)
        .await
        .unwrap();

    // "yes" is not the literal "true": the step is gated out.
    assert!(report.is_success());
    assert_eq!(writer.calls(), 0);

    std::env::remove_var("WIGGUM_TEST_DOCS_GATE_OFF");
}

#[tokio::test]
async fn resume_skips_completed_prefix_and_matches_fresh_gates() {
    let tmp = tempfile::tempdir().unwrap();
    let worker = worker_fixture(tmp.path());

    let pipeline = Pipeline {
        name: "resume".into(),
        steps: vec![
            Step::new("plan", "planner").readonly(),
            Step::new("implement", "coder"),
            Step::new("test", "tester"),
        ],
        config: None,
    };

    let planner = ScriptedAgent::always(StepResult::pass());
    let coder = ScriptedAgent::always(StepResult::pass());
    let tester = ScriptedAgent::always(StepResult::pass());
    let mut registry = AgentRegistry::new();
    registry.register("planner", planner.clone());
    registry.register("coder", coder.clone());
    registry.register("tester", tester.clone());

    let runner = runner(tmp.path(), pipeline, registry);

    let fresh = runner.run_all(&worker, None).await.unwrap();
    assert!(fresh.is_success());
    assert_eq!(planner.calls(), 1);

    // Restart from "test": earlier steps are not re-invoked, and the final
    // gate vector for steps >= test matches the fresh run.
    let resumed = runner.run_all(&worker, Some("test")).await.unwrap();
    assert!(resumed.is_success());
    assert_eq!(planner.calls(), 1);
    assert_eq!(coder.calls(), 1);
    assert_eq!(tester.calls(), 2);

    assert_eq!(gates(&fresh)[2..], gates(&resumed)[2..]);
    assert_eq!(
        std::fs::read_to_string(worker.resume_step()).unwrap(),
        "test"
    );
}

#[tokio::test]
async fn resume_agent_can_abort() {
    let tmp = tempfile::tempdir().unwrap();
    let worker = worker_fixture(tmp.path());

    let pipeline = Pipeline {
        name: "abort".into(),
        steps: vec![
            Step::new("plan", "planner").readonly(),
            Step::new("implement", "coder"),
        ],
        config: None,
    };

    // Prior history: plan already ran.
    let store = ResultStore::new(worker.results_dir());
    store.write("plan", 100, &StepResult::pass()).await.unwrap();

    let coder = ScriptedAgent::always(StepResult::pass());
    let mut registry = AgentRegistry::new();
    registry.register("planner", ScriptedAgent::always(StepResult::pass()));
    registry.register("coder", coder.clone());
    registry.register(
        "resume-decide",
        Arc::new(ResumeAgent {
            decision: "ABORT".to_string(),
        }),
    );

    let report = runner(tmp.path(), pipeline, registry)
        .run_all(&worker, None)
        .await
        .unwrap();

    assert_eq!(report.outcome, PipelineOutcome::Aborted);
    assert_eq!(coder.calls(), 0);
}
