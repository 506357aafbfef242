//! End-to-end workflow properties over the engine and session store.

use std::sync::Mutex;

use anyhow::Result;

use triad::core::types::TerminalReason;
use triad::engine::{RunRequest, WorkflowEngine};
use triad::io::config::EngineConfig;
use triad::io::reasoner::{ReasonRequest, Reasoner};
use triad::io::session_store::FileSessionStore;
use triad::test_support::ScriptedReasoner;

fn config(max_iterations: u32) -> EngineConfig {
    EngineConfig {
        max_iterations_per_task: max_iterations,
        success_threshold: 0.8,
        ..EngineConfig::default()
    }
}

fn plan_json(task_count: u32) -> String {
    let tasks: Vec<String> = (1..=task_count)
        .map(|id| {
            format!(
                r#"{{"task_id": {id}, "description": "task {id}", "priority": 3, "dependencies": []}}"#
            )
        })
        .collect();
    format!(r#"{{"tasks": [{}]}}"#, tasks.join(","))
}

fn artifact_json(label: &str) -> String {
    format!(r#"{{"content": "{label}", "rationale": "because", "verification_cases": []}}"#)
}

fn evaluation_json(score: f64, success: bool) -> String {
    format!(r#"{{"score": {score}, "feedback": "fb", "improvements": [], "success": {success}}}"#)
}

/// Reasoner that snapshots the persisted session before every call, so tests
/// can assert properties over the sequence of stored states.
struct ProbingReasoner<'a> {
    inner: ScriptedReasoner,
    store: &'a FileSessionStore,
    session_id: &'a str,
    observed_indices: Mutex<Vec<usize>>,
}

impl Reasoner for ProbingReasoner<'_> {
    fn reason(&self, request: &ReasonRequest) -> Result<String> {
        if let Some(session) = self.store.get(self.session_id)? {
            self.observed_indices
                .lock()
                .expect("lock")
                .push(session.state.current_task_index);
        }
        self.inner.reason(request)
    }
}

/// `current_task_index` is monotonically non-decreasing across every persisted
/// snapshot and never exceeds the task count; each evaluation carries the id
/// of the task active at that point.
#[test]
fn persisted_index_is_monotonic_and_evaluations_track_tasks() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = FileSessionStore::new(temp.path().join("sessions")).expect("store");
    let session_id = "sess-probe";

    let reasoner = ProbingReasoner {
        inner: ScriptedReasoner::new(vec![
            Ok(plan_json(3)),
            Ok(artifact_json("a1")),
            Ok(evaluation_json(0.9, true)),
            Ok(artifact_json("a2")),
            Ok(evaluation_json(0.1, false)),
            Ok(artifact_json("a2b")),
            Ok(evaluation_json(0.9, true)),
            Ok(artifact_json("a3")),
            Ok(evaluation_json(0.85, true)),
        ]),
        store: &store,
        session_id,
        observed_indices: Mutex::new(Vec::new()),
    };
    let engine = WorkflowEngine::new(&store, &reasoner, config(2));

    let outcome = engine
        .run(&RunRequest {
            goal: "three tasks".to_string(),
            session_id: Some(session_id.to_string()),
            ..RunRequest::default()
        })
        .expect("run");

    assert_eq!(outcome.terminal(), Some(&TerminalReason::Completed));

    let observed = reasoner.observed_indices.lock().expect("lock");
    assert!(
        observed.windows(2).all(|w| w[0] <= w[1]),
        "index went backwards: {observed:?}"
    );
    assert!(observed.iter().all(|i| *i <= 3));

    // One evaluation per attempt, each tagged with the task active at the time.
    let expected_task_ids = [1, 2, 2, 3];
    let actual: Vec<u32> = outcome.state.evaluations.iter().map(|e| e.task_id).collect();
    assert_eq!(actual, expected_task_ids);
}

/// A session persisted by one store instance reloads identically from another,
/// as after a process restart.
#[test]
fn session_survives_process_restart() {
    let temp = tempfile::tempdir().expect("tempdir");
    let dir = temp.path().join("sessions");

    let outcome = {
        let store = FileSessionStore::new(&dir).expect("store");
        let reasoner = ScriptedReasoner::new(vec![
            Ok(plan_json(1)),
            Ok(artifact_json("a1")),
            Ok(evaluation_json(0.9, true)),
        ]);
        let engine = WorkflowEngine::new(&store, &reasoner, config(2));
        engine
            .run(&RunRequest {
                goal: "persist me".to_string(),
                ..RunRequest::default()
            })
            .expect("run")
    };

    // New store instance over the same directory: the restart boundary.
    let store = FileSessionStore::new(&dir).expect("store");
    let session = store
        .get(&outcome.session_id)
        .expect("get")
        .expect("present");
    assert_eq!(session.state, outcome.state);
    assert!(
        session
            .conversation_log
            .iter()
            .any(|e| e.content.contains("planned 1 tasks"))
    );

    // A fresh engine over the reloaded session does not re-execute anything.
    let idle = ScriptedReasoner::new(Vec::new());
    let engine = WorkflowEngine::new(&store, &idle, config(2));
    let resumed = engine
        .run(&RunRequest {
            goal: "persist me".to_string(),
            session_id: Some(outcome.session_id.clone()),
            ..RunRequest::default()
        })
        .expect("resume");
    assert_eq!(resumed.state, outcome.state);
}

/// A task whose every attempt fails still advances once the cap is hit; the
/// engine proceeds to later tasks instead of looping forever.
#[test]
fn capped_out_middle_task_does_not_abort_the_run() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = FileSessionStore::new(temp.path().join("sessions")).expect("store");
    let reasoner = ScriptedReasoner::new(vec![
        Ok(plan_json(2)),
        Ok(artifact_json("t1-a")),
        Ok(evaluation_json(0.2, false)),
        Ok(artifact_json("t1-b")),
        Ok(evaluation_json(0.3, false)),
        Ok(artifact_json("t2")),
        Ok(evaluation_json(0.9, true)),
    ]);
    let engine = WorkflowEngine::new(&store, &reasoner, config(2));

    let outcome = engine
        .run(&RunRequest {
            goal: "stubborn first task".to_string(),
            ..RunRequest::default()
        })
        .expect("run");

    // The failed first task is best-effort, visible in the report, and the
    // run still completes because the final task succeeded.
    assert_eq!(outcome.terminal(), Some(&TerminalReason::Completed));
    assert!(outcome.reports[0].capped_out);
    assert_eq!(outcome.reports[0].attempts, 2);
    assert!(outcome.reports[1].succeeded);
}

/// Deleting a session is idempotent and observable.
#[test]
fn delete_then_get_returns_not_found() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = FileSessionStore::new(temp.path().join("sessions")).expect("store");
    let reasoner = ScriptedReasoner::new(vec![
        Ok(plan_json(1)),
        Ok(artifact_json("a")),
        Ok(evaluation_json(0.9, true)),
    ]);
    let engine = WorkflowEngine::new(&store, &reasoner, config(2));
    let outcome = engine
        .run(&RunRequest {
            goal: "goal".to_string(),
            ..RunRequest::default()
        })
        .expect("run");

    store.delete(&outcome.session_id).expect("delete");
    store.delete(&outcome.session_id).expect("delete again");
    assert!(store.get(&outcome.session_id).expect("get").is_none());
}
