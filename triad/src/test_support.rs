//! Test-only helpers: deterministic records and a scripted reasoner.

use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::{Result, anyhow};

use crate::core::types::{Artifact, Evaluation, Task};
use crate::io::reasoner::{ReasonRequest, Reasoner};
use crate::io::session_store::FileSessionStore;

/// Create a deterministic task with no dependencies.
pub fn task(id: u32) -> Task {
    Task {
        id,
        description: format!("task {id} description"),
        priority: 3,
        dependencies: Default::default(),
    }
}

/// Create a deterministic artifact for a task.
pub fn artifact(task_id: u32) -> Artifact {
    Artifact {
        task_id,
        content: format!("artifact for task {task_id}"),
        rationale: "deterministic fixture".to_string(),
        verification_cases: vec![format!("verify task {task_id}")],
    }
}

/// Create an evaluation with an explicit score and verdict.
pub fn evaluation(task_id: u32, score: f64, success: bool) -> Evaluation {
    Evaluation {
        task_id,
        score,
        feedback: format!("feedback for task {task_id}"),
        improvements: Vec::new(),
        success,
    }
}

/// Temp-backed session store for tests.
pub fn session_store() -> (tempfile::TempDir, FileSessionStore) {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = FileSessionStore::new(temp.path().join("sessions")).expect("session store");
    (temp, store)
}

/// Reasoner that replays a queue of scripted responses.
///
/// `Err(msg)` entries simulate transport failures. Draining the queue past its
/// end is a test bug and fails loudly.
pub struct ScriptedReasoner {
    responses: Mutex<VecDeque<Result<String, String>>>,
}

impl ScriptedReasoner {
    pub fn new(responses: Vec<Result<String, String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
        }
    }

    /// Number of scripted responses not yet consumed.
    pub fn remaining(&self) -> usize {
        self.responses.lock().expect("lock").len()
    }
}

impl Reasoner for ScriptedReasoner {
    fn reason(&self, _request: &ReasonRequest) -> Result<String> {
        let next = self
            .responses
            .lock()
            .expect("lock")
            .pop_front()
            .ok_or_else(|| anyhow!("scripted reasoner exhausted"))?;
        next.map_err(|msg| anyhow!("{msg}"))
    }
}
