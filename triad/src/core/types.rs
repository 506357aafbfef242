//! Shared deterministic types for the workflow core.
//!
//! These types define stable contracts between the planner, developer, critic,
//! and the workflow engine. They must not depend on I/O and must serialize
//! deterministically across runs.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One decomposed unit of work produced by the planner.
///
/// Tasks are created once per run and immutable thereafter. Dependencies are
/// recorded as data; execution order is strictly plan order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: u32,
    pub description: String,
    /// Priority 1..=5, 5 highest.
    pub priority: u32,
    /// Ids of tasks this task depends on. Informational only.
    pub dependencies: BTreeSet<u32>,
}

/// A candidate solution produced by the developer for one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub task_id: u32,
    pub content: String,
    pub rationale: String,
    pub verification_cases: Vec<String>,
}

/// A scored judgment of an artifact, one per attempt, immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub task_id: u32,
    /// Quality score in [0,1].
    pub score: f64,
    pub feedback: String,
    pub improvements: Vec<String>,
    /// The critic's verdict (`score >= success_threshold`). Never recomputed
    /// by the engine.
    pub success: bool,
}

/// Why a workflow reached a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TerminalReason {
    /// Every task was visited and the final task succeeded; earlier tasks may
    /// have capped out without success.
    Completed,
    /// The final task hit its iteration cap without a successful evaluation.
    Exhausted,
    /// Planning failed, the run was cancelled, or the store rejected a write.
    Failed { reason: String },
}

/// Author role for a conversation-log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRole {
    Planner,
    Developer,
    Critic,
}

/// Append-only conversation-log record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub role: LogRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<u32>,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    /// Create an entry stamped with the current UTC time.
    pub fn now(role: LogRole, task_id: Option<u32>, content: impl Into<String>) -> Self {
        Self {
            role,
            task_id,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Per-task summary derived from the evaluation history.
///
/// Makes the best-effort advancement policy visible: a capped-out task shows
/// `capped_out=true` and `succeeded=false` instead of aborting the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskReport {
    pub task_id: u32,
    pub attempts: u32,
    pub succeeded: bool,
    pub capped_out: bool,
}
