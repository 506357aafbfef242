//! Workflow state and transition decisions.
//!
//! [`WorkflowState`] is mutated exclusively by the engine; the pure helpers
//! here fold in records returned by the three roles and decide
//! advance-vs-retry. All decision logic is deterministic and I/O-free.

use serde::{Deserialize, Serialize};

use crate::core::types::{Artifact, Evaluation, Task, TaskReport, TerminalReason};

/// What the engine should do after an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Re-run the current task from scratch with the failure context.
    Retry,
    /// Move to the next task (or finish). `succeeded` records whether the
    /// advance was earned or forced by the iteration cap.
    Advance { succeeded: bool },
}

/// Decide the next transition from the latest evaluation.
///
/// Advance on success or once the per-task cap is reached; the cap path is the
/// best-effort policy, not an error.
pub fn decide(success: bool, iteration_count: u32, max_iterations_per_task: u32) -> Decision {
    if success {
        return Decision::Advance { succeeded: true };
    }
    if iteration_count >= max_iterations_per_task {
        return Decision::Advance { succeeded: false };
    }
    Decision::Retry
}

/// The single live state record for one workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub goal: String,
    pub tasks: Vec<Task>,
    /// Position in `tasks`; equals `tasks.len()` once terminal.
    pub current_task_index: usize,
    /// Attempts made on the current task.
    pub iteration_count: u32,
    /// Latest artifact per task position. Earlier attempts survive only in the
    /// conversation log.
    pub results: Vec<Option<Artifact>>,
    /// Append-only, one entry per attempt across all tasks.
    pub evaluations: Vec<Evaluation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal: Option<TerminalReason>,
}

impl WorkflowState {
    /// Fresh pre-planning state for a goal.
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            tasks: Vec::new(),
            current_task_index: 0,
            iteration_count: 0,
            results: Vec::new(),
            evaluations: Vec::new(),
            terminal: None,
        }
    }

    /// Install the plan: one result slot per task, bookkeeping reset.
    pub fn install_plan(&mut self, tasks: Vec<Task>) {
        self.results = vec![None; tasks.len()];
        self.tasks = tasks;
        self.current_task_index = 0;
        self.iteration_count = 0;
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal.is_some()
    }

    /// Task currently being worked on, if any remain.
    pub fn current_task(&self) -> Option<&Task> {
        self.tasks.get(self.current_task_index)
    }

    /// Artifacts for completed positions below the current index, in plan order.
    pub fn prior_artifacts(&self) -> Vec<&Artifact> {
        self.results[..self.current_task_index.min(self.results.len())]
            .iter()
            .filter_map(Option::as_ref)
            .collect()
    }

    /// Latest evaluation for the current task, if this is a retry attempt.
    pub fn last_evaluation_for_current(&self) -> Option<&Evaluation> {
        if self.iteration_count == 0 {
            return None;
        }
        let task = self.current_task()?;
        self.evaluations.iter().rev().find(|e| e.task_id == task.id)
    }

    /// Store the latest attempt's artifact, overwriting any prior attempt.
    pub fn record_artifact(&mut self, artifact: Artifact) {
        self.results[self.current_task_index] = Some(artifact);
    }

    /// Append an evaluation and count the attempt it concludes.
    pub fn record_evaluation(&mut self, evaluation: Evaluation) {
        self.evaluations.push(evaluation);
        self.iteration_count += 1;
    }

    /// Advance past the current task. Returns `true` when the plan is finished,
    /// in which case the terminal reason is set: `Exhausted` only when the
    /// final task capped out without success, `Completed` otherwise.
    pub fn advance(&mut self, succeeded: bool) -> bool {
        self.current_task_index += 1;
        self.iteration_count = 0;
        if self.current_task_index < self.tasks.len() {
            return false;
        }
        self.terminal = Some(if succeeded {
            TerminalReason::Completed
        } else {
            TerminalReason::Exhausted
        });
        true
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        self.terminal = Some(TerminalReason::Failed {
            reason: reason.into(),
        });
    }

    /// Per-task attempt summaries derived from the evaluation history.
    pub fn task_reports(&self, max_iterations_per_task: u32) -> Vec<TaskReport> {
        self.tasks
            .iter()
            .map(|task| {
                let evals: Vec<&Evaluation> = self
                    .evaluations
                    .iter()
                    .filter(|e| e.task_id == task.id)
                    .collect();
                let attempts = evals.len() as u32;
                let succeeded = evals.last().is_some_and(|e| e.success);
                TaskReport {
                    task_id: task.id,
                    attempts,
                    succeeded,
                    capped_out: !succeeded && attempts >= max_iterations_per_task,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{evaluation, task};

    #[test]
    fn decide_prefers_success_over_cap() {
        assert_eq!(decide(true, 3, 3), Decision::Advance { succeeded: true });
        assert_eq!(decide(false, 3, 3), Decision::Advance { succeeded: false });
        assert_eq!(decide(false, 1, 3), Decision::Retry);
    }

    #[test]
    fn install_plan_sizes_result_slots() {
        let mut state = WorkflowState::new("goal");
        state.install_plan(vec![task(1), task(2), task(3)]);
        assert_eq!(state.results.len(), 3);
        assert_eq!(state.current_task_index, 0);
        assert!(state.results.iter().all(Option::is_none));
    }

    #[test]
    fn advance_resets_iterations_and_marks_terminal_on_last() {
        let mut state = WorkflowState::new("goal");
        state.install_plan(vec![task(1), task(2)]);
        state.iteration_count = 2;

        assert!(!state.advance(true));
        assert_eq!(state.iteration_count, 0);
        assert_eq!(state.current_task_index, 1);
        assert!(state.terminal.is_none());

        assert!(state.advance(true));
        assert_eq!(state.terminal, Some(TerminalReason::Completed));
    }

    #[test]
    fn advance_without_success_on_final_task_is_exhausted() {
        let mut state = WorkflowState::new("goal");
        state.install_plan(vec![task(1)]);
        assert!(state.advance(false));
        assert_eq!(state.terminal, Some(TerminalReason::Exhausted));
    }

    #[test]
    fn last_evaluation_only_visible_on_retry() {
        let mut state = WorkflowState::new("goal");
        state.install_plan(vec![task(1)]);
        assert!(state.last_evaluation_for_current().is_none());

        state.record_evaluation(evaluation(1, 0.2, false));
        let last = state.last_evaluation_for_current().expect("retry context");
        assert_eq!(last.task_id, 1);
    }

    #[test]
    fn task_reports_mark_capped_out_tasks() {
        let mut state = WorkflowState::new("goal");
        state.install_plan(vec![task(1), task(2)]);
        state.record_evaluation(evaluation(1, 0.9, true));
        state.advance(true);
        state.record_evaluation(evaluation(2, 0.3, false));
        state.record_evaluation(evaluation(2, 0.5, false));
        state.advance(false);

        let reports = state.task_reports(2);
        assert_eq!(reports.len(), 2);
        assert!(reports[0].succeeded);
        assert!(!reports[0].capped_out);
        assert_eq!(reports[1].attempts, 2);
        assert!(!reports[1].succeeded);
        assert!(reports[1].capped_out);
    }
}
