//! Structural invariants the engine checks after every transition.

use crate::core::state::WorkflowState;
use crate::core::types::TerminalReason;

/// Validate state invariants, returning all violations.
///
/// The engine fails loudly on any violation instead of persisting a state it
/// could not resume from.
pub fn validate_invariants(state: &WorkflowState, max_iterations_per_task: u32) -> Vec<String> {
    let mut errors = Vec::new();

    if state.current_task_index > state.tasks.len() {
        errors.push(format!(
            "current_task_index {} exceeds task count {}",
            state.current_task_index,
            state.tasks.len()
        ));
    }
    if !state.tasks.is_empty() && state.results.len() != state.tasks.len() {
        errors.push(format!(
            "results has {} slots for {} tasks",
            state.results.len(),
            state.tasks.len()
        ));
    }
    if state.iteration_count > max_iterations_per_task {
        errors.push(format!(
            "iteration_count {} exceeds cap {max_iterations_per_task}",
            state.iteration_count
        ));
    }
    for evaluation in &state.evaluations {
        if !(0.0..=1.0).contains(&evaluation.score) {
            errors.push(format!(
                "evaluation for task {} has score {} outside [0,1]",
                evaluation.task_id, evaluation.score
            ));
        }
    }
    if matches!(
        state.terminal,
        Some(TerminalReason::Completed | TerminalReason::Exhausted)
    ) && state.current_task_index != state.tasks.len()
    {
        errors.push(format!(
            "terminal state reached at index {} of {}",
            state.current_task_index,
            state.tasks.len()
        ));
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{evaluation, task};

    #[test]
    fn fresh_state_has_no_violations() {
        let state = WorkflowState::new("goal");
        assert!(validate_invariants(&state, 3).is_empty());
    }

    #[test]
    fn violations_are_all_reported() {
        let mut state = WorkflowState::new("goal");
        state.install_plan(vec![task(1)]);
        state.current_task_index = 5;
        state.iteration_count = 9;
        state.results.push(None);
        state.evaluations.push(evaluation(1, 1.5, true));

        let errors = validate_invariants(&state, 3);
        assert!(errors.iter().any(|e| e.contains("current_task_index")));
        assert!(errors.iter().any(|e| e.contains("slots")));
        assert!(errors.iter().any(|e| e.contains("iteration_count")));
        assert!(errors.iter().any(|e| e.contains("outside [0,1]")));
    }
}
