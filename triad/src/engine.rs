//! Workflow engine: the state machine sequencing planner, developer, and
//! critic against a task list.
//!
//! States: Planning -> Executing -> Evaluating -> (Retrying | Advancing) ->
//! (Executing | Completed | Exhausted | Failed). The engine exclusively owns
//! [`WorkflowState`] mutation and writes the updated snapshot to the session
//! store after every transition, so a crash at any point leaves a resumable,
//! self-consistent record. Execution order is strictly plan order;
//! dependencies are recorded as data but not used for scheduling.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};
use tracing::{debug, info, warn};

use crate::agents::critic::ArtifactEvaluator;
use crate::agents::developer::ArtifactProducer;
use crate::agents::planner::PlanBuilder;
use crate::core::invariants::validate_invariants;
use crate::core::plan::PlanError;
use crate::core::state::{Decision, WorkflowState, decide};
use crate::core::types::{TaskReport, TerminalReason};
use crate::io::config::EngineConfig;
use crate::io::reasoner::Reasoner;
use crate::io::session_store::{FileSessionStore, Session, generate_session_id};

/// Caller-supplied cancellation signal, observable across threads.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A request to run (or resume) a workflow.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub goal: String,
    /// Resume this session when set; otherwise a fresh id is generated.
    pub session_id: Option<String>,
    pub cancel: CancelToken,
}

/// Final result of a workflow run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub session_id: String,
    pub state: WorkflowState,
    /// Per-task attempt summaries; capped-out tasks are visible here.
    pub reports: Vec<TaskReport>,
}

impl RunOutcome {
    pub fn terminal(&self) -> Option<&TerminalReason> {
        self.state.terminal.as_ref()
    }
}

/// The workflow state machine.
pub struct WorkflowEngine<'s, R> {
    store: &'s FileSessionStore,
    reasoner: &'s R,
    config: EngineConfig,
    planner: PlanBuilder,
    producer: ArtifactProducer,
    evaluator: ArtifactEvaluator,
}

impl<'s, R: Reasoner> WorkflowEngine<'s, R> {
    pub fn new(store: &'s FileSessionStore, reasoner: &'s R, config: EngineConfig) -> Self {
        let planner = PlanBuilder::new(
            config.prompt_budget_bytes,
            config.reasoner_output_limit_bytes,
        );
        let producer = ArtifactProducer::new(
            config.prompt_budget_bytes,
            config.reasoner_output_limit_bytes,
        );
        let evaluator = ArtifactEvaluator::new(
            config.prompt_budget_bytes,
            config.reasoner_output_limit_bytes,
        );
        Self {
            store,
            reasoner,
            config,
            planner,
            producer,
            evaluator,
        }
    }

    /// Run the workflow to a terminal state.
    ///
    /// Planning failures, cancellation, and timeouts become a `Failed`
    /// terminal in the returned outcome; the partial state accumulated so far
    /// is never discarded. Store I/O failures propagate as errors instead of
    /// proceeding with unpersisted state.
    pub fn run(&self, request: &RunRequest) -> Result<RunOutcome> {
        let deadline = Instant::now() + Duration::from_secs(self.config.workflow_timeout_secs);
        let session_id = match &request.session_id {
            Some(id) => id.clone(),
            None => generate_session_id(),
        };

        // Create-on-first-use; an existing session resumes from its snapshot.
        let mut state = match self.store.get(&session_id)? {
            Some(session) => session.state,
            None => {
                let state = WorkflowState::new(request.goal.clone());
                let session = Session::new(session_id.clone(), state.clone());
                self.store.put(&session_id, &session)?;
                info!(session_id, "session created");
                state
            }
        };

        if state.is_terminal() {
            debug!(session_id, "session already terminal, nothing to do");
            return Ok(self.outcome(session_id, state));
        }

        // Planning runs once per session; a resumed session keeps its plan.
        if state.tasks.is_empty() && state.evaluations.is_empty() {
            match self.plan_phase(&request.cancel, deadline, &session_id, &mut state)? {
                Phase::Continue => {}
                Phase::Terminal => return Ok(self.outcome(session_id, state)),
            }
        }

        while !state.is_terminal() {
            let Some(task) = state.current_task().cloned() else {
                // Empty (but valid) plan: nothing to execute.
                state.terminal = Some(TerminalReason::Completed);
                self.persist(&session_id, &state)?;
                break;
            };

            // Executing: produce an artifact for the current task.
            let timeout = match self.time_slice(&request.cancel, deadline) {
                Ok(timeout) => timeout,
                Err(reason) => {
                    warn!(session_id, %reason, "run interrupted");
                    state.fail(reason);
                    self.persist(&session_id, &state)?;
                    break;
                }
            };
            let artifact = {
                let prior = state.prior_artifacts();
                let last_evaluation = state.last_evaluation_for_current();
                self.producer.produce(
                    self.reasoner,
                    self.store,
                    &session_id,
                    &task,
                    &prior,
                    last_evaluation,
                    timeout,
                )?
            };
            state.record_artifact(artifact.clone());
            self.persist(&session_id, &state)?;

            // Evaluating: score the just-produced artifact.
            let timeout = match self.time_slice(&request.cancel, deadline) {
                Ok(timeout) => timeout,
                Err(reason) => {
                    warn!(session_id, %reason, "run interrupted");
                    state.fail(reason);
                    self.persist(&session_id, &state)?;
                    break;
                }
            };
            let evaluation = {
                let prior = state.prior_artifacts();
                self.evaluator.evaluate(
                    self.reasoner,
                    self.store,
                    &session_id,
                    &task,
                    &artifact,
                    &prior,
                    self.config.success_threshold,
                    timeout,
                )?
            };
            let success = evaluation.success;
            state.record_evaluation(evaluation);
            self.persist(&session_id, &state)?;

            match decide(
                success,
                state.iteration_count,
                self.config.max_iterations_per_task,
            ) {
                Decision::Retry => {
                    debug!(
                        session_id,
                        task_id = task.id,
                        iteration = state.iteration_count,
                        "retrying task"
                    );
                }
                Decision::Advance { succeeded } => {
                    if !succeeded {
                        info!(
                            session_id,
                            task_id = task.id,
                            "iteration cap reached, advancing without success"
                        );
                    }
                    let finished = state.advance(succeeded);
                    self.persist(&session_id, &state)?;
                    if finished {
                        break;
                    }
                }
            }
        }

        info!(session_id, terminal = ?state.terminal, "workflow finished");
        Ok(self.outcome(session_id, state))
    }

    fn plan_phase(
        &self,
        cancel: &CancelToken,
        deadline: Instant,
        session_id: &str,
        state: &mut WorkflowState,
    ) -> Result<Phase> {
        let timeout = match self.time_slice(cancel, deadline) {
            Ok(timeout) => timeout,
            Err(reason) => {
                state.fail(reason);
                self.persist(session_id, state)?;
                return Ok(Phase::Terminal);
            }
        };
        match self
            .planner
            .plan(self.reasoner, self.store, session_id, &state.goal, timeout)
        {
            Ok(tasks) => {
                state.install_plan(tasks);
                self.persist(session_id, state)?;
                Ok(Phase::Continue)
            }
            Err(err) => {
                // Planning failure is fatal to the run, never silently replaced
                // by an empty plan. Store errors propagate unchanged.
                let Some(plan_err) = err.downcast_ref::<PlanError>() else {
                    return Err(err);
                };
                warn!(session_id, err = %plan_err, "planning failed");
                state.fail(plan_err.to_string());
                self.persist(session_id, state)?;
                Ok(Phase::Terminal)
            }
        }
    }

    /// Persist the snapshot before the next transition begins, checking
    /// structural invariants first so a corrupt state is never written.
    fn persist(&self, session_id: &str, state: &WorkflowState) -> Result<()> {
        let errors = validate_invariants(state, self.config.max_iterations_per_task);
        if !errors.is_empty() {
            return Err(anyhow!("state invariants failed: {}", errors.join("; ")));
        }
        let mut session = self
            .store
            .get(session_id)?
            .ok_or_else(|| anyhow!("session '{session_id}' disappeared mid-run"))?;
        session.state = state.clone();
        self.store.put(session_id, &session)
    }

    /// Remaining time budget, or the reason the run must stop.
    fn time_slice(&self, cancel: &CancelToken, deadline: Instant) -> Result<Duration, String> {
        if cancel.is_cancelled() {
            return Err("workflow cancelled by caller".to_string());
        }
        let remaining = deadline
            .checked_duration_since(Instant::now())
            .unwrap_or(Duration::ZERO);
        if remaining.is_zero() {
            return Err(format!(
                "workflow timed out after {}s",
                self.config.workflow_timeout_secs
            ));
        }
        Ok(remaining)
    }

    fn outcome(&self, session_id: String, state: WorkflowState) -> RunOutcome {
        let reports = state.task_reports(self.config.max_iterations_per_task);
        RunOutcome {
            session_id,
            state,
            reports,
        }
    }
}

enum Phase {
    Continue,
    Terminal,
}
