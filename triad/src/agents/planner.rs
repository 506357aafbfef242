//! Planner role: decompose a goal into an ordered task list.

use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::core::plan::{DecodedPlan, PlanError, decode_plan};
use crate::core::types::{LogEntry, LogRole, Task};
use crate::io::prompt::PromptBuilder;
use crate::io::reasoner::{ReasonRequest, Reasoner};
use crate::io::session_store::FileSessionStore;

use super::decode_role_value;

const TASK_PLAN_SCHEMA: &str = include_str!("../../schemas/task_plan.schema.json");

/// Builds a validated plan from the goal text.
pub struct PlanBuilder {
    prompts: PromptBuilder,
    output_limit_bytes: usize,
}

impl PlanBuilder {
    pub fn new(prompt_budget_bytes: usize, output_limit_bytes: usize) -> Self {
        Self {
            prompts: PromptBuilder::new(prompt_budget_bytes),
            output_limit_bytes,
        }
    }

    /// Plan the goal. Planning failures are fatal to the run: the error chain
    /// carries a [`PlanError`] the engine can downcast, and the caller must
    /// never substitute an empty plan. Store failures propagate unchanged.
    pub fn plan<R: Reasoner>(
        &self,
        reasoner: &R,
        store: &FileSessionStore,
        session_id: &str,
        goal: &str,
        timeout: Duration,
    ) -> Result<Vec<Task>> {
        let prompt = self
            .prompts
            .render_planner(goal)
            .map_err(|err| PlanError::Parse(format!("{err:#}")))?;

        let text = reasoner
            .reason(&ReasonRequest {
                prompt,
                timeout,
                output_limit_bytes: self.output_limit_bytes,
            })
            .map_err(|err| PlanError::Parse(format!("reasoning engine failed: {err:#}")))?;

        let value = decode_role_value(&text, TASK_PLAN_SCHEMA, "planner")
            .map_err(|err| PlanError::Parse(format!("{err:#}")))?;
        let DecodedPlan { tasks, dropped } = decode_plan(&value)?;

        // Dropped dependency entries are a documented tolerance, not silent
        // data loss: each one lands in the conversation log.
        for drop in &dropped {
            warn!(task_id = drop.task_id, raw = %drop.raw, "dropped unparseable dependency");
            store.append_to_log(
                session_id,
                LogEntry::now(
                    LogRole::Planner,
                    Some(drop.task_id),
                    format!("dropped unparseable dependency entry {}", drop.raw),
                ),
            )?;
        }

        store.append_to_log(
            session_id,
            LogEntry::now(
                LogRole::Planner,
                None,
                format!("planned {} tasks for goal: {goal}", tasks.len()),
            ),
        )?;

        info!(tasks = tasks.len(), dropped = dropped.len(), "plan built");
        debug!(?tasks, "decoded plan");
        Ok(tasks)
    }
}
