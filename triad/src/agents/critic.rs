//! Critic role: score an artifact and render a success verdict.

use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::core::types::{Artifact, Evaluation, LogEntry, LogRole, Task};
use crate::io::prompt::PromptBuilder;
use crate::io::reasoner::{ReasonRequest, Reasoner};
use crate::io::session_store::FileSessionStore;

use super::decode_role_output;

const EVALUATION_SCHEMA: &str = include_str!("../../schemas/evaluation.schema.json");

/// Marker prefix identifying a sentinel evaluation in `feedback`.
pub const EVALUATION_FAILURE_MARKER: &str = "[evaluation failed]";

#[derive(Debug, Deserialize)]
struct RawEvaluation {
    score: f64,
    feedback: String,
    improvements: Vec<String>,
    success: bool,
}

/// Evaluates artifacts; reasoner and decode failures become sentinel
/// evaluations (score 0, not successful) instead of propagating.
pub struct ArtifactEvaluator {
    prompts: PromptBuilder,
    output_limit_bytes: usize,
}

impl ArtifactEvaluator {
    pub fn new(prompt_budget_bytes: usize, output_limit_bytes: usize) -> Self {
        Self {
            prompts: PromptBuilder::new(prompt_budget_bytes),
            output_limit_bytes,
        }
    }

    /// Evaluate `artifact` against `task`. The success verdict comes from the
    /// critic (`score >= success_threshold`); the engine never recomputes it.
    /// Only a store write error propagates.
    pub fn evaluate<R: Reasoner>(
        &self,
        reasoner: &R,
        store: &FileSessionStore,
        session_id: &str,
        task: &Task,
        artifact: &Artifact,
        prior_artifacts: &[&Artifact],
        success_threshold: f64,
        timeout: Duration,
    ) -> Result<Evaluation> {
        let attempt = (|| -> Result<Evaluation> {
            let prompt = self.prompts.render_critic(
                task,
                artifact,
                prior_artifacts,
                success_threshold,
            )?;
            let text = reasoner.reason(&ReasonRequest {
                prompt,
                timeout,
                output_limit_bytes: self.output_limit_bytes,
            })?;
            let raw: RawEvaluation = decode_role_output(&text, EVALUATION_SCHEMA, "critic")?;
            Ok(Evaluation {
                task_id: task.id,
                // Reasoners occasionally score outside the contract range.
                score: raw.score.clamp(0.0, 1.0),
                feedback: raw.feedback,
                improvements: raw.improvements,
                success: raw.success,
            })
        })();

        let evaluation = match attempt {
            Ok(evaluation) => {
                debug!(
                    task_id = task.id,
                    score = evaluation.score,
                    success = evaluation.success,
                    "artifact evaluated"
                );
                evaluation
            }
            Err(err) => {
                warn!(task_id = task.id, err = %format!("{err:#}"), "producing sentinel evaluation");
                Evaluation {
                    task_id: task.id,
                    score: 0.0,
                    feedback: format!("{EVALUATION_FAILURE_MARKER} {err:#}"),
                    improvements: vec![
                        "regenerate the artifact and respond with JSON matching the required \
                         evaluation shape"
                            .to_string(),
                    ],
                    success: false,
                }
            }
        };

        store.append_to_log(
            session_id,
            LogEntry::now(
                LogRole::Critic,
                Some(task.id),
                serde_json::to_string(&evaluation)?,
            ),
        )?;

        Ok(evaluation)
    }
}
