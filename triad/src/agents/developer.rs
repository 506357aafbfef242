//! Developer role: produce a candidate artifact for one task.

use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::core::types::{Artifact, Evaluation, LogEntry, LogRole, Task};
use crate::io::prompt::PromptBuilder;
use crate::io::reasoner::{ReasonRequest, Reasoner};
use crate::io::session_store::FileSessionStore;

use super::decode_role_output;

const ARTIFACT_SCHEMA: &str = include_str!("../../schemas/artifact.schema.json");

/// Marker prefix identifying a sentinel artifact in `content`.
pub const PRODUCTION_FAILURE_MARKER: &str = "[artifact production failed]";

#[derive(Debug, Deserialize)]
struct RawArtifact {
    content: String,
    rationale: String,
    verification_cases: Vec<String>,
}

/// Produces artifacts; reasoner and decode failures become sentinel artifacts
/// so the pipeline always advances deterministically.
pub struct ArtifactProducer {
    prompts: PromptBuilder,
    output_limit_bytes: usize,
}

impl ArtifactProducer {
    pub fn new(prompt_budget_bytes: usize, output_limit_bytes: usize) -> Self {
        Self {
            prompts: PromptBuilder::new(prompt_budget_bytes),
            output_limit_bytes,
        }
    }

    /// Produce an artifact for `task` given the artifacts of earlier tasks and,
    /// on retries, the previous failed evaluation. Never fails for reasoner or
    /// parse errors; only a store write error propagates.
    pub fn produce<R: Reasoner>(
        &self,
        reasoner: &R,
        store: &FileSessionStore,
        session_id: &str,
        task: &Task,
        prior_artifacts: &[&Artifact],
        last_evaluation: Option<&Evaluation>,
        timeout: Duration,
    ) -> Result<Artifact> {
        let attempt = (|| -> Result<Artifact> {
            let prompt =
                self.prompts
                    .render_developer(task, prior_artifacts, last_evaluation)?;
            let text = reasoner.reason(&ReasonRequest {
                prompt,
                timeout,
                output_limit_bytes: self.output_limit_bytes,
            })?;
            let raw: RawArtifact = decode_role_output(&text, ARTIFACT_SCHEMA, "developer")?;
            Ok(Artifact {
                task_id: task.id,
                content: raw.content,
                rationale: raw.rationale,
                verification_cases: raw.verification_cases,
            })
        })();

        let artifact = match attempt {
            Ok(artifact) => {
                debug!(task_id = task.id, "artifact produced");
                artifact
            }
            Err(err) => {
                warn!(task_id = task.id, err = %format!("{err:#}"), "producing sentinel artifact");
                Artifact {
                    task_id: task.id,
                    content: format!("{PRODUCTION_FAILURE_MARKER} {err:#}"),
                    rationale: "the reasoning call or output decoding failed; this sentinel \
                                records the failure so the workflow can retry"
                        .to_string(),
                    verification_cases: Vec::new(),
                }
            }
        };

        store.append_to_log(
            session_id,
            LogEntry::now(
                LogRole::Developer,
                Some(task.id),
                serde_json::to_string(&artifact)?,
            ),
        )?;

        Ok(artifact)
    }
}
