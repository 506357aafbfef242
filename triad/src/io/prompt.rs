//! Prompt rendering for the three roles.
//!
//! Templates are minijinja documents compiled at startup. The prior-results
//! section is bounded by a byte budget so long runs cannot grow prompts
//! without limit; truncation is explicit in the rendered text.

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use serde::Serialize;

use crate::core::types::{Artifact, Evaluation, Task};

const PLANNER_TEMPLATE: &str = include_str!("prompts/planner.md");
const DEVELOPER_TEMPLATE: &str = include_str!("prompts/developer.md");
const CRITIC_TEMPLATE: &str = include_str!("prompts/critic.md");

/// Task context for template rendering.
#[derive(Debug, Clone, Serialize)]
struct TaskContext {
    id: u32,
    description: String,
    priority: u32,
}

impl TaskContext {
    fn from_task(task: &Task) -> Self {
        Self {
            id: task.id,
            description: task.description.clone(),
            priority: task.priority,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct ArtifactContext {
    content: String,
    rationale: String,
    verification_cases: Vec<String>,
}

impl ArtifactContext {
    fn from_artifact(artifact: &Artifact) -> Self {
        Self {
            content: artifact.content.clone(),
            rationale: artifact.rationale.clone(),
            verification_cases: artifact.verification_cases.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct FeedbackContext {
    score: f64,
    feedback: String,
    improvements: Vec<String>,
}

/// Template engine wrapper around minijinja.
pub struct PromptBuilder {
    env: Environment<'static>,
    budget_bytes: usize,
}

impl PromptBuilder {
    /// `budget_bytes` bounds the prior-results section of developer/critic
    /// prompts.
    pub fn new(budget_bytes: usize) -> Self {
        let mut env = Environment::new();
        env.add_template("planner", PLANNER_TEMPLATE)
            .expect("planner template should be valid");
        env.add_template("developer", DEVELOPER_TEMPLATE)
            .expect("developer template should be valid");
        env.add_template("critic", CRITIC_TEMPLATE)
            .expect("critic template should be valid");
        Self { env, budget_bytes }
    }

    pub fn render_planner(&self, goal: &str) -> Result<String> {
        let template = self.env.get_template("planner")?;
        template
            .render(context! { goal => goal.trim() })
            .context("render planner prompt")
    }

    pub fn render_developer(
        &self,
        task: &Task,
        prior: &[&Artifact],
        feedback: Option<&Evaluation>,
    ) -> Result<String> {
        let template = self.env.get_template("developer")?;
        let prior_block = prior_results_block(prior, self.budget_bytes);
        let feedback = feedback.map(|e| FeedbackContext {
            score: e.score,
            feedback: e.feedback.clone(),
            improvements: e.improvements.clone(),
        });
        template
            .render(context! {
                task => TaskContext::from_task(task),
                prior_results => (!prior_block.is_empty()).then_some(prior_block),
                feedback => feedback,
            })
            .context("render developer prompt")
    }

    pub fn render_critic(
        &self,
        task: &Task,
        artifact: &Artifact,
        prior: &[&Artifact],
        success_threshold: f64,
    ) -> Result<String> {
        let template = self.env.get_template("critic")?;
        let prior_block = prior_results_block(prior, self.budget_bytes);
        template
            .render(context! {
                task => TaskContext::from_task(task),
                artifact => ArtifactContext::from_artifact(artifact),
                prior_results => (!prior_block.is_empty()).then_some(prior_block),
                success_threshold => success_threshold,
            })
            .context("render critic prompt")
    }
}

/// Render prior artifacts as a budget-bounded text block.
///
/// Truncation keeps the earliest results (later tasks usually matter less as
/// context than foundations) and appends an explicit marker.
fn prior_results_block(prior: &[&Artifact], budget_bytes: usize) -> String {
    let mut block = String::new();
    for artifact in prior {
        block.push_str(&format!(
            "Task {}: {}\n  rationale: {}\n",
            artifact.task_id, artifact.content, artifact.rationale
        ));
    }
    if block.len() <= budget_bytes {
        return block.trim_end().to_string();
    }
    let mut cut = budget_bytes;
    while !block.is_char_boundary(cut) {
        cut -= 1;
    }
    let dropped = block.len() - cut;
    format!("{}\n[prior results truncated {dropped} bytes]", &block[..cut])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{artifact, evaluation, task};

    #[test]
    fn planner_prompt_contains_goal_and_contract() {
        let builder = PromptBuilder::new(1024);
        let prompt = builder.render_planner("build two endpoints").expect("render");
        assert!(prompt.contains("Planner Contract"));
        assert!(prompt.contains("build two endpoints"));
        assert!(prompt.contains("task_id"));
    }

    #[test]
    fn developer_prompt_folds_in_feedback_on_retry() {
        let builder = PromptBuilder::new(1024);
        let t = task(2);
        let prior = artifact(1);
        let mut failed = evaluation(2, 0.3, false);
        failed.feedback = "missing error handling".to_string();
        failed.improvements = vec!["handle the empty case".to_string()];

        let prompt = builder
            .render_developer(&t, &[&prior], Some(&failed))
            .expect("render");
        assert!(prompt.contains("Developer Contract"));
        assert!(prompt.contains("missing error handling"));
        assert!(prompt.contains("handle the empty case"));
        assert!(prompt.contains("Task 1:"));
    }

    #[test]
    fn developer_prompt_omits_feedback_section_on_first_attempt() {
        let builder = PromptBuilder::new(1024);
        let prompt = builder
            .render_developer(&task(1), &[], None)
            .expect("render");
        assert!(!prompt.contains("previous attempt"));
        assert!(!prompt.contains("Results of earlier tasks"));
    }

    #[test]
    fn critic_prompt_carries_threshold_and_artifact() {
        let builder = PromptBuilder::new(1024);
        let t = task(1);
        let a = artifact(1);
        let prompt = builder
            .render_critic(&t, &a, &[], 0.8)
            .expect("render");
        assert!(prompt.contains("Critic Contract"));
        assert!(prompt.contains("score >= 0.8"));
        assert!(prompt.contains(&a.content));
    }

    #[test]
    fn prior_results_respect_budget() {
        let mut big = artifact(1);
        big.content = "x".repeat(500);
        let block = prior_results_block(&[&big], 100);
        assert!(block.len() < 200);
        assert!(block.contains("truncated"));
    }
}
