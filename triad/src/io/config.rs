//! Engine configuration stored under `.triad/config.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Engine configuration (TOML).
///
/// This file is intended to be edited by humans and must remain stable and
/// automatable. Missing fields default to sensible values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Attempts allowed per task before the engine advances anyway.
    pub max_iterations_per_task: u32,

    /// Score at or above which the critic declares success, in [0,1].
    pub success_threshold: f64,

    /// Total wall-clock budget for one workflow run in seconds.
    pub workflow_timeout_secs: u64,

    /// Truncate reasoner output beyond this many bytes.
    pub reasoner_output_limit_bytes: usize,

    /// Maximum bytes for the prior-results prompt section before truncation.
    pub prompt_budget_bytes: usize,

    pub reasoner: ReasonerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReasonerConfig {
    /// Command to spawn for reasoning calls (prompt on stdin, text on stdout).
    pub command: Vec<String>,
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            command: vec!["codex".to_string(), "exec".to_string(), "-".to_string()],
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_iterations_per_task: 3,
            success_threshold: 0.8,
            workflow_timeout_secs: 30 * 60,
            reasoner_output_limit_bytes: 100_000,
            prompt_budget_bytes: 40_000,
            reasoner: ReasonerConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations_per_task == 0 {
            return Err(anyhow!("max_iterations_per_task must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.success_threshold) {
            return Err(anyhow!("success_threshold must be in [0,1]"));
        }
        if self.workflow_timeout_secs == 0 {
            return Err(anyhow!("workflow_timeout_secs must be > 0"));
        }
        if self.reasoner_output_limit_bytes == 0 {
            return Err(anyhow!("reasoner_output_limit_bytes must be > 0"));
        }
        if self.prompt_budget_bytes == 0 {
            return Err(anyhow!("prompt_budget_bytes must be > 0"));
        }
        if self.reasoner.command.is_empty() || self.reasoner.command[0].trim().is_empty() {
            return Err(anyhow!("reasoner.command must be a non-empty array"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `EngineConfig::default()`.
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    if !path.exists() {
        let cfg = EngineConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: EngineConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &EngineConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
