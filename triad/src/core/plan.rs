//! Plan decoding and validation.
//!
//! The planner's reasoning output arrives as loosely-typed JSON. This module
//! coerces it into [`Task`] values and validates the result. Coercion is
//! tolerant only where documented (dependency entries); everything else is a
//! hard error so the engine never runs against a silently-empty plan.

use std::collections::BTreeSet;
use std::fmt;

use serde_json::Value;
use tracing::debug;

use crate::core::types::Task;

/// Why a plan could not be built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// The reasoning output could not be obtained or decoded into the plan shape.
    Parse(String),
    /// Decoded tasks violate plan invariants (ids, dependencies).
    Validation(Vec<String>),
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanError::Parse(msg) => write!(f, "plan parse failed: {msg}"),
            PlanError::Validation(errors) => {
                write!(f, "plan validation failed: {}", errors.join("; "))
            }
        }
    }
}

impl std::error::Error for PlanError {}

/// A dependency entry the decoder dropped, recorded for the conversation log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedDependency {
    pub task_id: u32,
    pub raw: String,
}

/// Decoded plan plus the dependency entries dropped during coercion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPlan {
    pub tasks: Vec<Task>,
    pub dropped: Vec<DroppedDependency>,
}

/// Decode a `{"tasks": [...]}` document into a validated plan.
pub fn decode_plan(value: &Value) -> Result<DecodedPlan, PlanError> {
    let raw_tasks = value
        .get("tasks")
        .and_then(Value::as_array)
        .ok_or_else(|| PlanError::Parse("missing 'tasks' array".to_string()))?;

    let mut tasks = Vec::with_capacity(raw_tasks.len());
    let mut dropped = Vec::new();
    for (index, raw) in raw_tasks.iter().enumerate() {
        tasks.push(decode_task(index, raw, &mut dropped)?);
    }

    let errors = validate_plan(&tasks);
    if !errors.is_empty() {
        return Err(PlanError::Validation(errors));
    }
    Ok(DecodedPlan { tasks, dropped })
}

fn decode_task(
    index: usize,
    raw: &Value,
    dropped: &mut Vec<DroppedDependency>,
) -> Result<Task, PlanError> {
    let id = raw
        .get("task_id")
        .and_then(Value::as_u64)
        .and_then(|id| u32::try_from(id).ok())
        .ok_or_else(|| PlanError::Parse(format!("task {index}: missing or invalid 'task_id'")))?;
    let description = raw
        .get("description")
        .and_then(Value::as_str)
        .ok_or_else(|| PlanError::Parse(format!("task {index}: missing 'description'")))?
        .to_string();
    let priority = raw
        .get("priority")
        .and_then(Value::as_u64)
        .ok_or_else(|| PlanError::Parse(format!("task {index}: missing 'priority'")))?;
    // Reasoners routinely overshoot the 1..=5 range; clamp instead of failing.
    let priority = priority.clamp(1, 5) as u32;

    let mut dependencies = BTreeSet::new();
    if let Some(deps) = raw.get("dependencies").and_then(Value::as_array) {
        for dep in deps {
            match coerce_dependency(dep) {
                Some(dep_id) => {
                    dependencies.insert(dep_id);
                }
                None => {
                    debug!(task_id = id, raw = %dep, "dropping unparseable dependency");
                    dropped.push(DroppedDependency {
                        task_id: id,
                        raw: dep.to_string(),
                    });
                }
            }
        }
    }

    Ok(Task {
        id,
        description,
        priority,
        dependencies,
    })
}

/// Coerce a loosely-typed dependency entry into a task id.
///
/// Integers pass through; strings like `"tasks.3"` or `"task 3"` reduce to
/// their digits. Anything else is unparseable and must be dropped (and logged)
/// by the caller.
pub fn coerce_dependency(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => {
            let digits: String = s.chars().filter(char::is_ascii_digit).collect();
            digits.parse().ok()
        }
        _ => None,
    }
}

/// Validate plan invariants: ids unique and positive, no self or dangling
/// dependencies. Returns all violations rather than stopping at the first.
pub fn validate_plan(tasks: &[Task]) -> Vec<String> {
    let mut errors = Vec::new();
    let ids: BTreeSet<u32> = tasks.iter().map(|t| t.id).collect();

    let mut seen = BTreeSet::new();
    for task in tasks {
        if task.id == 0 {
            errors.push(format!("task id must be >= 1, got {}", task.id));
        }
        if !seen.insert(task.id) {
            errors.push(format!("duplicate task id {}", task.id));
        }
        for dep in &task.dependencies {
            if *dep == task.id {
                errors.push(format!("task {} depends on itself", task.id));
            } else if !ids.contains(dep) {
                errors.push(format!("task {} depends on unknown task {dep}", task.id));
            }
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_coerces_string_dependencies() {
        let value = json!({
            "tasks": [
                {"task_id": 1, "description": "first", "priority": 3, "dependencies": []},
                {"task_id": 2, "description": "second", "priority": 9,
                 "dependencies": [1, "tasks.1", "task 1", {"bad": true}]}
            ]
        });

        let plan = decode_plan(&value).expect("decode");
        assert_eq!(plan.tasks.len(), 2);
        assert_eq!(plan.tasks[1].priority, 5);
        assert_eq!(
            plan.tasks[1].dependencies,
            BTreeSet::from([1]),
            "string forms of the same id collapse to one entry"
        );
        assert_eq!(plan.dropped.len(), 1);
        assert_eq!(plan.dropped[0].task_id, 2);
    }

    #[test]
    fn decode_rejects_missing_tasks_array() {
        let err = decode_plan(&json!({"plan": []})).unwrap_err();
        assert!(matches!(err, PlanError::Parse(_)));
    }

    #[test]
    fn decode_rejects_task_without_id() {
        let value = json!({"tasks": [{"description": "x", "priority": 1}]});
        let err = decode_plan(&value).unwrap_err();
        assert!(err.to_string().contains("task_id"));
    }

    #[test]
    fn validate_reports_all_violations() {
        let value = json!({
            "tasks": [
                {"task_id": 1, "description": "a", "priority": 1, "dependencies": [1]},
                {"task_id": 1, "description": "b", "priority": 1, "dependencies": [7]}
            ]
        });
        let err = decode_plan(&value).unwrap_err();
        let PlanError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert!(errors.iter().any(|e| e.contains("duplicate task id")));
        assert!(errors.iter().any(|e| e.contains("depends on itself")));
        assert!(errors.iter().any(|e| e.contains("unknown task")));
    }

    #[test]
    fn coerce_handles_each_shape() {
        assert_eq!(coerce_dependency(&json!(3)), Some(3));
        assert_eq!(coerce_dependency(&json!("tasks.12")), Some(12));
        assert_eq!(coerce_dependency(&json!("no digits")), None);
        assert_eq!(coerce_dependency(&json!(null)), None);
        assert_eq!(coerce_dependency(&json!(-1)), None);
    }
}
