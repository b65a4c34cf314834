//! Plan ingestion from the decomposition stage's JSON document.
//!
//! ```text
//! {"tasks": [{"task_id": 1, "main_table": "orders as o", "target": [...], ...}]}
//! ```

use std::fs;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use super::node::null_as_default;
use super::{Plan, Task, TaskId};

/// Errors raised while constructing a plan.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("Failed to read plan: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed plan document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Duplicate task id: {0}")]
    DuplicateTask(TaskId),

    #[error("Task {task} is not achievable: {reason}")]
    Unachievable { task: TaskId, reason: String },
}

pub type PlanResult<T> = Result<T, PlanError>;

#[derive(Deserialize)]
struct PlanDocument {
    #[serde(default, deserialize_with = "null_as_default")]
    tasks: Vec<Task>,
}

impl Plan {
    /// Parse a plan document.
    pub fn from_json(json: &str) -> PlanResult<Self> {
        let document: PlanDocument = serde_json::from_str(json)?;
        Plan::new(document.tasks)
    }

    pub fn from_reader<R: Read>(reader: R) -> PlanResult<Self> {
        let document: PlanDocument = serde_json::from_reader(reader)?;
        Plan::new(document.tasks)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> PlanResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Serialize back to the document shape accepted by [`Plan::from_json`].
    pub fn to_json(&self) -> PlanResult<String> {
        Ok(serde_json::to_string_pretty(&serde_json::json!({
            "tasks": self.tasks(),
        }))?)
    }
}
