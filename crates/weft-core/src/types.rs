use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Category of a long-term memory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryCategory {
    Preference,
    Fact,
    TaskHistory,
}

impl MemoryCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryCategory::Preference => "preference",
            MemoryCategory::Fact => "fact",
            MemoryCategory::TaskHistory => "task_history",
        }
    }
}

impl std::fmt::Display for MemoryCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Context passed to tools during execution.
///
/// `previous_results` is a snapshot of completed node outputs taken at
/// dispatch time; mutations made by the tool are not visible to the run.
#[derive(Clone)]
pub struct ToolContext {
    pub plan_id: String,
    pub node_id: String,
    pub previous_results: HashMap<String, serde_json::Value>,
    pub memory: Arc<dyn crate::traits::Memory>,
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("plan_id", &self.plan_id)
            .field("node_id", &self.node_id)
            .field("previous_results", &self.previous_results.len())
            .finish()
    }
}
