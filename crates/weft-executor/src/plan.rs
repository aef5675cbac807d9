use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Caller-supplied specification for one node.
///
/// Optional fields are filled with defaults at plan-build time. An omitted
/// `id` gets a generated one; ids must be unique within a plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeSpec {
    pub tool: String,
    #[serde(default)]
    pub input: Map<String, Value>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub input_from: Vec<String>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl NodeSpec {
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the static input map.
    pub fn with_input(mut self, input: Map<String, Value>) -> Self {
        self.input = input;
        self
    }

    /// Add one static input field.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.input.insert(key.into(), value);
        self
    }

    /// Declare predecessor nodes whose outputs feed this node's input.
    pub fn with_input_from(mut self, ids: Vec<String>) -> Self {
        self.input_from = ids;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// One step in a plan: a named tool call with optional dependencies on
/// prior nodes' outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub tool: String,
    #[serde(default)]
    pub input: Map<String, Value>,
    #[serde(default)]
    pub input_from: Vec<String>,
    /// The only field mutated during a run.
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

/// Metadata captured at plan-build time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanMetadata {
    pub goal: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An ordered, pre-built list of tool-invocation nodes plus metadata.
///
/// Immutable after construction except for node-level `retry_count`
/// bookkeeping during a run. `input_from` references are not validated
/// here; unknown or not-yet-run sources are skipped at resolution time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub nodes: Vec<Node>,
    pub metadata: PlanMetadata,
}

impl Plan {
    /// Build a plan from node specs, assigning a fresh plan id, generating
    /// missing node ids, and filling defaults.
    pub fn create(goal: impl Into<String>, specs: Vec<NodeSpec>) -> Self {
        let id = format!(
            "plan-{}-{:08x}",
            Utc::now().timestamp_millis(),
            rand::random::<u32>()
        );

        let nodes = specs
            .into_iter()
            .enumerate()
            .map(|(index, spec)| Node {
                id: spec
                    .id
                    .unwrap_or_else(|| format!("node-{}-{:04x}", index, rand::random::<u16>())),
                tool: spec.tool,
                input: spec.input,
                input_from: spec.input_from,
                retry_count: 0,
                max_retries: spec.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
                timeout_ms: spec.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS),
            })
            .collect();

        Self {
            id,
            nodes,
            metadata: PlanMetadata {
                goal: goal.into(),
                user_id: None,
                created_at: Utc::now(),
            },
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.metadata.user_id = Some(user_id.into());
        self
    }
}

/// Build a plan from node specs. See [`Plan::create`].
pub fn create_plan(goal: impl Into<String>, specs: Vec<NodeSpec>) -> Plan {
    Plan::create(goal, specs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_filled() {
        let plan = create_plan("summarize the page", vec![NodeSpec::new("extract_table")]);

        assert!(plan.id.starts_with("plan-"));
        assert_eq!(plan.nodes.len(), 1);
        let node = &plan.nodes[0];
        assert!(node.id.starts_with("node-0-"));
        assert_eq!(node.retry_count, 0);
        assert_eq!(node.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(node.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert_eq!(plan.metadata.goal, "summarize the page");
        assert!(plan.metadata.user_id.is_none());
    }

    #[test]
    fn test_explicit_fields_kept() {
        let spec = NodeSpec::new("search")
            .with_id("a")
            .with_field("query", json!("rust"))
            .with_input_from(vec!["warmup".into()])
            .with_max_retries(1)
            .with_timeout_ms(500);
        let plan = create_plan("find docs", vec![spec]).with_user("u-42");

        let node = &plan.nodes[0];
        assert_eq!(node.id, "a");
        assert_eq!(node.input.get("query"), Some(&json!("rust")));
        assert_eq!(node.input_from, vec!["warmup"]);
        assert_eq!(node.max_retries, 1);
        assert_eq!(node.timeout_ms, 500);
        assert_eq!(plan.metadata.user_id.as_deref(), Some("u-42"));
    }

    #[test]
    fn test_unknown_input_from_not_rejected() {
        // References are resolved lazily at run time; construction accepts
        // anything, including forward and dangling ids.
        let plan = create_plan(
            "best effort",
            vec![NodeSpec::new("t").with_input_from(vec!["nope".into(), "later".into()])],
        );
        assert_eq!(plan.nodes[0].input_from.len(), 2);
    }

    #[test]
    fn test_plan_ids_distinct() {
        let a = create_plan("g", vec![]);
        let b = create_plan("g", vec![]);
        assert_ne!(a.id, b.id);
    }
}
