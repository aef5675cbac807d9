use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use weft_core::error::{Result, WeftError};
use weft_core::traits::Memory;
use weft_core::types::{MemoryCategory, ToolContext};
use weft_tools::ToolRegistry;

use crate::plan::{Node, Plan};
use crate::resolver::resolve_input;

/// Result of executing a single node. Exactly one per node per run;
/// retries replace the attempt in place, they never append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeResult {
    pub node_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
}

/// Result of executing an entire plan.
///
/// Always complete: on partial failure every node still has an entry in
/// `results`, and callers inspect `results[].success` for per-step status.
/// `error` is set only when the run aborted at the executor level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanExecutionResult {
    pub plan_id: String,
    pub success: bool,
    pub results: Vec<NodeResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub total_duration_ms: u64,
}

/// Drives plan nodes through input resolution, dispatch, timeout, retry,
/// and result recording — strictly sequentially, one node fully terminal
/// (including its retries) before the next begins.
///
/// A node failure never aborts the plan: independent steps should not be
/// blocked by one failed step, so the executor records the failure and
/// moves on. Only executor-level faults (cancellation, a memory write
/// failure) end a run early, and even then the caller receives a
/// structured result carrying everything accumulated so far.
pub struct PlanExecutor {
    registry: Arc<ToolRegistry>,
    cancel: CancellationToken,
}

impl PlanExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            cancel: CancellationToken::new(),
        }
    }

    /// Get a cancellation token for this executor.
    ///
    /// Cancellation takes effect between nodes; an in-flight node runs to
    /// its own terminal state first.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run a plan to completion.
    ///
    /// Never returns an error to the caller: executor-level faults are
    /// folded into the result's `error` field.
    pub async fn run(&self, plan: &mut Plan, memory: Arc<dyn Memory>) -> PlanExecutionResult {
        let start = Instant::now();
        let mut results: Vec<NodeResult> = Vec::with_capacity(plan.nodes.len());
        let mut previous_results: HashMap<String, Value> = HashMap::new();

        info!(
            plan_id = %plan.id,
            nodes = plan.nodes.len(),
            goal = %plan.metadata.goal,
            "Starting plan run"
        );

        let outcome = self
            .run_nodes(plan, &memory, &mut results, &mut previous_results)
            .await;

        let total_duration_ms = start.elapsed().as_millis() as u64;
        match outcome {
            Ok(()) => {
                let success = results.iter().all(|r| r.success);
                let final_output = results.last().and_then(|r| r.output.clone());
                info!(plan_id = %plan.id, success, total_duration_ms, "Plan run complete");
                PlanExecutionResult {
                    plan_id: plan.id.clone(),
                    success,
                    results,
                    final_output,
                    error: None,
                    total_duration_ms,
                }
            }
            Err(e) => {
                error!(plan_id = %plan.id, error = %e, "Plan run aborted");
                PlanExecutionResult {
                    plan_id: plan.id.clone(),
                    success: false,
                    results,
                    final_output: None,
                    error: Some(e.to_string()),
                    total_duration_ms,
                }
            }
        }
    }

    async fn run_nodes(
        &self,
        plan: &mut Plan,
        memory: &Arc<dyn Memory>,
        results: &mut Vec<NodeResult>,
        previous_results: &mut HashMap<String, Value>,
    ) -> Result<()> {
        let plan_id = plan.id.clone();

        for node in &mut plan.nodes {
            if self.cancel.is_cancelled() {
                return Err(WeftError::Cancelled);
            }

            let mut result = self
                .attempt_node(&plan_id, node, memory, previous_results)
                .await;

            // Bounded retries, exhausting max_retries. Input is re-resolved
            // fresh on every attempt so a retry sees outputs recorded since
            // the original dispatch.
            while !result.success && node.retry_count < node.max_retries {
                node.retry_count += 1;
                warn!(
                    node_id = %node.id,
                    attempt = node.retry_count,
                    max_retries = node.max_retries,
                    error = result.error.as_deref().unwrap_or(""),
                    "Retrying failed node"
                );
                result = self
                    .attempt_node(&plan_id, node, memory, previous_results)
                    .await;
            }

            let succeeded = result.success;
            if succeeded {
                if let Some(output) = &result.output {
                    previous_results.insert(node.id.clone(), output.clone());
                }
            } else {
                error!(
                    node_id = %node.id,
                    tool = %node.tool,
                    error = result.error.as_deref().unwrap_or(""),
                    "Node failed permanently, continuing plan"
                );
            }

            // The node is terminal: record its result before any plan-level
            // bookkeeping, so an abort below still returns it.
            results.push(result);

            if succeeded {
                self.record_history(memory, node).await?;
            }
        }

        Ok(())
    }

    /// Execute one attempt of a node: resolve input, dispatch through the
    /// timeout race, and fold the outcome into a `NodeResult`.
    async fn attempt_node(
        &self,
        plan_id: &str,
        node: &Node,
        memory: &Arc<dyn Memory>,
        previous_results: &HashMap<String, Value>,
    ) -> NodeResult {
        let started_at = Utc::now();
        let start = Instant::now();

        let input = resolve_input(node, previous_results);
        debug!(node_id = %node.id, tool = %node.tool, "Dispatching node");

        let outcome = self
            .dispatch(plan_id, node, input, memory, previous_results)
            .await;

        let duration_ms = start.elapsed().as_millis() as u64;
        match outcome {
            Ok(output) => {
                debug!(node_id = %node.id, duration_ms, "Node succeeded");
                NodeResult {
                    node_id: node.id.clone(),
                    success: true,
                    output: Some(output),
                    error: None,
                    duration_ms,
                    started_at,
                }
            }
            Err(e) => NodeResult {
                node_id: node.id.clone(),
                success: false,
                output: None,
                error: Some(e.to_string()),
                duration_ms,
                started_at,
            },
        }
    }

    /// Race the tool invocation against the node's deadline.
    ///
    /// When the deadline fires the losing future is dropped, so the overrun
    /// tool call is cancelled at its next await point rather than left
    /// running unobserved. A missing tool fails here too and takes the same
    /// retry path as any other error.
    async fn dispatch(
        &self,
        plan_id: &str,
        node: &Node,
        input: Value,
        memory: &Arc<dyn Memory>,
        previous_results: &HashMap<String, Value>,
    ) -> Result<Value> {
        let tool = self
            .registry
            .get(&node.tool)
            .ok_or_else(|| WeftError::ToolNotFound(node.tool.clone()))?;

        let ctx = ToolContext {
            plan_id: plan_id.to_string(),
            node_id: node.id.clone(),
            previous_results: previous_results.clone(),
            memory: Arc::clone(memory),
        };

        let deadline = Duration::from_millis(node.timeout_ms);
        match tokio::time::timeout(deadline, tool.execute(input, ctx)).await {
            Ok(result) => result,
            Err(_) => Err(WeftError::Timeout {
                ms: node.timeout_ms,
            }),
        }
    }

    /// Append the successful node to the memory collaborator's task history.
    async fn record_history(&self, memory: &Arc<dyn Memory>, node: &Node) -> Result<()> {
        memory
            .remember(
                MemoryCategory::TaskHistory,
                &format!("node:{}", node.id),
                json!({
                    "tool": node.tool,
                    "success": true,
                    "timestamp": Utc::now().to_rfc3339(),
                }),
            )
            .await
    }
}

/// Run a plan against a registry with a one-off executor.
pub async fn run_plan(
    registry: Arc<ToolRegistry>,
    plan: &mut Plan,
    memory: Arc<dyn Memory>,
) -> PlanExecutionResult {
    PlanExecutor::new(registry).run(plan, memory).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_result_roundtrip_with_error() {
        let result = NodeResult {
            node_id: "n1".into(),
            success: false,
            output: None,
            error: Some("Tool not found: extract_table".into()),
            duration_ms: 3,
            started_at: Utc::now(),
        };

        let text = serde_json::to_string(&result).unwrap();
        assert!(!text.contains("\"output\""));
        let back: NodeResult = serde_json::from_str(&text).unwrap();
        assert!(!back.success);
        assert_eq!(back.error.as_deref(), Some("Tool not found: extract_table"));
        assert_eq!(back.output, None);
    }

    #[test]
    fn test_plan_result_roundtrip() {
        let result = PlanExecutionResult {
            plan_id: "plan-1".into(),
            success: true,
            results: vec![NodeResult {
                node_id: "a".into(),
                success: true,
                output: Some(json!({"x": 1})),
                error: None,
                duration_ms: 12,
                started_at: Utc::now(),
            }],
            final_output: Some(json!({"x": 1})),
            error: None,
            total_duration_ms: 12,
        };

        let text = serde_json::to_string(&result).unwrap();
        let back: PlanExecutionResult = serde_json::from_str(&text).unwrap();
        assert!(back.success);
        assert_eq!(back.results.len(), 1);
        assert_eq!(back.results[0].output, Some(json!({"x": 1})));
        assert_eq!(back.results[0].started_at, result.results[0].started_at);
        assert_eq!(back.final_output, Some(json!({"x": 1})));
        assert_eq!(back.error, None);
    }
}
