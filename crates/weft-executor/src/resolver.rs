//! Node input resolution.
//!
//! A node's effective input is its static `input` map with the outputs of
//! its `input_from` predecessors layered on top. The merge is deliberately
//! permissive — the `MergeMissingAsSkip` policy: a source whose output is
//! absent from `previous_results` (not yet run, failed, or unknown id) is
//! skipped without error, so best-effort upstream steps never block a
//! downstream node from running with whatever data did arrive.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::plan::Node;

/// Resolve a node's input against the outputs recorded so far.
///
/// Merge rules, in `input_from` order (later sources win on collision):
/// - object output: fields shallow-merged over the static input;
/// - any other output (string, number, bool, null, array): inserted under
///   a key equal to the source node's id.
pub fn resolve_input(node: &Node, previous_results: &HashMap<String, Value>) -> Value {
    if node.input_from.is_empty() {
        return Value::Object(node.input.clone());
    }

    let mut merged = node.input.clone();
    for source_id in &node.input_from {
        let Some(output) = previous_results.get(source_id) else {
            debug!(node_id = %node.id, source = %source_id, "Input source absent, skipped");
            continue;
        };

        match output {
            Value::Object(fields) => {
                for (key, value) in fields {
                    merged.insert(key.clone(), value.clone());
                }
            }
            other => {
                merged.insert(source_id.clone(), other.clone());
            }
        }
    }

    Value::Object(merged)
}
