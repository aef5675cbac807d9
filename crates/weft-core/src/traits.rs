use futures::future::BoxFuture;

use crate::error::Result;
use crate::types::{MemoryCategory, ToolContext};

/// Tool — a named async capability invoked by plan nodes.
pub trait Tool: Send + Sync + 'static {
    /// Tool name (used by nodes to reference this tool).
    fn name(&self) -> &str;

    /// Execute the tool with resolved input and run context.
    ///
    /// An `Err`'s display string is captured verbatim as the node's error.
    fn execute(
        &self,
        input: serde_json::Value,
        ctx: ToolContext,
    ) -> BoxFuture<'_, Result<serde_json::Value>>;
}

/// Memory — key/value store plus categorized event log, injected into
/// every tool call and written to by the executor after successful nodes.
pub trait Memory: Send + Sync + 'static {
    /// Look up a value by key.
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<serde_json::Value>>>;

    /// Store a value under a key, replacing any prior value.
    fn set(&self, key: &str, value: serde_json::Value) -> BoxFuture<'_, Result<()>>;

    /// Append a categorized entry to the long-term log.
    fn remember(
        &self,
        category: MemoryCategory,
        key: &str,
        value: serde_json::Value,
    ) -> BoxFuture<'_, Result<()>>;
}
