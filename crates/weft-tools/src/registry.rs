use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use weft_core::traits::Tool;

/// Registry of available tools.
///
/// Long-lived and read-mostly: register everything at startup, then share
/// the registry by `Arc` with any number of executors. Registration is
/// last-writer-wins; re-registering a name replaces the prior handler.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool under its own name, replacing any prior registration.
    pub fn register(&mut self, tool: impl Tool) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), Arc::new(tool)).is_some() {
            debug!(tool = %name, "Replaced existing tool registration");
        }
    }

    /// Unregister a tool by name.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.tools.remove(name).is_some()
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// List all registered tool names.
    pub fn list(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
