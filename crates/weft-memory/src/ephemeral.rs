use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;

use weft_core::error::Result;
use weft_core::traits::Memory;
use weft_core::types::MemoryCategory;

/// One entry in the append-only event log.
#[derive(Debug, Clone)]
pub struct MemoryEvent {
    pub category: MemoryCategory,
    pub key: String,
    pub value: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Process-local memory backed by plain maps.
///
/// The default collaborator for ephemeral runs and the test double used
/// throughout the executor's test suite. Nothing survives the process.
#[derive(Default)]
pub struct InMemoryStore {
    kv: Mutex<HashMap<String, serde_json::Value>>,
    events: Mutex<Vec<MemoryEvent>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the event log, oldest first.
    pub fn events(&self) -> Vec<MemoryEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Events in one category, oldest first.
    pub fn events_in(&self, category: MemoryCategory) -> Vec<MemoryEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.category == category)
            .collect()
    }
}

impl Memory for InMemoryStore {
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<serde_json::Value>>> {
        let value = self
            .kv
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned();
        Box::pin(async move { Ok(value) })
    }

    fn set(&self, key: &str, value: serde_json::Value) -> BoxFuture<'_, Result<()>> {
        self.kv
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value);
        Box::pin(async move { Ok(()) })
    }

    fn remember(
        &self,
        category: MemoryCategory,
        key: &str,
        value: serde_json::Value,
    ) -> BoxFuture<'_, Result<()>> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(MemoryEvent {
                category,
                key: key.to_string(),
                value,
                timestamp: Utc::now(),
            });
        Box::pin(async move { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_kv_roundtrip() {
        let store = InMemoryStore::new();
        assert_eq!(store.get("missing").await.unwrap(), None);

        store.set("lang", json!("rust")).await.unwrap();
        assert_eq!(store.get("lang").await.unwrap(), Some(json!("rust")));

        store.set("lang", json!("still rust")).await.unwrap();
        assert_eq!(store.get("lang").await.unwrap(), Some(json!("still rust")));
    }

    #[tokio::test]
    async fn test_event_log_order_and_filter() {
        let store = InMemoryStore::new();
        store
            .remember(MemoryCategory::Fact, "a", json!(1))
            .await
            .unwrap();
        store
            .remember(MemoryCategory::TaskHistory, "b", json!(2))
            .await
            .unwrap();
        store
            .remember(MemoryCategory::TaskHistory, "c", json!(3))
            .await
            .unwrap();

        assert_eq!(store.events().len(), 3);
        let history = store.events_in(MemoryCategory::TaskHistory);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].key, "b");
        assert_eq!(history[1].key, "c");
    }
}
