use crate::error::StoreError;
use crate::traits::{FieldMap, TaskStore};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Records {
    by_id: HashMap<String, FieldMap>,
    id_by_url: HashMap<String, String>,
}

/// Process-local task records keyed by a random id.
#[derive(Default)]
pub struct InMemoryTaskStore {
    records: RwLock<Records>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create(&self, url: &str) -> Result<String, StoreError> {
        let mut records = self.records.write().await;
        if let Some(existing) = records.id_by_url.get(url) {
            return Ok(existing.clone());
        }

        let id = Uuid::new_v4().to_string();
        let mut record = FieldMap::new();
        record.insert("websiteLink".to_string(), Value::String(url.to_string()));
        records.by_id.insert(id.clone(), record);
        records.id_by_url.insert(url.to_string(), id.clone());
        Ok(id)
    }

    async fn store(&self, id: &str, fields: FieldMap) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let record = records
            .by_id
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        record.extend(fields);
        record.insert(
            "updatedAt".to_string(),
            Value::String(Utc::now().to_rfc3339()),
        );
        Ok(())
    }

    async fn exists(&self, id: &str) -> bool {
        self.records.read().await.by_id.contains_key(id)
    }

    async fn read(&self, id: &str) -> Option<FieldMap> {
        self.records.read().await.by_id.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn create_is_idempotent_per_url() {
        let store = InMemoryTaskStore::new();
        let first = store.create("https://project.io").await.expect("create");
        let second = store.create("https://project.io").await.expect("create");
        let other = store.create("https://other.io").await.expect("create");

        assert_eq!(first, second);
        assert_ne!(first, other);
        assert!(store.exists(&first).await);
    }

    #[tokio::test]
    async fn store_merges_without_dropping_fields() {
        let store = InMemoryTaskStore::new();
        let id = store.create("https://project.io").await.expect("create");

        let mut first = FieldMap::new();
        first.insert("tokenName".to_string(), json!("Example"));
        store.store(&id, first).await.expect("store");

        let mut second = FieldMap::new();
        second.insert("gpt_score".to_string(), json!(7));
        store.store(&id, second).await.expect("store");

        let record = store.read(&id).await.expect("record exists");
        assert_eq!(record.get("tokenName"), Some(&json!("Example")));
        assert_eq!(record.get("gpt_score"), Some(&json!(7)));
        assert_eq!(record.get("websiteLink"), Some(&json!("https://project.io")));
        assert!(record.contains_key("updatedAt"));
    }

    #[tokio::test]
    async fn store_rejects_unknown_ids() {
        let store = InMemoryTaskStore::new();
        let result = store.store("missing", FieldMap::new()).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
        assert!(store.read("missing").await.is_none());
    }
}
