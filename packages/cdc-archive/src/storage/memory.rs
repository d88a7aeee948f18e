use super::ObjectStore;
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Record of a storage call, for assertions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageOp {
    Put { key: String, body: Vec<u8>, content_type: String },
    Delete { key: String },
}

impl StorageOp {
    pub fn key(&self) -> &str {
        match self {
            StorageOp::Put { key, .. } | StorageOp::Delete { key } => key,
        }
    }
}

/// In-memory object store that records every call.
///
/// Clones share the same contents, so a test can keep one handle and give another to the
/// transform. Failures can be injected per key prefix.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    bucket: String,
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    operations: Arc<Mutex<Vec<StorageOp>>>,
    fail_prefixes: Arc<Mutex<Vec<String>>>,
}

impl MemoryStore {
    pub fn new(bucket: impl Into<String>) -> Result<Self> {
        let bucket = bucket.into();
        if bucket.trim().is_empty() {
            bail!("archive bucket name must not be empty");
        }
        Ok(Self {
            bucket,
            ..Self::default()
        })
    }

    /// Every subsequent put/delete on a key starting with `prefix` fails.
    pub async fn inject_failure(&self, prefix: impl Into<String>) {
        self.fail_prefixes.lock().await.push(prefix.into());
    }

    pub async fn clear_failures(&self) {
        self.fail_prefixes.lock().await.clear();
    }

    /// All calls made so far, including failed ones.
    pub async fn operations(&self) -> Vec<StorageOp> {
        self.operations.lock().await.clone()
    }

    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().await.get(key).cloned()
    }

    pub async fn get_json(&self, key: &str) -> Option<serde_json::Value> {
        let body = self.get(key).await?;
        serde_json::from_slice(&body).ok()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub async fn len(&self) -> usize {
        self.objects.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.lock().await.is_empty()
    }

    async fn check_failure(&self, key: &str) -> Result<()> {
        let prefixes = self.fail_prefixes.lock().await;
        if let Some(prefix) = prefixes.iter().find(|p| key.starts_with(p.as_str())) {
            bail!("injected failure for {}/{} (prefix {:?})", self.bucket, key, prefix);
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put_object(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()> {
        self.operations.lock().await.push(StorageOp::Put {
            key: key.to_string(),
            body: body.clone(),
            content_type: content_type.to_string(),
        });
        self.check_failure(key).await?;

        self.objects.lock().await.insert(key.to_string(), body);
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.operations.lock().await.push(StorageOp::Delete {
            key: key.to_string(),
        });
        self.check_failure(key).await?;

        self.objects.lock().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_bucket_rejected() {
        assert!(MemoryStore::new("").is_err());
        assert!(MemoryStore::new("archive").is_ok());
    }

    #[tokio::test]
    async fn test_put_overwrites_and_delete_is_idempotent() {
        let store = MemoryStore::new("archive").unwrap();

        store.put_object("a/b.json", b"1".to_vec(), "application/json").await.unwrap();
        store.put_object("a/b.json", b"2".to_vec(), "application/json").await.unwrap();
        assert_eq!(store.len().await, 1);
        assert_eq!(store.get("a/b.json").await.as_deref(), Some(&b"2"[..]));

        store.delete_object("a/b.json").await.unwrap();
        store.delete_object("a/b.json").await.unwrap();
        assert!(store.is_empty().await);
        assert_eq!(store.operations().await.len(), 4);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let store = MemoryStore::new("archive").unwrap();
        store.inject_failure("users/").await;

        assert!(store.put_object("users/x.json", vec![], "application/json").await.is_err());
        assert!(store.delete_object("users/x.json").await.is_err());
        assert!(store.put_object("blog/x.json", vec![], "application/json").await.is_ok());

        store.clear_failures().await;
        assert!(store.put_object("users/x.json", vec![], "application/json").await.is_ok());
        assert_eq!(store.keys().await, vec!["blog/x.json", "users/x.json"]);
    }
}
