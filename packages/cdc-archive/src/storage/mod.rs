//! Object-store boundary of the archive.
//!
//! Both I/O calls are single atomic requests: a put either replaces the whole object or
//! leaves it untouched. Errors are returned to the caller as-is; nothing here retries.

mod memory;
mod s3_store;

pub use memory::{MemoryStore, StorageOp};
pub use s3_store::S3Store;

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Name of the bucket (or namespace) objects are written to.
    fn bucket(&self) -> &str;

    /// Create or overwrite the object at `key`.
    async fn put_object(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()>;

    /// Delete the object at `key`. Deleting a missing object is not an error.
    async fn delete_object(&self, key: &str) -> Result<()>;
}
