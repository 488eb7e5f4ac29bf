//! # Object Storage
//!
//! Long-running recognition jobs read their audio from a bucket, not from the
//! request body. The gateway only needs one capability from storage: put a
//! blob under a name and get back the URI the speech provider understands.

pub mod gcs;

pub use gcs::GcsObjectStore;

use async_trait::async_trait;

use crate::error::GatewayResult;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` as `bucket/object`, replacing any existing object of that
    /// name, and return its `gs://` URI.
    async fn put(&self, bucket: &str, object: &str, bytes: Vec<u8>) -> GatewayResult<String>;
}
