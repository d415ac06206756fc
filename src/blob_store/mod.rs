//! BlobStore trait definition.
//!
//! This trait abstracts the content store so the mirror engine can work with
//! a local filesystem store, an in-memory store or any other key-addressed
//! blob backend transparently. Keys are path-like strings such as
//! `/<package-name>/index.json`.

mod fs_store;
mod memory_store;

pub use fs_store::FsBlobStore;
pub use memory_store::MemoryBlobStore;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

pub type GuardedBlobStore = Arc<dyn BlobStore>;

pub type BlobReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BlobWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Errors surfaced by blob store implementations.
///
/// Transport-style failures get their own variants because the HTTP read
/// path maps them to distinct status codes; everything else is either a
/// missing key or an opaque IO error.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key not found: {0}")]
    NotFound(String),

    #[error("connection refused")]
    ConnectionRefused,

    #[error("connection reset")]
    ConnectionReset,

    #[error("store io error: {0}")]
    Io(std::io::Error),
}

impl From<std::io::Error> for StoreError {
    fn from(error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::ConnectionRefused => StoreError::ConnectionRefused,
            std::io::ErrorKind::ConnectionReset => StoreError::ConnectionReset,
            _ => StoreError::Io(error),
        }
    }
}

/// Trait for key-addressed blob storage backends.
///
/// Shared across all concurrent processing passes without locking; backends
/// must be safe for concurrent access to independent keys. Concurrent writes
/// to the same key are not coordinated, the backend's own write semantics
/// (typically last-write-wins) apply.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Check whether a blob exists under the given key.
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Open a streamed read of the blob stored under `key`.
    async fn read_stream(&self, key: &str) -> Result<BlobReader, StoreError>;

    /// Open a streamed write to `key`. The blob becomes visible to readers
    /// once the writer has been shut down.
    async fn write_stream(&self, key: &str) -> Result<BlobWriter, StoreError>;
}
