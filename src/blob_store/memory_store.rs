//! In-memory blob store.
//!
//! Used by tests and ephemeral mirrors. Records every existence check and
//! every opened write stream so tests can assert on the dedup behavior of
//! the engine without reaching into its internals.

use super::{BlobReader, BlobStore, BlobWriter, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::AsyncWrite;

#[derive(Default)]
struct Inner {
    blobs: HashMap<String, Vec<u8>>,
    exists_checks: Vec<String>,
    write_keys: Vec<String>,
}

#[derive(Default, Clone)]
pub struct MemoryBlobStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a blob directly, bypassing the streamed write path.
    pub fn insert(&self, key: &str, content: impl Into<Vec<u8>>) {
        let mut inner = self.inner.lock().unwrap();
        inner.blobs.insert(key.to_string(), content.into());
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.lock().unwrap().blobs.get(key).cloned()
    }

    /// Keys that were passed to `exists` since construction or the last
    /// `reset_history` call.
    pub fn exists_checks(&self) -> Vec<String> {
        self.inner.lock().unwrap().exists_checks.clone()
    }

    /// Keys for which a write stream was opened.
    pub fn write_keys(&self) -> Vec<String> {
        self.inner.lock().unwrap().write_keys.clone()
    }

    /// Forget recorded calls, keeping stored blobs.
    pub fn reset_history(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.exists_checks.clear();
        inner.write_keys.clear();
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.exists_checks.push(key.to_string());
        Ok(inner.blobs.contains_key(key))
    }

    async fn read_stream(&self, key: &str) -> Result<BlobReader, StoreError> {
        let inner = self.inner.lock().unwrap();
        match inner.blobs.get(key) {
            Some(content) => Ok(Box::new(std::io::Cursor::new(content.clone()))),
            None => Err(StoreError::NotFound(key.to_string())),
        }
    }

    async fn write_stream(&self, key: &str) -> Result<BlobWriter, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.write_keys.push(key.to_string());
        Ok(Box::new(MemoryBlobWriter {
            key: key.to_string(),
            buf: Vec::new(),
            store: self.inner.clone(),
        }))
    }
}

/// Writer that commits its buffer to the store map on shutdown.
struct MemoryBlobWriter {
    key: String,
    buf: Vec<u8>,
    store: Arc<Mutex<Inner>>,
}

impl AsyncWrite for MemoryBlobWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        self.buf.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        let content = std::mem::take(&mut self.buf);
        let key = self.key.clone();
        self.store.lock().unwrap().blobs.insert(key, content);
        Poll::Ready(Ok(()))
    }
}
