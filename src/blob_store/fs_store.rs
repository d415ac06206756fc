//! Filesystem-backed blob store.
//!
//! Keys map to files under a root directory. Writes go to a temporary file
//! first and are renamed into place on shutdown, so readers never observe a
//! partially written blob.

use super::{BlobReader, BlobStore, BlobWriter, StoreError};
use async_trait::async_trait;
use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::fs::File;
use tokio::io::AsyncWrite;
use tracing::debug;

pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a store key to a path under the root directory.
    ///
    /// Rejects keys with parent-directory components so a hostile tarball
    /// URL cannot escape the store root.
    fn resolve(&self, key: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(key.trim_start_matches('/'));
        for component in relative.components() {
            match component {
                Component::Normal(_) => {}
                _ => {
                    return Err(StoreError::NotFound(key.to_string()));
                }
            }
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.resolve(key)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }

    async fn read_stream(&self, key: &str) -> Result<BlobReader, StoreError> {
        let path = self.resolve(key)?;
        match File::open(&path).await {
            Ok(file) => Ok(Box::new(file)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(key.to_string()))
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn write_stream(&self, key: &str) -> Result<BlobWriter, StoreError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut staging = path.clone().into_os_string();
        staging.push(".part");
        let staging = PathBuf::from(staging);
        debug!("opening write stream for {} at {:?}", key, staging);
        let file = File::create(&staging).await?;
        Ok(Box::new(FsBlobWriter {
            file: Some(file),
            staging,
            target: path,
            rename: None,
        }))
    }
}

/// Writer that renames the staging file onto the target during shutdown.
struct FsBlobWriter {
    file: Option<File>,
    staging: PathBuf,
    target: PathBuf,
    rename: Option<Pin<Box<dyn std::future::Future<Output = std::io::Result<()>> + Send>>>,
}

impl AsyncWrite for FsBlobWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.file.as_mut() {
            Some(file) => Pin::new(file).poll_write(cx, buf),
            None => Poll::Ready(Err(std::io::Error::other("write after shutdown"))),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.file.as_mut() {
            Some(file) => Pin::new(file).poll_flush(cx),
            None => Poll::Ready(Ok(())),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        if let Some(file) = self.file.as_mut() {
            match Pin::new(file).poll_shutdown(cx) {
                Poll::Ready(Ok(())) => {
                    self.file = None;
                    let staging = self.staging.clone();
                    let target = self.target.clone();
                    self.rename = Some(Box::pin(tokio::fs::rename(staging, target)));
                }
                other => return other,
            }
        }
        match self.rename.as_mut() {
            Some(rename) => rename.as_mut().poll(cx),
            None => Poll::Ready(Ok(())),
        }
    }
}
