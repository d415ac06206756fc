//! Artifact fetcher.
//!
//! Streams remote tarballs into the blob store, one concurrent task per
//! version. A tarball already present under its derived key is fetched at
//! most once, ever: the existence check runs before any network request.

use super::keys;
use crate::blob_store::{GuardedBlobStore, StoreError};
use crate::feed::VersionDescriptor;
use crate::server::metrics;
use futures::StreamExt;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid tarball url: {0}")]
    InvalidTarballUrl(String),

    #[error("origin returned {status} for {url}")]
    BadStatus {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("store failed: {0}")]
    Store(#[from] StoreError),

    #[error("stream copy failed: {0}")]
    Copy(std::io::Error),
}

pub struct ArtifactFetcher {
    client: reqwest::Client,
    store: GuardedBlobStore,
}

impl ArtifactFetcher {
    pub fn new(store: GuardedBlobStore) -> Self {
        Self {
            // No request timeout: a stalled origin ties up its version's
            // task until the transport gives up on its own.
            client: reqwest::Client::new(),
            store,
        }
    }

    /// Fetch every version's tarball concurrently, returning the versions
    /// actually downloaded in this pass, in input order.
    ///
    /// A failure fetching one version never cancels or fails the others;
    /// failed and already-present versions are simply omitted from the
    /// result.
    pub async fn fetch_all(
        &self,
        package_name: &str,
        versions: &[VersionDescriptor],
    ) -> Vec<VersionDescriptor> {
        let tasks = versions.iter().map(|version| self.fetch_version(version));
        let results = futures::future::join_all(tasks).await;

        let mut downloaded = Vec::new();
        for (version, result) in versions.iter().zip(results) {
            match result {
                Ok(true) => {
                    metrics::TARBALLS_DOWNLOADED_TOTAL.inc();
                    downloaded.push(version.clone());
                }
                Ok(false) => {}
                Err(error) => {
                    metrics::DOWNLOAD_FAILURES_TOTAL.inc();
                    warn!(
                        "failed to download {} {}: {}",
                        package_name, version.version, error
                    );
                }
            }
        }
        downloaded
    }

    /// Returns `Ok(true)` when the tarball was downloaded in this pass,
    /// `Ok(false)` when there was nothing to do (no tarball reference, or
    /// the key already exists in the store).
    async fn fetch_version(&self, version: &VersionDescriptor) -> Result<bool, FetchError> {
        let Some(tarball) = version.tarball.as_deref() else {
            return Ok(false);
        };
        let key = keys::tarball_key(tarball)?;

        // An errored existence check counts as a fetch failure rather than
        // triggering a defensive download, which could double-write the key.
        if self.store.exists(&key).await? {
            debug!("{} already stored, skipping download", key);
            return Ok(false);
        }

        debug!("downloading {} to {}", tarball, key);
        let response = self.client.get(tarball).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::BadStatus {
                status: response.status(),
                url: tarball.to_string(),
            });
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(std::io::Error::other));
        let mut reader = StreamReader::new(body);
        let mut writer = self.store.write_stream(&key).await?;
        tokio::io::copy(&mut reader, &mut writer)
            .await
            .map_err(FetchError::Copy)?;
        writer.shutdown().await.map_err(FetchError::Copy)?;

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob_store::MemoryBlobStore;
    use std::sync::Arc;

    fn version(ver: &str, tarball: Option<&str>) -> VersionDescriptor {
        VersionDescriptor {
            version: ver.to_string(),
            tarball: tarball.map(str::to_string),
            shasum: None,
        }
    }

    #[tokio::test]
    async fn version_without_tarball_is_skipped_without_store_access() {
        let store = MemoryBlobStore::new();
        let fetcher = ArtifactFetcher::new(Arc::new(store.clone()));

        let downloaded = fetcher
            .fetch_all("bare", &[version("1.0.0", None)])
            .await;

        assert!(downloaded.is_empty());
        assert!(store.exists_checks().is_empty());
        assert!(store.write_keys().is_empty());
    }

    #[tokio::test]
    async fn existing_key_is_never_fetched_again() {
        let store = MemoryBlobStore::new();
        store.insert("/pkg/-/pkg-1.0.0.tgz", b"already here".to_vec());
        let fetcher = ArtifactFetcher::new(Arc::new(store.clone()));

        // The URL points nowhere; the existence check must short-circuit
        // before any request is issued.
        let downloaded = fetcher
            .fetch_all(
                "pkg",
                &[version("1.0.0", Some("http://127.0.0.1:1/pkg/-/pkg-1.0.0.tgz"))],
            )
            .await;

        assert!(downloaded.is_empty());
        assert_eq!(store.exists_checks(), vec!["/pkg/-/pkg-1.0.0.tgz"]);
        assert!(store.write_keys().is_empty());
    }

    #[tokio::test]
    async fn unreachable_origin_is_a_non_fatal_failure() {
        let store = MemoryBlobStore::new();
        let fetcher = ArtifactFetcher::new(Arc::new(store.clone()));

        let downloaded = fetcher
            .fetch_all(
                "pkg",
                &[version("1.0.0", Some("http://127.0.0.1:1/pkg/-/pkg-1.0.0.tgz"))],
            )
            .await;

        assert!(downloaded.is_empty());
        assert!(store.write_keys().is_empty());
    }
}
