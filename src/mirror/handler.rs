//! Change handler.
//!
//! Invoked once per incoming change-feed record. Validates the record,
//! persists the manifest, delegates artifact acquisition to the fetcher and
//! emits the per-package `processed` event.

use super::fetcher::ArtifactFetcher;
use super::{keys, ProcessedEvent};
use crate::blob_store::GuardedBlobStore;
use crate::feed::{ChangeHandler, ChangeRecord, Done};
use crate::server::metrics;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use tokio::sync::broadcast;

pub struct MirrorChangeHandler {
    eager_download: bool,
    store: GuardedBlobStore,
    fetcher: ArtifactFetcher,
    events: broadcast::Sender<ProcessedEvent>,
}

#[async_trait]
impl ChangeHandler for MirrorChangeHandler {
    async fn handle(&self, record: ChangeRecord, done: Done) {
        match self.process(record).await {
            Ok(Some(event)) => {
                metrics::PACKAGES_PROCESSED_TOTAL.inc();
                // Nobody listening is fine; the event is an observation
                // channel, not part of the persistence contract.
                let _ = self.events.send(event);
            }
            Ok(None) => {}
            Err(error) => {
                warn!("failed to process change record: {error:#}");
            }
        }
        // The cursor advances on every path, an unprocessable record must
        // never stall the feed.
        done();
    }
}

impl MirrorChangeHandler {
    pub fn new(
        eager_download: bool,
        store: GuardedBlobStore,
        events: broadcast::Sender<ProcessedEvent>,
    ) -> Self {
        Self {
            eager_download,
            fetcher: ArtifactFetcher::new(store.clone()),
            store,
            events,
        }
    }

    /// Returns `Ok(None)` for records absorbed as no-ops (missing name or
    /// versions). A manifest that cannot be persisted is an error: the pass
    /// must not produce a false-positive `processed` event.
    async fn process(&self, record: ChangeRecord) -> Result<Option<ProcessedEvent>> {
        let Some(name) = record.package_name().map(str::to_string) else {
            debug!("change record without a package name, skipping");
            return Ok(None);
        };
        let Some(versions) = record.versions() else {
            debug!("change record for {} without versions, skipping", name);
            return Ok(None);
        };

        // The manifest is written whether or not eager download is enabled,
        // so metadata is available to readers even when tarballs are
        // fetched lazily on first request.
        self.write_manifest(&name, &record.json)
            .await
            .with_context(|| format!("persisting manifest of {}", name))?;

        let downloaded = if self.eager_download {
            self.fetcher.fetch_all(&name, &versions).await
        } else {
            Vec::new()
        };

        debug!(
            "processed {}: {} of {} versions downloaded",
            name,
            downloaded.len(),
            versions.len()
        );
        Ok(Some(ProcessedEvent {
            json: record.json,
            downloaded,
        }))
    }

    async fn write_manifest(&self, name: &str, json: &serde_json::Value) -> Result<()> {
        let key = keys::manifest_key(name);
        let body = serde_json::to_vec(json)?;
        let mut writer = self.store.write_stream(&key).await?;
        writer.write_all(&body).await?;
        writer.shutdown().await?;
        Ok(())
    }
}
