//! Change-feed follower.
//!
//! Polls the origin registry's CouchDB-style `_changes` endpoint, invokes
//! the registered handler once per change and advances the persisted cursor
//! only after the handler's `done` continuation has fired. Feed errors are
//! never fatal at runtime; the follower reconnects with exponential backoff.

use super::{ChangeHandler, ChangeRecord};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct FollowerSettings {
    /// Base URL of the origin registry database.
    pub feed_url: String,
    /// File the feed cursor is persisted to between runs.
    pub cursor_path: PathBuf,
    /// How long to wait before polling again when the feed is drained.
    pub poll_interval_secs: u64,
    /// Maximum number of changes requested per poll.
    pub batch_limit: u32,
    pub initial_backoff_secs: u64,
    pub max_backoff_secs: u64,
    pub backoff_multiplier: f64,
}

impl FollowerSettings {
    pub fn new(feed_url: impl Into<String>, cursor_path: impl Into<PathBuf>) -> Self {
        Self {
            feed_url: feed_url.into(),
            cursor_path: cursor_path.into(),
            poll_interval_secs: 30,
            batch_limit: 100,
            initial_backoff_secs: 5,
            max_backoff_secs: 600,
            backoff_multiplier: 2.0,
        }
    }
}

/// Exponential backoff between reconnect attempts.
#[derive(Debug)]
struct Backoff {
    initial_secs: u64,
    max_secs: u64,
    multiplier: f64,
    attempt: i32,
}

impl Backoff {
    fn new(settings: &FollowerSettings) -> Self {
        Self {
            initial_secs: settings.initial_backoff_secs,
            max_secs: settings.max_backoff_secs,
            multiplier: settings.backoff_multiplier,
            attempt: 0,
        }
    }

    fn next_delay(&mut self) -> Duration {
        let secs = self.initial_secs as f64 * self.multiplier.powi(self.attempt);
        self.attempt += 1;
        Duration::from_secs(secs.min(self.max_secs as f64) as u64)
    }

    fn reset(&mut self) {
        self.attempt = 0;
    }
}

#[derive(Debug, Deserialize)]
struct ChangesBatch {
    #[serde(default)]
    results: Vec<ChangeRow>,
    last_seq: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChangeRow {
    seq: Option<serde_json::Value>,
    doc: Option<serde_json::Value>,
}

pub struct Follower {
    settings: FollowerSettings,
    client: reqwest::Client,
}

impl Follower {
    /// Build a follower. An unparsable feed URL is a startup error, outside
    /// the per-event error model.
    pub fn new(settings: FollowerSettings) -> Result<Self> {
        reqwest::Url::parse(&settings.feed_url)
            .with_context(|| format!("invalid feed url: {}", settings.feed_url))?;
        Ok(Self {
            settings,
            client: reqwest::Client::new(),
        })
    }

    /// Follow the feed forever, delivering each change to `handler`.
    pub async fn run(&self, handler: Arc<dyn ChangeHandler>) -> Result<()> {
        let mut seq = self.load_cursor().await;
        let mut backoff = Backoff::new(&self.settings);
        info!(
            "following changes of {} from seq {}",
            self.settings.feed_url, seq
        );

        loop {
            match self.poll_batch(seq).await {
                Ok(batch) => {
                    backoff.reset();
                    let drained = batch.results.is_empty();
                    seq = self.deliver_batch(batch, seq, &handler).await;
                    self.store_cursor(seq).await;
                    if drained {
                        tokio::time::sleep(Duration::from_secs(
                            self.settings.poll_interval_secs,
                        ))
                        .await;
                    }
                }
                Err(error) => {
                    let delay = backoff.next_delay();
                    warn!(
                        "change feed poll failed ({error:#}), retrying in {}s",
                        delay.as_secs()
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn poll_batch(&self, since: u64) -> Result<ChangesBatch> {
        let url = format!(
            "{}/_changes?since={}&include_docs=true&limit={}",
            self.settings.feed_url.trim_end_matches('/'),
            since,
            self.settings.batch_limit
        );
        debug!("polling {}", url);
        let response = self.client.get(&url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }

    /// Invoke the handler per change, awaiting each `done` before moving on.
    /// Returns the sequence number the cursor should advance to.
    async fn deliver_batch(
        &self,
        batch: ChangesBatch,
        mut seq: u64,
        handler: &Arc<dyn ChangeHandler>,
    ) -> u64 {
        for row in batch.results {
            let row_seq = row.seq.as_ref().and_then(seq_number);
            let record = ChangeRecord {
                seq: row_seq,
                json: row.doc.unwrap_or(serde_json::Value::Null),
            };

            let (tx, rx) = oneshot::channel();
            let done: super::Done = Box::new(move || {
                let _ = tx.send(());
            });
            handler.handle(record, done).await;
            let _ = rx.await;

            if let Some(row_seq) = row_seq {
                seq = row_seq;
            }
        }
        if let Some(last) = batch.last_seq.as_ref().and_then(seq_number) {
            seq = last;
        }
        seq
    }

    async fn load_cursor(&self) -> u64 {
        match tokio::fs::read_to_string(&self.settings.cursor_path).await {
            Ok(content) => content.trim().parse().unwrap_or(0),
            Err(_) => 0,
        }
    }

    async fn store_cursor(&self, seq: u64) {
        if let Err(error) =
            tokio::fs::write(&self.settings.cursor_path, seq.to_string()).await
        {
            warn!(
                "failed to persist feed cursor to {:?}: {}",
                self.settings.cursor_path, error
            );
        }
    }
}

/// CouchDB emits sequence values either as plain numbers or as
/// `"<number>-<opaque>"` strings.
fn seq_number(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.split('-').next()?.parse().ok(),
        _ => None,
    }
}
