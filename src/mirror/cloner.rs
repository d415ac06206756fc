//! Synchronization engine.
//!
//! A `Cloner` owns the change handler and the `processed` event channel for
//! one mirror. Instances are fully self-contained; multiple independent
//! cloners can coexist in one process, each with its own policy and store.

use super::handler::MirrorChangeHandler;
use crate::blob_store::GuardedBlobStore;
use crate::config::MirrorSettings;
use crate::feed::{ChangeHandler, VersionDescriptor};
use std::sync::Arc;
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Emitted once per successfully handled change record, after the manifest
/// has been durably written and every fetch attempt of the pass has settled.
#[derive(Debug, Clone)]
pub struct ProcessedEvent {
    /// The package manifest as it was written to the store.
    pub json: serde_json::Value,
    /// The versions downloaded in this pass, in manifest order. Empty when
    /// eager download is disabled or nothing new was fetched.
    pub downloaded: Vec<VersionDescriptor>,
}

pub struct Cloner {
    handler: Arc<MirrorChangeHandler>,
    events: broadcast::Sender<ProcessedEvent>,
}

impl Cloner {
    pub fn new(settings: MirrorSettings, store: GuardedBlobStore) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let handler = Arc::new(MirrorChangeHandler::new(
            settings.eager_download,
            store,
            events.clone(),
        ));
        Self { handler, events }
    }

    /// The handler to register with a change-feed follower.
    pub fn handler(&self) -> Arc<dyn ChangeHandler> {
        self.handler.clone()
    }

    /// Subscribe to `processed` events. Subscribers that lag behind the
    /// channel capacity miss events; the store, not the channel, is the
    /// source of truth.
    pub fn subscribe(&self) -> broadcast::Receiver<ProcessedEvent> {
        self.events.subscribe()
    }
}
