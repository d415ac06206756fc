use axum::extract::FromRef;

use crate::blob_store::GuardedBlobStore;
use std::time::Instant;

use super::ServerConfig;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub store: GuardedBlobStore,
}

impl ServerState {
    pub fn new(config: ServerConfig, store: GuardedBlobStore) -> ServerState {
        ServerState {
            config,
            start_time: Instant::now(),
            store,
        }
    }
}

impl FromRef<ServerState> for GuardedBlobStore {
    fn from_ref(input: &ServerState) -> Self {
        input.store.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
