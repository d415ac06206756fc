//! Registry Mirror Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod blob_store;
pub mod config;
pub mod feed;
pub mod mirror;
pub mod server;

// Re-export commonly used types for convenience
pub use blob_store::{BlobStore, FsBlobStore, GuardedBlobStore, MemoryBlobStore, StoreError};
pub use config::{AppConfig, MirrorSettings};
pub use feed::{ChangeHandler, ChangeRecord, Done, Follower, VersionDescriptor};
pub use mirror::{Cloner, ProcessedEvent};
pub use server::{make_app, run_server, RequestsLoggingLevel, ServerConfig};
