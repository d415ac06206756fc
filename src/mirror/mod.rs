//! The mirror core: change handling, artifact fetching and the cloner that
//! ties them to a `processed` event stream.

mod cloner;
mod fetcher;
mod handler;
pub mod keys;

pub use cloner::{Cloner, ProcessedEvent};
pub use fetcher::{ArtifactFetcher, FetchError};
