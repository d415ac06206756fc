//! Manifest read path.
//!
//! Streams a stored manifest back to the client. Store errors never leak:
//! they are mapped to plain status codes (504 for a refused connection to
//! the store backend, 500 for a reset so clients know to retry, 404 for
//! everything else).

use crate::blob_store::{GuardedBlobStore, StoreError};
use crate::mirror::keys::INDEX_JSON;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use futures::{stream, StreamExt};
use tokio_util::io::ReaderStream;
use tracing::debug;

/// Derive the manifest store key for a request path, appending
/// `/index.json` when the path does not already end with it.
fn manifest_key_for_path(path: &str) -> String {
    let key = format!("/{}", path.trim_matches('/'));
    if key.ends_with(INDEX_JSON) {
        key
    } else {
        format!("{}/{}", key, INDEX_JSON)
    }
}

fn status_for_store_error(error: &StoreError) -> StatusCode {
    match error {
        StoreError::ConnectionRefused => StatusCode::GATEWAY_TIMEOUT,
        // Triggers a retry from the npm client
        StoreError::ConnectionReset => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::NOT_FOUND,
    }
}

pub async fn get_manifest(
    State(store): State<GuardedBlobStore>,
    Path(path): Path<String>,
) -> Response {
    let key = manifest_key_for_path(&path);
    debug!("loading {}", key);

    let reader = match store.read_stream(&key).await {
        Ok(reader) => reader,
        Err(error) => {
            debug!("error loading {}: {}", key, error);
            return status_for_store_error(&error).into_response();
        }
    };

    // The status is not committed until the first chunk arrives; an error
    // surfacing between open and first byte still maps to a plain status
    // code instead of truncating a 200.
    let mut chunks = ReaderStream::new(reader);
    let first = match chunks.next().await {
        Some(Ok(chunk)) => Some(chunk),
        Some(Err(error)) => {
            let error = StoreError::from(error);
            debug!("error streaming {}: {}", key, error);
            return status_for_store_error(&error).into_response();
        }
        None => None,
    };

    let body = match first {
        Some(chunk) => Body::from_stream(stream::iter([Ok(chunk)]).chain(chunks)),
        None => Body::empty(),
    };
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json; charset=utf-8")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", INDEX_JSON),
        )
        .body(body)
        .unwrap()
}
