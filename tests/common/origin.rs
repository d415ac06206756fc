//! Fake origin registry
//!
//! Serves a fixed map of paths to tarball bytes on a random local port, so
//! download tests never touch the network.

use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct TestOrigin {
    /// Base URL for building tarball links (e.g. "http://127.0.0.1:12345")
    pub base_url: String,
}

impl TestOrigin {
    /// Spawns an origin serving `files` on a random port.
    pub async fn spawn(files: HashMap<String, Vec<u8>>) -> Self {
        let app = Router::new()
            .fallback(serve_file)
            .with_state(Arc::new(files));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener.local_addr().expect("No local address").port();

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Origin server died");
        });

        Self {
            base_url: format!("http://127.0.0.1:{}", port),
        }
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

async fn serve_file(
    State(files): State<Arc<HashMap<String, Vec<u8>>>>,
    uri: Uri,
) -> Response {
    match files.get(uri.path()) {
        Some(bytes) => bytes.clone().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
