//! Fixture builders for change-feed records.

use registry_mirror::{ChangeRecord, Done};
use serde_json::json;
use tokio::sync::oneshot;

/// Build a change record for `name` with the given `(version, tarball_url)`
/// pairs, shaped like an npm manifest update.
pub fn module_update(name: &str, versions: &[(&str, &str)]) -> ChangeRecord {
    let mut version_map = serde_json::Map::new();
    for (version, tarball) in versions {
        version_map.insert(
            version.to_string(),
            json!({ "dist": { "tarball": tarball, "shasum": "123" } }),
        );
    }
    ChangeRecord::new(json!({ "name": name, "versions": version_map }))
}

/// A `done` continuation paired with a receiver that resolves once it has
/// been invoked.
pub fn done_channel() -> (Done, oneshot::Receiver<()>) {
    let (tx, rx) = oneshot::channel();
    let done: Done = Box::new(move || {
        let _ = tx.send(());
    });
    (done, rx)
}
