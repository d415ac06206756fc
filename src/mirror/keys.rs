//! Store-key derivation.
//!
//! One manifest per package at `/<package-name>/index.json`; one tarball per
//! version at a key mirroring the path segment of its origin URL, so the
//! same artifact always lands under the same key regardless of which host
//! served it.

use super::FetchError;

pub const INDEX_JSON: &str = "index.json";

pub fn manifest_key(package_name: &str) -> String {
    format!("/{}/{}", package_name, INDEX_JSON)
}

/// Derive a tarball's store key from the path component of its URL,
/// everything after the registry host.
pub fn tarball_key(tarball_url: &str) -> Result<String, FetchError> {
    let url = reqwest::Url::parse(tarball_url)
        .map_err(|_| FetchError::InvalidTarballUrl(tarball_url.to_string()))?;
    Ok(url.path().to_string())
}
