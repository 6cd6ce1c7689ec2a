//! External lookups: registry metadata and vulnerability data.
//!
//! The audit engine only talks to the two traits defined here, so tests can
//! swap the HTTP clients for in-memory fakes.

mod osv;
mod registry;
mod version;

pub use osv::{OsvClient, DEFAULT_OSV_URL, MAX_BATCH_SIZE};
pub use registry::{NpmRegistry, DEFAULT_REGISTRY_URL};
pub use version::{is_newer, resolve_version, ResolvedVersion};

use crate::model::{OsvVulnerability, PackageKey, PackageMetadata};
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default cap on a single response body.
pub const DEFAULT_MAX_RESPONSE_BYTES: u64 = 50 * 1024 * 1024;

/// Source of package metadata (the npm registry in production).
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Fetches the metadata document for `name`.
    ///
    /// Returns `Ok(None)` when the package does not exist.
    async fn metadata(&self, name: &str) -> Result<Option<Arc<PackageMetadata>>>;
}

/// Source of vulnerability records (OSV in production).
#[async_trait]
pub trait VulnerabilitySource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Full vulnerability records affecting one package version.
    async fn query(&self, package: &PackageKey) -> Result<Vec<OsvVulnerability>>;

    /// Vulnerabilities for many package versions at once.
    ///
    /// Records in a batch response may only carry their `id`. Packages without
    /// any vulnerability may be absent from the returned map.
    async fn query_batch(
        &self,
        packages: &[PackageKey],
    ) -> Result<HashMap<PackageKey, Vec<OsvVulnerability>>>;
}

/// Reads a response body, failing as soon as it grows past `max_bytes`.
pub(crate) async fn read_capped(mut response: reqwest::Response, max_bytes: u64) -> Result<Vec<u8>> {
    if let Some(length) = response.content_length() {
        if length > max_bytes {
            bail!("Response too large: {} bytes (max: {})", length, max_bytes);
        }
    }

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        if (body.len() + chunk.len()) as u64 > max_bytes {
            bail!("Response exceeded max size: {} bytes", max_bytes);
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}
