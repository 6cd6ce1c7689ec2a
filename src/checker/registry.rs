use super::{read_capped, MetadataSource, DEFAULT_MAX_RESPONSE_BYTES, DEFAULT_TIMEOUT};
use crate::model::PackageMetadata;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_REGISTRY_URL: &str = "https://registry.npmjs.org";

/// npm naming rules cap package names at this length.
const MAX_NAME_LENGTH: usize = 214;

pub struct NpmRegistry {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    max_response_bytes: u64,
}

impl NpmRegistry {
    pub fn new() -> Self {
        Self::with_settings(DEFAULT_REGISTRY_URL, DEFAULT_TIMEOUT, DEFAULT_MAX_RESPONSE_BYTES)
    }

    pub fn with_settings(base_url: &str, timeout: Duration, max_response_bytes: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            max_response_bytes,
        }
    }

    fn package_url(&self, name: &str) -> String {
        // Scoped packages are addressed as `@scope%2Fname`.
        format!("{}/{}", self.base_url, name.replace('/', "%2F"))
    }
}

impl Default for NpmRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataSource for NpmRegistry {
    async fn metadata(&self, name: &str) -> Result<Option<Arc<PackageMetadata>>> {
        if name.is_empty() || name.len() > MAX_NAME_LENGTH {
            bail!("Invalid package name: {:?}", name);
        }

        let url = self.package_url(name);
        debug!(%url, "fetching registry metadata");

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .header("Accept", "application/json")
            .send()
            .await
            .with_context(|| format!("Failed to fetch metadata for {}", name))?;

        match response.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            status if !status.is_success() => {
                bail!("Error fetching metadata for {}: HTTP {}", name, status.as_u16())
            }
            _ => {}
        }

        let body = read_capped(response, self.max_response_bytes).await?;
        let metadata: PackageMetadata = serde_json::from_slice(&body)
            .with_context(|| format!("Invalid JSON response from registry for {}", name))?;
        Ok(Some(Arc::new(metadata)))
    }
}
