use super::{read_capped, VulnerabilitySource, DEFAULT_MAX_RESPONSE_BYTES, DEFAULT_TIMEOUT};
use crate::model::{OsvVulnerability, PackageKey};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;

/// Maximum number of packages to query in a single batch request.
pub const MAX_BATCH_SIZE: usize = 1000;

pub const DEFAULT_OSV_URL: &str = "https://api.osv.dev";
const ECOSYSTEM: &str = "npm";

pub struct OsvClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    max_response_bytes: u64,
}

impl OsvClient {
    pub fn new() -> Self {
        Self::with_settings(DEFAULT_OSV_URL, DEFAULT_TIMEOUT, DEFAULT_MAX_RESPONSE_BYTES)
    }

    pub fn with_settings(base_url: &str, timeout: Duration, max_response_bytes: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            max_response_bytes,
        }
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
        timeout: Duration,
    ) -> Result<R> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Network error calling {}", url))?;

        if !response.status().is_success() {
            bail!("OSV request to {} failed: HTTP {}", path, response.status().as_u16());
        }

        let body = read_capped(response, self.max_response_bytes).await?;
        serde_json::from_slice(&body).context("Invalid JSON response from OSV API")
    }
}

impl Default for OsvClient {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize, Clone)]
struct OsvPackage<'a> {
    name: &'a str,
    ecosystem: &'static str,
}

#[derive(Serialize)]
struct OsvQuery<'a> {
    package: OsvPackage<'a>,
    version: &'a str,
}

impl<'a> OsvQuery<'a> {
    fn for_package(key: &'a PackageKey) -> Self {
        Self {
            package: OsvPackage {
                name: &key.name,
                ecosystem: ECOSYSTEM,
            },
            version: &key.version,
        }
    }
}

// Batch query types for efficient bulk lookups
#[derive(Serialize)]
struct OsvBatchQuery<'a> {
    queries: Vec<OsvQuery<'a>>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct OsvQueryResponse {
    vulns: Vec<OsvVulnerability>,
}

#[derive(Deserialize)]
struct OsvBatchResponse {
    results: Vec<OsvQueryResponse>,
}

#[async_trait]
impl VulnerabilitySource for OsvClient {
    fn name(&self) -> &'static str {
        "OSV.dev"
    }

    async fn query(&self, package: &PackageKey) -> Result<Vec<OsvVulnerability>> {
        let response: OsvQueryResponse = self
            .post("/v1/query", &OsvQuery::for_package(package), self.timeout)
            .await?;
        Ok(response.vulns)
    }

    async fn query_batch(
        &self,
        packages: &[PackageKey],
    ) -> Result<HashMap<PackageKey, Vec<OsvVulnerability>>> {
        let packages = if packages.len() > MAX_BATCH_SIZE {
            warn!(
                requested = packages.len(),
                "Batch size limited to {} packages",
                MAX_BATCH_SIZE
            );
            &packages[..MAX_BATCH_SIZE]
        } else {
            packages
        };

        let queries: Vec<&PackageKey> = packages
            .iter()
            .filter(|key| !key.name.is_empty() && !key.version.is_empty())
            .collect();
        if queries.is_empty() {
            return Ok(HashMap::new());
        }

        let batch_query = OsvBatchQuery {
            queries: queries.iter().map(|key| OsvQuery::for_package(*key)).collect(),
        };
        let batch_response: OsvBatchResponse = self
            .post("/v1/querybatch", &batch_query, self.timeout * 2)
            .await?;

        // Results come back in query order
        Ok(queries
            .into_iter()
            .zip(batch_response.results)
            .filter(|(_, result)| !result.vulns.is_empty())
            .map(|(key, result)| (key.clone(), result.vulns))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_serialization() {
        let key = PackageKey::new("@babel/traverse", "7.22.0");
        let json = serde_json::to_value(OsvQuery::for_package(&key)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "package": { "name": "@babel/traverse", "ecosystem": "npm" },
                "version": "7.22.0"
            })
        );
    }

    #[test]
    fn test_batch_response_tolerates_empty_results() {
        let response: OsvBatchResponse = serde_json::from_str(
            r#"{ "results": [ {}, { "vulns": [ { "id": "GHSA-1", "modified": "2024-01-01T00:00:00Z" } ] } ] }"#,
        )
        .unwrap();
        assert!(response.results[0].vulns.is_empty());
        assert_eq!(response.results[1].vulns[0].id, "GHSA-1");
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_request() {
        let client = OsvClient::with_settings("http://127.0.0.1:9", Duration::from_millis(50), 1024);
        let result = client.query_batch(&[]).await.unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_osv_client_default() {
        let client = OsvClient::default();
        assert_eq!(client.name(), "OSV.dev");
    }
}
