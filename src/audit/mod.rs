//! The audit engine.
//!
//! [`Auditor`] drives one audit run against a [`MetadataSource`] and a
//! [`VulnerabilitySource`]:
//!
//! - [`Auditor::audit_package`] walks the live registry graph from a root
//!   package, resolving declared ranges as it goes.
//! - [`Auditor::audit_lock`] audits the pinned entries of a lock file with one
//!   batch query followed by detail queries for the hits only.
//!
//! Every outbound call is bounded by the configured timeout and the run's
//! [`CancellationToken`]. A failed call only prunes the node it was made for;
//! the reason is kept in [`AuditReport::warnings`](crate::model::AuditReport).

mod collector;
mod live;
mod lock;
mod normalize;

pub use collector::{FindingsCollector, VisitedSet};
pub use normalize::normalize;

use anyhow::{anyhow, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::checker::{MetadataSource, VulnerabilitySource, DEFAULT_TIMEOUT};
use crate::config::{Config, IgnoreConfig};
use crate::model::{Category, OsvVulnerability, PackageKey, PackageMetadata};
use crate::severity::SeverityFilter;

/// Dependencies deeper than this are pruned in package mode.
pub const DEFAULT_MAX_DEPTH: usize = 6;

/// Tuning and filtering for one run.
#[derive(Debug, Clone)]
pub struct AuditOptions {
    pub max_depth: usize,
    /// Upper bound on lookups in flight at once. `1` gives a strictly
    /// sequential depth-first walk.
    pub concurrency: usize,
    pub query_timeout: Duration,
    pub severity: SeverityFilter,
    pub ignore: IgnoreConfig,
}

impl Default for AuditOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            concurrency: 8,
            query_timeout: DEFAULT_TIMEOUT,
            severity: SeverityFilter::default(),
            ignore: IgnoreConfig::default(),
        }
    }
}

impl AuditOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_depth: config.max_depth,
            concurrency: config.concurrency.max(1),
            query_timeout: config.request_timeout(),
            severity: config.severity_filter(),
            ignore: config.ignore.clone(),
        }
    }
}

pub struct Auditor<M, V> {
    metadata: M,
    vulnerabilities: V,
    options: AuditOptions,
    cancel: CancellationToken,
}

impl<M: MetadataSource, V: VulnerabilitySource> Auditor<M, V> {
    pub fn new(metadata: M, vulnerabilities: V, options: AuditOptions) -> Self {
        Self {
            metadata,
            vulnerabilities,
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Ties this auditor to an externally owned token (e.g. a Ctrl-C handler).
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn options(&self) -> &AuditOptions {
        &self.options
    }

    fn concurrency(&self) -> usize {
        self.options.concurrency.max(1)
    }

    /// Runs `call` under the per-call timeout, giving up early on cancellation.
    async fn bounded<T>(
        &self,
        what: &str,
        limit: Duration,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(anyhow!("audit cancelled")),
            result = tokio::time::timeout(limit, call) => {
                result.map_err(|_| anyhow!("{} timed out after {}s", what, limit.as_secs()))?
            }
        }
    }

    async fn lookup_metadata(&self, name: &str) -> Result<Option<Arc<PackageMetadata>>> {
        self.bounded(
            "metadata lookup",
            self.options.query_timeout,
            self.metadata.metadata(name),
        )
        .await
    }

    async fn lookup_vulnerabilities(&self, key: &PackageKey) -> Result<Vec<OsvVulnerability>> {
        self.bounded(
            "vulnerability query",
            self.options.query_timeout,
            self.vulnerabilities.query(key),
        )
        .await
    }

    /// Metadata for a non-root package; failures become a warning and `None`.
    async fn metadata_or_warn(
        &self,
        name: &str,
        collector: &FindingsCollector,
    ) -> Option<Arc<PackageMetadata>> {
        match self.lookup_metadata(name).await {
            Ok(metadata) => metadata,
            Err(e) => {
                self.degrade(collector, format!("Could not fetch metadata for {}: {:#}", name, e));
                None
            }
        }
    }

    /// Queries `key` and records its findings under `category` and `path`.
    ///
    /// Returns `false` when the query itself failed.
    async fn check(
        &self,
        key: &PackageKey,
        category: Category,
        path: &[String],
        collector: &FindingsCollector,
    ) -> bool {
        match self.lookup_vulnerabilities(key).await {
            Ok(records) => {
                self.record(&records, key, category, path, collector);
                true
            }
            Err(e) => {
                self.degrade(
                    collector,
                    format!("Vulnerability query failed for {}: {:#}", key, e),
                );
                false
            }
        }
    }

    fn record(
        &self,
        records: &[OsvVulnerability],
        key: &PackageKey,
        category: Category,
        path: &[String],
        collector: &FindingsCollector,
    ) {
        records
            .iter()
            .filter_map(|record| normalize(record, key, category, path, &self.options.severity))
            .filter(|finding| !self.options.ignore.should_ignore_finding(finding))
            .for_each(|finding| collector.push(finding));
    }

    /// Logs a degraded lookup. Failures caused by cancellation are not reported.
    fn degrade(&self, collector: &FindingsCollector, message: String) {
        if self.cancel.is_cancelled() {
            return;
        }
        warn!("{}", message);
        collector.warn(message);
    }
}

/// In-memory collaborators shared by the engine tests.
#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use anyhow::bail;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::{BTreeMap, HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::model::VersionMetadata;

    #[derive(Default)]
    pub struct FakeRegistry {
        packages: HashMap<String, PackageMetadata>,
        pub failing: HashSet<String>,
        pub calls: AtomicUsize,
    }

    impl FakeRegistry {
        /// Publishes `name@version` with the given runtime dependencies.
        pub fn publish(&mut self, name: &str, version: &str, deps: &[(&str, &str)]) -> &mut VersionMetadata {
            let package = self.packages.entry(name.to_string()).or_default();
            package.dist_tags.insert("latest".into(), version.into());
            let manifest = package.versions.entry(version.to_string()).or_default();
            manifest.dependencies = deps
                .iter()
                .map(|(n, r)| (n.to_string(), r.to_string()))
                .collect::<BTreeMap<_, _>>();
            manifest
        }
    }

    #[async_trait]
    impl MetadataSource for FakeRegistry {
        async fn metadata(&self, name: &str) -> Result<Option<Arc<PackageMetadata>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.contains(name) {
                bail!("registry unavailable");
            }
            Ok(self.packages.get(name).cloned().map(Arc::new))
        }
    }

    #[derive(Default)]
    pub struct FakeOsv {
        records: HashMap<PackageKey, Vec<OsvVulnerability>>,
        pub failing: HashSet<String>,
        pub queried: Mutex<Vec<PackageKey>>,
        pub batches: Mutex<Vec<usize>>,
        /// Keys whose detail query never returns.
        pub hanging: HashSet<String>,
    }

    impl FakeOsv {
        pub fn vulnerable(&mut self, name: &str, version: &str, id: &str, vector: &str) {
            let record = serde_json::from_value(serde_json::json!({
                "id": id,
                "summary": format!("{} in {}", id, name),
                "severity": [ { "type": "CVSS_V3", "score": vector } ]
            }))
            .unwrap_or_else(|e| panic!("bad fixture: {}", e));
            self.records
                .entry(PackageKey::new(name, version))
                .or_default()
                .push(record);
        }

        pub fn query_count(&self) -> usize {
            self.queried.lock().len()
        }

        pub fn queried_names(&self) -> Vec<String> {
            self.queried.lock().iter().map(|k| k.name.clone()).collect()
        }
    }

    #[async_trait]
    impl VulnerabilitySource for FakeOsv {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn query(&self, package: &PackageKey) -> Result<Vec<OsvVulnerability>> {
            self.queried.lock().push(package.clone());
            if self.failing.contains(&package.name) {
                bail!("HTTP 500");
            }
            if self.hanging.contains(&package.name) {
                std::future::pending::<()>().await;
            }
            Ok(self.records.get(package).cloned().unwrap_or_default())
        }

        async fn query_batch(
            &self,
            packages: &[PackageKey],
        ) -> Result<HashMap<PackageKey, Vec<OsvVulnerability>>> {
            self.batches.lock().push(packages.len());
            Ok(packages
                .iter()
                .filter_map(|key| {
                    let ids = self.records.get(key)?;
                    // Batch results only carry ids
                    let stripped = ids
                        .iter()
                        .map(|r| OsvVulnerability {
                            id: r.id.clone(),
                            ..OsvVulnerability::default()
                        })
                        .collect();
                    Some((key.clone(), stripped))
                })
                .collect())
        }
    }

    pub const CRITICAL: &str = "CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H";
    pub const MEDIUM: &str = "CVSS:3.1/AV:N/AC:L/PR:N/UI:R/S:C/C:L/I:L/A:N";

    pub fn options(concurrency: usize) -> AuditOptions {
        AuditOptions {
            concurrency,
            query_timeout: Duration::from_secs(5),
            ..AuditOptions::default()
        }
    }
}
