//! Package mode: walks the registry graph from a root package.

use futures::future::join_all;
use tracing::{debug, info};

use super::{Auditor, FindingsCollector, VisitedSet};
use crate::checker::{is_newer, resolve_version, MetadataSource, ResolvedVersion, VulnerabilitySource};
use crate::error::AuditError;
use crate::model::{AuditReport, Category, PackageKey, PackageRef, ResolvedPackage};

/// A dependency edge still to be resolved.
#[derive(Debug, Clone)]
struct Branch {
    dependency: PackageRef,
    category: Category,
    depth: usize,
    /// Names from the root's direct dependency down to this one.
    path: Vec<String>,
}

impl Branch {
    fn child(&self, name: &str, range: &str) -> Self {
        let mut path = self.path.clone();
        path.push(name.to_string());
        Self {
            dependency: PackageRef::new(name, range),
            category: self.category,
            depth: self.depth + 1,
            path,
        }
    }
}

impl<M: MetadataSource, V: VulnerabilitySource> Auditor<M, V> {
    /// Audits `name` at `version` (or its `latest` dist-tag) and everything it
    /// depends on, down to the configured depth.
    ///
    /// Only problems with the root itself are errors. Anything that goes wrong
    /// below the root prunes that branch and is reported as a warning.
    pub async fn audit_package(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> Result<AuditReport, AuditError> {
        let metadata = match self.lookup_metadata(name).await {
            Ok(Some(metadata)) => metadata,
            Ok(None) => return Err(AuditError::PackageNotFound(name.to_string())),
            Err(e) => {
                return Err(AuditError::RegistryUnavailable {
                    name: name.to_string(),
                    reason: format!("{:#}", e),
                })
            }
        };

        let version = match version {
            Some(version) => version.to_string(),
            None => metadata
                .latest()
                .ok_or_else(|| AuditError::NoVersion(name.to_string()))?
                .to_string(),
        };
        let manifest = metadata
            .version(&version)
            .ok_or_else(|| AuditError::VersionNotFound {
                name: name.to_string(),
                version: version.clone(),
            })?;

        let mut report = AuditReport::new(name);
        report.audited_version = Some(version.clone());
        report.latest_version = metadata
            .latest()
            .filter(|latest| is_newer(latest, &version))
            .map(str::to_string);

        let collector = FindingsCollector::new();
        if let Some(message) = &manifest.deprecated {
            collector.warn(format!("{}@{} is deprecated: {}", name, version, message));
        }

        info!(package = name, %version, "auditing package");
        let visited = VisitedSet::new();
        let root = PackageKey::new(name, &version);
        visited.insert(root.clone());

        // A failed root query is reported but does not stop the walk.
        if !self.options.ignore.should_ignore_package(name) {
            self.check(&root, Category::Root, &[name.to_string()], &collector)
                .await;
        }

        let groups = [
            (Category::Mandatory, &manifest.dependencies),
            (Category::Dev, &manifest.dev_dependencies),
            (Category::Optional, &manifest.optional_dependencies),
        ];
        let direct: Vec<Branch> = groups
            .into_iter()
            .flat_map(|(group, deps)| {
                deps.iter().map(move |(dep, range)| Branch {
                    dependency: PackageRef::new(dep.as_str(), range.as_str()),
                    category: Category::Root.inherit(group),
                    depth: 1,
                    path: vec![dep.clone()],
                })
            })
            .collect();

        self.walk(direct, &visited, &collector).await;

        report.packages_checked = visited.len();
        report.cancelled = self.cancel.is_cancelled();
        collector.finish(&mut report);
        Ok(report)
    }

    /// Depth-first walk over pending branches.
    ///
    /// Up to `concurrency` branches from the top of the stack are resolved
    /// together; their children are pushed back so that the first branch's
    /// subtree is explored next.
    async fn walk(&self, direct: Vec<Branch>, visited: &VisitedSet, collector: &FindingsCollector) {
        let mut stack: Vec<Branch> = direct.into_iter().rev().collect();

        while !stack.is_empty() {
            if self.cancel.is_cancelled() {
                debug!(pending = stack.len(), "audit cancelled, abandoning pending branches");
                break;
            }

            let width = self.concurrency().min(stack.len());
            let wave: Vec<Branch> = stack.split_off(stack.len() - width).into_iter().rev().collect();
            let children = join_all(wave.into_iter().map(|branch| self.visit(branch, visited, collector))).await;

            for expanded in children.into_iter().rev() {
                stack.extend(expanded.unwrap_or_default().into_iter().rev());
            }
        }
    }

    /// Resolves, deduplicates and queries one branch.
    ///
    /// Returns the branch's children, or `None` when the branch ends here.
    async fn visit(
        &self,
        branch: Branch,
        visited: &VisitedSet,
        collector: &FindingsCollector,
    ) -> Option<Vec<Branch>> {
        if self.cancel.is_cancelled() {
            return None;
        }
        let PackageRef { name, range } = &branch.dependency;
        if branch.depth > self.options.max_depth {
            debug!(package = %name, depth = branch.depth, "max depth reached");
            return None;
        }

        let Some(resolved) = resolve_version(range) else {
            debug!(package = %name, "no version range, skipping");
            return None;
        };

        let mut fetched = None;
        let version = match resolved {
            ResolvedVersion::Exact(version) => version,
            ResolvedVersion::Latest => {
                let metadata = self.metadata_or_warn(name, collector).await?;
                let latest = metadata.latest()?.to_string();
                debug!(package = %name, %range, %latest, "resolved range to latest");
                fetched = Some(metadata);
                latest
            }
        };

        let package = ResolvedPackage {
            name: name.clone(),
            version,
            category: branch.category,
        };
        let key = package.key();
        if !visited.insert(key.clone()) {
            debug!(%key, "already audited");
            return None;
        }

        let metadata = match fetched {
            Some(metadata) => metadata,
            None => self.metadata_or_warn(name, collector).await?,
        };
        let Some(manifest) = metadata.version(&package.version) else {
            debug!(%key, "version not found in registry");
            return None;
        };

        debug!(%key, category = %package.category, depth = branch.depth, "auditing");
        if self.options.ignore.should_ignore_package(name) {
            debug!(%key, "package ignored, not querying");
        } else if !self.check(&key, package.category, &branch.path, collector).await {
            return None;
        }

        Some(
            manifest
                .runtime_dependencies()
                .into_iter()
                .map(|(name, range)| branch.child(name, range))
                .collect(),
        )
    }
}
