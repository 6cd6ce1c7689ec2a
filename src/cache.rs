//! Run-scoped memoization of registry lookups.
//!
//! A package is usually looked up twice during traversal: once to resolve its
//! `latest` dist-tag and once for the version map. Shared dependencies are
//! looked up again for every distinct version. [`MetadataCache`] wraps any
//! [`MetadataSource`] and remembers each answer (including "not found") for the
//! lifetime of the wrapper. Nothing is written to disk.
//!
//! # Example
//!
//! ```no_run
//! use npm_auditor::{cache::MetadataCache, checker::{MetadataSource, NpmRegistry}};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let registry = MetadataCache::new(NpmRegistry::new());
//!
//! // Only the first call reaches the network.
//! let first = registry.metadata("lodash").await?;
//! let second = registry.metadata("lodash").await?;
//! assert_eq!(first.is_some(), second.is_some());
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

use crate::checker::MetadataSource;
use crate::model::PackageMetadata;

/// A [`MetadataSource`] decorator that memoizes successful lookups.
///
/// Errors are not cached, so a transient failure can be retried by a later
/// branch of the same run.
pub struct MetadataCache<S> {
    inner: S,
    entries: DashMap<String, Option<Arc<PackageMetadata>>>,
}

impl<S: MetadataSource> MetadataCache<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            entries: DashMap::new(),
        }
    }

    /// Number of distinct packages looked up so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl<S: MetadataSource> MetadataSource for MetadataCache<S> {
    async fn metadata(&self, name: &str) -> Result<Option<Arc<PackageMetadata>>> {
        let cached = self.entries.get(name).map(|entry| entry.value().clone());
        if let Some(hit) = cached {
            return Ok(hit);
        }

        let fetched = self.inner.metadata(name).await?;
        self.entries.insert(name.to_string(), fetched.clone());
        Ok(fetched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MetadataSource for CountingSource {
        async fn metadata(&self, name: &str) -> Result<Option<Arc<PackageMetadata>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match name {
                "missing" => Ok(None),
                "broken" => bail!("connection reset"),
                _ => {
                    let mut meta = PackageMetadata::default();
                    meta.dist_tags.insert("latest".into(), "1.0.0".into());
                    Ok(Some(Arc::new(meta)))
                }
            }
        }
    }

    fn cache() -> MetadataCache<CountingSource> {
        MetadataCache::new(CountingSource {
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_hits_are_served_from_memory() {
        let cache = cache();
        let first = cache.metadata("lodash").await.unwrap().unwrap();
        let second = cache.metadata("lodash").await.unwrap().unwrap();

        assert_eq!(first.latest(), second.latest());
        assert_eq!(cache.inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_misses_are_remembered() {
        let cache = cache();
        assert!(cache.metadata("missing").await.unwrap().is_none());
        assert!(cache.metadata("missing").await.unwrap().is_none());
        assert_eq!(cache.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache = cache();
        assert!(cache.metadata("broken").await.is_err());
        assert!(cache.metadata("broken").await.is_err());
        assert_eq!(cache.inner.calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }
}
