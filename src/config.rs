//! Configuration file handling.
//!
//! This module provides loading and saving of npm-auditor configuration
//! from a TOML file.
//!
//! # Configuration Location
//!
//! The configuration file is stored at:
//! - Linux: `~/.config/npm-auditor/config.toml`
//! - macOS: `~/Library/Application Support/npm-auditor/config.toml`
//! - Windows: `%APPDATA%\npm-auditor\config.toml`
//!
//! # Example Configuration
//!
//! ```toml
//! registry_url = "https://registry.npmjs.org"
//! osv_url = "https://api.osv.dev"
//! request_timeout_secs = 30
//! max_depth = 6
//! concurrency = 8
//! default_format = "table"
//! severity = ["HIGH", "CRITICAL"]
//!
//! [ignore]
//! packages = ["@types/*"]
//! vulnerabilities = ["CVE-2021-12345", "GHSA-xxxx-xxxx-xxxx"]
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::audit::DEFAULT_MAX_DEPTH;
use crate::checker::{
    DEFAULT_MAX_RESPONSE_BYTES, DEFAULT_OSV_URL, DEFAULT_REGISTRY_URL, DEFAULT_TIMEOUT,
};
use crate::model::Finding;
use crate::severity::{Rating, SeverityFilter};

/// Application configuration.
///
/// Every field has a default, so a partial file (or none at all) is valid.
/// Command-line flags override whatever is loaded here.
///
/// # Example
///
/// ```no_run
/// use npm_auditor::Config;
///
/// // Load from file (or use defaults if file doesn't exist)
/// let config = Config::load().unwrap();
///
/// println!("Max depth: {}", config.max_depth);
/// println!("Timeout: {:?}", config.request_timeout());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the npm registry.
    pub registry_url: String,

    /// Base URL of the OSV API.
    pub osv_url: String,

    /// Timeout for a single request, in seconds. Batch queries get twice this.
    ///
    /// Default: 30
    pub request_timeout_secs: u64,

    /// Largest response body accepted from either service.
    ///
    /// Default: 50 MiB
    pub max_response_bytes: u64,

    /// Dependencies deeper than this are not audited in package mode.
    ///
    /// Default: 6
    pub max_depth: usize,

    /// Number of packages looked up at the same time.
    ///
    /// Default: 8
    pub concurrency: usize,

    /// Default output format when no `--output` flag is provided.
    ///
    /// Valid values: "table", "json"
    /// Default: "table"
    pub default_format: String,

    /// Ratings to report when no `--severity` flag is provided.
    ///
    /// Default: empty (report everything)
    pub severity: Vec<Rating>,

    /// Ignore list configuration for suppressing known issues.
    #[serde(default)]
    pub ignore: IgnoreConfig,
}

/// Configuration for ignoring specific packages or vulnerabilities.
///
/// Use this to suppress known false positives or accepted risks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreConfig {
    /// Package names that are never queried.
    ///
    /// Supports glob patterns (e.g., "lodash*", "@types/*").
    pub packages: Vec<String>,

    /// Vulnerability IDs to ignore (e.g., "CVE-2021-12345", "GHSA-xxxx").
    ///
    /// Matched against both the advisory id and its CVE alias.
    pub vulnerabilities: Vec<String>,
}

impl IgnoreConfig {
    /// True when `name` matches an entry of `packages`; `*` matches any run of characters.
    pub fn should_ignore_package(&self, name: &str) -> bool {
        self.packages.iter().any(|pattern| wildcard_match(pattern, name))
    }

    /// Ids are compared case-insensitively.
    pub fn should_ignore_vulnerability(&self, id: &str) -> bool {
        self.vulnerabilities
            .iter()
            .any(|ignored| ignored.eq_ignore_ascii_case(id))
    }

    /// A finding is suppressed by its own id or by its CVE alias.
    pub fn should_ignore_finding(&self, finding: &Finding) -> bool {
        self.should_ignore_vulnerability(&finding.id)
            || finding
                .cve
                .as_deref()
                .is_some_and(|cve| self.should_ignore_vulnerability(cve))
    }
}

fn wildcard_match(pattern: &str, name: &str) -> bool {
    let mut literals = pattern.split('*');
    // `split` always yields at least one item
    let head = literals.next().unwrap_or_default();
    let Some(mut rest) = name.strip_prefix(head) else {
        return false;
    };

    let literals: Vec<&str> = literals.collect();
    let Some((tail, middle)) = literals.split_last() else {
        // No wildcard at all
        return rest.is_empty();
    };

    for literal in middle.iter().filter(|l| !l.is_empty()) {
        match rest.find(literal) {
            Some(at) => rest = &rest[at + literal.len()..],
            None => return false,
        }
    }
    rest.ends_with(tail)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            osv_url: DEFAULT_OSV_URL.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            max_depth: DEFAULT_MAX_DEPTH,
            concurrency: 8,
            default_format: "table".to_string(),
            severity: Vec::new(),
            ignore: IgnoreConfig::default(),
        }
    }
}

impl Config {
    /// Reads the config file, falling back to defaults when there is none.
    ///
    /// # Errors
    ///
    /// Fails when the file exists but is unreadable or not valid TOML.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if !path.is_file() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Writes this configuration to [`Config::config_path`], creating the
    /// directory on first use.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Returns the path to the configuration file.
    ///
    /// # Example
    ///
    /// ```
    /// use npm_auditor::Config;
    ///
    /// let path = Config::config_path();
    /// assert!(path.ends_with("npm-auditor/config.toml"));
    /// ```
    pub fn config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        base.join("npm-auditor").join("config.toml")
    }

    /// The default configuration rendered as TOML.
    pub fn generate_default_config() -> String {
        toml::to_string_pretty(&Config::default()).unwrap_or_default()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn severity_filter(&self) -> SeverityFilter {
        SeverityFilter::new(self.severity.iter().copied())
    }
}
