//! Lock-file parsers.
//!
//! Every supported dialect reduces to the same shape: a list of
//! [`LockEntry`] values plus, for npm `packages` maps, a
//! [`DependencyPathMap`] that can rebuild the chain of parents leading to
//! each entry.
//!
//! | Format | Files | Dependency graph |
//! |--------|-------|------------------|
//! | [`LockFormat::Npm`] | `package-lock.json`, `npm-shrinkwrap.json` | v2/v3 path map, v1 nested tree |
//! | [`LockFormat::Yarn`] | `yarn.lock` | none |
//! | [`LockFormat::Pnpm`] | `pnpm-lock.yaml` | none |
//!
//! Parsing never fails: malformed input yields an empty (or partial) result
//! with the reason recorded in [`ParsedLock::problems`].
//!
//! # Example
//!
//! ```
//! use npm_auditor::lockfile::LockFormat;
//!
//! let lock = LockFormat::Yarn.parse("lodash@^4.17.0:\n  version \"4.17.20\"\n");
//! assert_eq!(lock.entries.len(), 1);
//! assert_eq!(lock.entries[0].version, "4.17.20");
//! ```

mod npm;
mod pnpm;
mod yarn;

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use crate::model::{Category, PackageKey};

/// Separator between nested install locations in an npm `packages` key.
const NESTED_SEPARATOR: &str = "/node_modules/";
const MODULES_PREFIX: &str = "node_modules/";

/// Supported lock-file dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockFormat {
    Npm,
    Yarn,
    Pnpm,
}

impl LockFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockFormat::Npm => "npm",
            LockFormat::Yarn => "yarn",
            LockFormat::Pnpm => "pnpm",
        }
    }

    /// Guesses the dialect from a well-known file name.
    pub fn detect(path: &Path) -> Option<Self> {
        match path.file_name()?.to_str()? {
            "package-lock.json" | "npm-shrinkwrap.json" => Some(LockFormat::Npm),
            "yarn.lock" => Some(LockFormat::Yarn),
            "pnpm-lock.yaml" => Some(LockFormat::Pnpm),
            _ => None,
        }
    }

    pub fn parse(&self, content: &str) -> ParsedLock {
        match self {
            LockFormat::Npm => npm::parse(content),
            LockFormat::Yarn => yarn::parse(content),
            LockFormat::Pnpm => pnpm::parse(content),
        }
    }
}

impl FromStr for LockFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "npm" => Ok(LockFormat::Npm),
            "yarn" => Ok(LockFormat::Yarn),
            "pnpm" => Ok(LockFormat::Pnpm),
            _ => Err(format!("Unknown lock format: {}. Use 'npm', 'yarn' or 'pnpm'", s)),
        }
    }
}

impl std::fmt::Display for LockFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a lock entry sits in the dependency tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOrigin {
    /// A `packages` key such as `node_modules/a/node_modules/b`, resolved
    /// through the lock's [`DependencyPathMap`] on demand.
    Location(String),
    /// The full chain of names, known at parse time.
    Chain(Vec<String>),
}

/// One installed package as recorded in a lock file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockEntry {
    pub name: String,
    pub version: String,
    pub category: Category,
    pub origin: EntryOrigin,
}

impl LockEntry {
    pub fn key(&self) -> PackageKey {
        PackageKey::new(&self.name, &self.version)
    }

    fn direct(name: String, version: String, category: Category) -> Self {
        let origin = EntryOrigin::Chain(vec![name.clone()]);
        Self {
            name,
            version,
            category,
            origin,
        }
    }
}

/// Result of parsing one lock file.
#[derive(Debug, Clone, Default)]
pub struct ParsedLock {
    /// Project name recorded in the lock, if any.
    pub root_name: Option<String>,
    pub entries: Vec<LockEntry>,
    pub path_map: DependencyPathMap,
    /// Reasons the file could not be (fully) read.
    pub problems: Vec<String>,
}

impl ParsedLock {
    fn with_problem(problem: impl Into<String>) -> Self {
        Self {
            problems: vec![problem.into()],
            ..Self::default()
        }
    }

    /// Chain of package names from the root dependency down to `entry`.
    pub fn path_of(&self, entry: &LockEntry) -> Vec<String> {
        match &entry.origin {
            EntryOrigin::Location(location) => self.path_map.path(location),
            EntryOrigin::Chain(chain) => chain.clone(),
        }
    }
}

/// Maps each npm install location to the location of its immediate parent.
///
/// Top-level packages map to the empty (root) location.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyPathMap {
    parents: HashMap<String, String>,
}

impl DependencyPathMap {
    /// Builds the map from `packages` keys. The root key (`""`) and keys
    /// outside `node_modules/` are ignored.
    pub fn build<'a>(locations: impl IntoIterator<Item = &'a str>) -> Self {
        let parents = locations
            .into_iter()
            .filter(|location| location.starts_with(MODULES_PREFIX))
            .map(|location| (location.to_string(), parent_location(location).to_string()))
            .collect();
        Self { parents }
    }

    pub fn parent(&self, location: &str) -> Option<&str> {
        self.parents.get(location).map(String::as_str)
    }

    /// Walks from `location` up to the root and returns the package names in
    /// root-to-leaf order.
    ///
    /// ```
    /// use npm_auditor::lockfile::DependencyPathMap;
    ///
    /// let map = DependencyPathMap::build(["node_modules/a", "node_modules/a/node_modules/b"]);
    /// assert_eq!(map.path("node_modules/a/node_modules/b"), vec!["a", "b"]);
    /// ```
    pub fn path(&self, location: &str) -> Vec<String> {
        let mut path = Vec::new();
        let mut current = Some(location);

        while let Some(location) = current.filter(|l| !l.is_empty()) {
            path.push(package_name(location).to_string());
            current = self.parent(location);
        }

        path.reverse();
        path
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}

/// Location of the directory that contains `location`'s `node_modules`.
fn parent_location(location: &str) -> &str {
    match location.rfind(NESTED_SEPARATOR) {
        Some(pos) => &location[..pos],
        None => "",
    }
}

/// Package name of an install location: everything after the last `node_modules/`.
fn package_name(location: &str) -> &str {
    match location.rfind(MODULES_PREFIX) {
        Some(pos) => &location[pos + MODULES_PREFIX.len()..],
        None => location,
    }
}
