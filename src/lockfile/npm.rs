use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::{DependencyPathMap, EntryOrigin, LockEntry, ParsedLock, MODULES_PREFIX};
use crate::model::Category;

/// Deepest `dependencies` nesting followed in a v1 lock file.
const MAX_NESTING: usize = 10;

#[derive(Deserialize)]
struct NpmLockFile {
    name: Option<String>,
    #[serde(rename = "lockfileVersion")]
    lockfile_version: Option<u64>,
    packages: Option<Map<String, Value>>,
    dependencies: Option<Map<String, Value>>,
}

/// One value of the v2/v3 `packages` map.
#[derive(Deserialize, Default)]
#[serde(default)]
struct PackageEntry {
    name: Option<String>,
    version: Option<String>,
    dev: bool,
    optional: bool,
}

/// One value of the v1 `dependencies` tree.
#[derive(Deserialize, Default)]
#[serde(default)]
struct DependencyEntry {
    version: Option<String>,
    dev: bool,
    optional: bool,
}

pub(super) fn parse(content: &str) -> ParsedLock {
    let lock: NpmLockFile = match serde_json::from_str(content) {
        Ok(lock) => lock,
        Err(e) => return ParsedLock::with_problem(format!("Invalid JSON in lock file: {}", e)),
    };
    debug!(version = ?lock.lockfile_version, "parsing npm lock file");

    if let Some(packages) = &lock.packages {
        let mut parsed = parse_packages(packages);
        parsed.root_name = parsed.root_name.or(lock.name);
        parsed
    } else if let Some(dependencies) = &lock.dependencies {
        let mut parsed = ParsedLock {
            root_name: lock.name,
            ..ParsedLock::default()
        };
        parse_dependency_tree(dependencies, &mut parsed);
        parsed
    } else {
        ParsedLock::with_problem("No 'packages' or 'dependencies' found in lock file")
    }
}

/// Flat `packages` map keyed by install location (lockfileVersion 2 and 3).
fn parse_packages(packages: &Map<String, Value>) -> ParsedLock {
    let mut parsed = ParsedLock {
        path_map: DependencyPathMap::build(packages.keys().map(String::as_str)),
        ..ParsedLock::default()
    };

    for (location, value) in packages {
        let Ok(entry) = serde_json::from_value::<PackageEntry>(value.clone()) else {
            debug!(%location, "skipping malformed package entry");
            continue;
        };

        if location.is_empty() {
            parsed.root_name = entry.name;
            continue;
        }
        // Workspace members and links outside node_modules
        if !location.starts_with(MODULES_PREFIX) {
            continue;
        }
        let Some(version) = entry.version else {
            continue;
        };

        parsed.entries.push(LockEntry {
            name: super::package_name(location).to_string(),
            version,
            category: Category::from_lock_flags(None, entry.dev, entry.optional),
            origin: EntryOrigin::Location(location.clone()),
        });
    }

    parsed
}

struct Pending<'a> {
    name: &'a str,
    value: &'a Value,
    parent: Option<Category>,
    parent_path: Vec<String>,
    depth: usize,
}

/// Nested `dependencies` tree (lockfileVersion 1), walked depth-first.
fn parse_dependency_tree(dependencies: &Map<String, Value>, parsed: &mut ParsedLock) {
    let mut stack: Vec<Pending> = dependencies
        .iter()
        .rev()
        .map(|(name, value)| Pending {
            name,
            value,
            parent: None,
            parent_path: Vec::new(),
            depth: 0,
        })
        .collect();

    while let Some(pending) = stack.pop() {
        let Ok(entry) = serde_json::from_value::<DependencyEntry>(pending.value.clone()) else {
            debug!(name = pending.name, "skipping malformed dependency entry");
            continue;
        };

        let category = Category::from_lock_flags(pending.parent, entry.dev, entry.optional);
        let mut path = pending.parent_path;
        path.push(pending.name.to_string());

        if let Some(version) = entry.version {
            parsed.entries.push(LockEntry {
                name: pending.name.to_string(),
                version,
                category,
                origin: EntryOrigin::Chain(path.clone()),
            });
        }

        if pending.depth >= MAX_NESTING {
            continue;
        }
        let depth = pending.depth + 1;
        for (name, value) in pending.value["dependencies"]
            .as_object()
            .into_iter()
            .flat_map(|children| children.iter().rev())
        {
            stack.push(Pending {
                name,
                value,
                parent: Some(category),
                parent_path: path.clone(),
                depth,
            });
        }
    }
}
