use super::{LockEntry, ParsedLock};
use crate::model::Category;

pub(super) fn parse(content: &str) -> ParsedLock {
    let lines: Vec<&str> = content.lines().collect();
    let mut parsed = ParsedLock::default();
    let mut i = 0;

    while i < lines.len() {
        let Some(name) = entry_header(lines[i]) else {
            i += 1;
            continue;
        };

        // Attribute lines are indented; a blank or unindented line ends the entry.
        i += 1;
        let mut version = None;
        while i < lines.len() && is_indented(lines[i]) && !lines[i].trim().is_empty() {
            if version.is_none() {
                version = version_attribute(lines[i].trim());
            }
            i += 1;
        }

        if let Some(version) = version {
            parsed
                .entries
                .push(LockEntry::direct(name, version, Category::Mandatory));
        }
    }

    // Comment-only and metadata-only locks are what yarn writes for a project
    // without dependencies.
    if parsed.entries.is_empty() && lines.iter().any(|line| is_unrecognized(line)) {
        parsed.problems.push("No packages found in yarn.lock".to_string());
    }
    parsed
}

/// A top-level line that is neither a comment, blank, nor the berry `__metadata` key.
fn is_unrecognized(line: &str) -> bool {
    !is_indented(line)
        && !line.trim().is_empty()
        && !line.starts_with('#')
        && line.trim_end() != "__metadata:"
}

fn is_indented(line: &str) -> bool {
    line.starts_with(' ') || line.starts_with('\t')
}

/// Package name of an entry header such as `"@babel/core@^7.0.0", "@babel/core@^7.1.0":`.
fn entry_header(line: &str) -> Option<String> {
    if is_indented(line) || line.starts_with('#') {
        return None;
    }
    let header = line.trim().strip_suffix(':')?;
    if !header.contains('@') {
        return None;
    }

    let first = header.split(',').next()?.trim().trim_matches('"');
    package_name(first)
}

/// Strips the range from a specifier, keeping the scope of scoped packages.
fn package_name(specifier: &str) -> Option<String> {
    let name = match specifier.strip_prefix('@') {
        Some(scoped) => format!("@{}", scoped.split('@').next()?),
        None => specifier.split('@').next()?.to_string(),
    };
    (!name.is_empty() && name != "@").then_some(name)
}

/// Parses `version "1.2.3"` (classic) or `version: 1.2.3` (berry).
fn version_attribute(line: &str) -> Option<String> {
    let value = line
        .strip_prefix("version:")
        .or_else(|| line.strip_prefix("version "))?;
    let version = value.trim().trim_matches('"').trim_matches('\'');
    (!version.is_empty()).then(|| version.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLASSIC: &str = r#"# THIS IS AN AUTOGENERATED FILE. DO NOT EDIT THIS FILE DIRECTLY.
# yarn lockfile v1


"@babel/code-frame@^7.0.0", "@babel/code-frame@^7.10.4":
  version "7.12.13"
  resolved "https://registry.yarnpkg.com/@babel/code-frame/-/code-frame-7.12.13.tgz"
  dependencies:
    "@babel/highlight" "^7.12.13"

lodash@^4.17.15, lodash@^4.17.19:
  version "4.17.20"
  resolved "https://registry.yarnpkg.com/lodash/-/lodash-4.17.20.tgz"

no-version@^1.0.0:
  resolved "https://example.com/no-version.tgz"
"#;

    #[test]
    fn test_classic_lockfile() {
        let parsed = parse(CLASSIC);
        assert!(parsed.problems.is_empty());

        let keys: Vec<String> = parsed.entries.iter().map(|e| e.key().to_string()).collect();
        assert_eq!(keys, vec!["@babel/code-frame@7.12.13", "lodash@4.17.20"]);
        assert!(parsed
            .entries
            .iter()
            .all(|e| e.category == Category::Mandatory));
        assert_eq!(parsed.path_of(&parsed.entries[1]), vec!["lodash"]);
    }

    #[test]
    fn test_berry_lockfile() {
        let parsed = parse(
            "__metadata:\n  version: 6\n\n\"lodash@npm:^4.17.21\":\n  version: 4.17.21\n  resolution: \"lodash@npm:4.17.21\"\n",
        );
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(parsed.entries[0].name, "lodash");
        assert_eq!(parsed.entries[0].version, "4.17.21");
    }

    #[test]
    fn test_adjacent_entries_without_blank_line() {
        let parsed = parse("a@^1.0.0:\n  version \"1.0.0\"\nb@^2.0.0:\n  version \"2.0.0\"\n");
        assert_eq!(parsed.entries.len(), 2);
        assert_eq!(parsed.entries[1].name, "b");
    }

    #[test]
    fn test_package_name() {
        assert_eq!(package_name("lodash@^4.0.0").as_deref(), Some("lodash"));
        assert_eq!(package_name("@types/node@*").as_deref(), Some("@types/node"));
        assert_eq!(package_name("@babel/core@npm:7.0.0").as_deref(), Some("@babel/core"));
        assert_eq!(package_name("@"), None);
    }

    #[test]
    fn test_garbage_is_reported() {
        let parsed = parse("this is not a lockfile");
        assert!(parsed.entries.is_empty());
        assert_eq!(parsed.problems.len(), 1);
    }

    #[test]
    fn test_lock_without_dependencies() {
        let classic = parse("# THIS IS AN AUTOGENERATED FILE. DO NOT EDIT THIS FILE DIRECTLY.\n# yarn lockfile v1\n\n\n");
        assert!(classic.entries.is_empty());
        assert!(classic.problems.is_empty());

        let berry = parse("# This file is generated by running \"yarn install\"\n\n__metadata:\n  version: 6\n  cacheKey: 8\n");
        assert!(berry.entries.is_empty());
        assert!(berry.problems.is_empty());
    }
}
