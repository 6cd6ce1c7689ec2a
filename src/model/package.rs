use serde::{Deserialize, Serialize};

/// How a package entered the dependency tree.
///
/// Category is inherited: once a node is `Dev`, everything below it is `Dev`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Root,
    Mandatory,
    Optional,
    Dev,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Root => "Root",
            Category::Mandatory => "Mandatory",
            Category::Optional => "Optional",
            Category::Dev => "Dev",
        }
    }

    /// Category of a child reached from a parent of this category.
    ///
    /// Children of the root take the group they were declared in; every other
    /// node passes its own category down.
    pub fn inherit(self, declared: Category) -> Category {
        match self {
            Category::Root => declared,
            other => other,
        }
    }

    /// Category of a lock-file entry given its parent's category and its own flags.
    pub fn from_lock_flags(parent: Option<Category>, dev: bool, optional: bool) -> Category {
        if parent == Some(Category::Dev) || dev {
            Category::Dev
        } else if optional {
            Category::Optional
        } else {
            Category::Mandatory
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A concrete `(name, version)` pair. Used as the visited-set and batch key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageKey {
    pub name: String,
    pub version: String,
}

impl PackageKey {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl std::fmt::Display for PackageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// A declared dependency: a name plus the range string it was requested with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRef {
    pub name: String,
    pub range: String,
}

impl PackageRef {
    pub fn new(name: impl Into<String>, range: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            range: range.into(),
        }
    }
}

/// A package whose version has been pinned down, with the category it was reached through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPackage {
    pub name: String,
    pub version: String,
    pub category: Category,
}

impl ResolvedPackage {
    pub fn key(&self) -> PackageKey {
        PackageKey::new(&self.name, &self.version)
    }
}
