//! Input errors that end an audit run before any traversal happens.
//!
//! Everything that goes wrong *during* traversal (missing metadata, failed
//! queries, unscorable vectors) degrades into warnings instead.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("package '{0}' not found in the npm registry")]
    PackageNotFound(String),

    #[error("version {version} not found in registry for package '{name}'")]
    VersionNotFound { name: String, version: String },

    #[error("could not determine a version to audit for '{0}'")]
    NoVersion(String),

    #[error("could not fetch '{name}' from the npm registry: {reason}")]
    RegistryUnavailable { name: String, reason: String },

    #[error("no packages could be read from the lock file: {0}")]
    InvalidLockFile(String),

    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("unsupported file type: {0} (expected .json, .lock, .yaml or .yml)")]
    UnsupportedFileType(String),

    #[error("file is empty: {}", .0.display())]
    EmptyFile(PathBuf),

    #[error("{what} too large: {size} bytes (max: {max})")]
    TooLarge {
        what: String,
        size: u64,
        max: u64,
    },

    #[error("no input received from stdin")]
    EmptyStdin,

    #[error("{0} contains invalid UTF-8")]
    InvalidUtf8(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
