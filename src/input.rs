//! Where the audit input comes from.
//!
//! A target is either a package name, a lock file on disk, or `-` for lock-file
//! content piped through stdin. Files and stdin are size-limited and must be
//! UTF-8 text.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::AuditError;
use crate::lockfile::LockFormat;

/// Largest lock file read from disk.
pub const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Largest lock-file content accepted on stdin.
pub const MAX_STDIN_SIZE: u64 = 50 * 1024 * 1024;

const ALLOWED_EXTENSIONS: &[&str] = &["json", "lock", "yaml", "yml"];

/// What the user asked to audit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Package(String),
    LockFile(PathBuf),
    Stdin,
}

impl Target {
    /// `-` means stdin; an existing file is a lock file; anything else is a
    /// package name.
    pub fn parse(arg: &str) -> Self {
        if arg == "-" {
            Target::Stdin
        } else if Path::new(arg).is_file() {
            Target::LockFile(PathBuf::from(arg))
        } else {
            Target::Package(arg.to_string())
        }
    }

    /// Label used for the report when the input does not name itself.
    pub fn label(&self) -> String {
        match self {
            Target::Package(name) => name.clone(),
            Target::LockFile(path) => path.display().to_string(),
            Target::Stdin => "stdin".to_string(),
        }
    }

    /// Lock dialect implied by the target's file name, if any.
    pub fn detected_format(&self) -> Option<LockFormat> {
        match self {
            Target::LockFile(path) => LockFormat::detect(path),
            _ => None,
        }
    }
}

/// Validates and reads a lock file.
pub fn read_lock_file(path: &Path) -> Result<String, AuditError> {
    if !path.is_file() {
        return Err(AuditError::FileNotFound(path.to_path_buf()));
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(AuditError::UnsupportedFileType(format!(".{}", extension)));
    }

    let io_error = |source| AuditError::Io {
        path: path.display().to_string(),
        source,
    };
    let size = fs::metadata(path).map_err(io_error)?.len();
    if size > MAX_FILE_SIZE {
        return Err(AuditError::TooLarge {
            what: "File".to_string(),
            size,
            max: MAX_FILE_SIZE,
        });
    }
    if size == 0 {
        return Err(AuditError::EmptyFile(path.to_path_buf()));
    }

    let bytes = fs::read(path).map_err(io_error)?;
    String::from_utf8(bytes).map_err(|_| AuditError::InvalidUtf8(path.display().to_string()))
}

/// Reads lock-file content from stdin.
pub fn read_stdin() -> Result<String, AuditError> {
    read_limited(std::io::stdin().lock(), MAX_STDIN_SIZE)
}

fn read_limited(reader: impl Read, max: u64) -> Result<String, AuditError> {
    let mut bytes = Vec::new();
    reader
        .take(max + 1)
        .read_to_end(&mut bytes)
        .map_err(|source| AuditError::Io {
            path: "stdin".to_string(),
            source,
        })?;

    if bytes.len() as u64 > max {
        return Err(AuditError::TooLarge {
            what: "stdin input".to_string(),
            size: bytes.len() as u64,
            max,
        });
    }

    let content = String::from_utf8(bytes).map_err(|_| AuditError::InvalidUtf8("stdin".to_string()))?;
    if content.trim().is_empty() {
        return Err(AuditError::EmptyStdin);
    }
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content).unwrap();
        path
    }

    #[test]
    fn test_target_parse() {
        let dir = TempDir::new().unwrap();
        let lock = write(&dir, "yarn.lock", b"a@1:\n  version \"1.0.0\"\n");

        assert_eq!(Target::parse("-"), Target::Stdin);
        assert_eq!(Target::parse("lodash"), Target::Package("lodash".into()));
        assert_eq!(Target::parse("@types/node"), Target::Package("@types/node".into()));

        let target = Target::parse(lock.to_str().unwrap());
        assert_eq!(target, Target::LockFile(lock.clone()));
        assert_eq!(target.detected_format(), Some(LockFormat::Yarn));
        assert_eq!(Target::Stdin.label(), "stdin");
    }

    #[test]
    fn test_read_lock_file() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "package-lock.json", br#"{"packages":{}}"#);
        assert_eq!(read_lock_file(&path).unwrap(), r#"{"packages":{}}"#);
    }

    #[test]
    fn test_read_lock_file_rejections() {
        let dir = TempDir::new().unwrap();

        let missing = dir.path().join("nope.json");
        assert!(matches!(read_lock_file(&missing), Err(AuditError::FileNotFound(_))));

        let text = write(&dir, "notes.txt", b"hello");
        assert!(matches!(
            read_lock_file(&text),
            Err(AuditError::UnsupportedFileType(ext)) if ext == ".txt"
        ));

        let empty = write(&dir, "empty.json", b"");
        assert!(matches!(read_lock_file(&empty), Err(AuditError::EmptyFile(_))));

        let binary = write(&dir, "bad.lock", &[0xff, 0xfe, 0x00]);
        assert!(matches!(read_lock_file(&binary), Err(AuditError::InvalidUtf8(_))));
    }

    #[test]
    fn test_extension_is_case_insensitive() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "PNPM-LOCK.YAML", b"packages:\n");
        assert!(read_lock_file(&path).is_ok());
    }

    #[test]
    fn test_read_limited() {
        assert_eq!(read_limited(&b"{}"[..], 10).unwrap(), "{}");
        assert!(matches!(read_limited(&b"  \n\t"[..], 10), Err(AuditError::EmptyStdin)));
        assert!(matches!(
            read_limited(&b"0123456789abc"[..], 10),
            Err(AuditError::TooLarge { size: 11, max: 10, .. })
        ));
    }
}
