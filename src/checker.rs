use crate::model::{BaselineEntry, CheckResult, FileRef, IssueKind};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Size of the head/tail probe reads for files without a baseline entry.
const PROBE_LENGTH: usize = 8192;

/// Capability interface for integrity checks. Implementations must be pure
/// over file content/metadata plus the baseline entry: no shared mutable
/// state between concurrent invocations.
///
/// Fail closed: "not found" maps to `Missing`, every other read error maps to
/// `Unreadable`. A partial read must never produce a false OK.
pub trait IntegrityChecker: Send + Sync {
    fn check(&self, file: &FileRef, baseline: Option<&BaselineEntry>) -> CheckResult;
}

#[derive(Debug, Clone, PartialEq)]
struct CachedHash {
    size: u64,
    modified: Option<DateTime<Utc>>,
    hash: String,
}

/// Default checker: compares size and blake3 content hash against the
/// baseline entry, or runs a readability probe when no entry exists.
///
/// The content hash is a full-stream blake3 digest, hex encoded; the one
/// fixed algorithm for the whole crate. Hashes are cached per path keyed on
/// (size, mtime) so an idempotent re-scan over an unchanged tree skips the
/// re-read.
#[derive(Debug, Default)]
pub struct BaselineChecker {
    hash_cache: DashMap<PathBuf, CachedHash>,
}

impl BaselineChecker {
    pub fn new() -> Self {
        Self::default()
    }

    fn content_hash(&self, file: &FileRef) -> io::Result<String> {
        if let Some(cached) = self.hash_cache.get(&file.path) {
            if cached.size == file.size && cached.modified == file.modified {
                return Ok(cached.hash.clone());
            }
        }

        let hash = hash_file(&file.path)?;
        self.hash_cache.insert(
            file.path.clone(),
            CachedHash {
                size: file.size,
                modified: file.modified,
                hash: hash.clone(),
            },
        );
        Ok(hash)
    }

    /// Cheap readability probe for files the baseline does not track, from
    /// the original maintenance tool: read the head, and for large files seek
    /// to and read the tail. Zero-byte files are flagged.
    fn probe(&self, file: &FileRef) -> CheckResult {
        if file.size == 0 {
            return CheckResult::issue(IssueKind::Unknown, "zero-byte file");
        }

        let result = (|| -> io::Result<()> {
            let mut f = File::open(&file.path)?;
            let mut buf = vec![0u8; PROBE_LENGTH.min(file.size as usize)];
            f.read_exact(&mut buf)?;
            if file.size > PROBE_LENGTH as u64 {
                f.seek(SeekFrom::End(-(PROBE_LENGTH as i64)))?;
                f.read_exact(&mut buf)?;
            }
            Ok(())
        })();

        match result {
            Ok(()) => CheckResult::ok(),
            Err(err) => unreadable(&err),
        }
    }
}

impl IntegrityChecker for BaselineChecker {
    fn check(&self, file: &FileRef, baseline: Option<&BaselineEntry>) -> CheckResult {
        let metadata = match std::fs::metadata(&file.path) {
            Ok(m) => m,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return CheckResult::issue(IssueKind::Missing, "file not found");
            }
            Err(err) => return unreadable(&err),
        };

        let Some(entry) = baseline else {
            return self.probe(file);
        };

        // Size tier first: a length mismatch needs no hashing.
        if metadata.len() != entry.size {
            return CheckResult::issue(
                IssueKind::SizeMismatch,
                format!("expected {} bytes, found {}", entry.size, metadata.len()),
            );
        }

        if let Some(expected) = &entry.hash {
            let actual = match self.content_hash(file) {
                Ok(h) => h,
                Err(err) => return unreadable(&err),
            };
            if &actual != expected {
                return CheckResult::issue(
                    IssueKind::HashMismatch,
                    format!("expected {}, found {}", expected, actual),
                );
            }
        }

        CheckResult::ok()
    }
}

fn unreadable(err: &io::Error) -> CheckResult {
    CheckResult::issue(IssueKind::Unreadable, err.to_string())
}

/// Streaming blake3 over the full byte stream, lowercase hex.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut f = File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    io::copy(&mut f, &mut hasher)?;
    Ok(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CheckVerdict;
    use std::fs;

    fn file_ref(path: &Path, rel: &str) -> FileRef {
        let metadata = fs::metadata(path).ok();
        FileRef {
            path: path.to_path_buf(),
            rel_path: PathBuf::from(rel),
            size: metadata.as_ref().map(|m| m.len()).unwrap_or(0),
            modified: metadata
                .as_ref()
                .and_then(|m| m.modified().ok())
                .map(DateTime::<Utc>::from),
        }
    }

    fn entry_for(path: &Path) -> BaselineEntry {
        BaselineEntry {
            size: fs::metadata(path).unwrap().len(),
            hash: Some(hash_file(path).unwrap()),
            version: None,
        }
    }

    #[test]
    fn matching_file_is_ok() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.dat");
        fs::write(&path, b"hello world").unwrap();

        let checker = BaselineChecker::new();
        let entry = entry_for(&path);
        let result = checker.check(&file_ref(&path, "a.dat"), Some(&entry));
        assert_eq!(result.verdict, CheckVerdict::Ok);
    }

    #[test]
    fn absent_file_is_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("gone.dat");

        let checker = BaselineChecker::new();
        let entry = BaselineEntry {
            size: 10,
            hash: None,
            version: None,
        };
        let result = checker.check(&file_ref(&path, "gone.dat"), Some(&entry));
        assert_eq!(result.verdict, CheckVerdict::Issue(IssueKind::Missing));
    }

    #[test]
    fn size_mismatch_short_circuits_before_hashing() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.dat");
        fs::write(&path, b"short").unwrap();

        let checker = BaselineChecker::new();
        let entry = BaselineEntry {
            size: 9999,
            hash: Some("not-a-real-hash".to_string()),
            version: None,
        };
        let result = checker.check(&file_ref(&path, "a.dat"), Some(&entry));
        assert_eq!(result.verdict, CheckVerdict::Issue(IssueKind::SizeMismatch));
    }

    #[test]
    fn content_change_is_hash_mismatch() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.dat");
        fs::write(&path, b"original!!!").unwrap();
        let entry = entry_for(&path);
        fs::write(&path, b"tampered!!!").unwrap(); // same length

        let checker = BaselineChecker::new();
        let result = checker.check(&file_ref(&path, "a.dat"), Some(&entry));
        assert_eq!(result.verdict, CheckVerdict::Issue(IssueKind::HashMismatch));
    }

    #[test]
    fn unbaselined_zero_byte_file_is_flagged() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("empty.dat");
        fs::write(&path, b"").unwrap();

        let checker = BaselineChecker::new();
        let result = checker.check(&file_ref(&path, "empty.dat"), None);
        assert_eq!(result.verdict, CheckVerdict::Issue(IssueKind::Unknown));
        assert_eq!(result.detail.as_deref(), Some("zero-byte file"));
    }

    #[test]
    fn unbaselined_readable_file_is_ok() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("big.bin");
        fs::write(&path, vec![0x5a; PROBE_LENGTH * 3]).unwrap();

        let checker = BaselineChecker::new();
        let result = checker.check(&file_ref(&path, "big.bin"), None);
        assert_eq!(result.verdict, CheckVerdict::Ok);
    }
}
