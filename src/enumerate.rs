use crate::model::{FileRef, ScanWarning, ScanWarningKind};
use crate::scheduler::CancellationToken;
use ahash::AHashSet;
use chrono::{DateTime, Utc};
use glob::Pattern;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{error, warn};

/// Produces the set of files to examine from the configured scan roots,
/// honoring glob include/exclude rules.
///
/// The walk is lazy (files are handed to the caller one at a time, so a
/// bounded downstream queue applies backpressure directly), finite
/// (symlink-cycle detection via canonical directory identities), and
/// restartable (`run` takes `&self` and builds fresh state per pass).
/// Permission-denied directories and cycles are recorded as warnings, never
/// session-fatal.
pub struct PathEnumerator {
    roots: Vec<PathBuf>,
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

/// What one enumeration pass saw: non-fatal warnings plus the set of
/// relative paths visited under the primary root. The baseline resolves
/// against the primary root only, so a same-named file under a secondary
/// root must not mask a missing primary copy during the baseline sweep.
#[derive(Debug, Default)]
pub struct EnumerationOutcome {
    pub warnings: Vec<ScanWarning>,
    pub visited: AHashSet<PathBuf>,
}

fn compile_patterns(globs: &[String]) -> Vec<Pattern> {
    globs
        .iter()
        .filter_map(|glob| match Pattern::new(glob) {
            Ok(p) => Some(p),
            Err(e) => {
                error!("Invalid glob pattern '{}': {}", glob, e);
                None
            }
        })
        .collect()
}

impl PathEnumerator {
    pub fn new(roots: &[String], include: &[String], exclude: &[String]) -> Self {
        Self {
            roots: roots.iter().map(PathBuf::from).collect(),
            include: compile_patterns(include),
            exclude: compile_patterns(exclude),
        }
    }

    /// The first configured root; baseline-relative paths resolve against it.
    pub fn primary_root(&self) -> Option<&Path> {
        self.roots.first().map(PathBuf::as_path)
    }

    /// Walks all roots in order, calling `emit` for every eligible file.
    /// `emit` returning `false` stops the pass (the consumer went away).
    /// Entries within a directory are visited in name order so a fixed
    /// filesystem snapshot enumerates deterministically.
    pub fn run<F>(&self, cancel: &CancellationToken, emit: &mut F) -> EnumerationOutcome
    where
        F: FnMut(FileRef) -> bool,
    {
        let mut outcome = EnumerationOutcome::default();
        let mut visited_dirs: AHashSet<PathBuf> = AHashSet::new();

        for root in &self.roots {
            if cancel.is_canceled() {
                break;
            }
            let keep_going = self.walk(root, root, &mut visited_dirs, &mut outcome, cancel, emit);
            if !keep_going {
                break;
            }
        }

        outcome
    }

    fn walk<F>(
        &self,
        root: &Path,
        dir: &Path,
        visited_dirs: &mut AHashSet<PathBuf>,
        outcome: &mut EnumerationOutcome,
        cancel: &CancellationToken,
        emit: &mut F,
    ) -> bool
    where
        F: FnMut(FileRef) -> bool,
    {
        // Canonical identity guards against symlink cycles: revisiting a
        // directory we have already walked is skipped, not fatal.
        let canonical = match fs::canonicalize(dir) {
            Ok(c) => c,
            Err(err) => {
                outcome.warnings.push(walk_warning(dir, &err));
                return true;
            }
        };
        if !visited_dirs.insert(canonical) {
            warn!("Symlink cycle at {}, skipping", dir.display());
            outcome.warnings.push(ScanWarning {
                path: dir.to_path_buf(),
                kind: ScanWarningKind::SymlinkCycle,
                detail: "directory already visited in this pass".to_string(),
            });
            return true;
        }

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                outcome.warnings.push(walk_warning(dir, &err));
                return true;
            }
        };

        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in entries {
            match entry {
                Ok(entry) => paths.push(entry.path()),
                Err(err) => outcome.warnings.push(walk_warning(dir, &err)),
            }
        }
        paths.sort();

        for path in paths {
            if cancel.is_canceled() {
                return false;
            }

            if self.exclude.iter().any(|p| p.matches_path(&path)) {
                continue;
            }

            if path.is_dir() {
                if !self.walk(root, &path, visited_dirs, outcome, cancel, emit) {
                    return false;
                }
                continue;
            }

            let metadata = match fs::symlink_metadata(&path) {
                Ok(m) => m,
                Err(err) => {
                    outcome.warnings.push(walk_warning(&path, &err));
                    continue;
                }
            };
            // Symlinked files are skipped; their targets are reached through
            // their real parent directory if it is inside a root.
            if metadata.file_type().is_symlink() {
                continue;
            }
            if !self.include.is_empty() && !self.include.iter().any(|p| p.matches_path(&path)) {
                continue;
            }

            let rel_path = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
            let modified: Option<DateTime<Utc>> =
                metadata.modified().ok().map(DateTime::<Utc>::from);
            if self.primary_root() == Some(root) {
                outcome.visited.insert(rel_path.clone());
            }

            let file_ref = FileRef {
                path: path.clone(),
                rel_path,
                size: metadata.len(),
                modified,
            };
            if !emit(file_ref) {
                return false;
            }
        }

        true
    }
}

fn walk_warning(path: &Path, err: &io::Error) -> ScanWarning {
    let kind = if err.kind() == io::ErrorKind::PermissionDenied {
        warn!("Access denied reading {}: {}", path.display(), err);
        ScanWarningKind::PermissionDenied
    } else {
        warn!("Error reading {}: {}", path.display(), err);
        ScanWarningKind::WalkError
    };
    ScanWarning {
        path: path.to_path_buf(),
        kind,
        detail: err.to_string(),
    }
}
