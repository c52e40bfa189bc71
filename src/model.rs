use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A file captured during enumeration. Immutable once captured for a scan
/// pass; `rel_path` is the path relative to its scan root and doubles as the
/// baseline key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRef {
    pub path: PathBuf,
    pub rel_path: PathBuf,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// Expected state of one file, keyed by relative path in the baseline map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineEntry {
    pub size: u64,
    pub hash: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IssueKind {
    Missing,
    SizeMismatch,
    HashMismatch,
    Unreadable,
    Unknown,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IssueKind::Missing => "missing",
            IssueKind::SizeMismatch => "size-mismatch",
            IssueKind::HashMismatch => "hash-mismatch",
            IssueKind::Unreadable => "unreadable",
            IssueKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// An anomaly discovered by a checker. Owned by the issue registry until
/// repaired or the session ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub path: PathBuf,
    pub rel_path: PathBuf,
    pub kind: IssueKind,
    pub detail: Option<String>,
    pub detected_at: DateTime<Utc>,
    pub baseline: Option<BaselineEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckVerdict {
    Ok,
    Issue(IssueKind),
}

/// Outcome of a single integrity check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub verdict: CheckVerdict,
    pub detail: Option<String>,
}

impl CheckResult {
    pub fn ok() -> Self {
        Self {
            verdict: CheckVerdict::Ok,
            detail: None,
        }
    }

    pub fn issue(kind: IssueKind, detail: impl Into<String>) -> Self {
        Self {
            verdict: CheckVerdict::Issue(kind),
            detail: Some(detail.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Redownload,
    RestoreBackup,
    InvokeExternalTool,
    Skip,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActionKind::Redownload => "redownload",
            ActionKind::RestoreBackup => "restore-backup",
            ActionKind::InvokeExternalTool => "invoke-external-tool",
            ActionKind::Skip => "skip",
        };
        f.write_str(s)
    }
}

/// Skipped is the terminal state of a `Skip` plan; Canceled is terminal and
/// distinct from Failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
    Canceled,
}

/// A planned corrective action for one issue. Status transitions are the only
/// mutation; side effects happen only while `Running`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairAction {
    pub issue: Issue,
    pub kind: ActionKind,
    pub status: ActionStatus,
    pub attempts: u32,
    pub needs_manual_review: bool,
    pub skip_reason: Option<String>,
    pub last_error: Option<String>,
}

impl RepairAction {
    pub fn pending(issue: Issue, kind: ActionKind) -> Self {
        Self {
            issue,
            kind,
            status: ActionStatus::Pending,
            attempts: 0,
            needs_manual_review: false,
            skip_reason: None,
            last_error: None,
        }
    }

    pub fn skip(issue: Issue, reason: impl Into<String>) -> Self {
        Self {
            issue,
            kind: ActionKind::Skip,
            status: ActionStatus::Pending,
            attempts: 0,
            needs_manual_review: false,
            skip_reason: Some(reason.into()),
            last_error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self.status, ActionStatus::Pending | ActionStatus::Running)
    }
}

/// Final accounting for one enumerated file. Every file gets exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Disposition {
    Ok,
    Issue(IssueKind),
    Canceled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanWarningKind {
    SymlinkCycle,
    PermissionDenied,
    WalkError,
}

/// Non-fatal event recorded during enumeration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanWarning {
    pub path: PathBuf,
    pub kind: ScanWarningKind,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ScanCounters {
    pub scanned: usize,
    pub ok: usize,
    pub issues: usize,
    pub canceled: usize,
    pub warnings: usize,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RepairCounters {
    pub planned: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub canceled: usize,
    pub needs_manual_review: usize,
}
