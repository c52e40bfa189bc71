use crate::checker::hash_file;
use crate::error::RepairError;
use crate::model::{ActionKind, Issue};
use crate::planner::RepairHandler;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Restores a damaged file from a mirror tree laid out like the scan root.
///
/// Available when the issue's relative path exists under the backup root.
/// The backup copy is verified against the baseline entry before it is used;
/// a backup that itself contradicts the baseline is a terminal,
/// needs-manual-review failure, since restoring it would just trade one
/// corruption for another.
pub struct RestoreBackupHandler {
    backup_root: PathBuf,
}

impl RestoreBackupHandler {
    pub fn new(backup_root: impl Into<PathBuf>) -> Self {
        Self {
            backup_root: backup_root.into(),
        }
    }

    fn backup_path(&self, issue: &Issue) -> PathBuf {
        self.backup_root.join(&issue.rel_path)
    }

    fn verify_backup(&self, backup: &Path, issue: &Issue) -> Result<(), RepairError> {
        let Some(entry) = &issue.baseline else {
            return Ok(());
        };
        let metadata = fs::metadata(backup)
            .map_err(|e| RepairError::Recoverable(format!("backup unreadable: {}", e)))?;
        if metadata.len() != entry.size {
            return Err(RepairError::Terminal(format!(
                "backup copy of '{}' has wrong size ({} != {})",
                issue.rel_path.display(),
                metadata.len(),
                entry.size
            )));
        }
        if let Some(expected) = &entry.hash {
            let actual = hash_file(backup)
                .map_err(|e| RepairError::Recoverable(format!("backup unreadable: {}", e)))?;
            if &actual != expected {
                return Err(RepairError::Terminal(format!(
                    "backup copy of '{}' is itself corrupted",
                    issue.rel_path.display()
                )));
            }
        }
        Ok(())
    }
}

impl RepairHandler for RestoreBackupHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::RestoreBackup
    }

    fn is_available(&self, issue: &Issue) -> bool {
        self.backup_path(issue).is_file()
    }

    fn execute(&self, issue: &Issue) -> Result<(), RepairError> {
        let backup = self.backup_path(issue);
        self.verify_backup(&backup, issue)?;

        if let Some(parent) = issue.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| RepairError::Recoverable(format!("create dir: {}", e)))?;
        }
        fs::copy(&backup, &issue.path)
            .map_err(|e| RepairError::Recoverable(format!("copy failed: {}", e)))?;
        info!(
            "Restored {} from backup",
            issue.path.display()
        );
        Ok(())
    }
}
