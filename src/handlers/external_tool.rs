use crate::config::ExternalToolConfig;
use crate::error::RepairError;
use crate::model::{ActionKind, Issue};
use crate::planner::RepairHandler;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::info;

/// Invokes a configured external repair utility (a game client's
/// verify-integrity command, a runtime installer, and the like) for one file.
///
/// The literal `{path}` in an argument expands to the damaged file's path.
/// Declared not retry-safe: a partially completed tool run has unknown side
/// effects, so the executor gives it a single attempt.
pub struct ExternalToolHandler {
    program: PathBuf,
    args: Vec<String>,
}

impl ExternalToolHandler {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &ExternalToolConfig) -> Self {
        Self::new(&config.program, config.args.clone())
    }

    fn expand_args(&self, path: &Path) -> Vec<String> {
        let path = path.to_string_lossy();
        self.args
            .iter()
            .map(|arg| arg.replace("{path}", &path))
            .collect()
    }
}

impl RepairHandler for ExternalToolHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::InvokeExternalTool
    }

    fn is_available(&self, _issue: &Issue) -> bool {
        self.program.is_file()
    }

    fn retry_safe(&self) -> bool {
        false
    }

    fn execute(&self, issue: &Issue) -> Result<(), RepairError> {
        let args = self.expand_args(&issue.path);
        info!(
            "Invoking {} {:?} for {}",
            self.program.display(),
            args,
            issue.path.display()
        );

        let status = Command::new(&self.program)
            .args(&args)
            .status()
            .map_err(|e| RepairError::Recoverable(format!("tool launch failed: {}", e)))?;

        if !status.success() {
            return Err(RepairError::Recoverable(format!(
                "tool exited with {}",
                status
            )));
        }
        Ok(())
    }
}
