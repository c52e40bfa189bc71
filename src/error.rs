use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Baseline manifest error: {0}")]
    Baseline(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("duplicate record for path '{0}' in one session")]
    DuplicatePath(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("{0}")]
    Other(String),
}

/// Failure classification for repair handlers. Recoverable errors are retried
/// per the executor's policy; terminal errors stop the action immediately and
/// flag it for manual review.
#[derive(Error, Debug)]
pub enum RepairError {
    #[error("recoverable: {0}")]
    Recoverable(String),

    #[error("terminal: {0}")]
    Terminal(String),
}
