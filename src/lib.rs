pub mod baseline;
pub mod checker;
pub mod cli;
pub mod config;
pub mod engine;
pub mod enumerate;
pub mod error;
pub mod executor;
pub mod handlers;
pub mod logging;
pub mod model;
pub mod planner;
pub mod registry;
pub mod report;
pub mod scheduler;

pub use baseline::Baseline;
pub use checker::{hash_file, BaselineChecker, IntegrityChecker};
pub use config::EngineConfig;
pub use engine::{MaintenanceEngine, MaintenanceReport, RepairReport, ScanReport};
pub use error::{Error, RepairError};
pub use model::{
    ActionKind, ActionStatus, BaselineEntry, Disposition, FileRef, Issue, IssueKind, RepairAction,
};
pub use planner::{HandlerRegistry, PolicyTable, RepairHandler, RepairPlanner};
pub use registry::IssueRegistry;
pub use report::{LogSink, ReportSink, SilentSink};
pub use scheduler::{CancellationToken, ScanScheduler, SchedulerConfig};
