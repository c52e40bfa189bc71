use crate::baseline::Baseline;
use crate::checker::{BaselineChecker, IntegrityChecker};
use crate::config::EngineConfig;
use crate::enumerate::PathEnumerator;
use crate::error::Error;
use crate::executor::{self, RepairExecutor};
use crate::model::{
    Disposition, Issue, RepairAction, RepairCounters, ScanCounters, ScanWarning,
};
use crate::planner::{HandlerRegistry, PolicyTable, RepairHandler, RepairPlanner};
use crate::registry::IssueRegistry;
use crate::report::ReportSink;
use crate::scheduler::{CancellationToken, ScanScheduler, SchedulerConfig};
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Read-only result of one scan session, handed to the planner and any
/// report sink.
#[derive(Debug)]
pub struct ScanReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub counters: ScanCounters,
    pub registry: IssueRegistry,
    pub dispositions: Vec<(PathBuf, Disposition)>,
    pub warnings: Vec<ScanWarning>,
    pub peak_queue_depth: usize,
}

/// Serialized form of a finished session, for resuming repair work in a later
/// process without re-scanning.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub counters: ScanCounters,
    pub issues: Vec<Issue>,
    pub dispositions: Vec<(PathBuf, Disposition)>,
    pub warnings: Vec<ScanWarning>,
    pub peak_queue_depth: usize,
}

impl ScanReport {
    pub fn save_snapshot(&self, path: &Path) -> Result<(), Error> {
        let snapshot = SessionSnapshot {
            started_at: self.started_at,
            finished_at: self.finished_at,
            counters: self.counters,
            issues: self.registry.all().to_vec(),
            dispositions: self.dispositions.clone(),
            warnings: self.warnings.clone(),
            peak_queue_depth: self.peak_queue_depth,
        };
        let file = File::create(path)?;
        bincode::serialize_into(BufWriter::new(file), &snapshot)
            .map_err(|e| Error::Snapshot(e.to_string()))
    }

    pub fn load_snapshot(path: &Path) -> Result<Self, Error> {
        let file = File::open(path)?;
        let snapshot: SessionSnapshot = bincode::deserialize_from(BufReader::new(file))
            .map_err(|e| Error::Snapshot(e.to_string()))?;
        Ok(Self {
            started_at: snapshot.started_at,
            finished_at: snapshot.finished_at,
            counters: snapshot.counters,
            registry: IssueRegistry::from_issues(snapshot.issues)?,
            dispositions: snapshot.dispositions,
            warnings: snapshot.warnings,
            peak_queue_depth: snapshot.peak_queue_depth,
        })
    }
}

#[derive(Debug)]
pub struct RepairReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub counters: RepairCounters,
    pub actions: Vec<RepairAction>,
}

#[derive(Debug)]
pub struct MaintenanceReport {
    pub scan: ScanReport,
    pub repair: RepairReport,
}

/// Orchestrates the full pipeline: enumerate → check → register → plan →
/// repair. Within a single file those stages are strictly sequential; across
/// files each phase runs on its own bounded worker pool.
pub struct MaintenanceEngine {
    config: EngineConfig,
    baseline: Arc<Baseline>,
    checker: Arc<dyn IntegrityChecker>,
    handlers: HandlerRegistry,
    policy: PolicyTable,
}

impl MaintenanceEngine {
    pub fn new(config: EngineConfig, baseline: Baseline) -> Self {
        Self {
            config,
            baseline: Arc::new(baseline),
            checker: Arc::new(BaselineChecker::new()),
            handlers: HandlerRegistry::new(),
            policy: PolicyTable::default(),
        }
    }

    /// Swap in a vendor-specific checker implementation.
    pub fn with_checker(mut self, checker: Arc<dyn IntegrityChecker>) -> Self {
        self.checker = checker;
        self
    }

    pub fn with_policy(mut self, policy: PolicyTable) -> Self {
        self.policy = policy;
        self
    }

    pub fn register_handler(&mut self, handler: Arc<dyn RepairHandler>) {
        self.handlers.register(handler);
    }

    pub fn scan(
        &self,
        cancel: &CancellationToken,
        sink: &dyn ReportSink,
    ) -> Result<ScanReport, Error> {
        let non_overlapping =
            crate::config::non_overlapping_directories(self.config.root_paths.clone());
        info!("Scanning roots: {:?}", non_overlapping);
        sink.on_scan_start();

        let enumerator = PathEnumerator::new(
            &non_overlapping,
            &self.config.include_patterns,
            &self.config.ignore_patterns,
        );
        let scheduler = ScanScheduler::new(SchedulerConfig::from(&self.config.scan));

        let outcome = scheduler.run(&enumerator, &self.checker, &self.baseline, cancel)?;
        let elapsed = (outcome.finished_at - outcome.started_at)
            .to_std()
            .unwrap_or_default();
        debug!(
            "Scan completed in {} seconds: {} files, {} issues",
            format!("{:.2}", elapsed.as_secs_f64()).green(),
            outcome.counters.scanned,
            outcome.counters.issues,
        );

        let report = ScanReport {
            started_at: outcome.started_at,
            finished_at: outcome.finished_at,
            counters: outcome.counters,
            registry: outcome.registry,
            dispositions: outcome.dispositions,
            warnings: outcome.warnings,
            peak_queue_depth: outcome.peak_queue_depth,
        };
        sink.on_scan_complete(&report);
        Ok(report)
    }

    /// Pure planning pass over the finished scan's issues.
    pub fn plan(&self, report: &ScanReport, sink: &dyn ReportSink) -> Vec<RepairAction> {
        let planner = RepairPlanner::new(self.policy.clone());
        let actions = planner.plan_all(report.registry.all(), &self.handlers);
        sink.on_plan_complete(&actions);
        actions
    }

    pub fn repair(
        &self,
        actions: Vec<RepairAction>,
        cancel: &CancellationToken,
        sink: &dyn ReportSink,
    ) -> Result<RepairReport, Error> {
        let started_at = Utc::now();
        let repair_executor = RepairExecutor::new(&self.config.repair)?;
        let actions = repair_executor.execute(actions, &self.handlers, cancel, sink);
        let finished_at = Utc::now();

        let counters = executor::tally(&actions);
        let elapsed = (finished_at - started_at).to_std().unwrap_or_default();
        debug!(
            "Repair completed in {} seconds: {} succeeded, {} failed",
            format!("{:.2}", elapsed.as_secs_f64()).green(),
            counters.succeeded,
            counters.failed,
        );

        let report = RepairReport {
            started_at,
            finished_at,
            counters,
            actions,
        };
        sink.on_repair_complete(&report);
        Ok(report)
    }

    /// Full scan-then-repair pass. The check result for every file is
    /// finalized before any repair for it can start, because the repair phase
    /// only begins once the scan rendezvous has completed.
    pub fn run(
        &self,
        cancel: &CancellationToken,
        sink: &dyn ReportSink,
    ) -> Result<MaintenanceReport, Error> {
        let scan = self.scan(cancel, sink)?;
        let actions = self.plan(&scan, sink);
        let repair = self.repair(actions, cancel, sink)?;
        Ok(MaintenanceReport { scan, repair })
    }
}
