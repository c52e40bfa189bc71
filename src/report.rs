use crate::engine::{RepairReport, ScanReport};
use crate::model::RepairAction;
use tracing::info;

/// Consumer of scan and repair results.
///
/// The CLI implements this with tracing; embedders can render however they
/// like. All methods have default no-op implementations. Report formatting
/// itself is out of scope for this crate.
pub trait ReportSink: Send + Sync {
    fn on_scan_start(&self) {}
    fn on_scan_complete(&self, _report: &ScanReport) {}
    fn on_plan_complete(&self, _actions: &[RepairAction]) {}
    fn on_action_complete(&self, _action: &RepairAction) {}
    fn on_repair_complete(&self, _report: &RepairReport) {}
}

/// No-op sink for silent operation.
pub struct SilentSink;

impl ReportSink for SilentSink {}

/// Sink that narrates outcomes through tracing, used by the CLI.
pub struct LogSink;

impl ReportSink for LogSink {
    fn on_scan_start(&self) {
        info!("Scan started");
    }

    fn on_scan_complete(&self, report: &ScanReport) {
        let c = &report.counters;
        info!(
            "Scan complete: {} files, {} ok, {} issues, {} canceled, {} warnings",
            c.scanned, c.ok, c.issues, c.canceled, c.warnings
        );
    }

    fn on_plan_complete(&self, actions: &[RepairAction]) {
        info!("{} repair actions planned", actions.len());
    }

    fn on_action_complete(&self, action: &RepairAction) {
        info!(
            "{} for {}: {:?} after {} attempt(s)",
            action.kind,
            action.issue.path.display(),
            action.status,
            action.attempts
        );
    }

    fn on_repair_complete(&self, report: &RepairReport) {
        let c = &report.counters;
        info!(
            "Repair complete: {} planned, {} succeeded, {} failed, {} skipped, {} canceled, {} need manual review",
            c.planned, c.succeeded, c.failed, c.skipped, c.canceled, c.needs_manual_review
        );
    }
}
