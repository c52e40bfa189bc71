use crate::config::RepairConfig;
use crate::error::{Error, RepairError};
use crate::model::{ActionKind, ActionStatus, RepairAction, RepairCounters};
use crate::planner::HandlerRegistry;
use crate::report::ReportSink;
use crate::scheduler::CancellationToken;
use rayon::prelude::*;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Applies planned repair actions with per-action isolation.
///
/// Actions run on a dedicated rayon pool sized from config (repairs tend to
/// be I/O or network heavy, so this is usually smaller than the scan pool).
/// Failures are classified by the handler: recoverable errors retry up to
/// `max_attempts` with exponential backoff, terminal errors and handler
/// panics fail immediately with the needs-manual-review flag. Handlers that
/// are not retry-safe get exactly one attempt. One action's failure never
/// blocks or aborts the others, and after cancellation no new action starts.
///
/// The executor only consumes issue snapshots carried by the actions; it
/// never writes back into the issue registry.
pub struct RepairExecutor {
    pool: rayon::ThreadPool,
    max_attempts: u32,
    backoff_base: Duration,
}

impl RepairExecutor {
    pub fn new(config: &RepairConfig) -> Result<Self, Error> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_count.max(1))
            .thread_name(|i| format!("sysmend-repair-{}", i))
            .build()
            .map_err(|e| Error::Other(format!("repair pool: {}", e)))?;
        Ok(Self {
            pool,
            max_attempts: config.max_attempts.max(1),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
        })
    }

    /// Drives every action to a terminal state and returns them in input
    /// order, emitting each outcome to the sink as it lands.
    pub fn execute(
        &self,
        actions: Vec<RepairAction>,
        handlers: &HandlerRegistry,
        cancel: &CancellationToken,
        sink: &dyn ReportSink,
    ) -> Vec<RepairAction> {
        self.pool.install(|| {
            actions
                .into_par_iter()
                .map(|mut action| {
                    self.run_action(&mut action, handlers, cancel);
                    sink.on_action_complete(&action);
                    action
                })
                .collect()
        })
    }

    fn run_action(
        &self,
        action: &mut RepairAction,
        handlers: &HandlerRegistry,
        cancel: &CancellationToken,
    ) {
        if action.kind == ActionKind::Skip {
            action.status = ActionStatus::Skipped;
            return;
        }
        if cancel.is_canceled() {
            action.status = ActionStatus::Canceled;
            return;
        }

        let Some(handler) = handlers.get(action.kind) else {
            // Planner only plans registered kinds; a miss here means the
            // registry changed between planning and execution.
            action.status = ActionStatus::Failed;
            action.needs_manual_review = true;
            action.last_error = Some(format!("no handler registered for {}", action.kind));
            return;
        };

        let max_attempts = if handler.retry_safe() {
            self.max_attempts
        } else {
            1
        };

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                if cancel.is_canceled() {
                    action.status = ActionStatus::Canceled;
                    return;
                }
                // Exponential: base, 2*base, 4*base, ...
                let backoff = self.backoff_base * 2u32.saturating_pow(attempt - 2);
                thread::sleep(backoff);
            }

            action.status = ActionStatus::Running;
            action.attempts = attempt;
            debug!(
                "repair {} for {} (attempt {}/{})",
                action.kind,
                action.issue.path.display(),
                attempt,
                max_attempts
            );

            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| handler.execute(&action.issue)));

            match outcome {
                Ok(Ok(())) => {
                    action.status = ActionStatus::Succeeded;
                    return;
                }
                Ok(Err(RepairError::Recoverable(msg))) => {
                    warn!(
                        "repair {} for {} failed (attempt {}): {}",
                        action.kind,
                        action.issue.path.display(),
                        attempt,
                        msg
                    );
                    action.last_error = Some(msg);
                }
                Ok(Err(RepairError::Terminal(msg))) => {
                    action.status = ActionStatus::Failed;
                    action.needs_manual_review = true;
                    action.last_error = Some(msg);
                    return;
                }
                Err(_) => {
                    // Crash mid-action: side effects unknown, hand it to a
                    // human instead of retrying blindly.
                    action.status = ActionStatus::Failed;
                    action.needs_manual_review = true;
                    action.last_error = Some("handler panicked".to_string());
                    return;
                }
            }
        }

        action.status = ActionStatus::Failed;
        if !handler.retry_safe() {
            action.needs_manual_review = true;
        }
    }
}

pub fn tally(actions: &[RepairAction]) -> RepairCounters {
    let mut counters = RepairCounters {
        planned: actions.len(),
        ..RepairCounters::default()
    };
    for action in actions {
        match action.status {
            ActionStatus::Succeeded => counters.succeeded += 1,
            ActionStatus::Failed => counters.failed += 1,
            ActionStatus::Skipped => counters.skipped += 1,
            ActionStatus::Canceled => counters.canceled += 1,
            ActionStatus::Pending | ActionStatus::Running => {}
        }
        if action.needs_manual_review {
            counters.needs_manual_review += 1;
        }
    }
    counters
}
