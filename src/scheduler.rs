use crate::baseline::Baseline;
use crate::checker::IntegrityChecker;
use crate::config::ScanConfig;
use crate::enumerate::PathEnumerator;
use crate::error::Error;
use crate::model::{
    BaselineEntry, CheckResult, CheckVerdict, Disposition, FileRef, Issue, IssueKind,
    ScanCounters, ScanWarning,
};
use crate::registry::IssueRegistry;
use ahash::AHashSet;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicIsize, AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Session-level cancellation flag, shared between enumeration, scan workers,
/// and the repair executor. Signaling is not an error: enumeration stops
/// producing, queued-but-undispatched files are recorded as canceled, and the
/// repair phase refuses to start new actions.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub worker_count: usize,
    pub per_file_timeout: Duration,
    pub max_pending_queue_depth: usize,
}

impl From<&ScanConfig> for SchedulerConfig {
    fn from(config: &ScanConfig) -> Self {
        Self {
            worker_count: config.worker_count.max(1),
            per_file_timeout: Duration::from_millis(config.per_file_timeout_ms),
            max_pending_queue_depth: config.max_pending_queue_depth.max(1),
        }
    }
}

/// Everything one scan pass produced. `dispositions` carries exactly one
/// entry per examined file; `peak_queue_depth` is the high-water mark of the
/// bounded work queue.
#[derive(Debug)]
pub struct ScanOutcome {
    pub registry: IssueRegistry,
    pub dispositions: Vec<(PathBuf, Disposition)>,
    pub warnings: Vec<ScanWarning>,
    pub counters: ScanCounters,
    pub peak_queue_depth: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

enum WorkerMsg {
    Checked { file: FileRef, result: CheckResult },
    Canceled { file: FileRef },
}

/// Fan-out/fan-in executor for the scan phase.
///
/// One enumerator thread fills a bounded `sync_channel` (enumeration blocks
/// when the queue is full, capping peak memory regardless of tree size);
/// `worker_count` workers pull from the shared receiver and run the checker;
/// a single aggregation lane on the calling thread owns the registry and the
/// disposition list. Completion is a rendezvous: the pass is done only when
/// enumeration has finished, the queue is drained, and every worker has hung
/// up its result sender.
pub struct ScanScheduler {
    config: SchedulerConfig,
}

impl ScanScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    pub fn run(
        &self,
        enumerator: &PathEnumerator,
        checker: &Arc<dyn IntegrityChecker>,
        baseline: &Arc<Baseline>,
        cancel: &CancellationToken,
    ) -> Result<ScanOutcome, Error> {
        let started_at = Utc::now();
        let worker_count = self.config.worker_count;
        let depth = self.config.max_pending_queue_depth;
        let timeout = self.config.per_file_timeout;

        let (work_tx, work_rx) = mpsc::sync_channel::<FileRef>(depth);
        let work_rx = Arc::new(Mutex::new(work_rx));
        let (result_tx, result_rx) = mpsc::channel::<WorkerMsg>();

        // Baseline-relative paths resolve against the primary root only;
        // files under secondary roots are checked un-baselined.
        let primary: Option<PathBuf> = enumerator.primary_root().map(Path::to_path_buf);

        // Queue occupancy gauge. Signed because the worker-side decrement can
        // race ahead of the producer-side increment. The raw count can also
        // momentarily over-read by one: a freed slot unblocks `send` before
        // the receiving worker's decrement lands. The recorded peak is
        // clamped to the channel bound, which real occupancy never exceeds.
        let pending = Arc::new(AtomicIsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut registry = IssueRegistry::new();
        let mut dispositions: Vec<(PathBuf, Disposition)> = Vec::new();
        let mut seen: AHashSet<PathBuf> = AHashSet::new();
        let mut counters = ScanCounters::default();
        let mut fatal: Option<Error> = None;

        let warnings = thread::scope(|s| {
            let enum_handle = {
                let pending = Arc::clone(&pending);
                let peak = Arc::clone(&peak);
                let baseline = Arc::clone(baseline);
                let cancel = cancel.clone();
                s.spawn(move || {
                    let mut send = |file: FileRef| -> bool {
                        if work_tx.send(file).is_err() {
                            return false;
                        }
                        let d = (pending.fetch_add(1, Ordering::SeqCst) + 1)
                            .clamp(0, depth as isize);
                        peak.fetch_max(d as usize, Ordering::SeqCst);
                        true
                    };

                    let outcome = enumerator.run(&cancel, &mut send);

                    // Baseline sweep: entries the walk never saw are handed to
                    // the checker as synthetic refs so absence surfaces as a
                    // Missing issue. Skipped once canceled; no new work after
                    // the signal.
                    if !cancel.is_canceled() {
                        if let Some(root) = enumerator.primary_root() {
                            let mut leftovers: Vec<&PathBuf> = baseline
                                .iter()
                                .filter(|(rel, _)| !outcome.visited.contains(*rel))
                                .map(|(rel, _)| rel)
                                .collect();
                            leftovers.sort();
                            for rel in leftovers {
                                let file = FileRef {
                                    path: root.join(rel),
                                    rel_path: rel.clone(),
                                    size: 0,
                                    modified: None,
                                };
                                if !send(file) {
                                    break;
                                }
                            }
                        }
                    }

                    outcome.warnings
                    // work_tx drops here; workers drain and hang up.
                })
            };

            for worker_id in 0..worker_count {
                let work_rx = Arc::clone(&work_rx);
                let result_tx = result_tx.clone();
                let pending = Arc::clone(&pending);
                let checker = Arc::clone(checker);
                let baseline = Arc::clone(baseline);
                let primary = primary.clone();
                let cancel = cancel.clone();
                s.spawn(move || {
                    debug!("scan worker {} started", worker_id);
                    loop {
                        let file = {
                            let rx = work_rx.lock().unwrap();
                            match rx.recv() {
                                Ok(file) => file,
                                Err(_) => break,
                            }
                        };
                        pending.fetch_sub(1, Ordering::SeqCst);

                        // Queued before the signal but never dispatched: the
                        // file still gets a terminal disposition.
                        if cancel.is_canceled() {
                            if result_tx.send(WorkerMsg::Canceled { file }).is_err() {
                                break;
                            }
                            continue;
                        }

                        let entry = primary
                            .as_deref()
                            .filter(|root| file.path.starts_with(root))
                            .and_then(|_| baseline.get(&file.rel_path))
                            .cloned();
                        let result = check_with_timeout(&checker, entry, &file, timeout);
                        if result_tx.send(WorkerMsg::Checked { file, result }).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(result_tx);

            // Single write lane: only this loop touches the registry.
            for msg in result_rx.iter() {
                let (file, verdict, detail, canceled) = match msg {
                    WorkerMsg::Checked { file, result } => {
                        (file, result.verdict, result.detail, false)
                    }
                    WorkerMsg::Canceled { file } => (
                        file,
                        CheckVerdict::Issue(IssueKind::Unknown),
                        Some("canceled".to_string()),
                        true,
                    ),
                };

                if !seen.insert(file.path.clone()) {
                    if fatal.is_none() {
                        fatal = Some(Error::DuplicatePath(file.path.display().to_string()));
                    }
                    continue;
                }
                match verdict {
                    CheckVerdict::Ok => {
                        counters.ok += 1;
                        dispositions.push((file.path, Disposition::Ok));
                    }
                    CheckVerdict::Issue(kind) => {
                        let disposition = if canceled {
                            counters.canceled += 1;
                            Disposition::Canceled
                        } else {
                            Disposition::Issue(kind)
                        };
                        let entry = primary
                            .as_deref()
                            .filter(|root| file.path.starts_with(root))
                            .and_then(|_| baseline.get(&file.rel_path))
                            .cloned();
                        let issue = Issue {
                            path: file.path.clone(),
                            rel_path: file.rel_path.clone(),
                            kind,
                            detail,
                            detected_at: Utc::now(),
                            baseline: entry,
                        };
                        if let Err(err) = registry.record(issue) {
                            if fatal.is_none() {
                                fatal = Some(err);
                            }
                            continue;
                        }
                        dispositions.push((file.path, disposition));
                    }
                }
            }

            enum_handle.join().unwrap()
        });

        if let Some(err) = fatal {
            return Err(err);
        }

        counters.scanned = dispositions.len();
        counters.issues = registry.len() - counters.canceled;
        counters.warnings = warnings.len();

        if !warnings.is_empty() {
            warn!("{} enumeration warnings recorded", warnings.len());
        }

        Ok(ScanOutcome {
            registry,
            dispositions,
            warnings,
            counters,
            peak_queue_depth: peak.load(Ordering::SeqCst),
            started_at,
            finished_at: Utc::now(),
        })
    }
}

/// Runs one check with a deadline. The check itself executes on a short-lived
/// helper thread; on timeout the worker slot is freed immediately while the
/// straggling read runs to completion detached, its late result discarded.
/// A panicking checker drops its sender, which surfaces as a checker fault,
/// so one bad file never takes down the scan.
fn check_with_timeout(
    checker: &Arc<dyn IntegrityChecker>,
    entry: Option<BaselineEntry>,
    file: &FileRef,
    timeout: Duration,
) -> CheckResult {
    let (tx, rx) = mpsc::channel::<CheckResult>();
    let checker = Arc::clone(checker);
    let file = file.clone();

    let spawned = thread::Builder::new()
        .name("sysmend-check".to_string())
        .spawn(move || {
            let result = checker.check(&file, entry.as_ref());
            let _ = tx.send(result);
        });
    if spawned.is_err() {
        return CheckResult::issue(IssueKind::Unreadable, "could not spawn check thread");
    }

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => CheckResult::issue(
            IssueKind::Unreadable,
            format!("timeout after {}ms", timeout.as_millis()),
        ),
        Err(RecvTimeoutError::Disconnected) => {
            CheckResult::issue(IssueKind::Unreadable, "checker fault")
        }
    }
}
