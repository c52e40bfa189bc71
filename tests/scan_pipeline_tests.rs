use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sysmend::checker::{hash_file, BaselineChecker};
use sysmend::model::{BaselineEntry, CheckResult, Disposition, FileRef, IssueKind};
use sysmend::report::SilentSink;
use sysmend::scheduler::CancellationToken;
use sysmend::{Baseline, EngineConfig, IntegrityChecker, MaintenanceEngine, ScanReport};

/// Create a scan tree with one of every anomaly the checker classifies.
/// Layout:
///   root/
///     ok.dat       (matches baseline size + hash)
///     a.dat        (baseline size matches, content tampered → HashMismatch)
///     short.dat    (baseline says 100 bytes → SizeMismatch)
///     stray.txt    (not in baseline, readable → OK)
///     empty.dat    (not in baseline, zero bytes → Unknown)
///   baseline also lists b.dat, which does not exist on disk → Missing
fn create_damaged_tree(root: &Path) -> Baseline {
    fs::create_dir_all(root).unwrap();

    fs::write(root.join("ok.dat"), b"all good here").unwrap();
    fs::write(root.join("a.dat"), b"TAMPERED!!").unwrap();
    fs::write(root.join("short.dat"), b"tiny").unwrap();
    fs::write(root.join("stray.txt"), b"untracked but fine").unwrap();
    fs::write(root.join("empty.dat"), b"").unwrap();

    let mut baseline = Baseline::new();
    baseline
        .insert(
            PathBuf::from("ok.dat"),
            BaselineEntry {
                size: 13,
                hash: Some(hash_file(&root.join("ok.dat")).unwrap()),
                version: None,
            },
        )
        .unwrap();
    // Same length as the tampered content, different bytes.
    baseline
        .insert(
            PathBuf::from("a.dat"),
            BaselineEntry {
                size: 10,
                hash: Some(blake3::hash(b"0123456789").to_hex().to_string()),
                version: None,
            },
        )
        .unwrap();
    baseline
        .insert(
            PathBuf::from("short.dat"),
            BaselineEntry {
                size: 100,
                hash: None,
                version: None,
            },
        )
        .unwrap();
    baseline
        .insert(
            PathBuf::from("b.dat"),
            BaselineEntry {
                size: 10,
                hash: None,
                version: None,
            },
        )
        .unwrap();

    baseline
}

fn engine_for(root: &Path, baseline: Baseline) -> MaintenanceEngine {
    let config = EngineConfig {
        root_paths: vec![root.to_string_lossy().into_owned()],
        ..EngineConfig::default()
    };
    MaintenanceEngine::new(config, baseline)
}

fn scan(engine: &MaintenanceEngine) -> ScanReport {
    engine
        .scan(&CancellationToken::new(), &SilentSink)
        .unwrap()
}

fn kinds_by_rel(report: &ScanReport) -> Vec<(PathBuf, IssueKind)> {
    let mut kinds: Vec<_> = report
        .registry
        .all()
        .iter()
        .map(|i| (i.rel_path.clone(), i.kind))
        .collect();
    kinds.sort();
    kinds
}

#[test]
fn classifies_every_anomaly_with_full_accounting() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("tree");
    let baseline = create_damaged_tree(&root);

    let engine = engine_for(&root, baseline);
    let report = scan(&engine);

    // 5 files on disk + 1 baseline-only file, one disposition each.
    assert_eq!(report.counters.scanned, 6);
    assert_eq!(report.dispositions.len(), 6);
    let unique: HashSet<_> = report.dispositions.iter().map(|(p, _)| p.clone()).collect();
    assert_eq!(unique.len(), 6, "every path gets exactly one disposition");

    assert_eq!(
        kinds_by_rel(&report),
        vec![
            (PathBuf::from("a.dat"), IssueKind::HashMismatch),
            (PathBuf::from("b.dat"), IssueKind::Missing),
            (PathBuf::from("empty.dat"), IssueKind::Unknown),
            (PathBuf::from("short.dat"), IssueKind::SizeMismatch),
        ]
    );

    assert_eq!(report.counters.ok, 2); // ok.dat + stray.txt
    assert_eq!(report.counters.issues, 4);
    assert_eq!(report.counters.canceled, 0);
    assert_eq!(
        report.counters.ok + report.counters.issues,
        report.counters.scanned
    );
}

#[test]
fn rescanning_an_unchanged_tree_is_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("tree");
    let baseline = create_damaged_tree(&root);

    let engine = engine_for(&root, baseline);
    let first = scan(&engine);
    let second = scan(&engine);

    assert_eq!(kinds_by_rel(&first), kinds_by_rel(&second));
    assert_eq!(first.counters.scanned, second.counters.scanned);
    assert_eq!(first.counters.ok, second.counters.ok);
}

struct FaultyChecker {
    inner: BaselineChecker,
    poison: PathBuf,
}

impl IntegrityChecker for FaultyChecker {
    fn check(&self, file: &FileRef, baseline: Option<&BaselineEntry>) -> CheckResult {
        if file.rel_path == self.poison {
            panic!("checker blew up on purpose");
        }
        self.inner.check(file, baseline)
    }
}

#[test]
fn one_faulting_check_never_aborts_the_scan() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("tree");
    let baseline = create_damaged_tree(&root);

    let engine = engine_for(&root, baseline).with_checker(Arc::new(FaultyChecker {
        inner: BaselineChecker::new(),
        poison: PathBuf::from("ok.dat"),
    }));
    let report = scan(&engine);

    assert_eq!(report.counters.scanned, 6);
    let poisoned = report.registry.get(&root.join("ok.dat")).unwrap();
    assert_eq!(poisoned.kind, IssueKind::Unreadable);
    assert_eq!(poisoned.detail.as_deref(), Some("checker fault"));

    // Everything else still classified normally.
    assert_eq!(report.registry.by_kind(IssueKind::HashMismatch).len(), 1);
    assert_eq!(report.registry.by_kind(IssueKind::Missing).len(), 1);
    assert_eq!(report.counters.ok, 1); // stray.txt
}

struct SlowChecker {
    delay: Duration,
    started: AtomicUsize,
}

impl IntegrityChecker for SlowChecker {
    fn check(&self, _file: &FileRef, _baseline: Option<&BaselineEntry>) -> CheckResult {
        self.started.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        CheckResult::ok()
    }
}

#[test]
fn bounded_queue_caps_pending_work() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("tree");
    fs::create_dir_all(&root).unwrap();
    for i in 0..20 {
        fs::write(root.join(format!("f{:02}.dat", i)), b"x").unwrap();
    }

    let mut config = EngineConfig {
        root_paths: vec![root.to_string_lossy().into_owned()],
        ..EngineConfig::default()
    };
    config.scan.worker_count = 1;
    config.scan.max_pending_queue_depth = 3;

    let engine = MaintenanceEngine::new(config, Baseline::new()).with_checker(Arc::new(
        SlowChecker {
            delay: Duration::from_millis(10),
            started: AtomicUsize::new(0),
        },
    ));
    let report = scan(&engine);

    assert_eq!(report.counters.scanned, 20);
    assert!(
        report.peak_queue_depth <= 3,
        "queue grew to {} with depth 3",
        report.peak_queue_depth
    );
}

#[test]
fn slow_check_times_out_without_stalling_the_scan() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("tree");
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join("stuck.dat"), b"x").unwrap();
    fs::write(root.join("fine.dat"), b"x").unwrap();

    struct StuckChecker;
    impl IntegrityChecker for StuckChecker {
        fn check(&self, file: &FileRef, _baseline: Option<&BaselineEntry>) -> CheckResult {
            if file.rel_path == Path::new("stuck.dat") {
                std::thread::sleep(Duration::from_secs(5));
            }
            CheckResult::ok()
        }
    }

    let mut config = EngineConfig {
        root_paths: vec![root.to_string_lossy().into_owned()],
        ..EngineConfig::default()
    };
    config.scan.per_file_timeout_ms = 100;

    let engine = MaintenanceEngine::new(config, Baseline::new())
        .with_checker(Arc::new(StuckChecker));
    let start = std::time::Instant::now();
    let report = scan(&engine);
    assert!(start.elapsed() < Duration::from_secs(4), "worker leaked");

    let stuck = report.registry.get(&root.join("stuck.dat")).unwrap();
    assert_eq!(stuck.kind, IssueKind::Unreadable);
    assert!(stuck.detail.as_deref().unwrap().starts_with("timeout"));
    assert_eq!(report.counters.ok, 1);
}

#[test]
fn cancellation_drains_to_terminal_dispositions() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("tree");
    fs::create_dir_all(&root).unwrap();
    for i in 0..30 {
        fs::write(root.join(format!("f{:02}.dat", i)), b"x").unwrap();
    }

    let mut config = EngineConfig {
        root_paths: vec![root.to_string_lossy().into_owned()],
        ..EngineConfig::default()
    };
    config.scan.worker_count = 2;
    config.scan.max_pending_queue_depth = 4;

    let checker = Arc::new(SlowChecker {
        delay: Duration::from_millis(20),
        started: AtomicUsize::new(0),
    });
    let engine =
        MaintenanceEngine::new(config, Baseline::new())
            .with_checker(Arc::clone(&checker) as Arc<dyn IntegrityChecker>);

    let cancel = CancellationToken::new();
    let canceler = {
        let cancel = cancel.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(60));
            cancel.cancel();
        })
    };

    let report = engine.scan(&cancel, &SilentSink).unwrap();
    canceler.join().unwrap();

    // The session completed (no hang) and every file that entered the
    // pipeline has exactly one terminal disposition.
    assert_eq!(report.dispositions.len(), report.counters.scanned);
    assert!(report.counters.scanned <= 30);
    assert_eq!(
        report.counters.ok + report.counters.issues + report.counters.canceled,
        report.counters.scanned
    );
    // Checks never started for work queued after the signal.
    assert!(checker.started.load(Ordering::SeqCst) <= report.counters.scanned);
    for (_, disposition) in &report.dispositions {
        assert!(matches!(
            disposition,
            Disposition::Ok | Disposition::Issue(_) | Disposition::Canceled
        ));
    }
}

#[test]
fn secondary_root_never_masks_a_missing_primary_file() {
    let tmp = tempfile::tempdir().unwrap();
    let primary = tmp.path().join("primary");
    let secondary = tmp.path().join("secondary");
    fs::create_dir_all(&primary).unwrap();
    fs::create_dir_all(&secondary).unwrap();
    // Same relative name under the secondary root. The baseline resolves
    // against the primary root, so this copy is neither a substitute for
    // the missing primary file nor judged against its entry.
    fs::write(secondary.join("x.dat"), b"unrelated content").unwrap();

    let mut baseline = Baseline::new();
    baseline
        .insert(
            PathBuf::from("x.dat"),
            BaselineEntry {
                size: 4,
                hash: Some("0".repeat(64)),
                version: None,
            },
        )
        .unwrap();

    let config = EngineConfig {
        root_paths: vec![
            primary.to_string_lossy().into_owned(),
            secondary.to_string_lossy().into_owned(),
        ],
        ..EngineConfig::default()
    };
    let engine = MaintenanceEngine::new(config, baseline);
    let report = scan(&engine);

    // The secondary copy plus the swept-in primary path.
    assert_eq!(report.counters.scanned, 2);
    let missing = report.registry.get(&primary.join("x.dat")).unwrap();
    assert_eq!(missing.kind, IssueKind::Missing);
    // Un-baselined under its own root: readability probe only, no mismatch.
    assert!(report.registry.get(&secondary.join("x.dat")).is_none());
    assert_eq!(report.counters.ok, 1);
    assert_eq!(report.counters.issues, 1);
}

#[test]
fn session_snapshot_round_trips() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("tree");
    let baseline = create_damaged_tree(&root);

    let engine = engine_for(&root, baseline);
    let report = scan(&engine);

    let snapshot_path = tmp.path().join("session.bin");
    report.save_snapshot(&snapshot_path).unwrap();
    let restored = ScanReport::load_snapshot(&snapshot_path).unwrap();

    assert_eq!(restored.counters.scanned, report.counters.scanned);
    assert_eq!(kinds_by_rel(&restored), kinds_by_rel(&report));
    assert_eq!(restored.dispositions.len(), report.dispositions.len());
}
