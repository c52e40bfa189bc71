use config::{Config, ConfigError, File as ConfigFile};
use serde::Deserialize;
use std::path::Path;
use std::thread;

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub root_paths: Vec<String>,
    /// Glob patterns a file must match to be scanned. Empty = scan everything.
    #[serde(default)]
    pub include_patterns: Vec<String>,
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
    /// CSV manifest of expected file states, relative to the first root.
    #[serde(default)]
    pub baseline_manifest: Option<String>,
    /// Mirror tree used by the restore-backup handler.
    #[serde(default)]
    pub backup_root: Option<String>,
    /// External repair tool invoked by the external-tool handler.
    #[serde(default)]
    pub repair_tool: Option<ExternalToolConfig>,
    /// Where to persist the finished session snapshot, if anywhere.
    #[serde(default)]
    pub snapshot_path: Option<String>,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub repair: RepairConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            root_paths: Vec::new(),
            include_patterns: Vec::new(),
            ignore_patterns: Vec::new(),
            baseline_manifest: None,
            backup_root: None,
            repair_tool: None,
            snapshot_path: None,
            scan: ScanConfig::default(),
            repair: RepairConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanConfig {
    #[serde(default = "default_scan_workers")]
    pub worker_count: usize,
    #[serde(default = "default_per_file_timeout_ms")]
    pub per_file_timeout_ms: u64,
    /// Cap on queued-but-unchecked files; enumeration blocks when reached.
    #[serde(default = "default_queue_depth")]
    pub max_pending_queue_depth: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            worker_count: default_scan_workers(),
            per_file_timeout_ms: default_per_file_timeout_ms(),
            max_pending_queue_depth: default_queue_depth(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepairConfig {
    #[serde(default = "default_repair_workers")]
    pub worker_count: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            worker_count: default_repair_workers(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExternalToolConfig {
    pub program: String,
    /// Arguments; the literal `{path}` expands to the damaged file's path.
    #[serde(default)]
    pub args: Vec<String>,
}

fn default_scan_workers() -> usize {
    let cpus = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    (cpus * 2).clamp(1, 32)
}

fn default_repair_workers() -> usize {
    // Repairs tend to be I/O or network bound; keep this small.
    4
}

fn default_per_file_timeout_ms() -> u64 {
    30_000
}

fn default_queue_depth() -> usize {
    1_000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    250
}

pub fn load_configuration() -> Result<EngineConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .build()?;
    builder.try_deserialize::<EngineConfig>()
}

/// Remove directories that are subdirectories of other directories in the list.
pub fn non_overlapping_directories(dirs: Vec<String>) -> Vec<String> {
    let mut result: Vec<String> = Vec::new();

    for dir in dirs {
        let dir_path = Path::new(&dir);
        let mut should_add = true;
        let result_clone = result.clone();

        for res_dir in &result_clone {
            let res_dir_path = Path::new(res_dir);

            if dir_path.starts_with(res_dir_path) {
                should_add = false;
                break;
            }

            if res_dir_path.starts_with(dir_path) {
                result.retain(|x| x != res_dir);
                break;
            }
        }

        if should_add {
            result.push(dir);
        }
    }

    result
}
