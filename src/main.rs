use anyhow::Context;
use clap::Parser;
use dotenv::dotenv;
use std::path::Path;
use std::sync::Arc;
use sysmend::cli::{Cli, Commands};
use sysmend::handlers::{ExternalToolHandler, RestoreBackupHandler};
use sysmend::report::LogSink;
use sysmend::scheduler::CancellationToken;
use sysmend::{config, logging, Baseline, EngineConfig, MaintenanceEngine};
use tracing::{error, info};

fn main() {
    dotenv().ok();

    let _guard = logging::init_logger();

    let args = Cli::parse();

    let result = match args.command {
        Some(Commands::Scan) | None => run(false),
        Some(Commands::Repair) => run(true),
        Some(Commands::PrintConfig) => print_config(),
    };

    if let Err(err) = result {
        error!("Error: {:#}", err);
        std::process::exit(1);
    }
}

fn build_engine(config: EngineConfig) -> anyhow::Result<MaintenanceEngine> {
    let baseline = match &config.baseline_manifest {
        Some(manifest) => Baseline::from_csv(Path::new(manifest))
            .with_context(|| format!("loading baseline manifest '{}'", manifest))?,
        None => Baseline::new(),
    };
    info!("Baseline entries: {}", baseline.len());

    let backup_root = config.backup_root.clone();
    let repair_tool = config.repair_tool.clone();

    let mut engine = MaintenanceEngine::new(config, baseline);
    if let Some(root) = backup_root {
        engine.register_handler(Arc::new(RestoreBackupHandler::new(root)));
    }
    if let Some(tool) = repair_tool {
        engine.register_handler(Arc::new(ExternalToolHandler::from_config(&tool)));
    }
    Ok(engine)
}

fn run(apply_repairs: bool) -> anyhow::Result<()> {
    // One configuration read per invocation; everything below sees the
    // same snapshot of it.
    let config = config::load_configuration().context("loading configuration")?;
    let snapshot_path = config.snapshot_path.clone();

    let engine = build_engine(config)?;
    let cancel = CancellationToken::new();
    let sink = LogSink;

    let scan = engine.scan(&cancel, &sink).context("scan session failed")?;

    if apply_repairs {
        let actions = engine.plan(&scan, &sink);
        engine
            .repair(actions, &cancel, &sink)
            .context("repair session failed")?;
    }

    if let Some(path) = snapshot_path {
        scan.save_snapshot(Path::new(&path))
            .with_context(|| format!("saving session snapshot to '{}'", path))?;
        info!("Session snapshot written to {}", path);
    }

    Ok(())
}

fn print_config() -> anyhow::Result<()> {
    let config = config::load_configuration().context("loading configuration")?;
    println!("{:#?}", config);
    Ok(())
}
