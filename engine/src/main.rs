use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::{signal, task, time::Duration};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use synaptic_memory::config::Config;
use synaptic_memory::graph::{GraphStore, SledGraphStore};
use synaptic_memory::lifecycle::{maintenance_loop, LifecycleManager};

#[derive(Parser, Debug)]
#[command(name = "synaptic-memory", version, about = "Maintenance runner for the confidence-weighted memory graph")]
struct Cli {
	/// Data directory root
	#[arg(long, env = "DATA_DIR")]
	data_dir: Option<String>,

	/// Milliseconds between maintenance cycles
	#[arg(long, env = "MAINTENANCE_INTERVAL_MS")]
	interval_ms: Option<u64>,

	/// Run a single maintenance cycle and exit
	#[arg(long)]
	once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
	init_tracing();
	let cfg = Config::load()?;
	let cli = Cli::parse();

	let data_dir = cli.data_dir.unwrap_or(cfg.data_dir);
	let interval = match cli.interval_ms {
		Some(0) => anyhow::bail!("--interval-ms must be positive"),
		Some(ms) => Duration::from_millis(ms),
		None => cfg.maintenance_interval,
	};

	let db_path = ensure_data_dir(&data_dir)?.join("kv");
	let store = SledGraphStore::open(&db_path)?;
	if store.seed_genesis().await? {
		info!(path = %db_path.display(), "seeded genesis nodes");
	}
	let manager = LifecycleManager::with_thresholds(Arc::new(store.clone()), cfg.engine.thresholds);

	if cli.once {
		let report = manager.run_cycle().await;
		println!("{}", serde_json::to_string(&report)?);
		store.db().flush_async().await?;
		return Ok(());
	}

	info!(%data_dir, interval_ms = interval.as_millis() as u64, "starting maintenance loop");
	let maint_task = task::spawn(maintenance_loop(manager, interval));

	signal::ctrl_c().await?;
	info!("Shutdown signal received");
	maint_task.abort();
	store.db().flush_async().await?;
	Ok(())
}

fn init_tracing() {
	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	// stdout carries the --once report
	let fmt_layer = fmt::layer().with_target(false).with_ansi(false).with_writer(std::io::stderr);
	tracing_subscriber::registry().with(env_filter).with(fmt_layer).init();
}

fn ensure_data_dir(root: &str) -> Result<PathBuf> {
	let dir = PathBuf::from(root).join("warm");
	std::fs::create_dir_all(&dir).with_context(|| format!("create data dir {}", dir.display()))?;
	Ok(dir)
}
