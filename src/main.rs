use clap::{Arg, ArgMatches, Command};
use std::error::Error;
use std::path;
use std::sync::Arc;

use twinsync::logging::*;
use twinsync::storage::Storage;
use twinsync::{ConflictStrategy, EngineConfig, FileSystemStorage, SyncEngine, SyncEvent};

///////////////////////
// Utility functions //
///////////////////////

/// Merge CLI flags over the loaded configuration
fn apply_args(config: &mut EngineConfig, args: &ArgMatches) -> Result<(), Box<dyn Error>> {
	if let Some(dir) = args.get_one::<String>("local") {
		config.local_root = path::PathBuf::from(dir);
	}
	if let Some(dir) = args.get_one::<String>("remote") {
		config.remote_root = path::PathBuf::from(dir);
	}
	if let Some(ms) = args.get_one::<u64>("debounce-ms") {
		config.debounce_ms = *ms;
	}
	if let Some(n) = args.get_one::<usize>("workers") {
		config.workers = *n;
	}
	if let Some(s) = args.get_one::<String>("conflict-strategy") {
		config.conflict_strategy = s.parse::<ConflictStrategy>()?;
	}
	Ok(())
}

/// Resolve once SIGINT or SIGTERM arrives
async fn shutdown_signal() {
	use tokio::signal::unix::{signal, SignalKind};

	let mut sigterm = match signal(SignalKind::terminate()) {
		Ok(stream) => stream,
		Err(e) => {
			warn!("Failed to setup SIGTERM handler: {}. Only Ctrl-C will stop the engine.", e);
			let _ = tokio::signal::ctrl_c().await;
			return;
		}
	};

	tokio::select! {
		_ = sigterm.recv() => debug!("Received SIGTERM"),
		_ = tokio::signal::ctrl_c() => debug!("Received SIGINT"),
	}
}

async fn run(args: &ArgMatches) -> Result<(), Box<dyn Error>> {
	let config_file = args.get_one::<String>("config").map(path::Path::new);
	let mut config = EngineConfig::load(config_file)?;
	apply_args(&mut config, args)?;
	init_tracing(&config.log_level);
	config.validate()?;

	let exclusion = twinsync::exclusion::ExclusionEngine::new(&config.exclude_patterns)?;
	let local = FileSystemStorage::new(&config.local_root)?.with_exclusion(exclusion.clone());
	let remote = FileSystemStorage::new(&config.remote_root)?.with_exclusion(exclusion);

	let engine = SyncEngine::new(Arc::new(local), Arc::new(remote), config)?;
	engine.set_notifier(|event: &SyncEvent| {
		info!(kind = %event.kind, direction = %event.direction, "{}", event.message);
	});

	engine.run().await?;
	info!("Press Ctrl-C to stop");
	shutdown_signal().await;

	info!("Shutting down...");
	engine.stop().await;
	Ok(())
}

async fn scan(dir: &str) -> Result<(), Box<dyn Error>> {
	let storage = FileSystemStorage::new(dir)?;
	let listing = storage.scan_all().await?;

	let mut paths: Vec<_> = listing.keys().collect();
	paths.sort();
	for p in paths {
		let meta = &listing[p];
		println!("{}  {}  {}", meta.content_hash, twinsync::types::format_mod_time(meta.mod_time), p);
	}
	eprintln!("{} files", listing.len());
	Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
	let matches = Command::new("TwinSync")
		.version(env!("CARGO_PKG_VERSION"))
		.about("Continuous two-sided directory sync")
		.subcommand_required(true)
		.subcommand(
			Command::new("run")
				.about("Reconcile both sides, then keep them in sync until interrupted")
				.arg(
					Arg::new("config")
						.short('c')
						.long("config")
						.value_name("FILE")
						.help("Config file (.toml or .json)"),
				)
				.arg(Arg::new("local").long("local").value_name("DIR").help("Local root"))
				.arg(Arg::new("remote").long("remote").value_name("DIR").help("Remote root"))
				.arg(
					Arg::new("debounce-ms")
						.long("debounce-ms")
						.value_name("MS")
						.value_parser(clap::value_parser!(u64))
						.help("Debounce window in milliseconds"),
				)
				.arg(
					Arg::new("workers")
						.long("workers")
						.value_name("N")
						.value_parser(clap::value_parser!(usize))
						.help("Worker count (0 = auto)"),
				)
				.arg(
					Arg::new("conflict-strategy")
						.long("conflict-strategy")
						.value_name("STRATEGY")
						.help("report or revert-to-newer"),
				),
		)
		.subcommand(
			Command::new("scan")
				.about("List the files of one directory with their hashes")
				.arg(Arg::new("dir").required(true)),
		)
		.get_matches();

	if let Some(sub) = matches.subcommand_matches("run") {
		return run(sub).await;
	} else if let Some(sub) = matches.subcommand_matches("scan") {
		init_tracing("warn");
		let dir = sub.get_one::<String>("dir").ok_or("scan: directory argument required")?;
		return scan(dir).await;
	}

	Ok(())
}

// vim: ts=4
