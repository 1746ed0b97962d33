//! Configuration for the sync engine
//!
//! The configuration follows a priority chain:
//! 1. Built-in defaults (`EngineConfig::default()`)
//! 2. Config file (`.toml` or `.json`)
//! 3. Environment variables (`TWINSYNC_*` prefix)
//! 4. CLI flags (highest priority, applied by the binary)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{SyncError, SyncResult};
use crate::exclusion::ExclusionEngine;
use crate::strategies::ConflictStrategy;
use crate::util::lexical_absolute;

/// Default debounce window for repeated notifications on one path
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

/// Default capacity of the bounded job queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 2048;

const ENV_PREFIX: &str = "TWINSYNC_";

/// Configuration for a [`crate::engine::SyncEngine`] and the binary around it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
	// ========================================================================
	// SIDES
	// ========================================================================
	/// Root of the local side
	pub local_root: PathBuf,

	/// Root of the remote side
	pub remote_root: PathBuf,

	// ========================================================================
	// EVENT PIPELINE
	// ========================================================================
	/// Minimum spacing between admitted events for one (side, path) key
	pub debounce_ms: u64,

	/// Capacity of the job queue; events are dropped when it is full
	pub queue_capacity: usize,

	/// Worker count (0 = scale to available parallelism)
	pub workers: usize,

	/// Lower clamp for the worker count
	pub min_workers: usize,

	/// Upper clamp for the worker count
	pub max_workers: usize,

	// ========================================================================
	// POLICY
	// ========================================================================
	/// Behavior when a changed source is older than a differing destination
	pub conflict_strategy: ConflictStrategy,

	/// Glob patterns excluded from scans and events (hidden names always are)
	pub exclude_patterns: Vec<String>,

	// ========================================================================
	// OUTPUT & LOGGING
	// ========================================================================
	/// Log level used when RUST_LOG is not set
	pub log_level: String,
}

impl Default for EngineConfig {
	fn default() -> Self {
		EngineConfig {
			local_root: PathBuf::from("./local_data"),
			remote_root: PathBuf::from("./remote_data"),
			debounce_ms: DEFAULT_DEBOUNCE_MS,
			queue_capacity: DEFAULT_QUEUE_CAPACITY,
			workers: 0,
			min_workers: 2,
			max_workers: 8,
			conflict_strategy: ConflictStrategy::Report,
			exclude_patterns: vec![],
			log_level: "info".to_string(),
		}
	}
}

impl EngineConfig {
	/// Build a config from defaults, an optional file and the process environment
	pub fn load(file: Option<&Path>) -> SyncResult<Self> {
		let mut config = match file {
			Some(path) => Self::from_file(path)?,
			None => Self::default(),
		};
		config.apply_env(std::env::vars())?;
		Ok(config)
	}

	/// Parse a config file; the extension selects TOML or JSON
	pub fn from_file(path: &Path) -> SyncResult<Self> {
		let contents = std::fs::read_to_string(path).map_err(|e| {
			SyncError::config(format!("cannot read config file {}: {}", path.display(), e))
		})?;

		match path.extension().and_then(|e| e.to_str()) {
			Some("json") => serde_json::from_str(&contents).map_err(|e| {
				SyncError::config(format!("invalid JSON in {}: {}", path.display(), e))
			}),
			Some("toml") | None => toml::from_str(&contents).map_err(|e| {
				SyncError::config(format!("invalid TOML in {}: {}", path.display(), e))
			}),
			Some(other) => {
				Err(SyncError::config(format!("unsupported config file extension: {}", other)))
			}
		}
	}

	/// Override fields from `TWINSYNC_*` variables
	pub fn apply_env<I>(&mut self, vars: I) -> SyncResult<()>
	where
		I: IntoIterator<Item = (String, String)>,
	{
		for (key, value) in vars {
			let Some(name) = key.strip_prefix(ENV_PREFIX) else {
				continue;
			};
			match name {
				"LOCAL_ROOT" => self.local_root = PathBuf::from(value),
				"REMOTE_ROOT" => self.remote_root = PathBuf::from(value),
				"DEBOUNCE_MS" => self.debounce_ms = parse_env(&key, &value)?,
				"QUEUE_CAPACITY" => self.queue_capacity = parse_env(&key, &value)?,
				"WORKERS" => self.workers = parse_env(&key, &value)?,
				"CONFLICT_STRATEGY" => {
					self.conflict_strategy =
						value.parse().map_err(|e: String| SyncError::config(e))?
				}
				"LOG_LEVEL" => self.log_level = value,
				_ => {}
			}
		}
		Ok(())
	}

	/// Reject configurations the engine cannot run with
	pub fn validate(&self) -> SyncResult<()> {
		if self.local_root.as_os_str().is_empty() || self.remote_root.as_os_str().is_empty() {
			return Err(SyncError::config("local and remote roots must both be set"));
		}

		let local = lexical_absolute(&self.local_root)?;
		let remote = lexical_absolute(&self.remote_root)?;
		if local == remote {
			return Err(SyncError::config(format!(
				"local and remote roots are the same directory: {}",
				local.display()
			)));
		}
		if local.starts_with(&remote) || remote.starts_with(&local) {
			return Err(SyncError::config(format!(
				"roots must not be nested: {} and {}",
				local.display(),
				remote.display()
			)));
		}

		if self.queue_capacity == 0 {
			return Err(SyncError::config("queueCapacity must be at least 1"));
		}
		if self.min_workers == 0 {
			return Err(SyncError::config("minWorkers must be at least 1"));
		}
		if self.min_workers > self.max_workers {
			return Err(SyncError::config(format!(
				"minWorkers ({}) exceeds maxWorkers ({})",
				self.min_workers, self.max_workers
			)));
		}

		ExclusionEngine::new(&self.exclude_patterns)?;
		Ok(())
	}

	pub fn debounce_interval(&self) -> Duration {
		Duration::from_millis(self.debounce_ms)
	}

	/// Worker count after auto-scaling and clamping
	pub fn effective_workers(&self) -> usize {
		let wanted = if self.workers == 0 {
			std::thread::available_parallelism().map(|n| n.get()).unwrap_or(self.min_workers)
		} else {
			self.workers
		};
		wanted.clamp(self.min_workers, self.max_workers.max(self.min_workers))
	}
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> SyncResult<T> {
	value
		.trim()
		.parse()
		.map_err(|_| SyncError::config(format!("{} has an invalid value: {}", key, value)))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
		pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
	}

	#[test]
	fn test_config_default() {
		let config = EngineConfig::default();
		assert_eq!(config.debounce_ms, 500);
		assert_eq!(config.queue_capacity, 2048);
		assert_eq!(config.conflict_strategy, ConflictStrategy::Report);
		assert!(config.validate().is_ok());
	}

	#[test]
	fn test_env_overrides() {
		let mut config = EngineConfig::default();
		config
			.apply_env(vars(&[
				("TWINSYNC_DEBOUNCE_MS", "250"),
				("TWINSYNC_WORKERS", "3"),
				("TWINSYNC_CONFLICT_STRATEGY", "revert"),
				("HOME", "/root"),
			]))
			.unwrap();
		assert_eq!(config.debounce_ms, 250);
		assert_eq!(config.workers, 3);
		assert_eq!(config.conflict_strategy, ConflictStrategy::RevertToNewer);
	}

	#[test]
	fn test_env_rejects_garbage() {
		let mut config = EngineConfig::default();
		let err = config.apply_env(vars(&[("TWINSYNC_QUEUE_CAPACITY", "lots")])).unwrap_err();
		assert!(matches!(err, SyncError::Configuration { .. }));
	}

	#[test]
	fn test_validate_rejects_nested_roots() {
		let config = EngineConfig {
			local_root: PathBuf::from("/data/sync"),
			remote_root: PathBuf::from("/data/sync/inner"),
			..EngineConfig::default()
		};
		assert!(config.validate().is_err());
	}

	#[test]
	fn test_validate_rejects_same_root() {
		let config = EngineConfig {
			local_root: PathBuf::from("/data/a/../b"),
			remote_root: PathBuf::from("/data/b"),
			..EngineConfig::default()
		};
		assert!(config.validate().is_err());
	}

	#[test]
	fn test_validate_rejects_bad_worker_bounds() {
		let config = EngineConfig { min_workers: 4, max_workers: 2, ..EngineConfig::default() };
		assert!(config.validate().is_err());
	}

	#[test]
	fn test_effective_workers_clamped() {
		let config = EngineConfig { workers: 64, ..EngineConfig::default() };
		assert_eq!(config.effective_workers(), 8);
		let config = EngineConfig { workers: 1, ..EngineConfig::default() };
		assert_eq!(config.effective_workers(), 2);
		let auto = EngineConfig::default().effective_workers();
		assert!((2..=8).contains(&auto));
	}

	#[test]
	fn test_config_serialization() {
		let config = EngineConfig::default();
		let json = serde_json::to_string(&config).expect("Failed to serialize");
		assert!(json.contains("debounceMs"));
		let deserialized: EngineConfig = serde_json::from_str(&json).expect("Failed to deserialize");
		assert_eq!(config.local_root, deserialized.local_root);
		assert_eq!(config.max_workers, deserialized.max_workers);
	}
}

// vim: ts=4
