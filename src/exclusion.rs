//! Path exclusion for scans and watch events
//!
//! Hidden entries (any component starting with `.`) are always excluded.
//! User patterns are compiled once into a `GlobSet` and matched against the
//! slash-separated relative path.

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::error::{SyncError, SyncResult};

#[derive(Debug, Clone)]
pub struct ExclusionEngine {
	patterns: GlobSet,
	pattern_count: usize,
}

impl ExclusionEngine {
	pub fn new(patterns: &[String]) -> SyncResult<Self> {
		let mut builder = GlobSetBuilder::new();
		for pattern in patterns {
			let glob = Glob::new(pattern).map_err(|e| {
				SyncError::config(format!("invalid exclude pattern '{}': {}", pattern, e))
			})?;
			builder.add(glob);
		}
		let patterns_set = builder
			.build()
			.map_err(|e| SyncError::config(format!("cannot compile exclude patterns: {}", e)))?;
		Ok(ExclusionEngine { patterns: patterns_set, pattern_count: patterns.len() })
	}

	/// Engine that only skips hidden entries
	pub fn hidden_only() -> Self {
		ExclusionEngine { patterns: GlobSet::empty(), pattern_count: 0 }
	}

	/// Check a slash-separated relative path
	pub fn is_excluded(&self, rel_path: &str) -> bool {
		if is_hidden(rel_path) {
			return true;
		}
		self.pattern_count > 0 && self.patterns.is_match(rel_path)
	}
}

impl Default for ExclusionEngine {
	fn default() -> Self {
		Self::hidden_only()
	}
}

/// True if any component of the relative path starts with a dot
pub fn is_hidden(rel_path: &str) -> bool {
	rel_path.split('/').any(|c| c.starts_with('.') && c != "." && c != "..")
}


// vim: ts=4
