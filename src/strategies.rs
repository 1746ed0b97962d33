//! Conflict strategy enum
//!
//! Parsed from config files, environment and CLI via `FromStr`.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// What a synchronization step does when the destination is newer than the
/// changed source and their contents differ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictStrategy {
	/// Report the conflict, copy nothing, leave both state entries untouched
	#[default]
	Report,

	/// Copy the newer destination back over the source, then report
	RevertToNewer,
}

impl FromStr for ConflictStrategy {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"report" | "report-only" => Ok(Self::Report),
			"revert-to-newer" | "revert" => Ok(Self::RevertToNewer),
			_ => Err(format!(
				"Unknown conflict strategy: {}. Valid options: report, revert-to-newer",
				s
			)),
		}
	}
}

impl std::fmt::Display for ConflictStrategy {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Report => write!(f, "report"),
			Self::RevertToNewer => write!(f, "revert-to-newer"),
		}
	}
}


// vim: ts=4
