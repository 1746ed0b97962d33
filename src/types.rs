//! Core data types shared by the engine, storage backends and callers

use serde::Serialize;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Content hash sentinel marking a directory entry
pub const DIRECTORY_HASH: &str = "";

/// One of the two synchronized locations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
	Local,
	Remote,
}

impl Side {
	pub fn opposite(self) -> Side {
		match self {
			Side::Local => Side::Remote,
			Side::Remote => Side::Local,
		}
	}
}

impl fmt::Display for Side {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Side::Local => write!(f, "local"),
			Side::Remote => write!(f, "remote"),
		}
	}
}

/// Transfer direction carried by notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
	LocalToRemote,
	RemoteToLocal,
}

impl Direction {
	/// Direction of a change raised on `source`
	pub fn from_source(source: Side) -> Direction {
		match source {
			Side::Local => Direction::LocalToRemote,
			Side::Remote => Direction::RemoteToLocal,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Direction::LocalToRemote => "local_to_remote",
			Direction::RemoteToLocal => "remote_to_local",
		}
	}
}

impl fmt::Display for Direction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Last-known content metadata of one path on one side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
	/// Slash-separated path relative to the side's root
	pub relative_path: String,
	/// Hex BLAKE3 digest, or [`DIRECTORY_HASH`] for directories
	pub content_hash: String,
	pub mod_time: SystemTime,
}

impl FileMetadata {
	pub fn new(relative_path: impl Into<String>, content_hash: impl Into<String>, mod_time: SystemTime) -> Self {
		FileMetadata {
			relative_path: relative_path.into(),
			content_hash: content_hash.into(),
			mod_time,
		}
	}

	/// Entry for a directory; never content-compared
	pub fn directory(relative_path: impl Into<String>, mod_time: SystemTime) -> Self {
		Self::new(relative_path, DIRECTORY_HASH, mod_time)
	}

	pub fn is_directory(&self) -> bool {
		self.content_hash == DIRECTORY_HASH
	}

	/// Same content; a directory never matches anything by hash
	pub fn same_content(&self, other: &FileMetadata) -> bool {
		!self.is_directory() && !other.is_directory() && self.content_hash == other.content_hash
	}
}

/// Where a path of the consolidated listing lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
	Local,
	Remote,
	Both,
}

/// One row of the consolidated listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
	pub relative_path: String,
	#[serde(rename = "hash")]
	pub content_hash: String,
	pub mod_time: String,
	pub location: Location,
}

/// Snapshot returned by the status query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
	pub local_files: usize,
	pub remote_files: usize,
	pub paused: bool,
	pub running: bool,
}

/// Render a modification time as `YYYY/MM/DD HH:MM:SS` in local time
pub fn format_mod_time(time: SystemTime) -> String {
	let dt: chrono::DateTime<chrono::Local> = time.into();
	dt.format("%Y/%m/%d %H:%M:%S").to_string()
}

/// The zero modification time; writers skip applying it
pub fn is_zero_time(time: SystemTime) -> bool {
	time == UNIX_EPOCH
}


// vim: ts=4
