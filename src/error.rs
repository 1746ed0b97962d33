//! Error types for TwinSync operations

use std::error::Error;
use std::fmt;
use std::io;

/// Result alias used across the crate
pub type SyncResult<T> = Result<T, SyncError>;

/// Main error type for sync operations
#[derive(Debug)]
pub enum SyncError {
	/// Read, write or delete failed on a path
	Io { path: String, source: io::Error },

	/// Path vanished between notification and processing
	NotFound { path: String },

	/// Full-tree traversal of a storage root failed
	Scan { root: String, source: Box<SyncError> },

	/// Change notification source could not be registered or failed
	Watch { message: String },

	/// Invalid or unreachable configuration
	Configuration { message: String },

	/// A reconciliation pass aborted on its first failing copy
	Reconcile { path: String, source: Box<SyncError> },

	/// Engine is stopped and no longer accepts work
	Stopped,
}

impl SyncError {
	/// Wrap an I/O error with the path it happened on
	///
	/// `ErrorKind::NotFound` is folded into [`SyncError::NotFound`] so callers
	/// only have to check one variant for race-induced missing paths.
	pub fn io(path: impl Into<String>, source: io::Error) -> Self {
		let path = path.into();
		if source.kind() == io::ErrorKind::NotFound {
			SyncError::NotFound { path }
		} else {
			SyncError::Io { path, source }
		}
	}

	pub fn config(message: impl Into<String>) -> Self {
		SyncError::Configuration { message: message.into() }
	}

	/// True when the error means the path does not exist
	pub fn is_not_found(&self) -> bool {
		match self {
			SyncError::NotFound { .. } => true,
			SyncError::Io { source, .. } => source.kind() == io::ErrorKind::NotFound,
			_ => false,
		}
	}
}

impl fmt::Display for SyncError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncError::Io { path, source } => write!(f, "I/O error on {}: {}", path, source),
			SyncError::NotFound { path } => write!(f, "Not found: {}", path),
			SyncError::Scan { root, source } => {
				write!(f, "Failed to scan {}: {}", root, source)
			}
			SyncError::Watch { message } => write!(f, "Watch error: {}", message),
			SyncError::Configuration { message } => {
				write!(f, "Invalid configuration: {}", message)
			}
			SyncError::Reconcile { path, source } => {
				write!(f, "Reconciliation aborted at {}: {}", path, source)
			}
			SyncError::Stopped => write!(f, "Sync engine is stopped"),
		}
	}
}

impl Error for SyncError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		match self {
			SyncError::Io { source, .. } => Some(source),
			SyncError::Scan { source, .. } | SyncError::Reconcile { source, .. } => {
				Some(source.as_ref())
			}
			_ => None,
		}
	}
}

impl From<io::Error> for SyncError {
	fn from(e: io::Error) -> Self {
		SyncError::io(String::new(), e)
	}
}

impl From<notify::Error> for SyncError {
	fn from(e: notify::Error) -> Self {
		SyncError::Watch { message: e.to_string() }
	}
}


// vim: ts=4
