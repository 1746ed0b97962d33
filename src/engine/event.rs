//! Raw change notifications and their attribution to a side

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::exclusion::ExclusionEngine;
use crate::logging::*;
use crate::types::Side;
use crate::util;

/// Kind of change reported by a notification source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
	Create,
	Write,
	Chmod,
	Remove,
	Rename,
	Other,
}

impl fmt::Display for ChangeKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			ChangeKind::Create => "CREATE",
			ChangeKind::Write => "WRITE",
			ChangeKind::Chmod => "CHMOD",
			ChangeKind::Remove => "REMOVE",
			ChangeKind::Rename => "RENAME",
			ChangeKind::Other => "OTHER",
		};
		f.write_str(name)
	}
}

/// Notification for one absolute path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
	pub path: PathBuf,
	pub kind: ChangeKind,
}

impl RawEvent {
	pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
		RawEvent { path: path.into(), kind }
	}
}

/// An admitted job waiting for a worker
#[derive(Debug, Clone)]
pub struct QueuedEvent {
	pub raw: RawEvent,
	pub side: Side,
	pub rel_path: String,
}

/// Outcome of offering a raw notification to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
	/// Enqueued for a worker
	Queued,
	/// Same key admitted within the debounce window
	Debounced,
	/// Path lies under neither root
	Unresolved,
	/// Hidden or matched by an exclusion pattern
	Excluded,
	/// Job queue at capacity; the notification is lost
	QueueFull,
	/// Engine is stopping or stopped
	Stopped,
}

struct RootEntry {
	side: Side,
	root: PathBuf,
}

/// Resolves absolute paths to (side, relative path) by longest root prefix
///
/// Each root is registered twice, as given and canonicalized, since
/// notification sources may report either form (e.g. through symlinked
/// temp directories). A root that does not exist yet has no canonical form;
/// call [`Categorizer::refresh_roots`] once it has been created.
pub struct Categorizer {
	local_root: PathBuf,
	remote_root: PathBuf,
	roots: RwLock<Vec<RootEntry>>,
	exclusion: ExclusionEngine,
}

impl Categorizer {
	pub fn new(local_root: &Path, remote_root: &Path, exclusion: ExclusionEngine) -> Self {
		let categorizer = Categorizer {
			local_root: local_root.to_path_buf(),
			remote_root: remote_root.to_path_buf(),
			roots: RwLock::new(Vec::new()),
			exclusion,
		};
		categorizer.refresh_roots();
		categorizer
	}

	/// Re-register both roots with their current canonical forms
	pub fn refresh_roots(&self) {
		let mut roots = Vec::new();
		for (side, root) in [(Side::Local, &self.local_root), (Side::Remote, &self.remote_root)] {
			roots.push(RootEntry { side, root: root.clone() });
			if let Ok(canonical) = std::fs::canonicalize(root) {
				if canonical != *root {
					debug!("{} root {} resolves to {}", side, root.display(), canonical.display());
					roots.push(RootEntry { side, root: canonical });
				}
			}
		}
		// Longest first so a nested match wins
		roots.sort_by(|a, b| b.root.as_os_str().len().cmp(&a.root.as_os_str().len()));
		*self.roots.write().unwrap_or_else(|e| e.into_inner()) = roots;
	}

	/// Side and relative path of `path`, if it lies strictly below a root
	///
	/// Paths with a component that is not valid UTF-8 are not resolved.
	pub fn resolve(&self, path: &Path) -> Option<(Side, String)> {
		let roots = self.roots.read().unwrap_or_else(|e| e.into_inner());
		for entry in roots.iter() {
			if let Ok(rest) = path.strip_prefix(&entry.root) {
				let Some(rel) = util::to_rel_string(rest) else {
					warn!("Ignoring non UTF-8 path {}", path.display());
					return None;
				};
				if rel.is_empty() {
					return None;
				}
				return Some((entry.side, rel));
			}
		}
		None
	}

	/// Attribute a raw notification, or say why it is dropped
	pub fn categorize(&self, raw: RawEvent) -> Result<QueuedEvent, Admission> {
		let (side, rel_path) = match self.resolve(&raw.path) {
			Some(found) => found,
			None => {
				debug!("Dropping event for unresolved path {}", raw.path.display());
				return Err(Admission::Unresolved);
			}
		};

		if self.exclusion.is_excluded(&rel_path) {
			return Err(Admission::Excluded);
		}

		Ok(QueuedEvent { raw, side, rel_path })
	}
}


// vim: ts=4
