//! Full bidirectional reconciliation of the two state maps

use std::collections::BTreeSet;

use super::state::StateMaps;
use crate::error::{SyncError, SyncResult};
use crate::logging::*;
use crate::storage::{copy_between, Storage};
use crate::types::{FileMetadata, Side};

/// Work done by one reconciliation pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
	pub copied_to_remote: usize,
	pub copied_to_local: usize,
	pub directories_created: usize,
}

impl ReconcileReport {
	pub fn total(&self) -> usize {
		self.copied_to_remote + self.copied_to_local + self.directories_created
	}
}

/// Bring both sides into agreement
///
/// Paths are visited in sorted order. Local-only entries go to remote,
/// remote-only entries go to local and, where both hold differing content,
/// the later modification time wins with ties going to local. The first
/// failing transfer aborts the pass.
pub async fn reconcile(
	maps: &mut StateMaps,
	local: &dyn Storage,
	remote: &dyn Storage,
) -> SyncResult<ReconcileReport> {
	let mut report = ReconcileReport::default();

	let paths: BTreeSet<String> = maps.local.keys().chain(maps.remote.keys()).cloned().collect();

	for path in &paths {
		let winner = match (maps.local.get(path), maps.remote.get(path)) {
			(Some(l), None) => (Side::Local, l.clone()),
			(None, Some(r)) => (Side::Remote, r.clone()),
			(Some(l), Some(r)) => {
				if l.is_directory() && r.is_directory() {
					continue;
				}
				if l.content_hash == r.content_hash {
					continue;
				}
				if r.mod_time > l.mod_time {
					(Side::Remote, r.clone())
				} else {
					(Side::Local, l.clone())
				}
			}
			(None, None) => continue,
		};

		let (source, meta) = winner;
		transfer(source, &meta, local, remote, &mut report)
			.await
			.map_err(|e| SyncError::Reconcile { path: path.clone(), source: Box::new(e) })?;
		maps.side_mut(source.opposite()).insert(path.clone(), meta);
	}

	info!(
		"Reconciliation complete: {} to remote, {} to local, {} directories",
		report.copied_to_remote, report.copied_to_local, report.directories_created
	);
	Ok(report)
}

async fn transfer(
	source: Side,
	meta: &FileMetadata,
	local: &dyn Storage,
	remote: &dyn Storage,
	report: &mut ReconcileReport,
) -> SyncResult<()> {
	let (src, dst) = match source {
		Side::Local => (local, remote),
		Side::Remote => (remote, local),
	};

	if meta.is_directory() {
		dst.ensure_directory(&meta.relative_path).await?;
		report.directories_created += 1;
		debug!("Created directory {} on {}", meta.relative_path, source.opposite());
		return Ok(());
	}

	let bytes = copy_between(src, dst, &meta.relative_path, meta.mod_time).await?;
	match source {
		Side::Local => report.copied_to_remote += 1,
		Side::Remote => report.copied_to_local += 1,
	}
	debug!("Copied {} ({} bytes) {} -> {}", meta.relative_path, bytes, source, source.opposite());
	Ok(())
}


// vim: ts=4
