//! Per-event synchronization step
//!
//! Runs with the path lock held by the calling worker and the state write
//! lock held for its whole duration.

use super::event::{ChangeKind, QueuedEvent};
use super::notifier::{SyncEvent, SyncEventKind};
use super::state::StateMaps;
use super::EngineInner;
use crate::error::SyncResult;
use crate::logging::*;
use crate::storage::copy_between;
use crate::strategies::ConflictStrategy;
use crate::types::{Direction, FileMetadata};

impl EngineInner {
	/// Apply one admitted event
	pub(crate) async fn handle_event(&self, job: &QueuedEvent) -> SyncResult<()> {
		if self.is_paused() {
			debug!("Paused, skipping {} {}", job.raw.kind, job.rel_path);
			return Ok(());
		}

		let mut maps = self.state.write().await;
		match job.raw.kind {
			ChangeKind::Create | ChangeKind::Write | ChangeKind::Chmod => {
				self.sync_path(&mut maps, job).await
			}
			ChangeKind::Remove => self.propagate_removal(&mut maps, job, SyncEventKind::Delete).await,
			ChangeKind::Rename => self.propagate_removal(&mut maps, job, SyncEventKind::Move).await,
			ChangeKind::Other => Ok(()),
		}
	}

	async fn sync_path(&self, maps: &mut StateMaps, job: &QueuedEvent) -> SyncResult<()> {
		let source = job.side;
		let rel = job.rel_path.as_str();

		let fresh = match self.storage(source).stat_one(rel).await {
			Ok(meta) => meta,
			Err(e) if e.is_not_found() => {
				debug!("{} vanished from {} before processing", rel, source);
				return self.propagate_removal(maps, job, SyncEventKind::Delete).await;
			}
			Err(e) => return Err(e),
		};

		if fresh.is_directory() {
			if job.raw.kind == ChangeKind::Create {
				return self.sync_directory(maps, job, fresh).await;
			}
			debug!("Ignoring {} on directory {}", job.raw.kind, rel);
			return Ok(());
		}

		let known = maps.side(source.opposite()).get(rel).cloned();
		match known {
			Some(dest) if dest.same_content(&fresh) => {
				maps.set_both(&fresh);
				Ok(())
			}
			Some(dest) if fresh.mod_time <= dest.mod_time => {
				self.resolve_conflict(maps, job, &dest).await
			}
			_ => {
				copy_between(self.storage(source), self.storage(source.opposite()), rel, fresh.mod_time)
					.await?;
				maps.set_both(&fresh);

				let direction = Direction::from_source(source);
				info!("Synced {} ({})", rel, direction);
				self.notifier.emit(SyncEvent::new(
					SyncEventKind::Sync,
					rel,
					direction,
					format!("File synced: {}", rel),
				));
				Ok(())
			}
		}
	}

	async fn resolve_conflict(
		&self,
		maps: &mut StateMaps,
		job: &QueuedEvent,
		dest: &FileMetadata,
	) -> SyncResult<()> {
		let source = job.side;
		let rel = job.rel_path.as_str();
		let direction = Direction::from_source(source);

		let message = match self.config.conflict_strategy {
			ConflictStrategy::Report => {
				warn!("Conflict on {}: {} copy is newer", rel, source.opposite());
				format!("File conflict: {} (destination is newer)", rel)
			}
			ConflictStrategy::RevertToNewer => {
				copy_between(self.storage(source.opposite()), self.storage(source), rel, dest.mod_time)
					.await?;
				maps.set_both(dest);
				warn!("Conflict on {}: reverted {} copy to the newer {} copy", rel, source, source.opposite());
				format!("File conflict: {} (destination is newer, source reverted)", rel)
			}
		};

		self.notifier.emit(SyncEvent::new(SyncEventKind::Conflict, rel, direction, message));
		Ok(())
	}

	async fn sync_directory(
		&self,
		maps: &mut StateMaps,
		job: &QueuedEvent,
		meta: FileMetadata,
	) -> SyncResult<()> {
		let source = job.side;
		let rel = job.rel_path.as_str();

		if self.watches.is_open() {
			if let Err(e) = self.watches.add_tree(&job.raw.path) {
				warn!("Failed to watch new directory {}: {}", job.raw.path.display(), e);
			}
		}

		let echoed = maps.local.get(rel).map_or(false, FileMetadata::is_directory)
			&& maps.remote.get(rel).map_or(false, FileMetadata::is_directory);

		self.storage(source.opposite()).ensure_directory(rel).await?;
		maps.set_both(&FileMetadata::directory(rel, meta.mod_time));

		if echoed {
			debug!("Directory {} already present on both sides", rel);
			return Ok(());
		}

		let direction = Direction::from_source(source);
		info!("Created directory {} ({})", rel, direction);
		self.notifier.emit(SyncEvent::new(
			SyncEventKind::Sync,
			rel,
			direction,
			format!("Directory synced: {}", rel),
		));
		Ok(())
	}

	/// Delete the counterpart and forget the path on both sides
	///
	/// A removal or rename that finds nothing to delete and no map entry is
	/// the echo of a removal already propagated and stays silent. A source
	/// that vanished before its create or write was processed always
	/// reports the delete.
	async fn propagate_removal(
		&self,
		maps: &mut StateMaps,
		job: &QueuedEvent,
		kind: SyncEventKind,
	) -> SyncResult<()> {
		let dest = job.side.opposite();
		let rel = job.rel_path.as_str();

		let removed = match self.storage(dest).delete_one(rel).await {
			Ok(removed) => removed,
			Err(e) if e.is_not_found() => false,
			Err(e) => {
				error!("Failed to delete {} on {}: {}", rel, dest, e);
				true
			}
		};
		let known = maps.remove_path(rel);

		let echoed = matches!(job.raw.kind, ChangeKind::Remove | ChangeKind::Rename) && !removed && !known;
		if echoed {
			debug!("{} already gone from both sides, nothing to report", rel);
			return Ok(());
		}

		let direction = Direction::from_source(job.side);
		let message = match kind {
			SyncEventKind::Move => format!("File moved or renamed: {}", rel),
			_ => format!("File deleted: {}", rel),
		};
		info!("{}", message);
		self.notifier.emit(SyncEvent::new(kind, rel, direction, message));
		Ok(())
	}
}


// vim: ts=4
