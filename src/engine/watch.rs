//! OS change notifications for both roots
//!
//! Each directory is watched non-recursively and new directories are added
//! as their creation is processed, so the set of watches tracks the tree.

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::event::{ChangeKind, RawEvent};
use super::EngineInner;
use crate::error::SyncResult;
use crate::logging::*;
use crate::util::lock;

/// Translate one notify event into zero or more raw events
pub fn map_event(event: &Event) -> Vec<RawEvent> {
	let per_path = |kind: ChangeKind| -> Vec<RawEvent> {
		event.paths.iter().map(|p| RawEvent::new(p.clone(), kind)).collect()
	};

	match &event.kind {
		EventKind::Create(_) => per_path(ChangeKind::Create),
		EventKind::Modify(ModifyKind::Metadata(_)) => per_path(ChangeKind::Chmod),
		EventKind::Modify(ModifyKind::Name(mode)) => match mode {
			RenameMode::From => per_path(ChangeKind::Rename),
			RenameMode::To => per_path(ChangeKind::Create),
			RenameMode::Both if event.paths.len() == 2 => vec![
				RawEvent::new(event.paths[0].clone(), ChangeKind::Rename),
				RawEvent::new(event.paths[1].clone(), ChangeKind::Create),
			],
			// Backends that cannot pair both halves report each path alone
			_ => event
				.paths
				.iter()
				.map(|p| {
					let kind = if p.exists() { ChangeKind::Create } else { ChangeKind::Rename };
					RawEvent::new(p.clone(), kind)
				})
				.collect(),
		},
		EventKind::Modify(_) => per_path(ChangeKind::Write),
		EventKind::Remove(_) => per_path(ChangeKind::Remove),
		EventKind::Access(_) | EventKind::Any | EventKind::Other => per_path(ChangeKind::Other),
	}
}

/// Owner of the OS watch handle
#[derive(Default)]
pub struct WatchRegistry {
	watcher: Mutex<Option<RecommendedWatcher>>,
}

impl WatchRegistry {
	/// Create the OS watcher; events are forwarded to the returned channel
	pub(crate) fn open(&self) -> SyncResult<mpsc::UnboundedReceiver<notify::Result<Event>>> {
		let (tx, rx) = mpsc::unbounded_channel();
		let watcher = RecommendedWatcher::new(
			move |res| {
				let _ = tx.send(res);
			},
			Config::default(),
		)?;
		*lock(&self.watcher) = Some(watcher);
		Ok(rx)
	}

	pub fn is_open(&self) -> bool {
		lock(&self.watcher).is_some()
	}

	/// Watch a single directory; no-op once closed
	pub fn add_directory(&self, dir: &Path) -> SyncResult<()> {
		let mut guard = lock(&self.watcher);
		if let Some(watcher) = guard.as_mut() {
			watcher.watch(dir, RecursiveMode::NonRecursive)?;
			debug!("Watching {}", dir.display());
		}
		Ok(())
	}

	/// Watch `root` and every non-hidden directory below it
	///
	/// Fails only if `root` itself cannot be watched; nested failures are
	/// logged and skipped.
	pub fn add_tree(&self, root: &Path) -> SyncResult<()> {
		self.add_directory(root)?;

		let mut pending = vec![root.to_path_buf()];
		while let Some(dir) = pending.pop() {
			let entries = match std::fs::read_dir(&dir) {
				Ok(entries) => entries,
				Err(e) => {
					warn!("Cannot list {} for watching: {}", dir.display(), e);
					continue;
				}
			};
			for entry in entries.flatten() {
				let hidden = entry.file_name().to_string_lossy().starts_with('.');
				let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
				if hidden || !is_dir {
					continue;
				}
				let path = entry.path();
				if let Err(e) = self.add_directory(&path) {
					warn!("Failed to watch {}: {}", path.display(), e);
					continue;
				}
				pending.push(path);
			}
		}
		Ok(())
	}

	/// Drop the OS handle, ending event delivery
	pub fn close(&self) {
		if lock(&self.watcher).take().is_some() {
			debug!("Watcher closed");
		}
	}
}

/// Forward notifications into the engine until the stop signal is raised
pub(crate) fn start_watch_task(
	inner: Arc<EngineInner>,
	mut events: mpsc::UnboundedReceiver<notify::Result<Event>>,
	mut stop: watch::Receiver<bool>,
) -> JoinHandle<()> {
	tokio::spawn(async move {
		loop {
			tokio::select! {
				biased;
				changed = stop.changed() => {
					if changed.is_err() || *stop.borrow() {
						break;
					}
				}
				received = events.recv() => match received {
					Some(Ok(event)) => {
						for raw in map_event(&event) {
							inner.submit(raw);
						}
					}
					Some(Err(e)) => error!("Watch error: {}", e),
					None => break,
				},
			}
		}
		inner.watches.close();
		info!("Watch task stopped");
	})
}


// vim: ts=4
