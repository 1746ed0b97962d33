//! The synchronization engine
//!
//! Startup runs strictly in order: both roots are created, both sides are
//! scanned, the state maps are reconciled, the worker pool starts and only
//! then does the watcher begin feeding events. Every event then travels
//! categorizer → debounce → bounded queue → worker → step.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use twinsync::{EngineConfig, FileSystemStorage, SyncEngine, SyncEvent};
//!
//! # async fn demo() -> twinsync::SyncResult<()> {
//! let config = EngineConfig::default();
//! let local = Arc::new(FileSystemStorage::new(&config.local_root)?);
//! let remote = Arc::new(FileSystemStorage::new(&config.remote_root)?);
//!
//! let engine = SyncEngine::new(local, remote, config)?;
//! engine.set_notifier(|e: &SyncEvent| println!("{}: {}", e.kind, e.message));
//! engine.run().await?;
//! // ...
//! engine.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod debounce;
pub mod event;
pub mod locks;
pub mod notifier;
pub mod reconcile;
pub mod state;
mod step;
pub mod watch;
mod worker;

pub use self::event::{Admission, ChangeKind, QueuedEvent, RawEvent};
pub use self::notifier::{SyncEvent, SyncEventKind, SyncNotifier};
pub use self::reconcile::ReconcileReport;

use futures::future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock as StdRwLock};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch as signal, Mutex as AsyncMutex, RwLock};
use tokio::task::JoinHandle;

use self::debounce::Debouncer;
use self::event::Categorizer;
use self::locks::PathLocks;
use self::notifier::NotifierSlot;
use self::state::StateMaps;
use self::watch::WatchRegistry;
use self::worker::JobReceiver;
use crate::config::EngineConfig;
use crate::error::{SyncError, SyncResult};
use crate::exclusion::ExclusionEngine;
use crate::logging::*;
use crate::storage::Storage;
use crate::types::{EngineStatus, FileInfo, Side};
use crate::util::lock;

/// State shared between the engine handle, the watch task and the workers
pub(crate) struct EngineInner {
	local: Arc<dyn Storage>,
	remote: Arc<dyn Storage>,
	config: EngineConfig,
	state: RwLock<StateMaps>,
	paused: StdRwLock<bool>,
	debouncer: Debouncer,
	locks: PathLocks,
	categorizer: Categorizer,
	notifier: NotifierSlot,
	watches: WatchRegistry,
	jobs: Mutex<Option<mpsc::Sender<QueuedEvent>>>,
	pending_rx: Mutex<Option<JobReceiver>>,
	stop: signal::Sender<bool>,
}

impl EngineInner {
	fn new(local: Arc<dyn Storage>, remote: Arc<dyn Storage>, config: EngineConfig) -> SyncResult<Self> {
		config.validate()?;
		if local.root_path() == remote.root_path() {
			return Err(SyncError::config(format!(
				"local and remote storage share the root {}",
				local.root_path().display()
			)));
		}

		let exclusion = ExclusionEngine::new(&config.exclude_patterns)?;
		let categorizer = Categorizer::new(local.root_path(), remote.root_path(), exclusion);
		let (tx, rx) = mpsc::channel(config.queue_capacity);
		let (stop, _) = signal::channel(false);

		Ok(EngineInner {
			debouncer: Debouncer::new(config.debounce_interval()),
			local,
			remote,
			config,
			state: RwLock::new(StateMaps::default()),
			paused: StdRwLock::new(false),
			locks: PathLocks::new(),
			categorizer,
			notifier: NotifierSlot::default(),
			watches: WatchRegistry::default(),
			jobs: Mutex::new(Some(tx)),
			pending_rx: Mutex::new(Some(Arc::new(AsyncMutex::new(rx)))),
			stop,
		})
	}

	fn storage(&self, side: Side) -> &dyn Storage {
		match side {
			Side::Local => self.local.as_ref(),
			Side::Remote => self.remote.as_ref(),
		}
	}

	fn is_paused(&self) -> bool {
		*self.paused.read().unwrap_or_else(|e| e.into_inner())
	}

	fn set_paused(&self, paused: bool) {
		*self.paused.write().unwrap_or_else(|e| e.into_inner()) = paused;
	}

	fn is_stopping(&self) -> bool {
		*self.stop.borrow()
	}

	/// Categorize, debounce and enqueue one raw notification
	fn submit(&self, raw: RawEvent) -> Admission {
		if self.is_stopping() {
			debug!("Engine stopping, dropping event for {}", raw.path.display());
			return Admission::Stopped;
		}

		let job = match self.categorizer.categorize(raw) {
			Ok(job) => job,
			Err(dropped) => return dropped,
		};

		if !self.debouncer.admit(job.side, &job.rel_path) {
			debug!("Debounced {} {} on {}", job.raw.kind, job.rel_path, job.side);
			return Admission::Debounced;
		}

		let jobs = lock(&self.jobs);
		let sender = match jobs.as_ref() {
			Some(sender) => sender,
			None => return Admission::Stopped,
		};
		match sender.try_send(job) {
			Ok(()) => Admission::Queued,
			Err(TrySendError::Full(job)) => {
				warn!("Job queue full, dropping {} {} on {}", job.raw.kind, job.rel_path, job.side);
				Admission::QueueFull
			}
			Err(TrySendError::Closed(_)) => Admission::Stopped,
		}
	}

	/// Rescan both sides and reconcile, holding the state lock throughout
	async fn rescan_and_reconcile(&self) -> SyncResult<ReconcileReport> {
		let mut maps = self.state.write().await;
		let local = self.local.scan_all().await?;
		let remote = self.remote.scan_all().await?;
		info!("Scanned {} local and {} remote files", local.len(), remote.len());
		maps.local = local;
		maps.remote = remote;
		reconcile::reconcile(&mut maps, self.local.as_ref(), self.remote.as_ref()).await
	}
}

enum RunState {
	Idle,
	Running { watch: Option<JoinHandle<()>>, workers: Vec<JoinHandle<()>> },
	Stopped,
}

/// Handle owning a two-sided sync engine
pub struct SyncEngine {
	inner: Arc<EngineInner>,
	tasks: AsyncMutex<RunState>,
	running: AtomicBool,
}

impl SyncEngine {
	/// Create an engine over two storages
	///
	/// Fails with a configuration error if `config` does not validate or
	/// both storages share a root.
	pub fn new(local: Arc<dyn Storage>, remote: Arc<dyn Storage>, config: EngineConfig) -> SyncResult<Self> {
		Ok(SyncEngine {
			inner: Arc::new(EngineInner::new(local, remote, config)?),
			tasks: AsyncMutex::new(RunState::Idle),
			running: AtomicBool::new(false),
		})
	}

	pub fn config(&self) -> &EngineConfig {
		&self.inner.config
	}

	/// Register the single outcome sink, replacing any previous one
	pub fn set_notifier<N: SyncNotifier + 'static>(&self, notifier: N) {
		self.inner.notifier.set(Some(Arc::new(notifier)));
	}

	pub fn clear_notifier(&self) {
		self.inner.notifier.set(None);
	}

	/// Start synchronizing
	///
	/// Any failure before the worker pool starts is returned and leaves the
	/// engine idle. A watcher failure stops the already started workers.
	pub async fn run(&self) -> SyncResult<()> {
		let mut tasks = self.tasks.lock().await;
		match *tasks {
			RunState::Idle => {}
			RunState::Running { .. } => return Err(SyncError::config("engine is already running")),
			RunState::Stopped => return Err(SyncError::Stopped),
		}

		let inner = &self.inner;
		for side in [Side::Local, Side::Remote] {
			let storage = inner.storage(side);
			storage.ensure_directory("").await.map_err(|e| {
				SyncError::config(format!(
					"{} root {} is unreachable: {}",
					side,
					storage.root_path().display(),
					e
				))
			})?;
		}
		inner.categorizer.refresh_roots();

		let report = inner.rescan_and_reconcile().await?;
		info!("Initial reconciliation transferred {} entries", report.total());

		let jobs = lock(&inner.pending_rx).take().ok_or(SyncError::Stopped)?;
		let count = inner.config.effective_workers();
		let workers = worker::spawn_workers(inner, jobs, count);
		info!("Started {} workers", count);

		match self.start_watching() {
			Ok(watch) => {
				*tasks = RunState::Running { watch, workers };
				self.running.store(true, Ordering::SeqCst);
				info!(
					"Sync engine running: {} <-> {}",
					inner.local.root_path().display(),
					inner.remote.root_path().display()
				);
				Ok(())
			}
			Err(e) => {
				error!("Failed to start watcher: {}", e);
				*tasks = RunState::Running { watch: None, workers };
				drop(tasks);
				self.stop().await;
				Err(e)
			}
		}
	}

	fn start_watching(&self) -> SyncResult<Option<JoinHandle<()>>> {
		let inner = &self.inner;
		let roots: Vec<_> = [&inner.local, &inner.remote]
			.into_iter()
			.filter(|s| s.supports_watch())
			.map(|s| s.root_path().to_path_buf())
			.collect();
		if roots.is_empty() {
			info!("No watchable side, relying on submitted events");
			return Ok(None);
		}

		let events = inner.watches.open()?;
		for root in &roots {
			inner.watches.add_tree(root)?;
			info!("Watching {}", root.display());
		}
		Ok(Some(watch::start_watch_task(Arc::clone(inner), events, inner.stop.subscribe())))
	}

	/// Offer a change notification for an absolute path
	///
	/// The watch task feeds OS notifications through here; backends with
	/// their own change feed can call it directly.
	pub fn submit(&self, raw: RawEvent) -> Admission {
		self.inner.submit(raw)
	}

	/// Suspend processing; events handled while paused are dropped
	pub fn pause(&self) {
		self.inner.set_paused(true);
		info!("Sync paused");
	}

	pub fn resume(&self) {
		self.inner.set_paused(false);
		info!("Sync resumed");
	}

	pub fn is_paused(&self) -> bool {
		self.inner.is_paused()
	}

	/// Full rescan of both sides followed by reconciliation
	pub async fn manual_sync(&self) -> SyncResult<ReconcileReport> {
		if self.inner.is_stopping() {
			return Err(SyncError::Stopped);
		}
		info!("Manual sync requested");
		self.inner.rescan_and_reconcile().await
	}

	/// Stop the watcher, then drain queued jobs and wait for the workers
	///
	/// Safe to call more than once.
	pub async fn stop(&self) {
		let mut tasks = self.tasks.lock().await;
		let previous = std::mem::replace(&mut *tasks, RunState::Stopped);
		self.inner.stop.send_replace(true);
		self.running.store(false, Ordering::SeqCst);

		let (watch, workers) = match previous {
			RunState::Running { watch, workers } => (watch, workers),
			RunState::Idle | RunState::Stopped => {
				lock(&self.inner.jobs).take();
				return;
			}
		};

		if let Some(watch) = watch {
			if let Err(e) = watch.await {
				error!("Watch task failed: {}", e);
			}
		}
		self.inner.watches.close();

		// Closing the queue lets workers finish what is already queued
		lock(&self.inner.jobs).take();
		for result in future::join_all(workers).await {
			if let Err(e) = result {
				error!("Worker task failed: {}", e);
			}
		}
		info!("Sync engine stopped");
	}

	pub async fn local_file_count(&self) -> usize {
		self.inner.state.read().await.local.len()
	}

	pub async fn remote_file_count(&self) -> usize {
		self.inner.state.read().await.remote.len()
	}

	/// Consolidated listing of both sides, computed on each call
	pub async fn file_list(&self) -> Vec<FileInfo> {
		self.inner.state.read().await.file_list()
	}

	pub async fn status(&self) -> EngineStatus {
		let maps = self.inner.state.read().await;
		EngineStatus {
			local_files: maps.local.len(),
			remote_files: maps.remote.len(),
			paused: self.is_paused(),
			running: self.running.load(Ordering::SeqCst),
		}
	}

	/// Snapshot of both state maps
	pub async fn snapshot(&self) -> StateMaps {
		self.inner.state.read().await.clone()
	}
}


// vim: ts=4
