/// Engine scenarios driven through `submit` over in-memory storages
///
/// Memory backends have no OS notification source, so every change is
/// reported explicitly. This makes the ordering deterministic:
/// 1. Manual sync followed by a remote edit propagates back to local
/// 2. Conflicts are reported once and leave the state maps alone
/// 3. Events arriving while paused are dropped, not replayed
/// 4. Bursts for one path collapse into one job
/// 5. Steps for the same path never overlap
/// 6. Startup failures are returned and leave no workers behind
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use twinsync::storage::{ReadStream, WriteSink};
use twinsync::util::hash;
use twinsync::{
	Admission, ChangeKind, Direction, EngineConfig, FileMetadata, Location, MemoryStorage, RawEvent,
	Storage, SyncEngine, SyncError, SyncEvent, SyncEventKind, SyncResult,
};

const LOCAL: &str = "/virtual/local";
const REMOTE: &str = "/virtual/remote";

fn at(secs: u64) -> SystemTime {
	UNIX_EPOCH + Duration::from_secs(secs)
}

fn local_event(rel: &str, kind: ChangeKind) -> RawEvent {
	RawEvent::new(format!("{}/{}", LOCAL, rel), kind)
}

fn remote_event(rel: &str, kind: ChangeKind) -> RawEvent {
	RawEvent::new(format!("{}/{}", REMOTE, rel), kind)
}

/// Poll `check` until it holds or five seconds pass
async fn eventually<F, Fut>(mut check: F) -> bool
where
	F: FnMut() -> Fut,
	Fut: Future<Output = bool>,
{
	let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
	while tokio::time::Instant::now() < deadline {
		if check().await {
			return true;
		}
		tokio::time::sleep(Duration::from_millis(20)).await;
	}
	false
}

struct Harness {
	engine: SyncEngine,
	local: MemoryStorage,
	remote: MemoryStorage,
	events: Arc<Mutex<Vec<SyncEvent>>>,
}

impl Harness {
	fn new(config: EngineConfig) -> Self {
		let local = MemoryStorage::new(LOCAL);
		let remote = MemoryStorage::new(REMOTE);
		let engine = SyncEngine::new(Arc::new(local.clone()), Arc::new(remote.clone()), config)
			.expect("engine should build");
		let events = Arc::new(Mutex::new(Vec::new()));
		let sink = Arc::clone(&events);
		engine.set_notifier(move |e: &SyncEvent| sink.lock().unwrap().push(e.clone()));
		Harness { engine, local, remote, events }
	}

	fn events(&self) -> Vec<SyncEvent> {
		self.events.lock().unwrap().clone()
	}

	async fn wait_for_events(&self, count: usize) -> bool {
		eventually(|| async { self.events.lock().unwrap().len() >= count }).await
	}
}

// ===================================================================
// SCENARIOS
// ===================================================================

#[tokio::test]
async fn test_notes_scenario_round_trip() {
	let h = Harness::new(EngineConfig::default());
	h.engine.run().await.unwrap();

	h.local.put("notes.txt", b"a", at(100));
	let report = h.engine.manual_sync().await.unwrap();
	assert_eq!(report.copied_to_remote, 1);
	assert_eq!(h.remote.read("notes.txt"), Some(b"a".to_vec()));

	let listing = h.engine.file_list().await;
	assert_eq!(listing.len(), 1);
	assert_eq!(listing[0].location, Location::Both);
	assert_eq!(listing[0].content_hash, hash(b"a"));

	// Edit only the remote copy
	h.remote.put("notes.txt", b"b", at(200));
	assert_eq!(h.engine.submit(remote_event("notes.txt", ChangeKind::Write)), Admission::Queued);

	assert!(h.wait_for_events(1).await, "remote edit should be synced");
	let events = h.events();
	assert_eq!(events[0].kind, SyncEventKind::Sync);
	assert_eq!(events[0].direction, Direction::RemoteToLocal);
	assert_eq!(events[0].path, "notes.txt");
	assert_eq!(h.local.read("notes.txt"), Some(b"b".to_vec()));

	let snapshot = h.engine.snapshot().await;
	assert_eq!(snapshot.local["notes.txt"].content_hash, hash(b"b"));
	assert_eq!(snapshot.remote["notes.txt"].content_hash, hash(b"b"));

	h.engine.stop().await;
}

#[tokio::test]
async fn test_paused_delete_is_not_replayed() {
	let h = Harness::new(EngineConfig::default());
	h.local.put("notes.txt", b"a", at(100));
	h.engine.run().await.unwrap();
	assert_eq!(h.remote.read("notes.txt"), Some(b"a".to_vec()));

	h.engine.pause();
	h.local.remove("notes.txt");
	assert_eq!(h.engine.submit(local_event("notes.txt", ChangeKind::Remove)), Admission::Queued);
	tokio::time::sleep(Duration::from_millis(200)).await;
	h.engine.resume();
	tokio::time::sleep(Duration::from_millis(200)).await;

	// Nothing happened while paused and nothing is replayed on resume
	assert!(h.events().is_empty());
	assert!(h.remote.contains("notes.txt"));
	assert_eq!(h.engine.local_file_count().await, 1);
	assert_eq!(h.engine.remote_file_count().await, 1);

	// A full pass restores the missing side from the surviving copy
	let report = h.engine.manual_sync().await.unwrap();
	assert_eq!(report.copied_to_local, 1);
	assert_eq!(h.local.read("notes.txt"), Some(b"a".to_vec()));

	h.engine.stop().await;
}

#[tokio::test]
async fn test_conflict_reported_once_and_state_kept() {
	let h = Harness::new(EngineConfig::default());
	h.engine.run().await.unwrap();

	h.remote.put("c.txt", b"remote", at(200));
	h.engine.submit(remote_event("c.txt", ChangeKind::Create));
	assert!(h.wait_for_events(1).await);
	let before = h.engine.snapshot().await;

	// An older, different local edit
	h.local.put("c.txt", b"stale local", at(150));
	assert_eq!(h.engine.submit(local_event("c.txt", ChangeKind::Write)), Admission::Queued);
	assert!(h.wait_for_events(2).await);
	tokio::time::sleep(Duration::from_millis(100)).await;

	let events = h.events();
	let conflicts: Vec<_> = events.iter().filter(|e| e.kind == SyncEventKind::Conflict).collect();
	assert_eq!(conflicts.len(), 1);
	assert_eq!(conflicts[0].message, "File conflict: c.txt (destination is newer)");
	assert_eq!(conflicts[0].direction, Direction::LocalToRemote);

	let after = h.engine.snapshot().await;
	assert_eq!(after.local["c.txt"], before.local["c.txt"]);
	assert_eq!(after.remote["c.txt"], before.remote["c.txt"]);
	assert_eq!(h.remote.read("c.txt"), Some(b"remote".to_vec()));

	h.engine.stop().await;
}

#[tokio::test]
async fn test_deletion_propagates() {
	let h = Harness::new(EngineConfig::default());
	h.local.put("docs/a.txt", b"a", at(10));
	h.local.put("keep.txt", b"k", at(10));
	h.engine.run().await.unwrap();
	assert!(h.remote.contains("docs/a.txt"));

	h.local.remove("docs/a.txt");
	h.engine.submit(local_event("docs/a.txt", ChangeKind::Remove));
	assert!(h.wait_for_events(1).await);

	let events = h.events();
	assert_eq!(events[0].kind, SyncEventKind::Delete);
	assert_eq!(events[0].message, "File deleted: docs/a.txt");
	assert!(!h.remote.contains("docs/a.txt"));

	let snapshot = h.engine.snapshot().await;
	assert!(!snapshot.local.contains_key("docs/a.txt"));
	assert!(!snapshot.remote.contains_key("docs/a.txt"));
	assert!(snapshot.remote.contains_key("keep.txt"));

	h.engine.stop().await;
}

#[tokio::test]
async fn test_convergence_after_mixed_operations() {
	let config = EngineConfig { debounce_ms: 20, ..EngineConfig::default() };
	let h = Harness::new(config);
	h.local.put("seed.txt", b"seed", at(1));
	h.engine.run().await.unwrap();

	let ops: Vec<(&str, Option<&[u8]>)> = vec![
		("one.txt", Some(b"1")),
		("two.txt", Some(b"2")),
		("one.txt", Some(b"1 again")),
		("seed.txt", None),
		("three/deep.txt", Some(b"3")),
		("two.txt", None),
	];
	for (i, (path, content)) in ops.into_iter().enumerate() {
		let kind = match content {
			Some(data) => {
				h.local.put(path, data, at(1000 + i as u64));
				ChangeKind::Write
			}
			None => {
				h.local.remove(path);
				ChangeKind::Remove
			}
		};
		// Leave room for the previous job on the same key to finish
		tokio::time::sleep(Duration::from_millis(60)).await;
		assert_eq!(h.engine.submit(local_event(path, kind)), Admission::Queued);
	}

	let converged = eventually(|| async {
		let snapshot = h.engine.snapshot().await;
		let local: HashMap<_, _> =
			snapshot.local.iter().map(|(k, v)| (k.clone(), v.content_hash.clone())).collect();
		let remote: HashMap<_, _> =
			snapshot.remote.iter().map(|(k, v)| (k.clone(), v.content_hash.clone())).collect();
		local == remote && local.len() == 2
	})
	.await;
	assert!(converged, "both maps should agree");
	assert_eq!(h.remote.read("one.txt"), Some(b"1 again".to_vec()));
	assert_eq!(h.remote.read("three/deep.txt"), Some(b"3".to_vec()));
	assert!(!h.remote.contains("two.txt"));
	assert!(!h.remote.contains("seed.txt"));

	h.engine.stop().await;
}

#[tokio::test]
async fn test_burst_collapses_to_one_job() {
	let h = Harness::new(EngineConfig::default());

	let outcomes: Vec<Admission> =
		(0..10).map(|_| h.engine.submit(local_event("burst.txt", ChangeKind::Write))).collect();

	assert_eq!(outcomes.iter().filter(|a| **a == Admission::Queued).count(), 1);
	assert_eq!(outcomes.iter().filter(|a| **a == Admission::Debounced).count(), 9);
	h.engine.stop().await;
}

#[tokio::test]
async fn test_stop_drains_queued_jobs() {
	let h = Harness::new(EngineConfig::default());
	h.engine.run().await.unwrap();

	for i in 0..20 {
		let path = format!("f{}.txt", i);
		h.local.put(&path, path.as_bytes(), at(10));
		h.engine.submit(local_event(&path, ChangeKind::Create));
	}
	h.engine.stop().await;

	for i in 0..20 {
		assert!(h.remote.contains(&format!("f{}.txt", i)), "queued job {} should have run", i);
	}
	assert_eq!(h.engine.submit(local_event("late.txt", ChangeKind::Create)), Admission::Stopped);
}

// ===================================================================
// MUTUAL EXCLUSION
// ===================================================================

/// Memory storage that tracks how many steps touch one path at once
struct Instrumented {
	inner: MemoryStorage,
	active: Arc<Mutex<HashMap<String, usize>>>,
	max_overlap: Arc<AtomicUsize>,
}

impl Instrumented {
	async fn enter(&self, rel_path: &str) {
		let now = {
			let mut active = self.active.lock().unwrap();
			let n = active.entry(rel_path.to_string()).or_insert(0);
			*n += 1;
			*n
		};
		self.max_overlap.fetch_max(now, Ordering::SeqCst);
		tokio::time::sleep(Duration::from_millis(30)).await;
		*self.active.lock().unwrap().get_mut(rel_path).unwrap() -= 1;
	}
}

#[async_trait]
impl Storage for Instrumented {
	async fn scan_all(&self) -> SyncResult<HashMap<String, FileMetadata>> {
		self.inner.scan_all().await
	}

	async fn open_read(&self, rel_path: &str) -> SyncResult<ReadStream> {
		self.inner.open_read(rel_path).await
	}

	async fn open_write(&self, rel_path: &str, mod_time: SystemTime) -> SyncResult<Box<dyn WriteSink>> {
		self.inner.open_write(rel_path, mod_time).await
	}

	async fn stat_one(&self, rel_path: &str) -> SyncResult<FileMetadata> {
		self.enter(rel_path).await;
		self.inner.stat_one(rel_path).await
	}

	async fn delete_one(&self, rel_path: &str) -> SyncResult<bool> {
		self.inner.delete_one(rel_path).await
	}

	async fn ensure_directory(&self, rel_path: &str) -> SyncResult<()> {
		self.inner.ensure_directory(rel_path).await
	}

	fn root_path(&self) -> &Path {
		self.inner.root_path()
	}
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_path_steps_never_overlap() {
	let active = Arc::new(Mutex::new(HashMap::new()));
	let max_overlap = Arc::new(AtomicUsize::new(0));
	let wrap = |root: &str| Instrumented {
		inner: MemoryStorage::new(root),
		active: Arc::clone(&active),
		max_overlap: Arc::clone(&max_overlap),
	};
	let local = wrap(LOCAL);
	let remote = wrap(REMOTE);
	local.inner.put("shared.txt", b"l", at(10));
	remote.inner.put("shared.txt", b"r", at(20));
	let (local_mem, remote_mem) = (local.inner.clone(), remote.inner.clone());

	let config = EngineConfig { workers: 4, ..EngineConfig::default() };
	let engine = SyncEngine::new(Arc::new(local), Arc::new(remote), config).unwrap();
	engine.run().await.unwrap();

	// Both sides raise an event for the same path at once
	local_mem.put("shared.txt", b"l2", at(30));
	remote_mem.put("shared.txt", b"r2", at(40));
	assert_eq!(engine.submit(local_event("shared.txt", ChangeKind::Write)), Admission::Queued);
	assert_eq!(engine.submit(remote_event("shared.txt", ChangeKind::Write)), Admission::Queued);
	engine.stop().await;

	assert_eq!(max_overlap.load(Ordering::SeqCst), 1);
}

// ===================================================================
// STARTUP FAILURES
// ===================================================================

/// Memory storage with switchable scan and read failures
struct Faulty {
	inner: MemoryStorage,
	root: PathBuf,
	fail_scans: Arc<AtomicBool>,
	fail_reads: Arc<AtomicBool>,
	watchable: bool,
}

impl Faulty {
	fn new(inner: MemoryStorage) -> Self {
		Faulty {
			root: inner.root_path().to_path_buf(),
			inner,
			fail_scans: Arc::new(AtomicBool::new(false)),
			fail_reads: Arc::new(AtomicBool::new(false)),
			watchable: false,
		}
	}
}

#[async_trait]
impl Storage for Faulty {
	async fn scan_all(&self) -> SyncResult<HashMap<String, FileMetadata>> {
		if self.fail_scans.load(Ordering::SeqCst) {
			return Err(SyncError::Scan {
				root: self.root.display().to_string(),
				source: Box::new(SyncError::io("", io::Error::from(io::ErrorKind::PermissionDenied))),
			});
		}
		self.inner.scan_all().await
	}

	async fn open_read(&self, rel_path: &str) -> SyncResult<ReadStream> {
		if self.fail_reads.load(Ordering::SeqCst) {
			return Err(SyncError::io(rel_path, io::Error::from(io::ErrorKind::PermissionDenied)));
		}
		self.inner.open_read(rel_path).await
	}

	async fn open_write(&self, rel_path: &str, mod_time: SystemTime) -> SyncResult<Box<dyn WriteSink>> {
		self.inner.open_write(rel_path, mod_time).await
	}

	async fn stat_one(&self, rel_path: &str) -> SyncResult<FileMetadata> {
		self.inner.stat_one(rel_path).await
	}

	async fn delete_one(&self, rel_path: &str) -> SyncResult<bool> {
		self.inner.delete_one(rel_path).await
	}

	async fn ensure_directory(&self, rel_path: &str) -> SyncResult<()> {
		self.inner.ensure_directory(rel_path).await
	}

	fn root_path(&self) -> &Path {
		&self.root
	}

	fn supports_watch(&self) -> bool {
		self.watchable
	}
}

#[tokio::test]
async fn test_failed_scan_aborts_run_and_allows_retry() {
	let local = Faulty::new(MemoryStorage::new(LOCAL));
	local.inner.put("a.txt", b"a", at(10));
	let fail_scans = Arc::clone(&local.fail_scans);
	fail_scans.store(true, Ordering::SeqCst);
	let remote = MemoryStorage::new(REMOTE);
	let engine =
		SyncEngine::new(Arc::new(local), Arc::new(remote.clone()), EngineConfig::default()).unwrap();

	let err = engine.run().await.unwrap_err();
	assert!(matches!(err, SyncError::Scan { .. }), "unexpected error: {}", err);
	assert!(!engine.status().await.running);
	assert!(!remote.contains("a.txt"));

	// Still idle, so a later attempt starts normally
	fail_scans.store(false, Ordering::SeqCst);
	engine.run().await.unwrap();
	assert!(engine.status().await.running);
	assert_eq!(remote.read("a.txt"), Some(b"a".to_vec()));
	engine.stop().await;
}

#[tokio::test]
async fn test_failed_reconcile_aborts_run_and_allows_retry() {
	let local = Faulty::new(MemoryStorage::new(LOCAL));
	local.inner.put("a.txt", b"a", at(10));
	let fail_reads = Arc::clone(&local.fail_reads);
	fail_reads.store(true, Ordering::SeqCst);
	let remote = MemoryStorage::new(REMOTE);
	let engine =
		SyncEngine::new(Arc::new(local), Arc::new(remote.clone()), EngineConfig::default()).unwrap();

	let err = engine.run().await.unwrap_err();
	assert!(matches!(err, SyncError::Reconcile { .. }), "unexpected error: {}", err);
	assert!(!engine.status().await.running);

	fail_reads.store(false, Ordering::SeqCst);
	engine.run().await.unwrap();
	assert_eq!(remote.read("a.txt"), Some(b"a".to_vec()));
	engine.stop().await;
}

#[tokio::test]
async fn test_watcher_failure_stops_started_workers() {
	let dir = tempfile::TempDir::new().unwrap();
	// A watchable side whose root never exists on disk
	let mut local = Faulty::new(MemoryStorage::new(dir.path().join("missing")));
	local.watchable = true;
	let remote = MemoryStorage::new(REMOTE);
	let engine =
		SyncEngine::new(Arc::new(local), Arc::new(remote), EngineConfig::default()).unwrap();

	let err = engine.run().await.unwrap_err();
	assert!(matches!(err, SyncError::Watch { .. }), "unexpected error: {}", err);
	assert!(!engine.status().await.running);

	// The queue is closed and the engine cannot be restarted
	let late = engine.submit(RawEvent::new(dir.path().join("missing/a.txt"), ChangeKind::Create));
	assert_eq!(late, Admission::Stopped);
	assert!(matches!(engine.run().await, Err(SyncError::Stopped)));
	engine.stop().await;
}

// vim: ts=4
