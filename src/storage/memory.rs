//! In-memory backend
//!
//! Keeps file bytes in a shared map under a virtual root. Useful as a side
//! that has no OS notification source; changes are fed to the engine through
//! [`crate::engine::SyncEngine::submit`].

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::SystemTime;
use tokio::io::AsyncWrite;

use super::{ReadStream, Storage, WriteSink};
use crate::error::{SyncError, SyncResult};
use crate::exclusion::is_hidden;
use crate::types::{is_zero_time, FileMetadata};
use crate::util::{self, lock};

#[derive(Debug, Clone)]
enum MemEntry {
	File { data: Vec<u8>, mod_time: SystemTime },
	Dir { mod_time: SystemTime },
}

type Entries = Arc<Mutex<BTreeMap<String, MemEntry>>>;

/// Record `entry` at `rel_path` and a directory for every missing ancestor
fn insert_with_parents(entries: &mut BTreeMap<String, MemEntry>, rel_path: &str, entry: MemEntry) {
	let mut end = 0;
	while let Some(pos) = rel_path[end..].find('/') {
		end += pos;
		entries
			.entry(rel_path[..end].to_string())
			.or_insert(MemEntry::Dir { mod_time: SystemTime::now() });
		end += 1;
	}
	entries.insert(rel_path.to_string(), entry);
}

#[derive(Debug, Clone)]
pub struct MemoryStorage {
	root: PathBuf,
	entries: Entries,
}

impl MemoryStorage {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		MemoryStorage { root: root.into(), entries: Arc::new(Mutex::new(BTreeMap::new())) }
	}

	/// Place a file directly, bypassing the engine
	pub fn put(&self, rel_path: &str, data: &[u8], mod_time: SystemTime) {
		let entry = MemEntry::File { data: data.to_vec(), mod_time };
		insert_with_parents(&mut lock(&self.entries), rel_path, entry);
	}

	/// Remove a file or directory subtree directly, bypassing the engine
	///
	/// Returns whether anything was removed.
	pub fn remove(&self, rel_path: &str) -> bool {
		let prefix = format!("{}/", rel_path);
		let mut entries = lock(&self.entries);
		let before = entries.len();
		entries.retain(|k, _| k != rel_path && !k.starts_with(&prefix));
		entries.len() != before
	}

	/// Bytes of a file, if present
	pub fn read(&self, rel_path: &str) -> Option<Vec<u8>> {
		match lock(&self.entries).get(rel_path) {
			Some(MemEntry::File { data, .. }) => Some(data.clone()),
			_ => None,
		}
	}

	pub fn contains(&self, rel_path: &str) -> bool {
		lock(&self.entries).contains_key(rel_path)
	}
}

#[async_trait]
impl Storage for MemoryStorage {
	async fn scan_all(&self) -> SyncResult<HashMap<String, FileMetadata>> {
		let entries = lock(&self.entries);
		Ok(entries
			.iter()
			.filter(|(path, _)| !is_hidden(path))
			.filter_map(|(path, entry)| match entry {
				MemEntry::File { data, mod_time } => {
					Some((path.clone(), FileMetadata::new(path.as_str(), util::hash(data), *mod_time)))
				}
				MemEntry::Dir { .. } => None,
			})
			.collect())
	}

	async fn open_read(&self, rel_path: &str) -> SyncResult<ReadStream> {
		match self.read(rel_path) {
			Some(data) => Ok(Box::new(io::Cursor::new(data))),
			None => Err(SyncError::NotFound { path: rel_path.to_string() }),
		}
	}

	async fn open_write(&self, rel_path: &str, mod_time: SystemTime) -> SyncResult<Box<dyn WriteSink>> {
		Ok(Box::new(MemWriteSink {
			entries: Arc::clone(&self.entries),
			path: rel_path.to_string(),
			mod_time,
			buf: Vec::new(),
		}))
	}

	async fn stat_one(&self, rel_path: &str) -> SyncResult<FileMetadata> {
		match lock(&self.entries).get(rel_path) {
			Some(MemEntry::File { data, mod_time }) => {
				Ok(FileMetadata::new(rel_path, util::hash(data), *mod_time))
			}
			Some(MemEntry::Dir { mod_time }) => Ok(FileMetadata::directory(rel_path, *mod_time)),
			None => Err(SyncError::NotFound { path: rel_path.to_string() }),
		}
	}

	async fn delete_one(&self, rel_path: &str) -> SyncResult<bool> {
		Ok(self.remove(rel_path))
	}

	async fn ensure_directory(&self, rel_path: &str) -> SyncResult<()> {
		if rel_path.is_empty() {
			return Ok(());
		}
		let mut entries = lock(&self.entries);
		if !entries.contains_key(rel_path) {
			insert_with_parents(&mut entries, rel_path, MemEntry::Dir { mod_time: SystemTime::now() });
		}
		Ok(())
	}

	fn root_path(&self) -> &Path {
		&self.root
	}
}

struct MemWriteSink {
	entries: Entries,
	path: String,
	mod_time: SystemTime,
	buf: Vec<u8>,
}

impl AsyncWrite for MemWriteSink {
	fn poll_write(
		mut self: Pin<&mut Self>,
		_cx: &mut Context<'_>,
		buf: &[u8],
	) -> Poll<io::Result<usize>> {
		self.buf.extend_from_slice(buf);
		Poll::Ready(Ok(buf.len()))
	}

	fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
		Poll::Ready(Ok(()))
	}

	fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
		Poll::Ready(Ok(()))
	}
}

#[async_trait]
impl WriteSink for MemWriteSink {
	async fn finish(self: Box<Self>) -> SyncResult<()> {
		let MemWriteSink { entries, path, mod_time, buf } = *self;
		let mod_time = if is_zero_time(mod_time) { SystemTime::now() } else { mod_time };
		insert_with_parents(&mut lock(&entries), &path, MemEntry::File { data: buf, mod_time });
		Ok(())
	}
}


// vim: ts=4
