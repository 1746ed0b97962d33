//! Storage capability required of each synchronized side
//!
//! The engine only talks to a side through [`Storage`]. Any backend that
//! implements it (local filesystem, in-memory, object store) can be used as
//! either the local or the remote side.

pub mod fs;
pub mod memory;

pub use self::fs::FileSystemStorage;
pub use self::memory::MemoryStorage;

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::time::SystemTime;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::{SyncError, SyncResult};
use crate::types::FileMetadata;

/// Byte stream returned by [`Storage::open_read`]
pub type ReadStream = Box<dyn AsyncRead + Send + Unpin>;

/// Byte sink returned by [`Storage::open_write`]
///
/// Data is written through `AsyncWrite`; `finish` must be called once all
/// bytes are written. It flushes and applies the requested modification time.
#[async_trait]
pub trait WriteSink: AsyncWrite + Send + Unpin {
	async fn finish(self: Box<Self>) -> SyncResult<()>;
}

/// Primitive per-side operations the sync engine relies on
#[async_trait]
pub trait Storage: Send + Sync {
	/// Metadata of every file under the root, keyed by relative path
	///
	/// Recurses into subdirectories and skips hidden entries. Fails with
	/// [`SyncError::Scan`] if the traversal fails.
	async fn scan_all(&self) -> SyncResult<HashMap<String, FileMetadata>>;

	/// Open a file for reading; [`SyncError::NotFound`] if absent
	async fn open_read(&self, rel_path: &str) -> SyncResult<ReadStream>;

	/// Open a file for writing, creating parent directories as needed
	///
	/// On finish the destination's modification time is set to `mod_time`
	/// unless it is the zero time.
	async fn open_write(&self, rel_path: &str, mod_time: SystemTime) -> SyncResult<Box<dyn WriteSink>>;

	/// Fresh hash and modification time of one path
	///
	/// Directories yield directory metadata (empty hash).
	async fn stat_one(&self, rel_path: &str) -> SyncResult<FileMetadata>;

	/// Remove a file or directory; succeeds if already absent
	///
	/// Returns whether anything was removed.
	async fn delete_one(&self, rel_path: &str) -> SyncResult<bool>;

	/// Create a directory and its parents; idempotent
	async fn ensure_directory(&self, rel_path: &str) -> SyncResult<()>;

	/// Root used to attribute absolute event paths to this side
	fn root_path(&self) -> &Path;

	/// Whether `root_path` is a directory the OS notification source can
	/// watch; other backends feed changes through the engine's submit
	fn supports_watch(&self) -> bool {
		false
	}
}

/// Stream one file from `src` to `dst`, preserving `mod_time`
///
/// Returns the number of bytes copied.
pub async fn copy_between(
	src: &dyn Storage,
	dst: &dyn Storage,
	rel_path: &str,
	mod_time: SystemTime,
) -> SyncResult<u64> {
	let mut reader = src.open_read(rel_path).await?;
	let mut writer = dst.open_write(rel_path, mod_time).await?;

	let copied = tokio::io::copy(&mut reader, &mut writer)
		.await
		.map_err(|e| SyncError::io(rel_path, e))?;

	writer.finish().await?;
	Ok(copied)
}

// vim: ts=4
