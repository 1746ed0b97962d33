//! Local filesystem backend

use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::SystemTime;
use tokio::fs as afs;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::{ReadStream, Storage, WriteSink};
use crate::error::{SyncError, SyncResult};
use crate::exclusion::ExclusionEngine;
use crate::logging::*;
use crate::types::{is_zero_time, FileMetadata};
use crate::util;

/// Storage rooted at a directory of the local filesystem
#[derive(Debug, Clone)]
pub struct FileSystemStorage {
	root: PathBuf,
	exclusion: ExclusionEngine,
}

impl FileSystemStorage {
	/// Create a backend for `root`; relative roots are resolved against the
	/// current directory
	pub fn new(root: impl AsRef<Path>) -> SyncResult<Self> {
		let root = util::lexical_absolute(root.as_ref())?;
		Ok(FileSystemStorage { root, exclusion: ExclusionEngine::hidden_only() })
	}

	/// Skip paths matched by `exclusion` during scans
	pub fn with_exclusion(mut self, exclusion: ExclusionEngine) -> Self {
		self.exclusion = exclusion;
		self
	}

	fn full_path(&self, rel_path: &str) -> PathBuf {
		if rel_path.is_empty() {
			self.root.clone()
		} else {
			self.root.join(rel_path)
		}
	}

	async fn metadata_for(&self, rel_path: &str) -> SyncResult<FileMetadata> {
		let full = self.full_path(rel_path);
		let meta = afs::metadata(&full).await.map_err(|e| SyncError::io(rel_path, e))?;
		let mod_time = meta.modified().map_err(|e| SyncError::io(rel_path, e))?;

		if meta.is_dir() {
			return Ok(FileMetadata::directory(rel_path, mod_time));
		}

		let mut file = afs::File::open(&full).await.map_err(|e| SyncError::io(rel_path, e))?;
		let hash = util::hash_reader(&mut file).await.map_err(|e| SyncError::io(rel_path, e))?;
		Ok(FileMetadata::new(rel_path, hash, mod_time))
	}

	/// Recursive worker for `scan_all`
	fn scan_dir<'a>(
		&'a self,
		dir: &'a Path,
		out: &'a mut HashMap<String, FileMetadata>,
	) -> Pin<Box<dyn std::future::Future<Output = SyncResult<()>> + Send + 'a>> {
		Box::pin(async move {
			let mut entries =
				afs::read_dir(dir).await.map_err(|e| SyncError::io(dir.display().to_string(), e))?;

			while let Some(entry) =
				entries.next_entry().await.map_err(|e| SyncError::io(dir.display().to_string(), e))?
			{
				let path = entry.path();
				let rel = match path.strip_prefix(&self.root).map(util::to_rel_string) {
					Ok(Some(rel)) => rel,
					Ok(None) => {
						warn!("Skipping non UTF-8 name: {}", path.display());
						continue;
					}
					Err(_) => continue,
				};
				if self.exclusion.is_excluded(&rel) {
					debug!("Skipping excluded path: {}", rel);
					continue;
				}

				let file_type =
					entry.file_type().await.map_err(|e| SyncError::io(rel.as_str(), e))?;
				if file_type.is_dir() {
					self.scan_dir(&path, out).await?;
				} else if file_type.is_file() {
					let meta = self.metadata_for(&rel).await?;
					out.insert(rel, meta);
				}
			}
			Ok(())
		})
	}
}

#[async_trait]
impl Storage for FileSystemStorage {
	async fn scan_all(&self) -> SyncResult<HashMap<String, FileMetadata>> {
		let mut out = HashMap::new();
		let root = self.root.clone();
		self.scan_dir(&root, &mut out).await.map_err(|e| SyncError::Scan {
			root: self.root.display().to_string(),
			source: Box::new(e),
		})?;
		Ok(out)
	}

	async fn open_read(&self, rel_path: &str) -> SyncResult<ReadStream> {
		let file = afs::File::open(self.full_path(rel_path))
			.await
			.map_err(|e| SyncError::io(rel_path, e))?;
		Ok(Box::new(file))
	}

	async fn open_write(&self, rel_path: &str, mod_time: SystemTime) -> SyncResult<Box<dyn WriteSink>> {
		let full = self.full_path(rel_path);
		if let Some(parent) = full.parent() {
			afs::create_dir_all(parent).await.map_err(|e| SyncError::io(rel_path, e))?;
		}
		let file = afs::File::create(&full).await.map_err(|e| SyncError::io(rel_path, e))?;
		Ok(Box::new(FsWriteSink { file, path: full, mod_time }))
	}

	async fn stat_one(&self, rel_path: &str) -> SyncResult<FileMetadata> {
		self.metadata_for(rel_path).await
	}

	async fn delete_one(&self, rel_path: &str) -> SyncResult<bool> {
		let full = self.full_path(rel_path);
		let meta = match afs::symlink_metadata(&full).await {
			Ok(m) => m,
			Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
			Err(e) => return Err(SyncError::io(rel_path, e)),
		};

		let result = if meta.is_dir() {
			afs::remove_dir_all(&full).await
		} else {
			afs::remove_file(&full).await
		};
		match result {
			Ok(()) => Ok(true),
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
			Err(e) => Err(SyncError::io(rel_path, e)),
		}
	}

	async fn ensure_directory(&self, rel_path: &str) -> SyncResult<()> {
		afs::create_dir_all(self.full_path(rel_path)).await.map_err(|e| SyncError::io(rel_path, e))
	}

	fn root_path(&self) -> &Path {
		&self.root
	}

	fn supports_watch(&self) -> bool {
		true
	}
}

/// File sink that stamps the modification time on finish
struct FsWriteSink {
	file: afs::File,
	path: PathBuf,
	mod_time: SystemTime,
}

impl AsyncWrite for FsWriteSink {
	fn poll_write(
		mut self: Pin<&mut Self>,
		cx: &mut Context<'_>,
		buf: &[u8],
	) -> Poll<io::Result<usize>> {
		Pin::new(&mut self.file).poll_write(cx, buf)
	}

	fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
		Pin::new(&mut self.file).poll_flush(cx)
	}

	fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
		Pin::new(&mut self.file).poll_shutdown(cx)
	}
}

#[async_trait]
impl WriteSink for FsWriteSink {
	async fn finish(self: Box<Self>) -> SyncResult<()> {
		let FsWriteSink { mut file, path, mod_time } = *self;
		let shown = path.display().to_string();
		file.flush().await.map_err(|e| SyncError::io(shown.as_str(), e))?;

		if is_zero_time(mod_time) {
			return Ok(());
		}

		let std_file = file.into_std().await;
		let result = tokio::task::spawn_blocking(move || std_file.set_modified(mod_time)).await;
		match result {
			Ok(Ok(())) => {}
			Ok(Err(e)) => warn!("Failed to preserve mod time for {}: {}", shown, e),
			Err(e) => warn!("Mod time task for {} did not complete: {}", shown, e),
		}
		Ok(())
	}
}


// vim: ts=4
