use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{SyncError, SyncResult};

const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Hex-encoded BLAKE3 digest of a byte slice
pub fn hash(buf: &[u8]) -> String {
	hex::encode(blake3::hash(buf).as_bytes())
}

/// Hex-encoded BLAKE3 digest of everything a reader yields
pub async fn hash_reader<R>(reader: &mut R) -> std::io::Result<String>
where
	R: AsyncRead + Unpin + ?Sized,
{
	let mut hasher = blake3::Hasher::new();
	let mut buf = vec![0u8; HASH_BUFFER_SIZE];
	loop {
		let n = reader.read(&mut buf).await?;
		if n == 0 {
			break;
		}
		hasher.update(&buf[..n]);
	}
	Ok(hex::encode(hasher.finalize().as_bytes()))
}

/// Slash-separated form of a relative path
///
/// `None` if any component is not valid UTF-8; such names cannot be
/// round-tripped through the string keys of the state maps.
pub fn to_rel_string(path: &Path) -> Option<String> {
	let mut parts = Vec::new();
	for component in path.components() {
		if let Component::Normal(s) = component {
			parts.push(s.to_str()?);
		}
	}
	Some(parts.join("/"))
}

/// Make a path absolute and fold `.`/`..` without touching the filesystem
pub fn lexical_absolute(path: &Path) -> SyncResult<PathBuf> {
	let joined = if path.is_absolute() {
		path.to_path_buf()
	} else {
		std::env::current_dir()
			.map_err(|e| SyncError::config(format!("cannot resolve current directory: {}", e)))?
			.join(path)
	};

	let mut out = PathBuf::new();
	for component in joined.components() {
		match component {
			Component::CurDir => {}
			Component::ParentDir => {
				out.pop();
			}
			other => out.push(other.as_os_str()),
		}
	}
	Ok(out)
}

/// Lock a std mutex, recovering the data if a holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}


// vim: ts=4
