//! Per-path mutual exclusion shared by both sides

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::util::lock;

/// One async mutex per relative path, created lazily and kept for the
/// process lifetime
#[derive(Default)]
pub struct PathLocks {
	table: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl PathLocks {
	pub fn new() -> Self {
		Self::default()
	}

	fn lock_for(&self, rel_path: &str) -> Arc<AsyncMutex<()>> {
		let mut table = lock(&self.table);
		Arc::clone(table.entry(rel_path.to_string()).or_default())
	}

	/// Wait until no other step holds `rel_path`
	pub async fn acquire(&self, rel_path: &str) -> OwnedMutexGuard<()> {
		self.lock_for(rel_path).lock_owned().await
	}
}


// vim: ts=4
