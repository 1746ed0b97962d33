//! In-memory view of both sides

use std::collections::{BTreeMap, HashMap};

use crate::types::{format_mod_time, FileInfo, FileMetadata, Location, Side};

pub type StateMap = HashMap<String, FileMetadata>;

/// The two state maps, always guarded together by the engine's state lock
#[derive(Debug, Default, Clone)]
pub struct StateMaps {
	pub local: StateMap,
	pub remote: StateMap,
}

impl StateMaps {
	pub fn side(&self, side: Side) -> &StateMap {
		match side {
			Side::Local => &self.local,
			Side::Remote => &self.remote,
		}
	}

	pub fn side_mut(&mut self, side: Side) -> &mut StateMap {
		match side {
			Side::Local => &mut self.local,
			Side::Remote => &mut self.remote,
		}
	}

	/// Record the same metadata on both sides
	pub fn set_both(&mut self, meta: &FileMetadata) {
		self.local.insert(meta.relative_path.clone(), meta.clone());
		self.remote.insert(meta.relative_path.clone(), meta.clone());
	}

	/// Drop a path and everything nested under it from both maps
	///
	/// Returns true if either map knew about the path.
	pub fn remove_path(&mut self, rel_path: &str) -> bool {
		let prefix = format!("{}/", rel_path);
		let mut known = false;
		for map in [&mut self.local, &mut self.remote] {
			known |= map.remove(rel_path).is_some();
			map.retain(|k, _| !k.starts_with(&prefix));
		}
		known
	}

	/// Consolidated listing of both maps, sorted by path
	///
	/// Equal hashes on both sides report `Both`. When the hashes differ the
	/// local entry is reported with `Local`.
	pub fn file_list(&self) -> Vec<FileInfo> {
		let mut merged: BTreeMap<&str, FileInfo> = BTreeMap::new();

		for (path, meta) in &self.local {
			merged.insert(path.as_str(), info(meta, Location::Local));
		}
		for (path, meta) in &self.remote {
			match merged.get_mut(path.as_str()) {
				Some(existing) => {
					if existing.content_hash == meta.content_hash {
						existing.location = Location::Both;
					}
				}
				None => {
					merged.insert(path.as_str(), info(meta, Location::Remote));
				}
			}
		}

		merged.into_values().collect()
	}
}

fn info(meta: &FileMetadata, location: Location) -> FileInfo {
	FileInfo {
		relative_path: meta.relative_path.clone(),
		content_hash: meta.content_hash.clone(),
		mod_time: format_mod_time(meta.mod_time),
		location,
	}
}


// vim: ts=4
