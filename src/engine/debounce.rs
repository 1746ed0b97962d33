//! Admission debounce keyed by (side, relative path)

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::types::Side;
use crate::util::lock;

/// Drops notifications arriving within `interval` of the last admission or
/// completion for the same key
///
/// The check and the record happen under one lock, so two racing
/// notifications for a key can never both be admitted.
pub struct Debouncer {
	interval: Duration,
	last_seen: Mutex<HashMap<(Side, String), Instant>>,
}

impl Debouncer {
	pub fn new(interval: Duration) -> Self {
		Debouncer { interval, last_seen: Mutex::new(HashMap::new()) }
	}

	/// Admit-or-drop decision; records the admission time when admitted
	pub fn admit(&self, side: Side, rel_path: &str) -> bool {
		self.admit_at(side, rel_path, Instant::now())
	}

	pub(crate) fn admit_at(&self, side: Side, rel_path: &str, now: Instant) -> bool {
		let mut last_seen = lock(&self.last_seen);
		let key = (side, rel_path.to_string());
		if let Some(last) = last_seen.get(&key) {
			if now.saturating_duration_since(*last) < self.interval {
				return false;
			}
		}
		last_seen.insert(key, now);
		true
	}

	/// Refresh the key once its job has finished processing
	pub fn mark_processed(&self, side: Side, rel_path: &str) {
		lock(&self.last_seen).insert((side, rel_path.to_string()), Instant::now());
	}
}


// vim: ts=4
