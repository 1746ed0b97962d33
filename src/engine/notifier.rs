//! Outcome notifications delivered to a single external sink

use serde::Serialize;
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use crate::types::Direction;

/// Recognized outcome of a synchronization step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncEventKind {
	Sync,
	Delete,
	Move,
	Conflict,
}

impl fmt::Display for SyncEventKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncEventKind::Sync => write!(f, "sync"),
			SyncEventKind::Delete => write!(f, "delete"),
			SyncEventKind::Move => write!(f, "move"),
			SyncEventKind::Conflict => write!(f, "conflict"),
		}
	}
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncEvent {
	#[serde(rename = "type")]
	pub kind: SyncEventKind,
	#[serde(rename = "filePath")]
	pub path: String,
	pub direction: Direction,
	pub message: String,
	pub timestamp: SystemTime,
}

impl SyncEvent {
	pub fn new(kind: SyncEventKind, path: &str, direction: Direction, message: String) -> Self {
		SyncEvent { kind, path: path.to_string(), direction, message, timestamp: SystemTime::now() }
	}
}

/// Receiver of sync outcomes
///
/// Called synchronously from the worker that produced the outcome, while that
/// worker still holds the path's lock. Implementations needing ordering across
/// paths must serialize themselves.
pub trait SyncNotifier: Send + Sync {
	fn notify(&self, event: &SyncEvent);
}

impl<T: Fn(&SyncEvent) + Send + Sync> SyncNotifier for T {
	fn notify(&self, event: &SyncEvent) {
		self(event);
	}
}

/// At most one registered sink; outcomes are discarded when empty
#[derive(Default)]
pub(crate) struct NotifierSlot {
	sink: RwLock<Option<Arc<dyn SyncNotifier>>>,
}

impl NotifierSlot {
	pub(crate) fn set(&self, sink: Option<Arc<dyn SyncNotifier>>) {
		*self.sink.write().unwrap_or_else(|e| e.into_inner()) = sink;
	}

	pub(crate) fn emit(&self, event: SyncEvent) {
		let sink = self.sink.read().unwrap_or_else(|e| e.into_inner()).clone();
		if let Some(sink) = sink {
			sink.notify(&event);
		}
	}
}


// vim: ts=4
