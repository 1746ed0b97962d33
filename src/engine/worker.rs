//! Worker pool draining the job queue

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use super::event::QueuedEvent;
use super::EngineInner;
use crate::logging::*;

pub(crate) type JobReceiver = Arc<Mutex<mpsc::Receiver<QueuedEvent>>>;

/// Start `count` workers sharing one receiver
///
/// Workers exit once the queue is closed and drained.
pub(crate) fn spawn_workers(inner: &Arc<EngineInner>, jobs: JobReceiver, count: usize) -> Vec<JoinHandle<()>> {
	(0..count)
		.map(|id| {
			let inner = Arc::clone(inner);
			let jobs = Arc::clone(&jobs);
			tokio::spawn(async move {
				debug!("Worker {} started", id);
				loop {
					let job = {
						let mut rx = jobs.lock().await;
						rx.recv().await
					};
					let job = match job {
						Some(job) => job,
						None => break,
					};
					process(&inner, job).await;
				}
				debug!("Worker {} exited", id);
			})
		})
		.collect()
}

async fn process(inner: &EngineInner, job: QueuedEvent) {
	let guard = inner.locks.acquire(&job.rel_path).await;
	if let Err(e) = inner.handle_event(&job).await {
		error!("Failed to process {} {} on {}: {}", job.raw.kind, job.rel_path, job.side, e);
	}
	drop(guard);
	inner.debouncer.mark_processed(job.side, &job.rel_path);
}

// vim: ts=4
