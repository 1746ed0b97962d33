//! # TwinSync - Two-sided continuous directory synchronizer
//!
//! TwinSync keeps a "local" and a "remote" storage convergent. At startup
//! both sides are scanned and reconciled; afterwards change notifications
//! from either side are debounced, queued and applied by a worker pool
//! that never runs two steps for the same path at once.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use twinsync::{EngineConfig, FileSystemStorage, SyncEngine};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::load(None)?;
//!     let local = Arc::new(FileSystemStorage::new(&config.local_root)?);
//!     let remote = Arc::new(FileSystemStorage::new(&config.remote_root)?);
//!
//!     let engine = SyncEngine::new(local, remote, config)?;
//!     engine.run().await?;
//!     println!("{} files on both sides", engine.file_list().await.len());
//!     engine.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! Any backend implementing [`storage::Storage`] can stand in for either
//! side. Backends without an OS notification source report their changes
//! through [`SyncEngine::submit`].

pub mod config;
pub mod engine;
pub mod error;
pub mod exclusion;
pub mod logging;
pub mod storage;
pub mod strategies;
pub mod types;
pub mod util;

// Re-export commonly used types and functions
pub use config::EngineConfig;
pub use engine::{
	Admission, ChangeKind, RawEvent, ReconcileReport, SyncEngine, SyncEvent, SyncEventKind,
	SyncNotifier,
};
pub use error::{SyncError, SyncResult};
pub use storage::{FileSystemStorage, MemoryStorage, Storage};
pub use strategies::ConflictStrategy;
pub use types::{Direction, EngineStatus, FileInfo, FileMetadata, Location, Side};

// vim: ts=4
