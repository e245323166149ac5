//! `indexsync-core`: primitives shared by the synchronization engine.
//!
//! This crate contains **pure** types (no I/O): job status codes, the
//! persisted job configuration shapes, cursors, run reports and the error
//! taxonomy used across the job lifecycle.

pub mod config;
pub mod error;
pub mod run;
pub mod status;

pub use config::{ConfigField, CursorState, JobConfig};
pub use error::{ConfigFieldError, SyncError, SyncResult, UnknownStatus};
pub use run::{Cursor, JobSnapshot, RunReport};
pub use status::Status;

/// Consecutive failed runs after which a job is suspended.
pub const MAX_RETRIES: u32 = 5;
