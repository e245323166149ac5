//! Infrastructure layer: checkpoint stores, catalog sources, index sinks,
//! the job engine and the concrete sync jobs.

pub mod checkpoint;
pub mod config;
pub mod jobs;
pub mod sink;
pub mod source;
pub mod sync;
