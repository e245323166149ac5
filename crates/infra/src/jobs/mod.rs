//! Scheduled job engine.
//!
//! ## Components
//!
//! - `TriggerScheduler`: fires callbacks on cron expressions (`CronScheduler`
//!   in production, `ManualScheduler` in tests)
//! - `Registry`: named jobs, their triggers and live run status
//! - `RunContext`: per-job run bookkeeping (retry budget, description, reports)
//! - `SyncJob`: the fetch → write → checkpoint lifecycle over a `SyncTask`

pub mod context;
pub mod registry;
pub mod scheduler;
pub mod template;

pub use context::{RunContext, Started};
pub use registry::{Registry, RegistryError, Runnable};
pub use scheduler::{
    BoxFuture, CronScheduler, FireFn, ManualScheduler, SchedulerError, TriggerHandle,
    TriggerScheduler,
};
pub use template::{Page, SyncJob, SyncTask};
