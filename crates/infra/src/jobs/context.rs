//! Run bookkeeping shared by every job: config loading, the retry budget,
//! the per-run description buffer and status reporting.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Utc};
use indexsync_core::{ConfigField, JobConfig, MAX_RETRIES, RunReport, Status, SyncError, SyncResult};
use tracing::{error, info, warn};

use super::registry::Registry;
use crate::checkpoint::CheckpointStore;

#[derive(Debug, Default)]
struct RunState {
    retry_count: u32,
    description: String,
}

/// A run that got past config loading and the retry guard.
#[derive(Debug)]
pub struct Started {
    pub config: JobConfig,
    pub at: DateTime<Utc>,
    clock: Instant,
}

pub struct RunContext {
    name: String,
    store: Arc<dyn CheckpointStore>,
    state: Mutex<RunState>,
}

impl RunContext {
    pub fn new(name: impl Into<String>, store: Arc<dyn CheckpointStore>) -> Self {
        Self {
            name: name.into(),
            store,
            state: Mutex::new(RunState::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store(&self) -> &dyn CheckpointStore {
        self.store.as_ref()
    }

    pub fn retry_count(&self) -> u32 {
        self.state.lock().unwrap().retry_count
    }

    /// Append a line to this run's description.
    pub fn note(&self, line: impl AsRef<str>) {
        let mut state = self.state.lock().unwrap();
        state.description.push_str(line.as_ref());
        state.description.push('\n');
    }

    /// Load the config, apply the retry guard and report `Running`.
    ///
    /// Returns `None` when the run must not proceed; the outcome has already
    /// been reported.
    pub async fn begin(&self, registry: &Registry) -> Option<Started> {
        let loaded = match self.store.load(&self.name).await {
            Ok(Some(config)) => Ok(config),
            Ok(None) => Err(SyncError::config_load(format!("no config for job {}", self.name))),
            Err(e) => Err(SyncError::config_load(e.to_string())),
        };

        if self.retry_count() >= MAX_RETRIES {
            self.suspend(registry).await;
            return None;
        }

        let config = match loaded {
            Ok(config) => config,
            Err(e) => {
                self.fail(registry, e);
                return None;
            }
        };

        let at = Utc::now();
        self.report(
            registry,
            RunReport::status(Status::Running)
                .started_at(at)
                .with_description(""),
        );
        info!(job = %self.name, "run started");

        Some(Started {
            config,
            at,
            clock: Instant::now(),
        })
    }

    /// Record a failed step: bump the retry counter and report `Failed`.
    pub fn fail(&self, registry: &Registry, err: SyncError) {
        let (retry_count, description) = {
            let mut state = self.state.lock().unwrap();
            state.retry_count += 1;
            let mut description = std::mem::take(&mut state.description);
            description.push_str(&err.to_string());
            (state.retry_count, description)
        };

        warn!(job = %self.name, retry_count, error = %err, "run failed");
        self.report(
            registry,
            RunReport::status(Status::Failed)
                .with_description(description)
                .with_retry_count(retry_count),
        );
    }

    /// Report the final status of a successful run and reset the retry counter.
    pub fn finish(&self, registry: &Registry, started: Started, status: Status) {
        let description = {
            let mut state = self.state.lock().unwrap();
            state.retry_count = 0;
            std::mem::take(&mut state.description)
        };

        let elapsed = started.clock.elapsed();
        info!(
            job = %self.name,
            status = %status,
            elapsed_ms = elapsed.as_millis() as u64,
            "run finished"
        );
        self.report(
            registry,
            RunReport::status(status)
                .took(elapsed)
                .with_description(description)
                .with_retry_count(0),
        );
    }

    /// Write fields over the durable config in one step.
    pub async fn persist(&self, fields: Vec<ConfigField>) -> SyncResult<()> {
        self.store
            .update(&self.name, fields)
            .await
            .map_err(|e| SyncError::checkpoint(e.to_string()))
    }

    /// Clear the retry budget, as an operator resume does.
    pub fn reset_retries(&self) {
        self.state.lock().unwrap().retry_count = 0;
    }

    async fn suspend(&self, registry: &Registry) {
        let retry_count = {
            let mut state = self.state.lock().unwrap();
            state.description.clear();
            std::mem::replace(&mut state.retry_count, 0)
        };

        error!(job = %self.name, retry_count, "retry budget exhausted");
        self.report(
            registry,
            RunReport::status(Status::Suspended)
                .with_description(format!("suspended after {retry_count} consecutive failures"))
                .with_retry_count(retry_count),
        );

        if let Err(e) = self.persist(vec![ConfigField::Status(Status::Suspended)]).await {
            error!(job = %self.name, error = %e, "failed to persist suspended status");
        }
        if let Err(e) = registry.suspend(&self.name).await {
            error!(job = %self.name, error = %e, "failed to detach suspended job");
        }
    }

    fn report(&self, registry: &Registry, report: RunReport) {
        if let Err(e) = registry.report(&self.name, report) {
            warn!(job = %self.name, error = %e, "run report dropped");
        }
    }
}
