//! Job registry: named jobs, their triggers and their live run status.
//!
//! ## Locking
//!
//! - `jobs` (std mutex) guards record metadata only and is never held across
//!   an `.await`; run reports and `list` only ever take this lock.
//! - `admin` (async mutex) serializes administrative operations (register,
//!   pause, resume, reschedule, suspend, remove) against each other while they
//!   talk to the scheduler and the checkpoint store.
//!
//! Neither lock is held while a job runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexsync_core::{ConfigField, JobSnapshot, RunReport, Status};
use tracing::{debug, error, info, warn};

use super::scheduler::{FireFn, SchedulerError, TriggerHandle, TriggerScheduler};
use crate::checkpoint::{CheckpointError, CheckpointStore};

const LAST_RUN_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Body of a job, invoked once per trigger firing.
#[async_trait]
pub trait Runnable: Send + Sync {
    async fn run(&self, registry: &Registry);

    /// Forget consecutive failures. Called when an operator re-arms the job.
    fn reset_retries(&self) {}
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("job not found: {0}")]
    NotFound(String),

    #[error("job already registered: {0}")]
    AlreadyRegistered(String),

    #[error("no persisted config for job: {0}")]
    MissingConfig(String),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

struct JobRecord {
    trigger_expression: String,
    batch_limit: u32,
    handle: Option<TriggerHandle>,
    last_run_at: Option<DateTime<Utc>>,
    last_run_duration: Duration,
    status: Status,
    description: String,
    retry_count: u32,
    runner: Arc<dyn Runnable>,
    in_flight: Arc<AtomicBool>,
}

impl JobRecord {
    fn snapshot(&self, name: &str) -> JobSnapshot {
        JobSnapshot {
            name: name.to_string(),
            trigger_expression: self.trigger_expression.clone(),
            last_run: self
                .last_run_at
                .map(|at| at.format(LAST_RUN_FORMAT).to_string())
                .unwrap_or_default(),
            interval_ms: self.last_run_duration.as_millis() as u64,
            status: self.status,
            description: self.description.clone(),
            retry_count: self.retry_count,
            batch_limit: self.batch_limit,
            attached: self.handle.is_some(),
        }
    }

    fn apply(&mut self, report: RunReport) {
        if let Some(at) = report.last_run_at {
            self.last_run_at = Some(at);
        }
        if let Some(duration) = report.duration {
            self.last_run_duration = duration;
        }
        if let Some(status) = report.status {
            // A run that outlives a pause or suspension must not re-arm the job.
            let halted = self.handle.is_none()
                && matches!(self.status, Status::Stopped | Status::Suspended);
            if !(halted && matches!(status, Status::Ready | Status::Running)) {
                self.status = status;
            }
        }
        if let Some(description) = report.description {
            self.description = description;
        }
        if let Some(retry_count) = report.retry_count {
            self.retry_count = retry_count;
        }
    }
}

/// Resets the in-flight flag when a run finishes, even if it panics.
struct InFlight(Arc<AtomicBool>);

impl InFlight {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Owns every registered job for the lifetime of the process.
pub struct Registry {
    scheduler: Arc<dyn TriggerScheduler>,
    store: Arc<dyn CheckpointStore>,
    jobs: Mutex<HashMap<String, JobRecord>>,
    admin: tokio::sync::Mutex<()>,
    this: Weak<Registry>,
}

impl Registry {
    pub fn new(scheduler: Arc<dyn TriggerScheduler>, store: Arc<dyn CheckpointStore>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            scheduler,
            store,
            jobs: Mutex::new(HashMap::new()),
            admin: tokio::sync::Mutex::new(()),
            this: this.clone(),
        })
    }

    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        &self.store
    }

    /// Start firing attached triggers.
    pub async fn start(&self) -> Result<(), RegistryError> {
        self.scheduler.start().await?;
        Ok(())
    }

    /// Stop the scheduler. In-flight runs are not interrupted.
    pub async fn shutdown(&self) -> Result<(), RegistryError> {
        self.scheduler.shutdown().await?;
        Ok(())
    }

    /// Register a job under `name`, reading its trigger and limit from the
    /// persisted config.
    ///
    /// A job whose persisted status is schedulable (Ready/Running) is attached
    /// right away; anything else stays dormant until resumed. An inherited
    /// `Running` status is normalized to `Ready`.
    pub async fn register(
        &self,
        name: impl Into<String>,
        runner: Arc<dyn Runnable>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        let _admin = self.admin.lock().await;

        if self.jobs.lock().unwrap().contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered(name));
        }

        let config = self
            .store
            .load(&name)
            .await?
            .ok_or_else(|| RegistryError::MissingConfig(name.clone()))?;

        let mut status = config.status;
        if status == Status::Running {
            status = Status::Ready;
            self.persist_status(&name, status).await?;
        }

        let in_flight = Arc::new(AtomicBool::new(false));
        let handle = if status.is_schedulable() {
            let fire = self.trigger_for(&name, Arc::clone(&runner), Arc::clone(&in_flight));
            Some(self.scheduler.attach(&config.trigger_expression, fire).await?)
        } else {
            None
        };

        info!(
            job = %name,
            status = %status,
            attached = handle.is_some(),
            "job registered"
        );

        self.jobs.lock().unwrap().insert(
            name,
            JobRecord {
                trigger_expression: config.trigger_expression,
                batch_limit: config.batch_limit,
                handle,
                last_run_at: None,
                last_run_duration: Duration::ZERO,
                status,
                description: String::new(),
                retry_count: 0,
                runner,
                in_flight,
            },
        );
        Ok(())
    }

    /// Detach the trigger and persist `Stopped`. An in-flight run finishes.
    pub async fn pause(&self, name: &str) -> Result<(), RegistryError> {
        let _admin = self.admin.lock().await;
        let handle = self.with_record(name, |record| record.handle)?;

        if let Some(handle) = handle {
            self.scheduler.detach(handle).await?;
        }
        self.with_record(name, |record| {
            record.handle = None;
            record.status = Status::Stopped;
        })?;
        self.persist_status(name, Status::Stopped).await?;

        info!(job = %name, "job paused");
        Ok(())
    }

    /// Reload the persisted config, attach with its trigger expression and
    /// persist `Ready`. Clears the retry counter.
    pub async fn resume(&self, name: &str) -> Result<(), RegistryError> {
        let _admin = self.admin.lock().await;
        let (runner, in_flight, old_handle) = self.with_record(name, |record| {
            (Arc::clone(&record.runner), Arc::clone(&record.in_flight), record.handle)
        })?;

        let config = self
            .store
            .load(name)
            .await?
            .ok_or_else(|| RegistryError::MissingConfig(name.to_string()))?;

        let fire = self.trigger_for(name, Arc::clone(&runner), in_flight);
        let handle = self.scheduler.attach(&config.trigger_expression, fire).await?;
        self.detach_quietly(name, old_handle).await;

        runner.reset_retries();
        self.with_record(name, |record| {
            record.trigger_expression = config.trigger_expression.clone();
            record.batch_limit = config.batch_limit;
            record.handle = Some(handle);
            record.status = Status::Ready;
            record.retry_count = 0;
        })?;
        self.persist_status(name, Status::Ready).await?;

        info!(job = %name, trigger = %config.trigger_expression, "job resumed");
        Ok(())
    }

    /// Swap the trigger expression (and optionally the batch limit), persist
    /// both and force `Ready`. Clears the retry counter.
    ///
    /// The new trigger is attached before the old one is detached; a rejected
    /// expression leaves the job untouched. An empty expression keeps the
    /// current one.
    pub async fn reschedule(
        &self,
        name: &str,
        trigger_expression: &str,
        batch_limit: Option<u32>,
    ) -> Result<(), RegistryError> {
        let _admin = self.admin.lock().await;
        let (runner, in_flight, old_handle, current_expression) = self.with_record(name, |record| {
            (
                Arc::clone(&record.runner),
                Arc::clone(&record.in_flight),
                record.handle,
                record.trigger_expression.clone(),
            )
        })?;

        let expression = if trigger_expression.trim().is_empty() {
            current_expression
        } else {
            trigger_expression.trim().to_string()
        };
        let batch_limit = batch_limit.filter(|limit| *limit > 0);

        let fire = self.trigger_for(name, Arc::clone(&runner), in_flight);
        let handle = self.scheduler.attach(&expression, fire).await?;
        self.detach_quietly(name, old_handle).await;

        runner.reset_retries();
        self.with_record(name, |record| {
            record.trigger_expression = expression.clone();
            if let Some(limit) = batch_limit {
                record.batch_limit = limit;
            }
            record.handle = Some(handle);
            record.status = Status::Ready;
            record.retry_count = 0;
        })?;

        let mut fields = vec![ConfigField::TriggerExpression(expression.clone())];
        fields.extend(batch_limit.map(ConfigField::BatchLimit));
        fields.push(ConfigField::Status(Status::Ready));
        self.store.update(name, fields).await?;

        info!(job = %name, trigger = %expression, batch_limit = ?batch_limit, "job rescheduled");
        Ok(())
    }

    /// Detach scheduling after the retry budget ran out.
    ///
    /// The job body persists `Suspended` itself; this only drops the trigger
    /// and marks the record.
    pub async fn suspend(&self, name: &str) -> Result<(), RegistryError> {
        let _admin = self.admin.lock().await;
        let handle = self.with_record(name, |record| record.handle.take())?;
        if let Some(handle) = handle {
            self.scheduler.detach(handle).await?;
        }
        self.with_record(name, |record| record.status = Status::Suspended)?;
        error!(job = %name, "job suspended, operator resume required");
        Ok(())
    }

    /// Detach and forget a job, dropping its checkpoint.
    pub async fn remove(&self, name: &str) -> Result<(), RegistryError> {
        let _admin = self.admin.lock().await;
        let record = self
            .jobs
            .lock()
            .unwrap()
            .remove(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;

        if let Some(handle) = record.handle {
            self.scheduler.detach(handle).await?;
        }
        self.store.remove(name).await?;
        info!(job = %name, "job removed");
        Ok(())
    }

    /// Apply a sparse run report to the job record.
    pub fn report(&self, name: &str, report: RunReport) -> Result<(), RegistryError> {
        self.with_record(name, |record| record.apply(report))
    }

    /// Snapshots of every job, sorted by name.
    pub fn list(&self) -> Vec<JobSnapshot> {
        let jobs = self.jobs.lock().unwrap();
        let mut snapshots: Vec<JobSnapshot> = jobs
            .iter()
            .map(|(name, record)| record.snapshot(name))
            .collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }

    pub fn get(&self, name: &str) -> Option<JobSnapshot> {
        self.jobs
            .lock()
            .unwrap()
            .get(name)
            .map(|record| record.snapshot(name))
    }

    /// Handle of the attached trigger, if any.
    pub fn trigger_handle(&self, name: &str) -> Option<TriggerHandle> {
        self.jobs.lock().unwrap().get(name).and_then(|record| record.handle)
    }

    /// Whether a run of the job is currently executing.
    pub fn is_running(&self, name: &str) -> bool {
        self.jobs
            .lock()
            .unwrap()
            .get(name)
            .is_some_and(|record| record.in_flight.load(Ordering::Acquire))
    }

    fn with_record<T>(
        &self,
        name: &str,
        f: impl FnOnce(&mut JobRecord) -> T,
    ) -> Result<T, RegistryError> {
        let mut jobs = self.jobs.lock().unwrap();
        let record = jobs
            .get_mut(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        Ok(f(record))
    }

    async fn persist_status(&self, name: &str, status: Status) -> Result<(), RegistryError> {
        self.store.update(name, vec![ConfigField::Status(status)]).await?;
        Ok(())
    }

    async fn detach_quietly(&self, name: &str, handle: Option<TriggerHandle>) {
        let Some(handle) = handle else {
            return;
        };
        if let Err(e) = self.scheduler.detach(handle).await {
            warn!(job = %name, error = %e, "failed to detach previous trigger");
        }
    }

    /// Trigger callback: skip the tick if the previous run is still going.
    fn trigger_for(&self, name: &str, runner: Arc<dyn Runnable>, in_flight: Arc<AtomicBool>) -> FireFn {
        let registry = self.this.clone();
        let name = name.to_string();
        Arc::new(move || {
            let registry = registry.clone();
            let runner = Arc::clone(&runner);
            let in_flight = Arc::clone(&in_flight);
            let name = name.clone();
            Box::pin(async move {
                let Some(registry) = registry.upgrade() else {
                    return;
                };
                let Some(_guard) = InFlight::acquire(&in_flight) else {
                    debug!(job = %name, "previous run still in flight, skipping tick");
                    return;
                };
                runner.run(&registry).await;
            })
        })
    }
}
