//! Trigger schedulers: the only component with a notion of time.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, info};
use uuid::Uuid;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Callback invoked on every trigger firing.
pub type FireFn = Arc<dyn Fn() -> BoxFuture<()> + Send + Sync>;

/// Opaque reference to an attached trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TriggerHandle(Uuid);

impl TriggerHandle {
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SchedulerError {
    #[error("invalid trigger expression `{expression}`: {reason}")]
    InvalidExpression { expression: String, reason: String },

    #[error("scheduler error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait TriggerScheduler: Send + Sync {
    /// Attach `fire` to a six-field (seconds-first) cron expression.
    async fn attach(&self, expression: &str, fire: FireFn) -> Result<TriggerHandle, SchedulerError>;

    /// Detach a trigger. Unknown handles are ignored.
    async fn detach(&self, handle: TriggerHandle) -> Result<(), SchedulerError>;

    async fn start(&self) -> Result<(), SchedulerError>;

    async fn shutdown(&self) -> Result<(), SchedulerError>;
}

/// Cron scheduler backed by `tokio-cron-scheduler`.
///
/// Every firing runs on its own tokio task.
#[derive(Clone)]
pub struct CronScheduler {
    inner: JobScheduler,
}

impl CronScheduler {
    pub async fn new() -> Result<Self, SchedulerError> {
        let inner = JobScheduler::new()
            .await
            .map_err(|e| SchedulerError::Backend(e.to_string()))?;
        Ok(Self { inner })
    }
}

#[async_trait]
impl TriggerScheduler for CronScheduler {
    async fn attach(&self, expression: &str, fire: FireFn) -> Result<TriggerHandle, SchedulerError> {
        let job = Job::new_async(expression, move |_uuid, _lock| {
            let fire = Arc::clone(&fire);
            Box::pin(async move { fire().await })
        })
        .map_err(|e| SchedulerError::InvalidExpression {
            expression: expression.to_string(),
            reason: e.to_string(),
        })?;

        let id = self
            .inner
            .add(job)
            .await
            .map_err(|e| SchedulerError::Backend(e.to_string()))?;
        debug!(trigger = %id, expression, "trigger attached");
        Ok(TriggerHandle(id))
    }

    async fn detach(&self, handle: TriggerHandle) -> Result<(), SchedulerError> {
        self.inner
            .remove(&handle.0)
            .await
            .map_err(|e| SchedulerError::Backend(e.to_string()))?;
        debug!(trigger = %handle.0, "trigger detached");
        Ok(())
    }

    async fn start(&self) -> Result<(), SchedulerError> {
        self.inner
            .start()
            .await
            .map_err(|e| SchedulerError::Backend(e.to_string()))?;
        info!("cron scheduler started");
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), SchedulerError> {
        let mut inner = self.inner.clone();
        inner
            .shutdown()
            .await
            .map_err(|e| SchedulerError::Backend(e.to_string()))?;
        info!("cron scheduler stopped");
        Ok(())
    }
}

/// Scheduler that only fires when told to, for tests/dev.
///
/// Expressions are checked for the six/seven-field shape only.
#[derive(Default)]
pub struct ManualScheduler {
    triggers: Mutex<HashMap<TriggerHandle, (String, FireFn)>>,
    running: AtomicBool,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attached_count(&self) -> usize {
        self.triggers.lock().unwrap().len()
    }

    pub fn is_attached(&self, handle: TriggerHandle) -> bool {
        self.triggers.lock().unwrap().contains_key(&handle)
    }

    pub fn expression_of(&self, handle: TriggerHandle) -> Option<String> {
        self.triggers
            .lock()
            .unwrap()
            .get(&handle)
            .map(|(expr, _)| expr.clone())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Fire one trigger and wait for the callback. Returns `false` if the
    /// handle is not attached.
    pub async fn fire(&self, handle: TriggerHandle) -> bool {
        let fire = self
            .triggers
            .lock()
            .unwrap()
            .get(&handle)
            .map(|(_, f)| Arc::clone(f));
        match fire {
            Some(fire) => {
                fire().await;
                true
            }
            None => false,
        }
    }

    /// Fire every attached trigger concurrently and wait for all of them.
    pub async fn fire_all(&self) {
        let fires: Vec<FireFn> = self
            .triggers
            .lock()
            .unwrap()
            .values()
            .map(|(_, f)| Arc::clone(f))
            .collect();
        let tasks: Vec<_> = fires.into_iter().map(|f| tokio::spawn(f())).collect();
        for task in tasks {
            let _ = task.await;
        }
    }
}

fn check_expression(expression: &str) -> Result<(), SchedulerError> {
    let fields = expression.split_whitespace().count();
    if fields == 6 || fields == 7 {
        Ok(())
    } else {
        Err(SchedulerError::InvalidExpression {
            expression: expression.to_string(),
            reason: format!("expected 6 or 7 fields, got {fields}"),
        })
    }
}

#[async_trait]
impl TriggerScheduler for ManualScheduler {
    async fn attach(&self, expression: &str, fire: FireFn) -> Result<TriggerHandle, SchedulerError> {
        check_expression(expression)?;
        let handle = TriggerHandle(Uuid::now_v7());
        self.triggers
            .lock()
            .unwrap()
            .insert(handle, (expression.to_string(), fire));
        Ok(handle)
    }

    async fn detach(&self, handle: TriggerHandle) -> Result<(), SchedulerError> {
        self.triggers.lock().unwrap().remove(&handle);
        Ok(())
    }

    async fn start(&self) -> Result<(), SchedulerError> {
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), SchedulerError> {
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_fire(counter: Arc<AtomicUsize>) -> FireFn {
        Arc::new(move || {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        })
    }

    #[tokio::test]
    async fn manual_scheduler_fires_attached_triggers_only() {
        let scheduler = ManualScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let handle = scheduler
            .attach("*/5 * * * * *", counting_fire(Arc::clone(&counter)))
            .await
            .unwrap();
        assert!(scheduler.fire(handle).await);
        scheduler.fire_all().await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        scheduler.detach(handle).await.unwrap();
        assert!(!scheduler.fire(handle).await);
        assert_eq!(scheduler.attached_count(), 0);
    }

    #[tokio::test]
    async fn manual_scheduler_rejects_malformed_expressions() {
        let scheduler = ManualScheduler::new();
        let err = scheduler
            .attach("every five minutes", counting_fire(Arc::new(AtomicUsize::new(0))))
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidExpression { .. }));
    }

    #[tokio::test]
    async fn cron_scheduler_rejects_invalid_expression() {
        let scheduler = CronScheduler::new().await.unwrap();
        let err = scheduler
            .attach("not a cron", counting_fire(Arc::new(AtomicUsize::new(0))))
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidExpression { .. }));
    }

    #[tokio::test]
    async fn cron_scheduler_attaches_and_detaches() {
        let scheduler = CronScheduler::new().await.unwrap();
        let handle = scheduler
            .attach("0 0 3 * * *", counting_fire(Arc::new(AtomicUsize::new(0))))
            .await
            .unwrap();
        scheduler.detach(handle).await.unwrap();
    }
}
