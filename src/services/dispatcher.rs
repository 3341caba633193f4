use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::instrument::WithSubscriber;
use tracing::Dispatch;

use super::pipeline::PipelineExecutor;
use crate::config::PipelineConfig;
use crate::db::MenuStore;
use crate::models::job::{Job, Transition};

pub const QUEUE_FULL_MESSAGE: &str = "Job queue is full";

/// Runs pipeline jobs as background tasks with bounded concurrency.
///
/// At most `max_concurrent_jobs` pipelines run at once and at most
/// `job_queue_capacity` more wait for a slot. Anything beyond that is
/// rejected and the job is failed immediately.
pub struct Dispatcher {
    executor: Arc<PipelineExecutor>,
    store: Arc<dyn MenuStore>,
    admission: Arc<Semaphore>,
    running: Arc<Semaphore>,
    log: Dispatch,
}

impl Dispatcher {
    pub fn new(
        executor: Arc<PipelineExecutor>,
        store: Arc<dyn MenuStore>,
        config: &PipelineConfig,
        log: Dispatch,
    ) -> Self {
        let running = config.max_concurrent_jobs.max(1);
        Self {
            executor,
            store,
            admission: Arc::new(Semaphore::new(running + config.job_queue_capacity)),
            running: Arc::new(Semaphore::new(running)),
            log,
        }
    }

    /// Start `job` in the background and return immediately.
    ///
    /// Pipeline errors are logged inside the task and never reach the
    /// caller. Dropping the returned handle detaches the task.
    pub async fn dispatch(&self, job: &Job) -> Result<JoinHandle<()>, DispatchError> {
        let job_id = job.uuid;

        let Ok(admitted) = Arc::clone(&self.admission).try_acquire_owned() else {
            metrics::counter!("menu_jobs_rejected_total").increment(1);
            tracing::dispatcher::with_default(&self.log, || {
                tracing::warn!(job_id = %job_id, "Rejecting menu job, queue is full");
            });
            if let Err(e) = self
                .store
                .advance_job(job_id, &Transition::failed(QUEUE_FULL_MESSAGE))
                .await
            {
                tracing::dispatcher::with_default(&self.log, || {
                    tracing::error!(job_id = %job_id, error = %e, "Failed to fail rejected job");
                });
            }
            return Err(DispatchError::Saturated);
        };

        metrics::counter!("menu_jobs_dispatched_total").increment(1);

        let executor = Arc::clone(&self.executor);
        let running = Arc::clone(&self.running);
        let task = async move {
            let _admitted = admitted;
            let Ok(_running) = running.acquire_owned().await else {
                tracing::error!(job_id = %job_id, "Job runner shut down before job started");
                return;
            };

            match executor.execute(job_id).await {
                Ok(_) => tracing::debug!(job_id = %job_id, "Menu job finished"),
                Err(e) => tracing::error!(job_id = %job_id, error = %e, "Menu job failed"),
            }
        };

        Ok(tokio::spawn(task.with_subscriber(self.log.clone())))
    }

    /// Jobs that can still be admitted right now.
    pub fn available_slots(&self) -> usize {
        self.admission.available_permits()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Job queue is full")]
    Saturated,
}
