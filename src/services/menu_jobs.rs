use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::dispatcher::{DispatchError, Dispatcher};
use crate::db::{MenuStore, StoreError};
use crate::models::job::{Job, JobStatusView, NewJob};

/// Entry point for creating menu jobs and polling their progress.
#[derive(Clone)]
pub struct MenuJobService {
    store: Arc<dyn MenuStore>,
    dispatcher: Arc<Dispatcher>,
}

impl MenuJobService {
    pub fn new(store: Arc<dyn MenuStore>, dispatcher: Arc<Dispatcher>) -> Self {
        Self { store, dispatcher }
    }

    /// Create a job for a session in state `created`. When both
    /// coordinates are given they are also stored on the session.
    pub async fn create_job(
        &self,
        session_id: Uuid,
        lat: Option<f64>,
        lng: Option<f64>,
    ) -> Result<Job, ServiceError> {
        let session = self
            .store
            .get_session_by_uuid(session_id)
            .await?
            .ok_or(ServiceError::SessionNotFound(session_id))?;

        if let (Some(lat), Some(lng)) = (lat, lng) {
            self.store.update_session_location(session.id, lat, lng).await?;
        }

        let job = self
            .store
            .create_job(NewJob {
                session_id: session.id,
                lat,
                lng,
            })
            .await?;

        metrics::counter!("menu_jobs_created_total").increment(1);
        tracing::info!(job_id = %job.uuid, session_id = %session_id, "Menu job created");
        Ok(job)
    }

    pub async fn dispatch(&self, job: &Job) -> Result<JoinHandle<()>, ServiceError> {
        Ok(self.dispatcher.dispatch(job).await?)
    }

    /// Create a job and start it. The job runs detached.
    pub async fn submit(
        &self,
        session_id: Uuid,
        lat: Option<f64>,
        lng: Option<f64>,
    ) -> Result<Job, ServiceError> {
        let job = self.create_job(session_id, lat, lng).await?;
        self.dispatch(&job).await?;
        Ok(job)
    }

    pub async fn status_of(&self, job_id: Uuid) -> Result<JobStatusView, ServiceError> {
        let job = self
            .store
            .get_job(job_id)
            .await?
            .ok_or(ServiceError::JobNotFound(job_id))?;
        Ok(job.status_view())
    }

    pub async fn ping(&self) -> Result<(), ServiceError> {
        Ok(self.store.ping().await?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Session {0} not found")]
    SessionNotFound(Uuid),

    #[error("Job {0} not found")]
    JobNotFound(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}
