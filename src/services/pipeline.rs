use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::instrument::WithSubscriber;
use tracing::{Dispatch, Instrument};
use uuid::Uuid;

use super::collaborators::{EnrichmentError, ExtractionError, MenuExtractor};
use super::enrichment::MenuEnricher;
use super::photos::SynthesisReport;
use crate::db::{MenuStore, StoreError};
use crate::models::job::{Job, JobStatus, Transition};
use crate::models::menu::MenuRefs;

/// Result of a successful pipeline run.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub menus: MenuRefs,
    /// Photo batch started during food enrichment, if any. Dropping it
    /// leaves the batch running.
    pub synthesis: Option<JoinHandle<SynthesisReport>>,
}

/// Runs one menu creation job from extraction to a terminal state.
pub struct PipelineExecutor {
    store: Arc<dyn MenuStore>,
    extractor: Arc<dyn MenuExtractor>,
    enricher: MenuEnricher,
    log: Dispatch,
}

impl PipelineExecutor {
    pub fn new(
        store: Arc<dyn MenuStore>,
        extractor: Arc<dyn MenuExtractor>,
        enricher: MenuEnricher,
        log: Dispatch,
    ) -> Self {
        Self {
            store,
            extractor,
            enricher,
            log,
        }
    }

    /// Execute the job. On any failure the job is moved to `failed` with the
    /// error's message before the error is returned.
    pub async fn execute(&self, job_id: Uuid) -> Result<PipelineOutcome, PipelineError> {
        let span = tracing::dispatcher::with_default(&self.log, || {
            tracing::info_span!("menu_job", job_id = %job_id)
        });

        self.run(job_id)
            .instrument(span)
            .with_subscriber(self.log.clone())
            .await
    }

    async fn run(&self, job_id: Uuid) -> Result<PipelineOutcome, PipelineError> {
        let started = Instant::now();
        metrics::gauge!("menu_jobs_in_flight").increment(1.0);

        let result = self.run_stages(job_id).await;

        metrics::gauge!("menu_jobs_in_flight").decrement(1.0);
        metrics::histogram!("menu_job_duration_seconds").record(started.elapsed().as_secs_f64());

        match result {
            Ok(outcome) => {
                metrics::counter!("menu_jobs_completed_total").increment(1);
                tracing::info!(
                    food_menu_id = ?outcome.menus.food_menu_id,
                    wine_menu_id = ?outcome.menus.wine_menu_id,
                    "Menu job completed"
                );
                Ok(outcome)
            }
            Err(e) => {
                metrics::counter!("menu_jobs_failed_total").increment(1);
                self.fail(job_id, &e).await;
                Err(e)
            }
        }
    }

    async fn run_stages(&self, job_id: Uuid) -> Result<PipelineOutcome, PipelineError> {
        let job = self
            .store
            .get_job(job_id)
            .await?
            .ok_or(PipelineError::JobNotFound(job_id))?;

        let session = self
            .store
            .get_session(job.session_id)
            .await?
            .ok_or(PipelineError::SessionNotFound(job.session_id))?;

        if session.photo_urls.is_empty() {
            return Err(PipelineError::NoPhotos);
        }

        self.advance(&job, JobStatus::ParsingMenu).await?;
        tracing::info!(photos = session.photo_urls.len(), "Extracting menu from photos");
        let extraction = self.extractor.extract(&session.photo_urls).await?;
        if extraction.is_empty() {
            tracing::warn!("No menu items found in photos");
        }

        self.advance(&job, JobStatus::BuildingProfile).await?;
        let menus = self
            .store
            .save_extraction(job.uuid, session.id, &extraction)
            .await?;
        tracing::info!(
            food_items = extraction.food_items.len(),
            wine_items = extraction.wine_items.len(),
            "Menus saved"
        );

        self.advance(&job, JobStatus::CollectingReviews).await?;
        let synthesis = self.enrich(menus).await?;

        // Ranking has no work of its own yet.
        self.advance(&job, JobStatus::Ranking).await?;

        self.advance(&job, JobStatus::Done).await?;

        Ok(PipelineOutcome { menus, synthesis })
    }

    /// Enrich food and wine menus concurrently. A failure on one side does
    /// not undo what the other side saved.
    async fn enrich(
        &self,
        menus: MenuRefs,
    ) -> Result<Option<JoinHandle<SynthesisReport>>, PipelineError> {
        let food = async {
            match menus.food_menu_id {
                Some(id) => self.enricher.enrich_food_menu(id).await.map(Some),
                None => Ok(None),
            }
        };
        let wine = async {
            match menus.wine_menu_id {
                Some(id) => self.enricher.enrich_wine_menu(id).await.map(Some),
                None => Ok(None),
            }
        };

        let (food, wine) = tokio::join!(food, wine);
        let food = food?;
        wine?;

        Ok(food.and_then(|outcome| outcome.synthesis))
    }

    async fn advance(&self, job: &Job, status: JobStatus) -> Result<Job, PipelineError> {
        let updated = self
            .store
            .advance_job(job.uuid, &Transition::stage(status))
            .await?;
        tracing::info!(status = %updated.status, progress = updated.progress, "Job advanced");
        Ok(updated)
    }

    async fn fail(&self, job_id: Uuid, error: &PipelineError) {
        tracing::warn!(error = %error, "Menu job failed");

        if let Err(e) = self
            .store
            .advance_job(job_id, &Transition::failed(error.to_string()))
            .await
        {
            tracing::error!(error = %e, "Failed to record job failure");
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("No photos uploaded")]
    NoPhotos,

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Persistence(#[from] StoreError),

    #[error(transparent)]
    Enrichment(#[from] EnrichmentError),

    #[error("Job {0} not found")]
    JobNotFound(Uuid),

    #[error("Session {0} not found")]
    SessionNotFound(i64),
}
