use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// Status of a menu creation job, listed in pipeline order.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Created,
    ParsingMenu,
    BuildingProfile,
    CollectingReviews,
    Ranking,
    Done,
    Failed,
}

impl JobStatus {
    /// Pipeline stages in the order a successful job visits them.
    pub const PIPELINE: [JobStatus; 6] = [
        JobStatus::Created,
        JobStatus::ParsingMenu,
        JobStatus::BuildingProfile,
        JobStatus::CollectingReviews,
        JobStatus::Ranking,
        JobStatus::Done,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }

    /// Progress reported when a job enters this stage.
    pub fn stage_progress(self) -> Option<f64> {
        match self {
            JobStatus::Created => Some(0.0),
            JobStatus::ParsingMenu => Some(0.2),
            JobStatus::BuildingProfile => Some(0.4),
            JobStatus::CollectingReviews => Some(0.6),
            JobStatus::Ranking => Some(0.9),
            JobStatus::Done => Some(1.0),
            JobStatus::Failed => None,
        }
    }

    /// Position in the pipeline. `Failed` has none: it may follow any
    /// non-terminal stage.
    fn rank(self) -> Option<usize> {
        Self::PIPELINE.iter().position(|s| *s == self)
    }
}

/// A requested change of job state.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub status: JobStatus,
    pub progress: Option<f64>,
    pub error_message: Option<String>,
}

impl Transition {
    /// Move to a pipeline stage with that stage's standard progress.
    pub fn stage(status: JobStatus) -> Self {
        Self {
            status,
            progress: status.stage_progress(),
            error_message: None,
        }
    }

    /// Move to a status with an explicit (or no) progress value.
    pub fn to(status: JobStatus, progress: Option<f64>) -> Self {
        Self {
            status,
            progress,
            error_message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failed,
            progress: None,
            error_message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransitionError {
    #[error("job is already {0} and cannot move to {1}")]
    Terminal(JobStatus, JobStatus),

    #[error("job cannot move backwards from {0} to {1}")]
    Backwards(JobStatus, JobStatus),

    #[error("progress {0} is outside 0.0..=1.0")]
    ProgressOutOfRange(f64),

    #[error("progress cannot decrease from {0} to {1}")]
    ProgressRegression(f64, f64),
}

/// A menu creation job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub id: i64,
    pub uuid: Uuid,
    pub session_id: i64,
    pub status: JobStatus,
    pub progress: f64,
    pub error_message: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub food_menu_id: Option<i64>,
    pub wine_menu_id: Option<i64>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Apply a transition in place.
    ///
    /// Sets `started_at` on the first move away from `created` and
    /// `completed_at` on entering `done` or `failed`. Nothing is modified
    /// when the transition is rejected.
    pub fn advance(&mut self, transition: &Transition, at: DateTime<Utc>) -> Result<(), TransitionError> {
        let next = transition.status;

        if self.status.is_terminal() {
            return Err(TransitionError::Terminal(self.status, next));
        }

        if let (Some(current), Some(target)) = (self.status.rank(), next.rank()) {
            if target <= current {
                return Err(TransitionError::Backwards(self.status, next));
            }
        }

        if let Some(progress) = transition.progress {
            if !(0.0..=1.0).contains(&progress) {
                return Err(TransitionError::ProgressOutOfRange(progress));
            }
            if progress < self.progress {
                return Err(TransitionError::ProgressRegression(self.progress, progress));
            }
            self.progress = progress;
        }

        self.status = next;
        if self.started_at.is_none() {
            self.started_at = Some(at);
        }
        if next.is_terminal() {
            self.completed_at = Some(at);
        }
        if let Some(message) = &transition.error_message {
            self.error_message = Some(message.clone());
        }
        self.updated_at = at;

        Ok(())
    }

    /// Client-facing view of the job.
    pub fn status_view(&self) -> JobStatusView {
        JobStatusView {
            job_id: self.uuid,
            status: self.status,
            progress: self.progress,
            food_menu_id: self.food_menu_id.filter(|_| self.status == JobStatus::Done),
            wine_menu_id: self.wine_menu_id.filter(|_| self.status == JobStatus::Done),
            error: self
                .error_message
                .clone()
                .filter(|_| self.status == JobStatus::Failed),
        }
    }
}

/// Fields needed to insert a job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub session_id: i64,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

/// Response for querying job status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobStatusView {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub food_menu_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wine_menu_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
