use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use garde::Validate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::job::{JobStatus, JobStatusView};
use crate::services::dispatcher::DispatchError;
use crate::services::menu_jobs::ServiceError;

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CreateMenuRequest {
    #[garde(range(min = -90.0, max = 90.0))]
    pub lat: Option<f64>,
    #[garde(range(min = -180.0, max = 180.0))]
    pub lng: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct CreateMenuResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub progress: f64,
}

/// POST /api/sessions/{session_id}/menus: start a menu creation job.
pub async fn create_menus(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    body: Option<Json<CreateMenuRequest>>,
) -> Result<(StatusCode, Json<CreateMenuResponse>), ApiError> {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    request
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let job = state.jobs.submit(session_id, request.lat, request.lng).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(CreateMenuResponse {
            job_id: job.uuid,
            status: job.status,
            progress: job.progress,
        }),
    ))
}

/// GET /api/menus/status/{job_id}: poll a job.
pub async fn get_menu_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobStatusView>, ApiError> {
    Ok(Json(state.jobs.status_of(job_id).await?))
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Service(ServiceError::SessionNotFound(_) | ServiceError::JobNotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            ApiError::Service(ServiceError::Dispatch(DispatchError::Saturated)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::Service(ServiceError::Store(e)) => {
                tracing::error!(error = %e, "Store error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
