use axum::{
    Json,
    extract::{Path, State},
};
use coursehub_db::models::{Batch, Enrollment, EnrollmentSource, EnrollmentStatus};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

#[derive(Debug, Serialize)]
pub struct EnrollmentResponse {
    pub id: String,
    pub user_id: String,
    pub user_email: String,
    pub course_id: String,
    pub batch_number: u32,
    pub status: EnrollmentStatus,
    pub amount_paid_cents: i64,
    pub order_id: Option<String>,
    pub enrollment_source: EnrollmentSource,
    pub enrolled_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_accessed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

/// Progress fields are left out entirely when progress tracking is off.
pub fn to_response(e: Enrollment, with_progress: bool) -> EnrollmentResponse {
    let rfc3339 = |d: bson::DateTime| d.try_to_rfc3339_string().unwrap_or_default();
    EnrollmentResponse {
        id: e.id,
        user_id: e.user_id.to_hex(),
        user_email: e.user_email,
        course_id: e.course_id,
        batch_number: e.batch_number,
        status: e.status,
        amount_paid_cents: e.amount_paid_cents,
        order_id: e.order_id,
        enrollment_source: e.enrollment_source,
        enrolled_at: rfc3339(e.enrolled_at),
        progress: with_progress.then_some(e.progress),
        last_accessed: e.last_accessed.filter(|_| with_progress).map(rfc3339),
        completed_at: e.completed_at.filter(|_| with_progress).map(rfc3339),
    }
}

#[derive(Debug, Serialize)]
pub struct EnrollmentDetail {
    pub enrollment: EnrollmentResponse,
    /// Full batch data including class links and recordings.
    pub batch: Option<Batch>,
}

#[derive(Debug, Deserialize)]
pub struct ProgressRequest {
    pub progress: u32,
}

pub async fn mine(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<EnrollmentResponse>>, ApiError> {
    let with_progress = state.settings.features.progress_tracking;
    let enrollments = state.enrollments.list_for_user(auth.user_id).await?;
    Ok(Json(
        enrollments
            .into_iter()
            .map(|e| to_response(e, with_progress))
            .collect(),
    ))
}

pub async fn for_course(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(course_id): Path<String>,
) -> Result<Json<EnrollmentDetail>, ApiError> {
    let enrollment = state
        .enrollments
        .find_for_user_course(auth.user_id, &course_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Not enrolled in this course".to_string()))?;

    let with_progress = state.settings.features.progress_tracking;
    if with_progress {
        if let Err(e) = state.enrollments.dao.touch(&enrollment.id).await {
            warn!(enrollment_id = %enrollment.id, error = %e, "Failed to update last access");
        }
    }

    let batch = state
        .catalog
        .batch(&enrollment.course_id, enrollment.batch_number)
        .cloned();
    Ok(Json(EnrollmentDetail {
        enrollment: to_response(enrollment, with_progress),
        batch,
    }))
}

pub async fn update_progress(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(course_id): Path<String>,
    Json(body): Json<ProgressRequest>,
) -> Result<Json<EnrollmentResponse>, ApiError> {
    state.require_progress()?;
    let enrollment = state
        .enrollments
        .update_progress(auth.user_id, &course_id, body.progress)
        .await?;
    Ok(Json(to_response(enrollment, true)))
}
