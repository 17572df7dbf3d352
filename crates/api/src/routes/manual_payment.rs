use axum::{Json, extract::State, http::StatusCode};
use coursehub_db::models::ManualPayment;
use coursehub_services::reconcile::{Claimant, ManualPaymentSubmission};
use serde::Deserialize;
use validator::Validate;

use crate::{error::ApiError, extractors::auth::AuthUser, routes::current_user, state::AppState};

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitRequest {
    #[validate(length(min = 1))]
    pub course_id: String,
    #[validate(range(min = 1))]
    pub amount_cents: i64,
    #[validate(length(min = 1, max = 50))]
    pub method: String,
    #[validate(length(min = 1, max = 200))]
    pub reference: String,
    #[validate(length(max = 1000))]
    pub note: Option<String>,
}

pub async fn submit(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<ManualPayment>), ApiError> {
    body.validate()?;
    let user = current_user(&state, &auth).await?;
    let claimant = Claimant {
        user_id: auth.user_id,
        email: user.email,
        name: user.display_name,
    };

    let claim = state
        .manual_payments
        .submit(
            &claimant,
            ManualPaymentSubmission {
                course_id: body.course_id,
                amount_cents: body.amount_cents,
                method: body.method,
                reference: body.reference,
                note: body.note,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(claim)))
}

pub async fn mine(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<ManualPayment>>, ApiError> {
    Ok(Json(state.manual_payments.list_for_user(auth.user_id).await?))
}
