use axum::{Json, extract::State};
use coursehub_services::coupon::{DiscountBreakdown, OrderContext};
use serde::Deserialize;

use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub code: String,
    pub course_id: String,
}

/// Prices the course with the coupon applied. Nothing is redeemed here.
pub async fn validate(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<ValidateRequest>,
) -> Result<Json<DiscountBreakdown>, ApiError> {
    state.require_coupons()?;
    let course = state
        .catalog
        .course(&body.course_id)
        .ok_or_else(|| ApiError::NotFound(format!("Course not found: {}", body.course_id)))?;

    let order = OrderContext {
        user_id: &auth.user_id,
        user_email: &auth.email,
        course_id: &course.id,
        amount_cents: course.price_cents,
    };
    let (_, breakdown) = state.coupons.validate(&body.code, &order).await?;
    Ok(Json(breakdown))
}
