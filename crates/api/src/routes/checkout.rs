use axum::{Json, extract::State, http::StatusCode};
use coursehub_db::models::Payment;
use coursehub_services::{
    checkout::{Buyer, CheckoutResult, FreeCheckout, PayPalCheckout},
    coupon::DiscountBreakdown,
    email::Delivery,
};
use serde::Serialize;

use crate::{
    error::ApiError,
    extractors::auth::AuthUser,
    routes::{
        current_user,
        enrollment::{EnrollmentResponse, to_response},
    },
    state::AppState,
};

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub enrollment: EnrollmentResponse,
    /// False when this order had already produced the enrollment.
    pub created: bool,
    pub payment: Payment,
    pub discount: Option<DiscountBreakdown>,
    pub email: Delivery,
    pub warnings: Vec<String>,
}

async fn buyer(state: &AppState, auth: &AuthUser) -> Result<Buyer, ApiError> {
    let user = current_user(state, auth).await?;
    Ok(Buyer {
        user_id: auth.user_id,
        email: user.email,
        name: user.display_name,
    })
}

fn respond(state: &AppState, result: CheckoutResult) -> (StatusCode, Json<CheckoutResponse>) {
    let status = if result.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    let body = CheckoutResponse {
        enrollment: to_response(result.enrollment, state.settings.features.progress_tracking),
        created: result.created,
        payment: result.payment,
        discount: result.discount,
        email: result.email,
        warnings: result.warnings,
    };
    (status, Json(body))
}

pub async fn paypal(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<PayPalCheckout>,
) -> Result<(StatusCode, Json<CheckoutResponse>), ApiError> {
    state.require_paypal()?;
    let buyer = buyer(&state, &auth).await?;
    let result = state
        .checkout
        .paypal(&buyer, body, state.settings.features.coupons)
        .await?;
    Ok(respond(&state, result))
}

pub async fn free(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<FreeCheckout>,
) -> Result<(StatusCode, Json<CheckoutResponse>), ApiError> {
    state.require_coupons()?;
    let buyer = buyer(&state, &auth).await?;
    let result = state.checkout.free(&buyer, body).await?;
    Ok(respond(&state, result))
}
