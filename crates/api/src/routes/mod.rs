pub mod admin;
pub mod auth;
pub mod checkout;
pub mod coupon;
pub mod course;
pub mod enrollment;
pub mod manual_payment;

use bson::oid::ObjectId;
use coursehub_db::models::User;

use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

pub(crate) fn parse_oid(value: &str, what: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(value).map_err(|_| ApiError::BadRequest(format!("Invalid {what}")))
}

/// The stored profile behind a token, for handlers that need the display name.
pub(crate) async fn current_user(state: &AppState, auth: &AuthUser) -> Result<User, ApiError> {
    Ok(state.users.base.find_by_id(auth.user_id).await?)
}
