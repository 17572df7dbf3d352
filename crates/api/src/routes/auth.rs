use axum::{
    Json,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header},
};
use coursehub_db::models::{User, UserRole};
use coursehub_services::auth::TokenPair;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 100))]
    pub display_name: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub role: UserRole,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMeRequest {
    #[validate(length(min = 1, max = 100))]
    pub display_name: String,
}

fn to_response(user: User) -> Result<UserResponse, ApiError> {
    let id = user
        .id
        .ok_or_else(|| ApiError::Internal("User without id".to_string()))?;
    Ok(UserResponse {
        id: id.to_hex(),
        email: user.email,
        display_name: user.display_name,
        role: user.role,
    })
}

fn session_cookie(tokens: &TokenPair) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    let cookie = format!(
        "access_token={}; HttpOnly; Path=/; SameSite=Lax; Max-Age={}",
        tokens.access_token, tokens.expires_in
    );
    let value = HeaderValue::from_str(&cookie)
        .map_err(|e| ApiError::Internal(format!("Invalid cookie: {e}")))?;
    headers.insert(header::SET_COOKIE, value);
    Ok(headers)
}

fn issue(state: &AppState, user: User) -> Result<(HeaderMap, Json<AuthResponse>), ApiError> {
    let user = to_response(user)?;
    let user_id = bson::oid::ObjectId::parse_str(&user.id)
        .map_err(|_| ApiError::Internal("Invalid user id".to_string()))?;
    let tokens = state.auth.generate_tokens(user_id, &user.email, user.role)?;
    let headers = session_cookie(&tokens)?;

    Ok((
        headers,
        Json(AuthResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_in: tokens.expires_in,
            user,
        }),
    ))
}

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, HeaderMap, Json<AuthResponse>), ApiError> {
    body.validate()?;
    let password_hash = state.auth.hash_password(&body.password)?;

    let role = if state.settings.admin.is_admin_email(body.email.trim()) {
        UserRole::Admin
    } else {
        UserRole::Student
    };

    let user = state
        .users
        .create(body.email, body.display_name, password_hash, role)
        .await?;

    let (headers, response) = issue(&state, user)?;
    Ok((StatusCode::CREATED, headers, response))
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<(HeaderMap, Json<AuthResponse>), ApiError> {
    let user = state
        .users
        .find_by_email(&body.email)
        .await
        .map_err(|_| ApiError::Unauthorized("Invalid credentials".to_string()))?;

    let password_hash = user
        .password_hash
        .as_ref()
        .ok_or_else(|| ApiError::Unauthorized("No password set".to_string()))?;

    let valid = state.auth.verify_password(&body.password, password_hash)?;
    if !valid {
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    }

    issue(&state, user)
}

pub async fn logout() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_static("access_token=; HttpOnly; Path=/; SameSite=Lax; Max-Age=0"),
    );
    headers
}

pub async fn me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.users.base.find_by_id(auth.user_id).await?;
    Ok(Json(to_response(user)?))
}

pub async fn update_me(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<UpdateMeRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    body.validate()?;
    state
        .users
        .update_display_name(auth.user_id, body.display_name.trim().to_string())
        .await?;
    let user = state.users.base.find_by_id(auth.user_id).await?;
    Ok(Json(to_response(user)?))
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> Result<(HeaderMap, Json<AuthResponse>), ApiError> {
    let claims = state.auth.verify_refresh_token(&body.refresh_token)?;
    let user = state.users.base.find_by_id(claims.user_id()?).await?;
    // The role is re-read so a promotion or demotion applies on the next refresh.
    issue(&state, user)
}
