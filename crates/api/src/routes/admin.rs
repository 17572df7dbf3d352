use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
};
use coursehub_db::models::{
    AuditChange, Coupon, CouponStatus, EnrollmentSource, ManualPayment, ManualPaymentStatus,
    Payment, PaymentStatus, User,
};
use coursehub_services::{
    coupon::{CouponEmailRequest, DeleteOutcome, NewCoupon},
    dao::{
        base::{PaginatedResult, PaginationParams},
        enrollment::{EnrollmentFilter, ProgressOverview},
    },
    email::Delivery,
    enrollment::EnrollRequest,
    payment::PaymentStatusUpdate,
    reconcile::{ManualPaymentAction, VerifyOutcome},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    error::ApiError,
    extractors::auth::AdminUser,
    routes::{
        enrollment::{EnrollmentResponse, ProgressRequest, to_response},
        parse_oid,
    },
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct StatusQuery<S> {
    pub status: Option<S>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentQuery {
    pub status: Option<PaymentStatus>,
    pub course_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DecisionBody {
    pub reason: Option<String>,
}

impl DecisionBody {
    /// The body is optional on every decision endpoint.
    fn parse(body: &Bytes) -> Result<Self, ApiError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("Invalid body: {e}")))
    }
}

#[derive(Debug, Serialize)]
pub struct Deleted<T> {
    pub outcome: T,
}

// -- coupons --

pub async fn create_coupon(
    State(state): State<AppState>,
    admin: AdminUser,
    Json(body): Json<NewCoupon>,
) -> Result<(StatusCode, Json<Coupon>), ApiError> {
    state.require_coupons()?;
    let coupon = state
        .coupons
        .create(body, &state.catalog, admin.id())
        .await?;
    let target = coupon.id.map(|id| id.to_hex()).unwrap_or_default();
    state
        .audit
        .record(
            admin.id(),
            "coupon.create",
            "coupon",
            &target,
            vec![AuditChange::new("code", None::<String>, &coupon.code)],
            None,
        )
        .await;
    Ok((StatusCode::CREATED, Json(coupon)))
}

pub async fn list_coupons(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(filter): Query<StatusQuery<CouponStatus>>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<PaginatedResult<Coupon>>, ApiError> {
    state.require_coupons()?;
    Ok(Json(state.coupons.list(filter.status, &params).await?))
}

pub async fn get_coupon(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> Result<Json<Coupon>, ApiError> {
    state.require_coupons()?;
    let id = parse_oid(&id, "coupon id")?;
    Ok(Json(state.coupons.get(id).await?))
}

async fn set_coupon_active(
    state: &AppState,
    admin: &AdminUser,
    id: &str,
    active: bool,
) -> Result<Coupon, ApiError> {
    state.require_coupons()?;
    let oid = parse_oid(id, "coupon id")?;
    let before = state.coupons.get(oid).await?;
    let coupon = state.coupons.set_active(oid, active).await?;
    let action = if active {
        "coupon.activate"
    } else {
        "coupon.deactivate"
    };
    state
        .audit
        .record(
            admin.id(),
            action,
            "coupon",
            id,
            vec![AuditChange::new("status", before.status, coupon.status)],
            None,
        )
        .await;
    Ok(coupon)
}

pub async fn activate_coupon(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<String>,
) -> Result<Json<Coupon>, ApiError> {
    Ok(Json(set_coupon_active(&state, &admin, &id, true).await?))
}

pub async fn deactivate_coupon(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<String>,
) -> Result<Json<Coupon>, ApiError> {
    Ok(Json(set_coupon_active(&state, &admin, &id, false).await?))
}

pub async fn delete_coupon(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<String>,
) -> Result<Json<Deleted<DeleteOutcome>>, ApiError> {
    state.require_coupons()?;
    let oid = parse_oid(&id, "coupon id")?;
    let outcome = state.coupons.delete(oid).await?;
    let action = match outcome {
        DeleteOutcome::Deleted => "coupon.delete",
        DeleteOutcome::Deactivated => "coupon.deactivate",
    };
    state
        .audit
        .record(admin.id(), action, "coupon", &id, Vec::new(), None)
        .await;
    Ok(Json(Deleted { outcome }))
}

pub async fn email_coupon(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<String>,
    Json(body): Json<CouponEmailRequest>,
) -> Result<Json<Delivery>, ApiError> {
    state.require_coupons()?;
    let oid = parse_oid(&id, "coupon id")?;
    let to_email = body.to_email.clone();
    let delivery = state
        .coupons
        .send_by_email(
            oid,
            body,
            &state.catalog,
            &state.notifier,
            state.paypal.currency(),
        )
        .await?;
    state
        .audit
        .record(
            admin.id(),
            "coupon.email",
            "coupon",
            &id,
            vec![AuditChange::new("sent_to", None::<String>, to_email)],
            None,
        )
        .await;
    Ok(Json(delivery))
}

// -- enrollments --

pub async fn list_enrollments(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(filter): Query<EnrollmentFilter>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<PaginatedResult<EnrollmentResponse>>, ApiError> {
    let with_progress = state.settings.features.progress_tracking;
    let page = state.enrollments.list_filtered(&filter, &params).await?;
    Ok(Json(page.map(|e| to_response(e, with_progress))))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ManualEnrollmentRequest {
    #[validate(email)]
    pub user_email: Option<String>,
    pub user_id: Option<String>,
    #[validate(length(min = 1))]
    pub course_id: String,
    #[validate(range(min = 1))]
    pub batch_number: u32,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub amount_paid_cents: i64,
    pub reason: Option<String>,
}

async fn resolve_user(state: &AppState, body: &ManualEnrollmentRequest) -> Result<User, ApiError> {
    match (&body.user_id, &body.user_email) {
        (Some(id), _) => {
            let oid = parse_oid(id, "user id")?;
            Ok(state.users.base.find_by_id(oid).await?)
        }
        (None, Some(email)) => Ok(state.users.find_by_email(email).await?),
        (None, None) => Err(ApiError::BadRequest(
            "user_id or user_email is required".to_string(),
        )),
    }
}

pub async fn create_enrollment(
    State(state): State<AppState>,
    admin: AdminUser,
    Json(body): Json<ManualEnrollmentRequest>,
) -> Result<(StatusCode, Json<EnrollmentResponse>), ApiError> {
    body.validate()?;
    let user = resolve_user(&state, &body).await?;
    let user_id = user
        .id
        .ok_or_else(|| ApiError::Internal("stored user without id".to_string()))?;

    let outcome = state
        .enrollments
        .enroll_manually(
            &state.catalog,
            EnrollRequest {
                user_id,
                user_email: user.email,
                course_id: body.course_id,
                amount_paid_cents: body.amount_paid_cents,
                payment_id: None,
                order_id: None,
                source: EnrollmentSource::AdminManual,
            },
            body.batch_number,
            admin.id(),
        )
        .await?;

    let enrollment = outcome.enrollment;
    state
        .audit
        .record(
            admin.id(),
            "enrollment.create",
            "enrollment",
            &enrollment.id,
            vec![AuditChange::new(
                "batch_number",
                None::<u32>,
                enrollment.batch_number,
            )],
            body.reason,
        )
        .await;

    let with_progress = state.settings.features.progress_tracking;
    Ok((StatusCode::CREATED, Json(to_response(enrollment, with_progress))))
}

pub async fn delete_enrollment(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let removed = state.enrollments.delete(&id).await?;
    state
        .audit
        .record(
            admin.id(),
            "enrollment.delete",
            "enrollment",
            &id,
            vec![AuditChange::new(
                "user_email",
                &removed.user_email,
                None::<String>,
            )],
            None,
        )
        .await;
    Ok(StatusCode::NO_CONTENT)
}

// -- progress --

pub async fn progress_overview(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<ProgressOverview>, ApiError> {
    state.require_progress()?;
    Ok(Json(state.enrollments.progress_overview().await?))
}

pub async fn override_progress(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<String>,
    Json(body): Json<ProgressRequest>,
) -> Result<Json<EnrollmentResponse>, ApiError> {
    state.require_progress()?;
    let enrollment = state.enrollments.override_progress(&id, body.progress).await?;
    state
        .audit
        .record(
            admin.id(),
            "enrollment.progress",
            "enrollment",
            &id,
            vec![AuditChange::new("progress", None::<u8>, enrollment.progress)],
            None,
        )
        .await;
    Ok(Json(to_response(enrollment, true)))
}

// -- payments --

pub async fn list_payments(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(filter): Query<PaymentQuery>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<PaginatedResult<Payment>>, ApiError> {
    Ok(Json(
        state
            .payments
            .list(filter.status, filter.course_id.as_deref(), &params)
            .await?,
    ))
}

/// Payments with no enrollment pointing back at them.
pub async fn orphaned_payments(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<Payment>>, ApiError> {
    Ok(Json(state.payments.orphaned().await?))
}

pub async fn update_payment_status(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<String>,
    Json(body): Json<PaymentStatusUpdate>,
) -> Result<Json<Payment>, ApiError> {
    let oid = parse_oid(&id, "payment id")?;
    let reason = body.note.clone();
    let (payment, old_status) = state
        .payments
        .update_status(oid, body, admin.id())
        .await?;
    state
        .audit
        .record(
            admin.id(),
            "payment.status",
            "payment",
            &id,
            vec![AuditChange::new("status", old_status, payment.status)],
            reason,
        )
        .await;
    Ok(Json(payment))
}

// -- manual payments --

pub async fn list_manual_payments(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(filter): Query<StatusQuery<ManualPaymentStatus>>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<PaginatedResult<ManualPayment>>, ApiError> {
    Ok(Json(
        state
            .manual_payments
            .list_by_status(filter.status, &params)
            .await?,
    ))
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub manual_payment: ManualPayment,
    pub enrollment: EnrollmentResponse,
    pub email: Delivery,
    pub warnings: Vec<String>,
}

pub async fn verify_manual_payment(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<VerifyResponse>, ApiError> {
    let oid = parse_oid(&id, "manual payment id")?;
    let note = DecisionBody::parse(&body)?.reason;
    let VerifyOutcome {
        manual_payment,
        enrollment,
        email,
        warnings,
    } = state.manual_payments.verify(oid, admin.id(), note).await?;
    Ok(Json(VerifyResponse {
        manual_payment,
        enrollment: to_response(
            enrollment.enrollment,
            state.settings.features.progress_tracking,
        ),
        email,
        warnings,
    }))
}

async fn decide(
    state: &AppState,
    admin: &AdminUser,
    id: &str,
    action: ManualPaymentAction,
    body: &Bytes,
) -> Result<ManualPayment, ApiError> {
    let oid = parse_oid(id, "manual payment id")?;
    let reason = DecisionBody::parse(body)?.reason;
    Ok(state
        .manual_payments
        .decide(oid, action, admin.id(), reason)
        .await?)
}

pub async fn archive_manual_payment(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<ManualPayment>, ApiError> {
    Ok(Json(
        decide(&state, &admin, &id, ManualPaymentAction::Archive, &body).await?,
    ))
}

pub async fn reject_manual_payment(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<ManualPayment>, ApiError> {
    Ok(Json(
        decide(&state, &admin, &id, ManualPaymentAction::Reject, &body).await?,
    ))
}

pub async fn restore_manual_payment(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<ManualPayment>, ApiError> {
    Ok(Json(
        decide(&state, &admin, &id, ManualPaymentAction::Restore, &body).await?,
    ))
}
