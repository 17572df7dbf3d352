use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use coursehub_services::auth::AuthError;
use coursehub_services::catalog::CatalogError;
use coursehub_services::checkout::CheckoutError;
use coursehub_services::coupon::{CouponError, CouponRejection};
use coursehub_services::dao::base::DaoError;
use coursehub_services::enrollment::EnrollmentError;
use coursehub_services::paypal::PayPalError;
use coursehub_services::reconcile::ReconcileError;
use coursehub_services::review::ReviewError;
use serde::Serialize;
use tracing::error;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    Conflict(String),
    Internal(String),
    Validation(String),
    /// A coupon that cannot be applied; the body carries the reason code.
    CouponRejected(CouponRejection),
    PaymentRequired(String),
    BadGateway(String),
    FeatureDisabled(&'static str),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    /// Adds `reason` (and any rule detail) for rejected coupons.
    #[serde(flatten)]
    reason: Option<CouponRejection>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut reason = None;
        let (status, error_type, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::Internal(msg) => {
                error!(%msg, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal", msg)
            }
            ApiError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, "validation", msg),
            ApiError::CouponRejected(rejection) => {
                let msg = rejection.to_string();
                reason = Some(rejection);
                (StatusCode::UNPROCESSABLE_ENTITY, "coupon_rejected", msg)
            }
            ApiError::PaymentRequired(msg) => {
                (StatusCode::PAYMENT_REQUIRED, "payment_required", msg)
            }
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "bad_gateway", msg),
            ApiError::FeatureDisabled(feature) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "feature_disabled",
                format!("{feature} is disabled"),
            ),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
            reason,
        };

        (status, Json(body)).into_response()
    }
}

impl From<DaoError> for ApiError {
    fn from(err: DaoError) -> Self {
        match err {
            DaoError::NotFound => ApiError::NotFound("Resource not found".to_string()),
            DaoError::DuplicateKey(msg) => ApiError::Conflict(msg),
            DaoError::Validation(msg) => ApiError::Validation(msg),
            DaoError::Mongo(e) => ApiError::Internal(e.to_string()),
            DaoError::BsonSer(e) => ApiError::Internal(e.to_string()),
            DaoError::BsonDe(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => {
                ApiError::Unauthorized("Invalid credentials".to_string())
            }
            AuthError::TokenExpired => ApiError::Unauthorized("Token expired".to_string()),
            AuthError::InvalidToken(msg) => ApiError::Unauthorized(msg),
            AuthError::HashError(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<CouponError> for ApiError {
    fn from(err: CouponError) -> Self {
        match err {
            CouponError::Rejected(rejection) => ApiError::CouponRejected(rejection),
            CouponError::Invalid(msg) => ApiError::Validation(msg),
            CouponError::DuplicateCode(msg) => ApiError::Conflict(msg),
            e @ CouponError::RedemptionConflict => ApiError::Conflict(e.to_string()),
            CouponError::Dao(e) => e.into(),
        }
    }
}

impl From<EnrollmentError> for ApiError {
    fn from(err: EnrollmentError) -> Self {
        match err {
            e @ (EnrollmentError::CourseNotFound(_) | EnrollmentError::BatchNotFound { .. }) => {
                ApiError::NotFound(e.to_string())
            }
            e @ (EnrollmentError::NoAvailableBatches(_) | EnrollmentError::AlreadyEnrolled) => {
                ApiError::Conflict(e.to_string())
            }
            e @ EnrollmentError::NotEnrolled => ApiError::Forbidden(e.to_string()),
            e @ EnrollmentError::InvalidProgress(_) => ApiError::Validation(e.to_string()),
            EnrollmentError::Dao(e) => e.into(),
        }
    }
}

impl From<PayPalError> for ApiError {
    fn from(err: PayPalError) -> Self {
        match err {
            e @ PayPalError::NotConfigured => ApiError::Internal(e.to_string()),
            e @ PayPalError::InvalidAmount(_) => ApiError::BadRequest(e.to_string()),
            e @ (PayPalError::AmountMismatch { .. }
            | PayPalError::CurrencyMismatch { .. }
            | PayPalError::NotCompleted { .. }) => ApiError::PaymentRequired(e.to_string()),
            e @ PayPalError::ApiError(_) => ApiError::BadGateway(e.to_string()),
        }
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::Coupon(e) => e.into(),
            CheckoutError::PayPal(e) => e.into(),
            CheckoutError::Enrollment(e) => e.into(),
            CheckoutError::CouponsDisabled => ApiError::FeatureDisabled("coupons"),
            e @ (CheckoutError::NotFree | CheckoutError::NothingToPay) => {
                ApiError::BadRequest(e.to_string())
            }
            e @ CheckoutError::OrderMismatch(_) => ApiError::Conflict(e.to_string()),
            CheckoutError::Dao(e) => e.into(),
        }
    }
}

impl From<ReconcileError> for ApiError {
    fn from(err: ReconcileError) -> Self {
        match err {
            e @ (ReconcileError::InvalidTransition { .. } | ReconcileError::Conflict) => {
                ApiError::Conflict(e.to_string())
            }
            ReconcileError::Invalid(msg) => ApiError::Validation(msg),
            ReconcileError::Enrollment(e) => e.into(),
            ReconcileError::Dao(e) => e.into(),
        }
    }
}

impl From<ReviewError> for ApiError {
    fn from(err: ReviewError) -> Self {
        match err {
            e @ ReviewError::CourseNotFound(_) => ApiError::NotFound(e.to_string()),
            ReviewError::Invalid(msg) => ApiError::Validation(msg),
            ReviewError::Enrollment(e) => e.into(),
            ReviewError::Dao(e) => e.into(),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::Validation(err.to_string())
    }
}
