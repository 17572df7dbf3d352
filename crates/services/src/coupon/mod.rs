pub mod engine;

use bson::{DateTime, oid::ObjectId};
use coursehub_db::models::{
    Coupon, CouponStatus, CouponTarget, CouponUsage, DiscountType, EmailKind,
};
use mongodb::Database;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::dao::base::{DaoError, PaginatedResult, PaginationParams};
use crate::dao::coupon::CouponDao;
use crate::email::{CouponEmail, Delivery, NotificationDispatcher};

pub use engine::{CouponRejection, DiscountBreakdown, OrderContext, compute_discount, evaluate};

#[derive(Debug, Error)]
pub enum CouponError {
    #[error("{0}")]
    Rejected(#[from] CouponRejection),
    #[error("Invalid coupon: {0}")]
    Invalid(String),
    #[error("Coupon code already exists: {0}")]
    DuplicateCode(String),
    #[error("Coupon could not be redeemed: its limits were reached by another order")]
    RedemptionConflict,
    #[error(transparent)]
    Dao(DaoError),
}

impl From<DaoError> for CouponError {
    fn from(err: DaoError) -> Self {
        match err {
            DaoError::DuplicateKey(msg) => CouponError::DuplicateCode(msg),
            other => CouponError::Dao(other),
        }
    }
}

/// Admin payload for creating a coupon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCoupon {
    pub code: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub max_discount_cents: Option<i64>,
    pub min_order_cents: Option<i64>,
    #[serde(default)]
    pub target_type: CouponTarget,
    #[serde(default)]
    pub target_user_emails: Vec<String>,
    #[serde(default)]
    pub target_course_ids: Vec<String>,
    pub usage_limit: Option<u32>,
    pub usage_limit_per_user: Option<u32>,
    pub valid_from: Option<chrono::DateTime<chrono::Utc>>,
    pub valid_until: Option<chrono::DateTime<chrono::Utc>>,
}

/// Admin request to send a coupon code to someone.
#[derive(Debug, Clone, Deserialize)]
pub struct CouponEmailRequest {
    pub to_email: String,
    #[serde(default)]
    pub to_name: String,
    pub message: Option<String>,
}

/// What deleting a coupon actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deleted,
    Deactivated,
}

impl NewCoupon {
    /// Checks the payload and builds the stored document.
    pub fn into_coupon(self, catalog: &Catalog, created_by: ObjectId) -> Result<Coupon, CouponError> {
        let code = Coupon::normalize_code(&self.code);
        if code.len() < 3
            || code.len() > 32
            || !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(CouponError::Invalid(
                "code must be 3-32 letters, digits, '-' or '_'".into(),
            ));
        }

        match self.discount_type {
            DiscountType::Percentage if !(1..=100).contains(&self.discount_value) => {
                return Err(CouponError::Invalid(
                    "percentage discount must be between 1 and 100".into(),
                ));
            }
            DiscountType::Fixed if self.discount_value <= 0 => {
                return Err(CouponError::Invalid(
                    "fixed discount must be greater than zero".into(),
                ));
            }
            _ => {}
        }

        if self.max_discount_cents.is_some_and(|c| c <= 0)
            || self.min_order_cents.is_some_and(|c| c < 0)
        {
            return Err(CouponError::Invalid("amount limits must be positive".into()));
        }

        let target_user_emails: Vec<String> = self
            .target_user_emails
            .iter()
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        match self.target_type {
            CouponTarget::UserSpecific if target_user_emails.is_empty() => {
                return Err(CouponError::Invalid(
                    "user specific coupons need at least one email".into(),
                ));
            }
            CouponTarget::CourseSpecific if self.target_course_ids.is_empty() => {
                return Err(CouponError::Invalid(
                    "course specific coupons need at least one course".into(),
                ));
            }
            _ => {}
        }
        if let Some(unknown) = self
            .target_course_ids
            .iter()
            .find(|id| catalog.course(id).is_none())
        {
            return Err(CouponError::Invalid(format!("unknown course: {unknown}")));
        }

        if matches!(self.usage_limit, Some(0)) || matches!(self.usage_limit_per_user, Some(0)) {
            return Err(CouponError::Invalid("usage limits must be at least 1".into()));
        }

        if let (Some(from), Some(until)) = (self.valid_from, self.valid_until) {
            if until <= from {
                return Err(CouponError::Invalid(
                    "valid_until must be after valid_from".into(),
                ));
            }
        }

        let now = DateTime::now();
        Ok(Coupon {
            id: None,
            code,
            description: self.description,
            discount_type: self.discount_type,
            discount_value: self.discount_value,
            max_discount_cents: self.max_discount_cents,
            min_order_cents: self.min_order_cents,
            target_type: self.target_type,
            target_user_emails,
            target_course_ids: self.target_course_ids,
            usage_limit: self.usage_limit,
            usage_limit_per_user: self.usage_limit_per_user,
            usage_count: 0,
            valid_from: self.valid_from.map(DateTime::from_chrono),
            valid_until: self.valid_until.map(DateTime::from_chrono),
            status: CouponStatus::Active,
            usage_history: Vec::new(),
            created_by: Some(created_by),
            created_at: now,
            updated_at: now,
        })
    }
}

pub struct CouponService {
    pub dao: CouponDao,
}

impl CouponService {
    pub fn new(db: &Database) -> Self {
        Self {
            dao: CouponDao::new(db),
        }
    }

    /// Looks the code up and checks it against the order. Nothing is recorded.
    pub async fn validate(
        &self,
        code: &str,
        order: &OrderContext<'_>,
    ) -> Result<(Coupon, DiscountBreakdown), CouponError> {
        let coupon = self
            .dao
            .find_by_code(code)
            .await?
            .ok_or(CouponRejection::InvalidCode)?;
        let breakdown = evaluate(&coupon, order, DateTime::now())?;
        Ok((coupon, breakdown))
    }

    /// Records a redemption after the payment went through.
    pub async fn record_usage(
        &self,
        coupon: &Coupon,
        order: &OrderContext<'_>,
        breakdown: &DiscountBreakdown,
        order_id: Option<&str>,
    ) -> Result<Coupon, CouponError> {
        let id = coupon
            .id
            .ok_or_else(|| CouponError::Invalid("coupon has no id".into()))?;
        let usage = CouponUsage {
            user_id: *order.user_id,
            course_id: order.course_id.to_string(),
            order_id: order_id.map(str::to_string),
            original_cents: breakdown.original_cents,
            discount_cents: breakdown.discount_cents,
            final_cents: breakdown.final_cents,
            used_at: DateTime::now(),
        };

        match self.dao.redeem(id, &usage).await? {
            Some(updated) => {
                info!(
                    code = %coupon.code,
                    user_id = %order.user_id,
                    usage_count = updated.usage_count,
                    "Coupon redeemed"
                );
                Ok(updated)
            }
            None => {
                warn!(code = %coupon.code, user_id = %order.user_id, "Coupon redemption lost a race");
                Err(CouponError::RedemptionConflict)
            }
        }
    }

    pub async fn create(
        &self,
        input: NewCoupon,
        catalog: &Catalog,
        admin_id: ObjectId,
    ) -> Result<Coupon, CouponError> {
        let coupon = input.into_coupon(catalog, admin_id)?;
        let created = self.dao.insert(&coupon).await?;
        info!(code = %created.code, %admin_id, "Coupon created");
        Ok(created)
    }

    pub async fn list(
        &self,
        status: Option<CouponStatus>,
        params: &PaginationParams,
    ) -> Result<PaginatedResult<Coupon>, CouponError> {
        Ok(self.dao.list(status, params).await?)
    }

    pub async fn get(&self, id: ObjectId) -> Result<Coupon, CouponError> {
        Ok(self.dao.base.find_by_id(id).await?)
    }

    pub async fn set_active(&self, id: ObjectId, active: bool) -> Result<Coupon, CouponError> {
        let status = if active {
            CouponStatus::Active
        } else {
            CouponStatus::Inactive
        };
        Ok(self.dao.set_status(id, status).await?)
    }

    pub async fn send_by_email(
        &self,
        id: ObjectId,
        request: CouponEmailRequest,
        catalog: &Catalog,
        notifier: &NotificationDispatcher,
        currency: &str,
    ) -> Result<Delivery, CouponError> {
        let to_email = request.to_email.trim().to_lowercase();
        if !to_email.contains('@') {
            return Err(CouponError::Invalid(format!("invalid recipient: {to_email}")));
        }
        let coupon = self.get(id).await?;
        if coupon.status != CouponStatus::Active {
            return Err(CouponRejection::Inactive.into());
        }

        let to_name = if request.to_name.trim().is_empty() {
            to_email.split('@').next().unwrap_or_default().to_string()
        } else {
            request.to_name.trim().to_string()
        };
        let course_titles = coupon
            .target_course_ids
            .iter()
            .filter_map(|id| catalog.course(id))
            .map(|c| c.title.as_str())
            .collect();
        let rendered = CouponEmail {
            recipient_name: &to_name,
            code: &coupon.code,
            discount_type: coupon.discount_type,
            discount_value: coupon.discount_value,
            currency,
            valid_until: coupon.valid_until.map(|d| d.to_chrono().date_naive()),
            course_titles,
            message: request.message.as_deref(),
        }
        .render();

        Ok(notifier
            .dispatch(
                EmailKind::Coupon,
                &to_email,
                &to_name,
                rendered,
                coupon.id.map(|id| id.to_hex()),
            )
            .await)
    }

    /// Hard-deletes a never-used coupon; a used one is only deactivated so
    /// its usage history stays attached to past orders.
    pub async fn delete(&self, id: ObjectId) -> Result<DeleteOutcome, CouponError> {
        if self.dao.delete_unused(id).await? {
            return Ok(DeleteOutcome::Deleted);
        }
        self.dao.set_status(id, CouponStatus::Inactive).await?;
        Ok(DeleteOutcome::Deactivated)
    }
}
