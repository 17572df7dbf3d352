use bson::{DateTime, oid::ObjectId};
use coursehub_db::models::{Payment, PaymentMethod, PaymentStatus};
use mongodb::Database;
use serde::Deserialize;
use tracing::{info, warn};

use crate::dao::base::{DaoError, DaoResult, PaginatedResult, PaginationParams};
use crate::dao::payment::PaymentDao;

/// Fields of a ledger entry known at capture time.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub user_id: ObjectId,
    pub course_id: String,
    pub amount_cents: i64,
    pub original_amount_cents: i64,
    pub discount_cents: i64,
    pub coupon_code: Option<String>,
    pub currency: String,
    pub order_id: String,
    pub payment_id: Option<String>,
    pub payer_email: Option<String>,
    pub payer_name: Option<String>,
    pub method: PaymentMethod,
}

impl NewPayment {
    fn into_payment(self) -> Payment {
        let now = DateTime::now();
        Payment {
            id: None,
            user_id: self.user_id,
            course_id: self.course_id,
            amount_cents: self.amount_cents,
            original_amount_cents: self.original_amount_cents,
            discount_cents: self.discount_cents,
            coupon_code: self.coupon_code,
            currency: self.currency,
            order_id: self.order_id,
            payment_id: self.payment_id,
            payer_email: self.payer_email,
            payer_name: self.payer_name,
            method: self.method,
            status: PaymentStatus::Completed,
            notes: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentStatusUpdate {
    pub status: PaymentStatus,
    pub note: Option<String>,
}

/// Payment ledger. Entries are written once per order id and afterwards only
/// their status and notes change.
pub struct PaymentService {
    pub dao: PaymentDao,
}

impl PaymentService {
    pub fn new(db: &Database) -> Self {
        Self {
            dao: PaymentDao::new(db),
        }
    }

    /// Records the payment. A second call with the same order id returns the
    /// existing entry and `false` instead of writing a duplicate.
    pub async fn record(&self, payment: NewPayment) -> DaoResult<(Payment, bool)> {
        let order_id = payment.order_id.clone();
        match self.dao.insert(&payment.into_payment()).await {
            Ok(stored) => {
                info!(
                    order_id = %stored.order_id,
                    course_id = %stored.course_id,
                    amount_cents = stored.amount_cents,
                    method = ?stored.method,
                    "Payment recorded"
                );
                Ok((stored, true))
            }
            Err(DaoError::DuplicateKey(_)) => {
                let existing = self
                    .dao
                    .find_by_order_id(&order_id)
                    .await?
                    .ok_or(DaoError::NotFound)?;
                info!(%order_id, "Payment already recorded for order");
                Ok((existing, false))
            }
            Err(e) => Err(e),
        }
    }

    /// Flags a payment that went through but whose follow-up failed.
    pub async fn flag_for_review(&self, id: ObjectId, note: String) {
        if let Err(e) = self
            .dao
            .set_status(id, PaymentStatus::NeedsReview, Some(note))
            .await
        {
            warn!(%id, error = %e, "Failed to flag payment for review");
        }
    }

    pub async fn list(
        &self,
        status: Option<PaymentStatus>,
        course_id: Option<&str>,
        params: &PaginationParams,
    ) -> DaoResult<PaginatedResult<Payment>> {
        self.dao.list(status, course_id, params).await
    }

    pub async fn orphaned(&self) -> DaoResult<Vec<Payment>> {
        self.dao.find_orphaned().await
    }

    pub async fn update_status(
        &self,
        id: ObjectId,
        update: PaymentStatusUpdate,
        admin_id: ObjectId,
    ) -> DaoResult<(Payment, PaymentStatus)> {
        let before = self.dao.base.find_by_id(id).await?;
        let note = update
            .note
            .map(|n| format!("{} ({}): {n}", status_label(update.status), admin_id.to_hex()));
        let after = self.dao.set_status(id, update.status, note).await?;
        Ok((after, before.status))
    }
}

fn status_label(status: PaymentStatus) -> &'static str {
    match status {
        PaymentStatus::Completed => "completed",
        PaymentStatus::NeedsReview => "needs_review",
        PaymentStatus::Refunded => "refunded",
        PaymentStatus::Cancelled => "cancelled",
    }
}
