use std::sync::Arc;

use bson::{DateTime, doc, oid::ObjectId};
use coursehub_db::models::{
    AuditChange, EnrollmentSource, ManualPayment, ManualPaymentStatus, PaymentMethod, StatusChange,
};
use mongodb::Database;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::dao::audit::AuditDao;
use crate::dao::base::{DaoError, PaginatedResult, PaginationParams};
use crate::dao::manual_payment::ManualPaymentDao;
use crate::email::{Delivery, NotificationDispatcher};
use crate::enrollment::{EnrollOutcome, EnrollRequest, EnrollmentError, EnrollmentService};
use crate::payment::{NewPayment, PaymentService};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManualPaymentAction {
    Verify,
    Archive,
    Reject,
    Restore,
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Cannot {action:?} a manual payment that is {from:?}")]
    InvalidTransition {
        from: ManualPaymentStatus,
        action: ManualPaymentAction,
    },
    #[error("Manual payment was changed by someone else, reload and try again")]
    Conflict,
    #[error("Invalid manual payment: {0}")]
    Invalid(String),
    #[error(transparent)]
    Enrollment(#[from] EnrollmentError),
    #[error(transparent)]
    Dao(#[from] DaoError),
}

/// The only moves an admin can make on a claim.
pub fn next_status(
    from: ManualPaymentStatus,
    action: ManualPaymentAction,
) -> Result<ManualPaymentStatus, ReconcileError> {
    use ManualPaymentAction as A;
    use ManualPaymentStatus as S;

    match (from, action) {
        (S::PendingManualVerification, A::Verify) => Ok(S::VerifiedAndEnrolled),
        (S::PendingManualVerification, A::Archive) => Ok(S::Archived),
        (S::PendingManualVerification, A::Reject) => Ok(S::Rejected),
        (S::Archived | S::Rejected, A::Restore) => Ok(S::PendingManualVerification),
        _ => Err(ReconcileError::InvalidTransition { from, action }),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManualPaymentSubmission {
    pub course_id: String,
    pub amount_cents: i64,
    pub method: String,
    pub reference: String,
    pub note: Option<String>,
}

/// The submitting user, as known from their token and profile.
#[derive(Debug, Clone)]
pub struct Claimant {
    pub user_id: ObjectId,
    pub email: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct VerifyOutcome {
    pub manual_payment: ManualPayment,
    pub enrollment: EnrollOutcome,
    pub email: Delivery,
    pub warnings: Vec<String>,
}

pub struct ManualPaymentService {
    pub dao: ManualPaymentDao,
    audit: AuditDao,
    catalog: Arc<Catalog>,
    enrollments: Arc<EnrollmentService>,
    payments: Arc<PaymentService>,
    notifier: Arc<NotificationDispatcher>,
    dashboard_url: String,
}

impl ManualPaymentService {
    pub fn new(
        db: &Database,
        catalog: Arc<Catalog>,
        enrollments: Arc<EnrollmentService>,
        payments: Arc<PaymentService>,
        notifier: Arc<NotificationDispatcher>,
        dashboard_url: String,
    ) -> Self {
        Self {
            dao: ManualPaymentDao::new(db),
            audit: AuditDao::new(db),
            catalog,
            enrollments,
            payments,
            notifier,
            dashboard_url,
        }
    }

    pub async fn submit(
        &self,
        claimant: &Claimant,
        submission: ManualPaymentSubmission,
    ) -> Result<ManualPayment, ReconcileError> {
        if self.catalog.course(&submission.course_id).is_none() {
            return Err(EnrollmentError::CourseNotFound(submission.course_id).into());
        }
        if submission.amount_cents <= 0 {
            return Err(ReconcileError::Invalid("amount must be positive".into()));
        }
        if submission.reference.trim().is_empty() || submission.method.trim().is_empty() {
            return Err(ReconcileError::Invalid(
                "payment method and reference are required".into(),
            ));
        }
        if self
            .enrollments
            .is_enrolled(claimant.user_id, &submission.course_id)
            .await?
        {
            return Err(EnrollmentError::AlreadyEnrolled.into());
        }

        let now = DateTime::now();
        let claim = ManualPayment {
            id: None,
            user_id: claimant.user_id,
            user_email: claimant.email.clone(),
            user_name: claimant.name.clone(),
            course_id: submission.course_id,
            amount_cents: submission.amount_cents,
            method: submission.method.trim().to_string(),
            reference: submission.reference.trim().to_string(),
            note: submission.note,
            status: ManualPaymentStatus::PendingManualVerification,
            rejection_reason: None,
            enrollment_id: None,
            payment_id: None,
            reviewed_by: None,
            reviewed_at: None,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        let stored = self.dao.insert(&claim).await?;
        info!(
            user_id = %claimant.user_id,
            course_id = %stored.course_id,
            amount_cents = stored.amount_cents,
            "Manual payment submitted"
        );
        Ok(stored)
    }

    pub async fn list_for_user(&self, user_id: ObjectId) -> Result<Vec<ManualPayment>, ReconcileError> {
        Ok(self.dao.list_for_user(user_id).await?)
    }

    pub async fn list_by_status(
        &self,
        status: Option<ManualPaymentStatus>,
        params: &PaginationParams,
    ) -> Result<PaginatedResult<ManualPayment>, ReconcileError> {
        Ok(self.dao.list_by_status(status, params).await?)
    }

    async fn load(&self, id: ObjectId) -> Result<ManualPayment, ReconcileError> {
        Ok(self.dao.base.find_by_id(id).await?)
    }

    /// Confirms the claim: records a manual payment, enrolls the user and
    /// sends the confirmation. The payment is keyed by the claim id, so a
    /// retried verify reuses both the payment and the enrollment. A student
    /// already enrolled through another purchase is refused before anything
    /// is written; the claim stays pending for the admin to reject.
    pub async fn verify(
        &self,
        id: ObjectId,
        admin_id: ObjectId,
        note: Option<String>,
    ) -> Result<VerifyOutcome, ReconcileError> {
        let claim = self.load(id).await?;
        let to = next_status(claim.status, ManualPaymentAction::Verify)?;
        let course = self
            .catalog
            .course(&claim.course_id)
            .ok_or_else(|| EnrollmentError::CourseNotFound(claim.course_id.clone()))?;

        let order_id = format!("manual-{}", id.to_hex());
        if let Some(existing) = self
            .enrollments
            .find_for_user_course(claim.user_id, &claim.course_id)
            .await?
            .filter(|e| e.order_id.as_deref() != Some(order_id.as_str()))
        {
            warn!(
                manual_payment_id = %id,
                enrollment_id = %existing.id,
                "Claimant is already enrolled, not verifying"
            );
            return Err(EnrollmentError::AlreadyEnrolled.into());
        }

        let (payment, _) = self
            .payments
            .record(NewPayment {
                user_id: claim.user_id,
                course_id: claim.course_id.clone(),
                amount_cents: claim.amount_cents,
                original_amount_cents: course.price_cents,
                discount_cents: (course.price_cents - claim.amount_cents).max(0),
                coupon_code: None,
                currency: course.currency.clone(),
                order_id,
                payment_id: Some(claim.reference.clone()),
                payer_email: Some(claim.user_email.clone()),
                payer_name: Some(claim.user_name.clone()),
                method: PaymentMethod::Manual,
            })
            .await?;

        let enrollment = self
            .enrollments
            .enroll(
                &self.catalog,
                EnrollRequest {
                    user_id: claim.user_id,
                    user_email: claim.user_email.clone(),
                    course_id: claim.course_id.clone(),
                    amount_paid_cents: claim.amount_cents,
                    payment_id: payment.id,
                    order_id: Some(payment.order_id.clone()),
                    source: EnrollmentSource::AdminManual,
                },
            )
            .await?;

        let change = StatusChange {
            from: claim.status,
            to,
            admin_id,
            reason: note.clone(),
            at: DateTime::now(),
        };
        let mut extra = doc! { "enrollment_id": &enrollment.enrollment.id };
        if let Some(payment_id) = payment.id {
            extra.insert("payment_id", payment_id);
        }
        let updated = self
            .dao
            .transition(id, &change, extra)
            .await?
            .ok_or(ReconcileError::Conflict)?;
        self.audit_transition(&change, id, note).await;

        let email = self
            .notifier
            .enrollment_confirmation(
                course,
                &enrollment.enrollment,
                &claim.user_name,
                &self.dashboard_url,
            )
            .await;
        let warnings = email.warning().into_iter().collect();

        Ok(VerifyOutcome {
            manual_payment: updated,
            enrollment,
            email,
            warnings,
        })
    }

    /// Archive, reject or restore. None of these touch enrollments or payments.
    pub async fn decide(
        &self,
        id: ObjectId,
        action: ManualPaymentAction,
        admin_id: ObjectId,
        reason: Option<String>,
    ) -> Result<ManualPayment, ReconcileError> {
        if action == ManualPaymentAction::Verify {
            return Err(ReconcileError::Invalid("use verify to approve a payment".into()));
        }
        let reason = reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
        if action == ManualPaymentAction::Reject && reason.is_none() {
            return Err(ReconcileError::Invalid("a rejection needs a reason".into()));
        }

        let claim = self.load(id).await?;
        let to = next_status(claim.status, action)?;
        let change = StatusChange {
            from: claim.status,
            to,
            admin_id,
            reason: reason.clone(),
            at: DateTime::now(),
        };
        let extra = match action {
            ManualPaymentAction::Reject => doc! { "rejection_reason": reason.clone() },
            ManualPaymentAction::Restore => doc! { "rejection_reason": bson::Bson::Null },
            _ => doc! {},
        };

        let updated = self
            .dao
            .transition(id, &change, extra)
            .await?
            .ok_or(ReconcileError::Conflict)?;
        self.audit_transition(&change, id, reason).await;
        Ok(updated)
    }

    async fn audit_transition(&self, change: &StatusChange, id: ObjectId, reason: Option<String>) {
        let action = format!("manual_payment.{}", status_action(change.to));
        self.audit
            .record(
                change.admin_id,
                &action,
                "manual_payment",
                &id.to_hex(),
                vec![AuditChange::new("status", change.from, change.to)],
                reason,
            )
            .await;
    }
}

fn status_action(to: ManualPaymentStatus) -> &'static str {
    match to {
        ManualPaymentStatus::VerifiedAndEnrolled => "verify",
        ManualPaymentStatus::Archived => "archive",
        ManualPaymentStatus::Rejected => "reject",
        ManualPaymentStatus::PendingManualVerification => "restore",
    }
}
