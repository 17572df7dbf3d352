use std::sync::Arc;

use bson::oid::ObjectId;
use coursehub_db::models::{Coupon, Course, Enrollment, EnrollmentSource, Payment, PaymentMethod};
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::catalog::Catalog;
use crate::coupon::{CouponError, CouponService, DiscountBreakdown, OrderContext};
use crate::dao::base::DaoError;
use crate::email::{Delivery, NotificationDispatcher};
use crate::enrollment::{EnrollRequest, EnrollmentError, EnrollmentService};
use crate::payment::{NewPayment, PaymentService};
use crate::paypal::{PayPalError, PayPalService, PaymentConfirmation};

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error(transparent)]
    Coupon(#[from] CouponError),
    #[error(transparent)]
    PayPal(#[from] PayPalError),
    #[error(transparent)]
    Enrollment(#[from] EnrollmentError),
    #[error("Coupons are disabled")]
    CouponsDisabled,
    #[error("Coupon does not cover the full price; use PayPal checkout")]
    NotFree,
    #[error("Order total is zero; use the free checkout")]
    NothingToPay,
    #[error("Order {0} was paid for a different purchase")]
    OrderMismatch(String),
    #[error(transparent)]
    Dao(#[from] DaoError),
}

/// The authenticated buyer.
#[derive(Debug, Clone)]
pub struct Buyer {
    pub user_id: ObjectId,
    pub email: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayPalCheckout {
    pub course_id: String,
    pub coupon_code: Option<String>,
    #[serde(flatten)]
    pub confirmation: PaymentConfirmation,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FreeCheckout {
    pub course_id: String,
    pub coupon_code: String,
}

#[derive(Debug, Clone)]
pub struct CheckoutResult {
    pub enrollment: Enrollment,
    /// False when this order had already produced the enrollment.
    pub created: bool,
    pub payment: Payment,
    pub discount: Option<DiscountBreakdown>,
    pub email: Delivery,
    pub warnings: Vec<String>,
}

/// Runs the purchase chain: coupon, payment, enrollment, email. Each step
/// commits on its own; failures after the payment is recorded leave it in
/// place for the orphaned-payment report.
pub struct CheckoutService {
    catalog: Arc<Catalog>,
    coupons: Arc<CouponService>,
    enrollments: Arc<EnrollmentService>,
    payments: Arc<PaymentService>,
    paypal: Arc<PayPalService>,
    notifier: Arc<NotificationDispatcher>,
    dashboard_url: String,
}

/// A captured order only ever pays for the purchase it was recorded for.
fn ensure_same_purchase(
    payment: &Payment,
    buyer: &Buyer,
    course_id: &str,
) -> Result<(), CheckoutError> {
    if payment.user_id != buyer.user_id || payment.course_id != course_id {
        warn!(
            order_id = %payment.order_id,
            buyer = %buyer.user_id,
            course_id,
            paid_by = %payment.user_id,
            paid_for = %payment.course_id,
            "Order id reused for a different purchase"
        );
        return Err(CheckoutError::OrderMismatch(payment.order_id.clone()));
    }
    Ok(())
}

impl CheckoutService {
    pub fn new(
        catalog: Arc<Catalog>,
        coupons: Arc<CouponService>,
        enrollments: Arc<EnrollmentService>,
        payments: Arc<PaymentService>,
        paypal: Arc<PayPalService>,
        notifier: Arc<NotificationDispatcher>,
        dashboard_url: String,
    ) -> Self {
        Self {
            catalog,
            coupons,
            enrollments,
            payments,
            paypal,
            notifier,
            dashboard_url,
        }
    }

    fn course(&self, course_id: &str) -> Result<&Course, CheckoutError> {
        self.catalog
            .course(course_id)
            .ok_or_else(|| EnrollmentError::CourseNotFound(course_id.to_string()).into())
    }

    pub async fn paypal(
        &self,
        buyer: &Buyer,
        request: PayPalCheckout,
        coupons_enabled: bool,
    ) -> Result<CheckoutResult, CheckoutError> {
        let course = self.course(&request.course_id)?;
        let mut warnings = Vec::new();

        // A resubmitted confirmation skips straight to enrollment.
        if let Some(existing) = self
            .payments
            .dao
            .find_by_order_id(&request.confirmation.order_id)
            .await?
        {
            ensure_same_purchase(&existing, buyer, &course.id)?;
            info!(order_id = %existing.order_id, "Order already captured, resuming checkout");
            return self.finish(buyer, course, existing, None, warnings).await;
        }

        let order = OrderContext {
            user_id: &buyer.user_id,
            user_email: &buyer.email,
            course_id: &course.id,
            amount_cents: course.price_cents,
        };
        let applied = match request.coupon_code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => {
                if !coupons_enabled {
                    return Err(CheckoutError::CouponsDisabled);
                }
                Some(self.coupons.validate(code, &order).await?)
            }
            _ => None,
        };

        let amount_cents = applied
            .as_ref()
            .map_or(course.price_cents, |(_, b)| b.final_cents);
        if amount_cents == 0 {
            return Err(CheckoutError::NothingToPay);
        }

        let captured = self.paypal.confirm(&request.confirmation, amount_cents).await?;
        let (payment, created) = self
            .payments
            .record(NewPayment {
                user_id: buyer.user_id,
                course_id: course.id.clone(),
                amount_cents,
                original_amount_cents: course.price_cents,
                discount_cents: course.price_cents - amount_cents,
                coupon_code: applied.as_ref().map(|(c, _)| c.code.clone()),
                currency: captured.currency.clone(),
                order_id: captured.order_id.clone(),
                payment_id: captured.capture_id.clone(),
                payer_email: captured.payer_email.clone(),
                payer_name: captured.payer_name.clone(),
                method: PaymentMethod::Paypal,
            })
            .await?;
        if !created {
            ensure_same_purchase(&payment, buyer, &course.id)?;
        }

        if let (Some((coupon, breakdown)), true) = (&applied, created) {
            self.redeem_after_capture(coupon, &order, breakdown, &payment, &mut warnings)
                .await;
        }

        let discount = applied.map(|(_, b)| b);
        self.finish(buyer, course, payment, discount, warnings).await
    }

    /// The buyer has already paid, so a coupon that can no longer be redeemed
    /// does not block enrollment. The payment is flagged for an admin instead.
    async fn redeem_after_capture(
        &self,
        coupon: &Coupon,
        order: &OrderContext<'_>,
        breakdown: &DiscountBreakdown,
        payment: &Payment,
        warnings: &mut Vec<String>,
    ) {
        if let Err(e) = self
            .coupons
            .record_usage(coupon, order, breakdown, Some(&payment.order_id))
            .await
        {
            warn!(order_id = %payment.order_id, code = %coupon.code, error = %e, "Coupon not redeemed after capture");
            if let Some(id) = payment.id {
                self.payments
                    .flag_for_review(id, format!("coupon {} not redeemed: {e}", coupon.code))
                    .await;
            }
            warnings.push(format!("Coupon {} could not be recorded: {e}", coupon.code));
        }
    }

    pub async fn free(
        &self,
        buyer: &Buyer,
        request: FreeCheckout,
    ) -> Result<CheckoutResult, CheckoutError> {
        let course = self.course(&request.course_id)?;
        if self.enrollments.is_enrolled(buyer.user_id, &course.id).await? {
            return Err(EnrollmentError::AlreadyEnrolled.into());
        }

        let order = OrderContext {
            user_id: &buyer.user_id,
            user_email: &buyer.email,
            course_id: &course.id,
            amount_cents: course.price_cents,
        };
        let (coupon, breakdown) = self.coupons.validate(&request.coupon_code, &order).await?;
        if !breakdown.is_free() {
            return Err(CheckoutError::NotFree);
        }

        // Nothing was charged, so the coupon must be ours before anything is written.
        let order_id = format!("free-{}", uuid::Uuid::new_v4());
        self.coupons
            .record_usage(&coupon, &order, &breakdown, Some(&order_id))
            .await?;

        let (payment, _) = self
            .payments
            .record(NewPayment {
                user_id: buyer.user_id,
                course_id: course.id.clone(),
                amount_cents: 0,
                original_amount_cents: breakdown.original_cents,
                discount_cents: breakdown.discount_cents,
                coupon_code: Some(coupon.code.clone()),
                currency: course.currency.clone(),
                order_id,
                payment_id: None,
                payer_email: Some(buyer.email.clone()),
                payer_name: Some(buyer.name.clone()),
                method: PaymentMethod::FreeCoupon,
            })
            .await?;

        self.finish(buyer, course, payment, Some(breakdown), Vec::new())
            .await
    }

    async fn finish(
        &self,
        buyer: &Buyer,
        course: &Course,
        payment: Payment,
        discount: Option<DiscountBreakdown>,
        mut warnings: Vec<String>,
    ) -> Result<CheckoutResult, CheckoutError> {
        let source = match payment.method {
            PaymentMethod::FreeCoupon => EnrollmentSource::FreeCoupon,
            PaymentMethod::Manual => EnrollmentSource::AdminManual,
            PaymentMethod::Paypal => EnrollmentSource::WebPurchase,
        };

        let outcome = self
            .enrollments
            .enroll(
                &self.catalog,
                EnrollRequest {
                    user_id: buyer.user_id,
                    user_email: buyer.email.clone(),
                    course_id: course.id.clone(),
                    amount_paid_cents: payment.amount_cents,
                    payment_id: payment.id,
                    order_id: Some(payment.order_id.clone()),
                    source,
                },
            )
            .await
            .inspect_err(|e| {
                error!(
                    order_id = %payment.order_id,
                    user_id = %buyer.user_id,
                    course_id = %course.id,
                    error = %e,
                    "Enrollment failed after payment was recorded"
                );
            })?;

        let email = if outcome.created {
            self.notifier
                .enrollment_confirmation(course, &outcome.enrollment, &buyer.name, &self.dashboard_url)
                .await
        } else {
            Delivery::Sent
        };
        warnings.extend(email.warning());

        Ok(CheckoutResult {
            enrollment: outcome.enrollment,
            created: outcome.created,
            payment,
            discount,
            email,
            warnings,
        })
    }
}
