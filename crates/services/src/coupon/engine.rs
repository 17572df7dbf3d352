//! Coupon rules and discount arithmetic. Pure: no I/O, `now` is passed in.

use bson::{DateTime, oid::ObjectId};
use coursehub_db::models::{Coupon, CouponStatus, CouponTarget, DiscountType};
use serde::Serialize;
use thiserror::Error;

/// Why a coupon cannot be applied to an order.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum CouponRejection {
    #[error("Invalid coupon code")]
    InvalidCode,
    #[error("Coupon is not active")]
    Inactive,
    #[error("Coupon is not valid yet")]
    NotYetValid,
    #[error("Coupon has expired")]
    Expired,
    #[error("Coupon is not available for this account")]
    NotForUser,
    #[error("Coupon does not apply to this course")]
    NotForCourse,
    #[error("Order total is below the coupon minimum of {min_order_cents} cents")]
    BelowMinimum { min_order_cents: i64 },
    #[error("Coupon usage limit reached")]
    UsageLimitReached,
    #[error("You have already used this coupon the maximum number of times")]
    PerUserLimitReached,
}

/// Who is buying what, for how much.
#[derive(Debug, Clone, Copy)]
pub struct OrderContext<'a> {
    pub user_id: &'a ObjectId,
    pub user_email: &'a str,
    pub course_id: &'a str,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscountBreakdown {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub original_cents: i64,
    pub discount_cents: i64,
    pub final_cents: i64,
    pub savings_cents: i64,
}

impl DiscountBreakdown {
    pub fn is_free(&self) -> bool {
        self.final_cents == 0
    }
}

/// Discount for `amount_cents`, never negative and never above the amount.
///
/// Percentages round half up to the cent and are then capped by
/// `max_discount_cents`. Fixed discounts are floored at the order amount.
pub fn compute_discount(
    discount_type: DiscountType,
    discount_value: i64,
    max_discount_cents: Option<i64>,
    amount_cents: i64,
) -> i64 {
    let amount = amount_cents.max(0);
    let discount = match discount_type {
        DiscountType::Percentage => {
            let pct = discount_value.clamp(0, 100);
            let raw = (amount * pct + 50) / 100;
            match max_discount_cents {
                Some(cap) => raw.min(cap.max(0)),
                None => raw,
            }
        }
        DiscountType::Fixed => discount_value.max(0),
    };
    discount.min(amount)
}

/// Checks every rule in order and returns the price breakdown when the
/// coupon applies. Does not record anything.
pub fn evaluate(
    coupon: &Coupon,
    order: &OrderContext<'_>,
    now: DateTime,
) -> Result<DiscountBreakdown, CouponRejection> {
    if coupon.status != CouponStatus::Active {
        return Err(CouponRejection::Inactive);
    }

    if let Some(from) = coupon.valid_from {
        if now < from {
            return Err(CouponRejection::NotYetValid);
        }
    }
    if let Some(until) = coupon.valid_until {
        if now > until {
            return Err(CouponRejection::Expired);
        }
    }

    match coupon.target_type {
        CouponTarget::General => {}
        CouponTarget::UserSpecific => {
            let allowed = coupon
                .target_user_emails
                .iter()
                .any(|e| e.eq_ignore_ascii_case(order.user_email));
            if !allowed {
                return Err(CouponRejection::NotForUser);
            }
        }
        CouponTarget::CourseSpecific => {
            if !coupon.target_course_ids.iter().any(|c| c == order.course_id) {
                return Err(CouponRejection::NotForCourse);
            }
        }
    }

    if let Some(min) = coupon.min_order_cents {
        if order.amount_cents < min {
            return Err(CouponRejection::BelowMinimum {
                min_order_cents: min,
            });
        }
    }

    if let Some(limit) = coupon.usage_limit {
        if coupon.usage_count >= limit {
            return Err(CouponRejection::UsageLimitReached);
        }
    }
    if let Some(per_user) = coupon.usage_limit_per_user {
        if coupon.uses_by(order.user_id) >= per_user {
            return Err(CouponRejection::PerUserLimitReached);
        }
    }

    let discount_cents = compute_discount(
        coupon.discount_type,
        coupon.discount_value,
        coupon.max_discount_cents,
        order.amount_cents,
    );
    let final_cents = order.amount_cents.max(0) - discount_cents;

    Ok(DiscountBreakdown {
        code: coupon.code.clone(),
        discount_type: coupon.discount_type,
        discount_value: coupon.discount_value,
        original_cents: order.amount_cents,
        discount_cents,
        final_cents,
        savings_cents: discount_cents,
    })
}
