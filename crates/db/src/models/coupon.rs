use bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coupon {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    /// Stored upper-case; lookups normalize the same way.
    pub code: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    /// Whole percent for `Percentage`, cents for `Fixed`.
    pub discount_value: i64,
    /// Upper bound for percentage discounts, in cents.
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
    #[serde(default)]
    pub usage_count: u32,
    pub valid_from: Option<DateTime>,
    pub valid_until: Option<DateTime>,
    #[serde(default)]
    pub status: CouponStatus,
    #[serde(default)]
    pub usage_history: Vec<CouponUsage>,
    pub created_by: Option<ObjectId>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CouponTarget {
    #[default]
    General,
    UserSpecific,
    CourseSpecific,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CouponStatus {
    #[default]
    Active,
    Inactive,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouponUsage {
    pub user_id: ObjectId,
    pub course_id: String,
    pub order_id: Option<String>,
    pub original_cents: i64,
    pub discount_cents: i64,
    pub final_cents: i64,
    pub used_at: DateTime,
}

impl Coupon {
    pub const COLLECTION: &'static str = "coupons";

    pub fn normalize_code(code: &str) -> String {
        code.trim().to_uppercase()
    }

    pub fn uses_by(&self, user_id: &ObjectId) -> u32 {
        self.usage_history
            .iter()
            .filter(|u| &u.user_id == user_id)
            .count() as u32
    }
}
