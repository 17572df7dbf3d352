use bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

/// Ledger entry for a completed transaction, including $0 coupon enrollments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub course_id: String,
    pub amount_cents: i64,
    #[serde(default)]
    pub original_amount_cents: i64,
    #[serde(default)]
    pub discount_cents: i64,
    pub coupon_code: Option<String>,
    pub currency: String,
    /// Provider order id, or a generated id for free and manual payments. Unique.
    pub order_id: String,
    /// Provider capture id.
    pub payment_id: Option<String>,
    pub payer_email: Option<String>,
    pub payer_name: Option<String>,
    pub method: PaymentMethod,
    #[serde(default)]
    pub status: PaymentStatus,
    #[serde(default)]
    pub notes: Vec<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Paypal,
    FreeCoupon,
    Manual,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Completed,
    NeedsReview,
    Refunded,
    Cancelled,
}

impl Payment {
    pub const COLLECTION: &'static str = "payments";
}
