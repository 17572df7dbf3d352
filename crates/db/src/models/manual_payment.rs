use bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

/// A user's claim of an out-of-band payment, waiting for an admin decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualPayment {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub user_email: String,
    pub user_name: String,
    pub course_id: String,
    pub amount_cents: i64,
    pub method: String,
    /// Bank transfer reference or similar, as typed by the user.
    pub reference: String,
    pub note: Option<String>,
    #[serde(default)]
    pub status: ManualPaymentStatus,
    pub rejection_reason: Option<String>,
    pub enrollment_id: Option<String>,
    pub payment_id: Option<ObjectId>,
    pub reviewed_by: Option<ObjectId>,
    pub reviewed_at: Option<DateTime>,
    #[serde(default)]
    pub history: Vec<StatusChange>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ManualPaymentStatus {
    #[default]
    PendingManualVerification,
    VerifiedAndEnrolled,
    Archived,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: ManualPaymentStatus,
    pub to: ManualPaymentStatus,
    pub admin_id: ObjectId,
    pub reason: Option<String>,
    pub at: DateTime,
}

impl ManualPayment {
    pub const COLLECTION: &'static str = "manual_payments";
}
