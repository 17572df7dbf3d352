use bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

/// A queued notification. Written before the first delivery attempt so a
/// failed send can be retried later without touching the enrollment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailOutbox {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub kind: EmailKind,
    pub to_email: String,
    pub to_name: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
    /// Enrollment, coupon or manual payment id this email is about.
    pub related_id: Option<String>,
    #[serde(default)]
    pub status: OutboxStatus,
    #[serde(default)]
    pub attempts: u32,
    pub last_error: Option<String>,
    pub sent_at: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmailKind {
    EnrollmentConfirmation,
    Coupon,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    #[default]
    Pending,
    Sent,
    Failed,
}

impl EmailOutbox {
    pub const COLLECTION: &'static str = "email_outbox";
}
