use bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

/// Links a user to one batch of a course.
///
/// The composite `_id` makes a repeated write for the same user, course and
/// batch replace the existing document instead of adding a second one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: ObjectId,
    pub user_email: String,
    pub course_id: String,
    pub batch_number: u32,
    #[serde(default)]
    pub status: EnrollmentStatus,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub amount_paid_cents: i64,
    pub payment_id: Option<ObjectId>,
    pub order_id: Option<String>,
    #[serde(default)]
    pub enrollment_source: EnrollmentSource,
    /// Admin who created the enrollment by hand.
    pub enrolled_by: Option<ObjectId>,
    pub enrolled_at: DateTime,
    pub last_accessed: Option<DateTime>,
    pub completed_at: Option<DateTime>,
    pub updated_at: DateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    #[default]
    Enrolled,
    Completed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentSource {
    #[default]
    WebPurchase,
    AdminManual,
    FreeCoupon,
}

impl Enrollment {
    pub const COLLECTION: &'static str = "enrollments";

    pub fn key(user_id: &ObjectId, course_id: &str, batch_number: u32) -> String {
        format!("{}_{}_{}", user_id.to_hex(), course_id, batch_number)
    }
}
