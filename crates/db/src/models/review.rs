use bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    /// `"{user_id}_{course_id}"`, one review per user and course.
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: ObjectId,
    pub user_name: String,
    pub course_id: String,
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
    /// Whether the author was enrolled when the review was submitted.
    #[serde(default)]
    pub verified: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Review {
    pub const COLLECTION: &'static str = "reviews";

    pub fn key(user_id: &ObjectId, course_id: &str) -> String {
        format!("{}_{}", user_id.to_hex(), course_id)
    }
}
