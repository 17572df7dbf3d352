use bson::DateTime;
use serde::{Deserialize, Serialize};

/// Seat counter for one batch. `_id` is `"{course_id}_{batch_number}"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSeats {
    #[serde(rename = "_id")]
    pub id: String,
    pub course_id: String,
    pub batch_number: u32,
    #[serde(default)]
    pub enrolled_count: u32,
    pub updated_at: DateTime,
}

impl BatchSeats {
    pub const COLLECTION: &'static str = "batch_seats";

    pub fn key(course_id: &str, batch_number: u32) -> String {
        format!("{course_id}_{batch_number}")
    }
}
