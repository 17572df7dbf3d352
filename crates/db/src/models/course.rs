use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A course as listed in the catalog file. Reference data, never written by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price_cents: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub instructor: Option<String>,
    pub thumbnail: Option<String>,
    pub level: Option<String>,
    #[serde(default)]
    pub batches: Vec<Batch>,
}

/// A cohort of a course with its own capacity and schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub batch_number: u32,
    #[serde(default)]
    pub status: BatchStatus,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Advisory seat limit, enforced by the seat counter.
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u32,
    #[serde(default)]
    pub class_links: ClassLinks,
    #[serde(default)]
    pub schedule: Vec<ScheduledSession>,
    #[serde(default)]
    pub videos: Vec<BatchVideo>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    #[default]
    Upcoming,
    Active,
    Completed,
}

impl BatchStatus {
    pub fn accepts_enrollments(self) -> bool {
        matches!(self, BatchStatus::Upcoming | BatchStatus::Active)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClassLinks {
    pub meeting_url: Option<String>,
    pub chat_url: Option<String>,
    pub materials_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledSession {
    pub date: NaiveDate,
    pub time: String,
    #[serde(default = "default_session_minutes")]
    pub duration_minutes: u32,
    pub topic: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchVideo {
    pub title: String,
    pub url: String,
    pub duration: Option<String>,
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_max_capacity() -> u32 {
    30
}

fn default_session_minutes() -> u32 {
    60
}

impl Course {
    pub fn batch(&self, batch_number: u32) -> Option<&Batch> {
        self.batches.iter().find(|b| b.batch_number == batch_number)
    }
}
