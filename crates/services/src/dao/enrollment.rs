use bson::{DateTime, Document, doc, oid::ObjectId};
use coursehub_db::models::{Enrollment, EnrollmentSource, EnrollmentStatus};
use mongodb::Database;
use serde::{Deserialize, Serialize};

use super::base::{BaseDao, DaoError, DaoResult, PaginatedResult, PaginationParams};

pub struct EnrollmentDao {
    pub base: BaseDao<Enrollment>,
}

/// Admin listing filters. Every field is optional and combined with AND.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrollmentFilter {
    pub course_id: Option<String>,
    pub batch_number: Option<u32>,
    pub status: Option<EnrollmentStatus>,
    pub source: Option<EnrollmentSource>,
    pub user_id: Option<String>,
}

impl EnrollmentFilter {
    pub fn to_document(&self) -> DaoResult<Document> {
        let mut filter = Document::new();
        if let Some(ref course_id) = self.course_id {
            filter.insert("course_id", course_id);
        }
        if let Some(batch) = self.batch_number {
            filter.insert("batch_number", batch as i64);
        }
        if let Some(status) = self.status {
            filter.insert("status", bson::to_bson(&status)?);
        }
        if let Some(source) = self.source {
            filter.insert("enrollment_source", bson::to_bson(&source)?);
        }
        if let Some(ref user_id) = self.user_id {
            let oid = ObjectId::parse_str(user_id)
                .map_err(|_| DaoError::Validation(format!("Invalid user_id: {user_id}")))?;
            filter.insert("user_id", oid);
        }
        Ok(filter)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseProgressStats {
    pub course_id: String,
    pub enrollments: u64,
    pub completed: u64,
    pub average_progress: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressOverview {
    pub total_enrollments: u64,
    pub completed: u64,
    pub in_progress: u64,
    pub not_started: u64,
    pub average_progress: f64,
    pub courses: Vec<CourseProgressStats>,
}

impl EnrollmentDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, Enrollment::COLLECTION),
        }
    }

    /// Writes the enrollment under its composite key. Returns true when the
    /// document was created, false when an existing one was overwritten.
    pub async fn upsert(&self, enrollment: &Enrollment) -> DaoResult<bool> {
        self.base.upsert_by_id(enrollment.id.as_str(), enrollment).await
    }

    pub async fn find_for_user_course(
        &self,
        user_id: ObjectId,
        course_id: &str,
    ) -> DaoResult<Option<Enrollment>> {
        self.base
            .find_one(doc! { "user_id": user_id, "course_id": course_id })
            .await
    }

    pub async fn list_for_user(&self, user_id: ObjectId) -> DaoResult<Vec<Enrollment>> {
        self.base
            .find_many(doc! { "user_id": user_id }, Some(doc! { "enrolled_at": -1 }))
            .await
    }

    pub async fn list_filtered(
        &self,
        filter: &EnrollmentFilter,
        params: &PaginationParams,
    ) -> DaoResult<PaginatedResult<Enrollment>> {
        self.base
            .find_paginated(filter.to_document()?, Some(doc! { "enrolled_at": -1 }), params)
            .await
    }

    pub async fn exists_for_course(&self, user_id: ObjectId, course_id: &str) -> DaoResult<bool> {
        Ok(self
            .base
            .count(doc! { "user_id": user_id, "course_id": course_id })
            .await?
            > 0)
    }

    /// Sets progress, marking the enrollment completed at 100.
    pub async fn set_progress(&self, id: &str, progress: u8) -> DaoResult<Enrollment> {
        let now = DateTime::now();
        let mut set = doc! {
            "progress": progress as i32,
            "last_accessed": now,
        };
        if progress >= 100 {
            set.insert("status", "completed");
            set.insert("completed_at", now);
        } else {
            set.insert("status", "enrolled");
            set.insert("completed_at", bson::Bson::Null);
        }

        let matched = self.base.update_by_id(id, doc! { "$set": set }).await?;
        if !matched {
            return Err(DaoError::NotFound);
        }
        self.base.find_by_id(id).await
    }

    pub async fn touch(&self, id: &str) -> DaoResult<bool> {
        self.base
            .update_by_id(id, doc! { "$set": { "last_accessed": DateTime::now() } })
            .await
    }

    pub async fn delete(&self, id: &str) -> DaoResult<Option<Enrollment>> {
        let existing = self.base.find_one(doc! { "_id": id }).await?;
        if existing.is_some() {
            self.base.hard_delete(doc! { "_id": id }).await?;
        }
        Ok(existing)
    }

    pub async fn progress_overview(&self) -> DaoResult<ProgressOverview> {
        let per_course = self
            .base
            .aggregate(vec![
                doc! { "$group": {
                    "_id": "$course_id",
                    "enrollments": { "$sum": 1 },
                    "completed": { "$sum": { "$cond": [{ "$eq": ["$status", "completed"] }, 1, 0] } },
                    "average_progress": { "$avg": "$progress" },
                }},
                doc! { "$sort": { "_id": 1 } },
            ])
            .await?;

        let courses: Vec<CourseProgressStats> = per_course
            .iter()
            .map(|d| CourseProgressStats {
                course_id: d.get_str("_id").unwrap_or_default().to_string(),
                enrollments: number(d, "enrollments") as u64,
                completed: number(d, "completed") as u64,
                average_progress: number(d, "average_progress"),
            })
            .collect();

        let total_enrollments = self.base.count(doc! {}).await?;
        let completed = self.base.count(doc! { "status": "completed" }).await?;
        let not_started = self
            .base
            .count(doc! { "status": "enrolled", "progress": 0 })
            .await?;
        let progress_sum: f64 = courses
            .iter()
            .map(|c| c.average_progress * c.enrollments as f64)
            .sum();

        Ok(ProgressOverview {
            total_enrollments,
            completed,
            in_progress: total_enrollments.saturating_sub(completed + not_started),
            not_started,
            average_progress: if total_enrollments == 0 {
                0.0
            } else {
                progress_sum / total_enrollments as f64
            },
            courses,
        })
    }
}

/// Aggregation numbers come back as Int32, Int64 or Double depending on the stage.
fn number(doc: &Document, key: &str) -> f64 {
    match doc.get(key) {
        Some(bson::Bson::Int32(v)) => *v as f64,
        Some(bson::Bson::Int64(v)) => *v as f64,
        Some(bson::Bson::Double(v)) => *v,
        _ => 0.0,
    }
}
