use std::sync::Arc;

use bson::{DateTime, oid::ObjectId};
use coursehub_db::models::Review;
use mongodb::Database;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::catalog::Catalog;
use crate::dao::base::DaoError;
use crate::dao::review::{RatingSummary, ReviewDao};
use crate::enrollment::{EnrollmentError, EnrollmentService};

const MAX_COMMENT_CHARS: usize = 2000;

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("Course not found: {0}")]
    CourseNotFound(String),
    #[error("Invalid review: {0}")]
    Invalid(String),
    #[error(transparent)]
    Enrollment(#[from] EnrollmentError),
    #[error(transparent)]
    Dao(#[from] DaoError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewInput {
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
}

impl ReviewInput {
    fn check(&self) -> Result<(), ReviewError> {
        if !(1..=5).contains(&self.rating) {
            return Err(ReviewError::Invalid("rating must be between 1 and 5".into()));
        }
        if self.comment.chars().count() > MAX_COMMENT_CHARS {
            return Err(ReviewError::Invalid(format!(
                "comment is longer than {MAX_COMMENT_CHARS} characters"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CourseReviews {
    pub summary: RatingSummary,
    pub reviews: Vec<Review>,
}

pub struct ReviewService {
    pub dao: ReviewDao,
    catalog: Arc<Catalog>,
    enrollments: Arc<EnrollmentService>,
}

impl ReviewService {
    pub fn new(db: &Database, catalog: Arc<Catalog>, enrollments: Arc<EnrollmentService>) -> Self {
        Self {
            dao: ReviewDao::new(db),
            catalog,
            enrollments,
        }
    }

    /// Creates or replaces the user's review. `verified` reflects whether
    /// the user was enrolled at the time of this submission.
    pub async fn submit(
        &self,
        user_id: ObjectId,
        user_name: &str,
        course_id: &str,
        input: ReviewInput,
    ) -> Result<Review, ReviewError> {
        if self.catalog.course(course_id).is_none() {
            return Err(ReviewError::CourseNotFound(course_id.to_string()));
        }
        input.check()?;

        let verified = self.enrollments.is_enrolled(user_id, course_id).await?;
        let key = Review::key(&user_id, course_id);
        let created_at = self
            .dao
            .base
            .find_one(bson::doc! { "_id": &key })
            .await?
            .map(|r| r.created_at)
            .unwrap_or_else(DateTime::now);

        let review = Review {
            id: key,
            user_id,
            user_name: user_name.to_string(),
            course_id: course_id.to_string(),
            rating: input.rating,
            comment: input.comment.trim().to_string(),
            verified,
            created_at,
            updated_at: DateTime::now(),
        };

        let stored = self.dao.upsert(&review).await?;
        info!(%user_id, course_id, rating = stored.rating, verified, "Review saved");
        Ok(stored)
    }

    pub async fn for_course(&self, course_id: &str) -> Result<CourseReviews, ReviewError> {
        if self.catalog.course(course_id).is_none() {
            return Err(ReviewError::CourseNotFound(course_id.to_string()));
        }
        let (summary, reviews) = futures::try_join!(
            self.dao.summary(course_id),
            self.dao.list_for_course(course_id)
        )?;
        Ok(CourseReviews { summary, reviews })
    }
}
