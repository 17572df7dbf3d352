use std::collections::HashMap;

use bson::{DateTime, oid::ObjectId};
use coursehub_db::models::{
    Batch, BatchStatus, Course, Enrollment, EnrollmentSource, EnrollmentStatus,
};
use mongodb::Database;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::dao::base::{DaoError, PaginatedResult, PaginationParams};
use crate::dao::enrollment::{EnrollmentDao, EnrollmentFilter, ProgressOverview};
use crate::dao::seats::SeatDao;

#[derive(Debug, Error)]
pub enum EnrollmentError {
    #[error("Course not found: {0}")]
    CourseNotFound(String),
    #[error("Batch {batch_number} not found for course {course_id}")]
    BatchNotFound { course_id: String, batch_number: u32 },
    #[error("No available batches for course {0}")]
    NoAvailableBatches(String),
    #[error("Already enrolled in this course")]
    AlreadyEnrolled,
    #[error("Not enrolled in this course")]
    NotEnrolled,
    #[error("Progress must be between 0 and 100, got {0}")]
    InvalidProgress(u32),
    #[error(transparent)]
    Dao(#[from] DaoError),
}

/// Batches that can take another student, in the order they should fill:
/// earliest start date first (undated batches last), then batch number.
pub fn candidate_batches<'a>(
    course: &'a Course,
    counts: &HashMap<u32, u32>,
) -> Vec<&'a Batch> {
    let mut open: Vec<&Batch> = course
        .batches
        .iter()
        .filter(|b| b.status.accepts_enrollments())
        .filter(|b| counts.get(&b.batch_number).copied().unwrap_or(0) < b.max_capacity)
        .collect();
    open.sort_by_key(|b| (b.start_date.is_none(), b.start_date, b.batch_number));
    open
}

pub fn select_next_batch<'a>(course: &'a Course, counts: &HashMap<u32, u32>) -> Option<&'a Batch> {
    candidate_batches(course, counts).into_iter().next()
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchAvailability {
    pub batch_number: u32,
    pub status: BatchStatus,
    pub enrolled: u32,
    pub max_capacity: u32,
    pub is_full: bool,
}

pub fn batch_availability(course: &Course, counts: &HashMap<u32, u32>) -> Vec<BatchAvailability> {
    course
        .batches
        .iter()
        .map(|b| {
            let enrolled = counts.get(&b.batch_number).copied().unwrap_or(0);
            BatchAvailability {
                batch_number: b.batch_number,
                status: b.status,
                enrolled,
                max_capacity: b.max_capacity,
                is_full: enrolled >= b.max_capacity,
            }
        })
        .collect()
}

/// Everything the writer needs to know about a purchase.
#[derive(Debug, Clone)]
pub struct EnrollRequest {
    pub user_id: ObjectId,
    pub user_email: String,
    pub course_id: String,
    pub amount_paid_cents: i64,
    pub payment_id: Option<ObjectId>,
    pub order_id: Option<String>,
    pub source: EnrollmentSource,
}

#[derive(Debug, Clone)]
pub struct EnrollOutcome {
    pub enrollment: Enrollment,
    /// False when an earlier attempt already enrolled the user.
    pub created: bool,
}

impl EnrollRequest {
    fn into_enrollment(self, batch_number: u32, enrolled_by: Option<ObjectId>) -> Enrollment {
        let now = DateTime::now();
        Enrollment {
            id: Enrollment::key(&self.user_id, &self.course_id, batch_number),
            user_id: self.user_id,
            user_email: self.user_email,
            course_id: self.course_id,
            batch_number,
            status: EnrollmentStatus::Enrolled,
            progress: 0,
            amount_paid_cents: self.amount_paid_cents,
            payment_id: self.payment_id,
            order_id: self.order_id,
            enrollment_source: self.source,
            enrolled_by,
            enrolled_at: now,
            last_accessed: None,
            completed_at: None,
            updated_at: now,
        }
    }
}

pub struct EnrollmentService {
    pub dao: EnrollmentDao,
    pub seats: SeatDao,
}

impl EnrollmentService {
    pub fn new(db: &Database) -> Self {
        Self {
            dao: EnrollmentDao::new(db),
            seats: SeatDao::new(db),
        }
    }

    /// Enrolls the user into the next open batch of the course.
    ///
    /// A repeated request for a course the user is already in returns the
    /// existing enrollment. Each candidate batch is claimed with a seat
    /// reservation; losing the race for the last seat moves on to the next one.
    pub async fn enroll(
        &self,
        catalog: &Catalog,
        request: EnrollRequest,
    ) -> Result<EnrollOutcome, EnrollmentError> {
        let course = catalog
            .course(&request.course_id)
            .ok_or_else(|| EnrollmentError::CourseNotFound(request.course_id.clone()))?;

        if let Some(existing) = self
            .dao
            .find_for_user_course(request.user_id, &request.course_id)
            .await?
        {
            info!(
                user_id = %request.user_id,
                course_id = %request.course_id,
                batch = existing.batch_number,
                "Enrollment already exists, reusing it"
            );
            return Ok(EnrollOutcome {
                enrollment: existing,
                created: false,
            });
        }

        let counts = self.seats.counts_for_course(&course.id).await?;
        for batch in candidate_batches(course, &counts) {
            if !self
                .seats
                .try_reserve(&course.id, batch.batch_number, batch.max_capacity)
                .await?
            {
                continue;
            }

            let enrollment = request.clone().into_enrollment(batch.batch_number, None);
            return self.write_reserved(enrollment).await;
        }

        warn!(course_id = %course.id, user_id = %request.user_id, "No available batches");
        Err(EnrollmentError::NoAvailableBatches(course.id.clone()))
    }

    /// Admin enrollment into a named batch. Capacity is not enforced but the
    /// seat is still counted.
    pub async fn enroll_manually(
        &self,
        catalog: &Catalog,
        request: EnrollRequest,
        batch_number: u32,
        admin_id: ObjectId,
    ) -> Result<EnrollOutcome, EnrollmentError> {
        if catalog.course(&request.course_id).is_none() {
            return Err(EnrollmentError::CourseNotFound(request.course_id));
        }
        if catalog.batch(&request.course_id, batch_number).is_none() {
            return Err(EnrollmentError::BatchNotFound {
                course_id: request.course_id,
                batch_number,
            });
        }

        if self
            .dao
            .find_for_user_course(request.user_id, &request.course_id)
            .await?
            .is_some()
        {
            return Err(EnrollmentError::AlreadyEnrolled);
        }

        self.seats.force_reserve(&request.course_id, batch_number).await?;
        let enrollment = request.into_enrollment(batch_number, Some(admin_id));
        let outcome = self.write_reserved(enrollment).await?;
        if !outcome.created {
            return Err(EnrollmentError::AlreadyEnrolled);
        }
        info!(
            enrollment_id = %outcome.enrollment.id,
            %admin_id,
            "Manual enrollment created"
        );
        Ok(outcome)
    }

    /// Writes an enrollment whose seat is already taken. The seat goes back
    /// when the write fails, or when a concurrent request enrolled the same
    /// user in the course first; that request's enrollment is returned.
    async fn write_reserved(&self, enrollment: Enrollment) -> Result<EnrollOutcome, EnrollmentError> {
        match self.dao.upsert(&enrollment).await {
            Err(DaoError::DuplicateKey(_)) => {
                self.release_seat(&enrollment.course_id, enrollment.batch_number)
                    .await;
                let existing = self
                    .dao
                    .find_for_user_course(enrollment.user_id, &enrollment.course_id)
                    .await?
                    .ok_or(DaoError::NotFound)?;
                info!(
                    enrollment_id = %existing.id,
                    released_batch = enrollment.batch_number,
                    "Concurrent enrollment for the same course, reusing it"
                );
                Ok(EnrollOutcome {
                    enrollment: existing,
                    created: false,
                })
            }
            Ok(created) => {
                if !created {
                    self.release_seat(&enrollment.course_id, enrollment.batch_number)
                        .await;
                }
                info!(
                    enrollment_id = %enrollment.id,
                    course_id = %enrollment.course_id,
                    batch = enrollment.batch_number,
                    source = ?enrollment.enrollment_source,
                    created,
                    "Enrollment written"
                );
                Ok(EnrollOutcome {
                    enrollment,
                    created,
                })
            }
            Err(e) => {
                self.release_seat(&enrollment.course_id, enrollment.batch_number)
                    .await;
                Err(e.into())
            }
        }
    }

    async fn release_seat(&self, course_id: &str, batch_number: u32) {
        if let Err(e) = self.seats.release(course_id, batch_number).await {
            warn!(course_id, batch_number, error = %e, "Failed to release seat");
        }
    }

    pub async fn list_for_user(&self, user_id: ObjectId) -> Result<Vec<Enrollment>, EnrollmentError> {
        Ok(self.dao.list_for_user(user_id).await?)
    }

    pub async fn find_for_user_course(
        &self,
        user_id: ObjectId,
        course_id: &str,
    ) -> Result<Option<Enrollment>, EnrollmentError> {
        Ok(self.dao.find_for_user_course(user_id, course_id).await?)
    }

    pub async fn is_enrolled(&self, user_id: ObjectId, course_id: &str) -> Result<bool, EnrollmentError> {
        Ok(self.dao.exists_for_course(user_id, course_id).await?)
    }

    pub async fn list_filtered(
        &self,
        filter: &EnrollmentFilter,
        params: &PaginationParams,
    ) -> Result<PaginatedResult<Enrollment>, EnrollmentError> {
        Ok(self.dao.list_filtered(filter, params).await?)
    }

    /// Hard delete by an admin. Frees the seat the enrollment held.
    pub async fn delete(&self, id: &str) -> Result<Enrollment, EnrollmentError> {
        let removed = self.dao.delete(id).await?.ok_or(DaoError::NotFound)?;
        self.release_seat(&removed.course_id, removed.batch_number)
            .await;
        Ok(removed)
    }

    pub async fn seat_counts(&self, course_id: &str) -> Result<HashMap<u32, u32>, EnrollmentError> {
        Ok(self.seats.counts_for_course(course_id).await?)
    }

    /// Student progress update for their own enrollment in the course.
    pub async fn update_progress(
        &self,
        user_id: ObjectId,
        course_id: &str,
        progress: u32,
    ) -> Result<Enrollment, EnrollmentError> {
        let progress = check_progress(progress)?;
        let enrollment = self
            .dao
            .find_for_user_course(user_id, course_id)
            .await?
            .ok_or(EnrollmentError::NotEnrolled)?;
        Ok(self.dao.set_progress(&enrollment.id, progress).await?)
    }

    pub async fn override_progress(&self, id: &str, progress: u32) -> Result<Enrollment, EnrollmentError> {
        let progress = check_progress(progress)?;
        Ok(self.dao.set_progress(id, progress).await?)
    }

    pub async fn progress_overview(&self) -> Result<ProgressOverview, EnrollmentError> {
        Ok(self.dao.progress_overview().await?)
    }
}

fn check_progress(progress: u32) -> Result<u8, EnrollmentError> {
    u8::try_from(progress)
        .ok()
        .filter(|p| *p <= 100)
        .ok_or(EnrollmentError::InvalidProgress(progress))
}
