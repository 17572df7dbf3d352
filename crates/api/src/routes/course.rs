use axum::{
    Json,
    extract::{Path, State},
};
use chrono::NaiveDate;
use coursehub_db::models::{Batch, BatchStatus, Course, Review, ScheduledSession};
use coursehub_services::{
    enrollment::{BatchAvailability, batch_availability},
    review::{CourseReviews, ReviewInput},
};
use serde::Serialize;

use crate::{error::ApiError, extractors::auth::AuthUser, routes::current_user, state::AppState};

#[derive(Debug, Serialize)]
pub struct CourseSummary {
    pub id: String,
    pub title: String,
    pub description: String,
    pub price_cents: i64,
    pub currency: String,
    pub instructor: Option<String>,
    pub thumbnail: Option<String>,
    pub level: Option<String>,
    pub batch_count: usize,
}

/// Public view of a batch. Class links and recordings are only handed out
/// to enrolled students.
#[derive(Debug, Serialize)]
pub struct PublicBatch {
    pub batch_number: u32,
    pub status: BatchStatus,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub max_capacity: u32,
    pub schedule: Vec<ScheduledSession>,
}

#[derive(Debug, Serialize)]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: CourseSummary,
    pub batches: Vec<PublicBatch>,
    pub availability: Vec<BatchAvailability>,
}

fn summary(course: &Course) -> CourseSummary {
    CourseSummary {
        id: course.id.clone(),
        title: course.title.clone(),
        description: course.description.clone(),
        price_cents: course.price_cents,
        currency: course.currency.clone(),
        instructor: course.instructor.clone(),
        thumbnail: course.thumbnail.clone(),
        level: course.level.clone(),
        batch_count: course.batches.len(),
    }
}

fn public_batch(batch: &Batch) -> PublicBatch {
    PublicBatch {
        batch_number: batch.batch_number,
        status: batch.status,
        start_date: batch.start_date,
        end_date: batch.end_date,
        max_capacity: batch.max_capacity,
        schedule: batch.schedule.clone(),
    }
}

fn find_course<'a>(state: &'a AppState, course_id: &str) -> Result<&'a Course, ApiError> {
    state
        .catalog
        .course(course_id)
        .ok_or_else(|| ApiError::NotFound(format!("Course not found: {course_id}")))
}

pub async fn list(State(state): State<AppState>) -> Json<Vec<CourseSummary>> {
    Json(state.catalog.courses().iter().map(summary).collect())
}

pub async fn get(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
) -> Result<Json<CourseDetail>, ApiError> {
    let course = find_course(&state, &course_id)?;
    let counts = state.enrollments.seat_counts(&course.id).await?;

    Ok(Json(CourseDetail {
        course: summary(course),
        batches: course.batches.iter().map(public_batch).collect(),
        availability: batch_availability(course, &counts),
    }))
}

pub async fn batches(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
) -> Result<Json<Vec<BatchAvailability>>, ApiError> {
    let course = find_course(&state, &course_id)?;
    let counts = state.enrollments.seat_counts(&course.id).await?;
    Ok(Json(batch_availability(course, &counts)))
}

pub async fn reviews(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
) -> Result<Json<CourseReviews>, ApiError> {
    Ok(Json(state.reviews.for_course(&course_id).await?))
}

pub async fn submit_review(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(course_id): Path<String>,
    Json(body): Json<ReviewInput>,
) -> Result<Json<Review>, ApiError> {
    let user = current_user(&state, &auth).await?;
    let review = state
        .reviews
        .submit(auth.user_id, &user.display_name, &course_id, body)
        .await?;
    Ok(Json(review))
}
