use bson::doc;
use coursehub_db::models::Review;
use mongodb::Database;
use serde::{Deserialize, Serialize};

use super::base::{BaseDao, DaoResult};

pub struct ReviewDao {
    pub base: BaseDao<Review>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingSummary {
    pub count: u64,
    pub average: f64,
}

impl ReviewDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, Review::COLLECTION),
        }
    }

    /// Creates or replaces the user's review for the course.
    pub async fn upsert(&self, review: &Review) -> DaoResult<Review> {
        self.base.upsert_by_id(review.id.as_str(), review).await?;
        self.base.find_by_id(review.id.as_str()).await
    }

    pub async fn list_for_course(&self, course_id: &str) -> DaoResult<Vec<Review>> {
        self.base
            .find_many(doc! { "course_id": course_id }, Some(doc! { "created_at": -1 }))
            .await
    }

    pub async fn summary(&self, course_id: &str) -> DaoResult<RatingSummary> {
        let rows = self
            .base
            .aggregate(vec![
                doc! { "$match": { "course_id": course_id } },
                doc! { "$group": {
                    "_id": null,
                    "count": { "$sum": 1 },
                    "average": { "$avg": "$rating" },
                }},
            ])
            .await?;

        Ok(rows
            .first()
            .map(|d| RatingSummary {
                count: d.get_i32("count").map(|c| c as u64).unwrap_or(0),
                average: d.get_f64("average").unwrap_or(0.0),
            })
            .unwrap_or(RatingSummary {
                count: 0,
                average: 0.0,
            }))
    }
}
