use std::collections::HashMap;

use bson::{DateTime, doc};
use coursehub_db::models::BatchSeats;
use mongodb::Database;
use tracing::debug;

use super::base::{BaseDao, DaoResult};

/// Per-batch seat counters. Reservation is a compare-and-swap on
/// `enrolled_count`, so two requests racing for the last seat cannot both win.
pub struct SeatDao {
    pub base: BaseDao<BatchSeats>,
}

impl SeatDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, BatchSeats::COLLECTION),
        }
    }

    /// Enrolled count per batch number for one course. Batches without a
    /// counter document have no seats taken.
    pub async fn counts_for_course(&self, course_id: &str) -> DaoResult<HashMap<u32, u32>> {
        let seats = self
            .base
            .find_many(doc! { "course_id": course_id }, None)
            .await?;
        Ok(seats
            .into_iter()
            .map(|s| (s.batch_number, s.enrolled_count))
            .collect())
    }

    async fn ensure(&self, course_id: &str, batch_number: u32) -> DaoResult<()> {
        let key = BatchSeats::key(course_id, batch_number);
        self.base
            .collection()
            .update_one(
                doc! { "_id": &key },
                doc! {
                    "$setOnInsert": {
                        "course_id": course_id,
                        "batch_number": batch_number as i64,
                        "enrolled_count": 0_i64,
                        "updated_at": DateTime::now(),
                    }
                },
            )
            .upsert(true)
            .await?;
        Ok(())
    }

    /// Takes one seat if fewer than `max_capacity` are taken. Returns false
    /// when the batch is full.
    pub async fn try_reserve(
        &self,
        course_id: &str,
        batch_number: u32,
        max_capacity: u32,
    ) -> DaoResult<bool> {
        self.ensure(course_id, batch_number).await?;

        let key = BatchSeats::key(course_id, batch_number);
        let reserved = self
            .base
            .find_one_and_update(
                doc! { "_id": &key, "enrolled_count": { "$lt": max_capacity as i64 } },
                doc! { "$inc": { "enrolled_count": 1 } },
                false,
            )
            .await?;

        debug!(course_id, batch_number, reserved = reserved.is_some(), "Seat reservation");
        Ok(reserved.is_some())
    }

    /// Takes a seat regardless of capacity (admin override).
    pub async fn force_reserve(&self, course_id: &str, batch_number: u32) -> DaoResult<()> {
        self.ensure(course_id, batch_number).await?;
        self.base
            .update_by_id(
                BatchSeats::key(course_id, batch_number),
                doc! { "$inc": { "enrolled_count": 1 } },
            )
            .await?;
        Ok(())
    }

    pub async fn release(&self, course_id: &str, batch_number: u32) -> DaoResult<()> {
        self.base
            .update_one(
                doc! {
                    "_id": BatchSeats::key(course_id, batch_number),
                    "enrolled_count": { "$gt": 0 },
                },
                doc! { "$inc": { "enrolled_count": -1 } },
            )
            .await?;
        Ok(())
    }
}
