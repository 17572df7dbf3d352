use bson::{DateTime, doc, oid::ObjectId};
use coursehub_db::models::{EmailOutbox, OutboxStatus};
use mongodb::Database;

use super::base::{BaseDao, DaoResult};

const PENDING_GRACE_MS: i64 = 60_000;

pub struct EmailOutboxDao {
    pub base: BaseDao<EmailOutbox>,
}

impl EmailOutboxDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, EmailOutbox::COLLECTION),
        }
    }

    pub async fn enqueue(&self, email: &EmailOutbox) -> DaoResult<EmailOutbox> {
        let id = self.base.insert_one(email).await?;
        self.base.find_by_id(id).await
    }

    /// Entries still owed a delivery attempt, oldest first. A pending entry
    /// is only due once its inline attempt had time to finish.
    pub async fn due(&self, max_attempts: u32, limit: i64) -> DaoResult<Vec<EmailOutbox>> {
        use futures::TryStreamExt;

        let stale = DateTime::from_millis(DateTime::now().timestamp_millis() - PENDING_GRACE_MS);
        let cursor = self
            .base
            .collection()
            .find(doc! {
                "attempts": { "$lt": max_attempts as i64 },
                "$or": [
                    { "status": "failed" },
                    { "status": "pending", "created_at": { "$lt": stale } },
                ],
            })
            .sort(doc! { "created_at": 1 })
            .limit(limit)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    pub async fn mark_sent(&self, id: ObjectId) -> DaoResult<bool> {
        self.base
            .update_by_id(
                id,
                doc! {
                    "$set": {
                        "status": bson::to_bson(&OutboxStatus::Sent)?,
                        "sent_at": DateTime::now(),
                        "last_error": bson::Bson::Null,
                    },
                    "$inc": { "attempts": 1 },
                },
            )
            .await
    }

    pub async fn mark_failed(&self, id: ObjectId, error: &str) -> DaoResult<bool> {
        self.base
            .update_by_id(
                id,
                doc! {
                    "$set": {
                        "status": bson::to_bson(&OutboxStatus::Failed)?,
                        "last_error": error,
                    },
                    "$inc": { "attempts": 1 },
                },
            )
            .await
    }
}
