use bson::{Document, doc, oid::ObjectId};
use coursehub_db::models::{Enrollment, Payment, PaymentStatus};
use mongodb::Database;

use super::base::{BaseDao, DaoError, DaoResult, PaginatedResult, PaginationParams};

pub struct PaymentDao {
    pub base: BaseDao<Payment>,
}

impl PaymentDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, Payment::COLLECTION),
        }
    }

    pub async fn insert(&self, payment: &Payment) -> DaoResult<Payment> {
        let id = self.base.insert_one(payment).await?;
        self.base.find_by_id(id).await
    }

    pub async fn find_by_order_id(&self, order_id: &str) -> DaoResult<Option<Payment>> {
        self.base.find_one(doc! { "order_id": order_id }).await
    }

    pub async fn list(
        &self,
        status: Option<PaymentStatus>,
        course_id: Option<&str>,
        params: &PaginationParams,
    ) -> DaoResult<PaginatedResult<Payment>> {
        let mut filter = Document::new();
        if let Some(status) = status {
            filter.insert("status", bson::to_bson(&status)?);
        }
        if let Some(course_id) = course_id {
            filter.insert("course_id", course_id);
        }
        self.base.find_paginated(filter, None, params).await
    }

    pub async fn set_status(
        &self,
        id: ObjectId,
        status: PaymentStatus,
        note: Option<String>,
    ) -> DaoResult<Payment> {
        let mut update = doc! { "$set": { "status": bson::to_bson(&status)? } };
        if let Some(note) = note {
            update.insert("$push", doc! { "notes": note });
        }
        if !self.base.update_by_id(id, update).await? {
            return Err(DaoError::NotFound);
        }
        self.base.find_by_id(id).await
    }

    /// Completed payments with no enrollment for the same user and course:
    /// captures whose enrollment step failed and need manual follow-up.
    pub async fn find_orphaned(&self) -> DaoResult<Vec<Payment>> {
        let docs = self
            .base
            .aggregate(vec![
                doc! { "$match": { "status": { "$in": ["completed", "needs_review"] } } },
                doc! { "$lookup": {
                    "from": Enrollment::COLLECTION,
                    "let": { "uid": "$user_id", "cid": "$course_id" },
                    "pipeline": [
                        { "$match": { "$expr": { "$and": [
                            { "$eq": ["$user_id", "$$uid"] },
                            { "$eq": ["$course_id", "$$cid"] },
                        ]}}},
                        { "$limit": 1 },
                    ],
                    "as": "enrollments",
                }},
                doc! { "$match": { "enrollments": { "$size": 0 } } },
                doc! { "$project": { "enrollments": 0 } },
                doc! { "$sort": { "created_at": -1 } },
            ])
            .await?;

        docs.into_iter()
            .map(|d| bson::from_document(d).map_err(DaoError::from))
            .collect()
    }
}
