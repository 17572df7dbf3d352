use bson::{Document, doc, oid::ObjectId};
use coursehub_db::models::{ManualPayment, ManualPaymentStatus, StatusChange};
use mongodb::Database;

use super::base::{BaseDao, DaoResult, PaginatedResult, PaginationParams};

pub struct ManualPaymentDao {
    pub base: BaseDao<ManualPayment>,
}

impl ManualPaymentDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, ManualPayment::COLLECTION),
        }
    }

    pub async fn insert(&self, claim: &ManualPayment) -> DaoResult<ManualPayment> {
        let id = self.base.insert_one(claim).await?;
        self.base.find_by_id(id).await
    }

    pub async fn list_by_status(
        &self,
        status: Option<ManualPaymentStatus>,
        params: &PaginationParams,
    ) -> DaoResult<PaginatedResult<ManualPayment>> {
        let mut filter = Document::new();
        if let Some(status) = status {
            filter.insert("status", bson::to_bson(&status)?);
        }
        self.base.find_paginated(filter, None, params).await
    }

    pub async fn list_for_user(&self, user_id: ObjectId) -> DaoResult<Vec<ManualPayment>> {
        self.base
            .find_many(doc! { "user_id": user_id }, Some(doc! { "created_at": -1 }))
            .await
    }

    /// Moves the claim from `change.from` to `change.to`. The status in the
    /// filter makes a concurrent second decision on the same claim a no-op.
    pub async fn transition(
        &self,
        id: ObjectId,
        change: &StatusChange,
        extra: Document,
    ) -> DaoResult<Option<ManualPayment>> {
        let mut set = doc! {
            "status": bson::to_bson(&change.to)?,
            "reviewed_by": change.admin_id,
            "reviewed_at": change.at,
        };
        for (key, value) in extra {
            set.insert(key, value);
        }

        self.base
            .find_one_and_update(
                doc! { "_id": id, "status": bson::to_bson(&change.from)? },
                doc! {
                    "$set": set,
                    "$push": { "history": bson::to_bson(change)? },
                },
                false,
            )
            .await
    }
}
