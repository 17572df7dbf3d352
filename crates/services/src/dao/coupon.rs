use bson::{Document, doc, oid::ObjectId};
use coursehub_db::models::{Coupon, CouponStatus, CouponUsage};
use mongodb::Database;

use super::base::{BaseDao, DaoError, DaoResult, PaginatedResult, PaginationParams};

pub struct CouponDao {
    pub base: BaseDao<Coupon>,
}

impl CouponDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, Coupon::COLLECTION),
        }
    }

    pub async fn insert(&self, coupon: &Coupon) -> DaoResult<Coupon> {
        let id = self.base.insert_one(coupon).await?;
        self.base.find_by_id(id).await
    }

    pub async fn find_by_code(&self, code: &str) -> DaoResult<Option<Coupon>> {
        self.base
            .find_one(doc! { "code": Coupon::normalize_code(code) })
            .await
    }

    pub async fn list(
        &self,
        status: Option<CouponStatus>,
        params: &PaginationParams,
    ) -> DaoResult<PaginatedResult<Coupon>> {
        let mut filter = Document::new();
        if let Some(status) = status {
            filter.insert("status", bson::to_bson(&status)?);
        }
        self.base.find_paginated(filter, None, params).await
    }

    pub async fn set_status(&self, id: ObjectId, status: CouponStatus) -> DaoResult<Coupon> {
        let matched = self
            .base
            .update_by_id(id, doc! { "$set": { "status": bson::to_bson(&status)? } })
            .await?;
        if !matched {
            return Err(DaoError::NotFound);
        }
        self.base.find_by_id(id).await
    }

    /// Deletes a coupon only if it has never been redeemed.
    pub async fn delete_unused(&self, id: ObjectId) -> DaoResult<bool> {
        let deleted = self
            .base
            .hard_delete(doc! {
                "_id": id,
                "usage_count": 0,
                "usage_history": { "$size": 0 },
            })
            .await?;
        Ok(deleted > 0)
    }

    /// Records one redemption in a single conditional update. The filter
    /// re-checks status, the global limit and the per-user limit against the
    /// stored document, so concurrent redemptions cannot exceed either limit.
    /// Returns `None` when the coupon can no longer be redeemed by this user.
    pub async fn redeem(&self, id: ObjectId, usage: &CouponUsage) -> DaoResult<Option<Coupon>> {
        let user_uses = doc! {
            "$size": {
                "$filter": {
                    "input": { "$ifNull": ["$usage_history", []] },
                    "as": "u",
                    "cond": { "$eq": ["$$u.user_id", usage.user_id] },
                }
            }
        };

        let filter = doc! {
            "_id": id,
            "status": "active",
            "$expr": {
                "$and": [
                    { "$or": [
                        { "$eq": [{ "$ifNull": ["$usage_limit", null] }, null] },
                        { "$lt": ["$usage_count", "$usage_limit"] },
                    ]},
                    { "$or": [
                        { "$eq": [{ "$ifNull": ["$usage_limit_per_user", null] }, null] },
                        { "$lt": [user_uses, "$usage_limit_per_user"] },
                    ]},
                ]
            }
        };

        let update = doc! {
            "$inc": { "usage_count": 1 },
            "$push": { "usage_history": bson::to_bson(usage)? },
        };

        self.base.find_one_and_update(filter, update, false).await
    }
}
