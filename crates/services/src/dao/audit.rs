use bson::{DateTime, oid::ObjectId};
use coursehub_db::models::{AuditChange, AuditLog};
use mongodb::Database;
use tracing::{info, warn};

use super::base::BaseDao;

pub struct AuditDao {
    pub base: BaseDao<AuditLog>,
}

impl AuditDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, AuditLog::COLLECTION),
        }
    }

    /// Records an admin action. A failed audit write is logged and does not
    /// undo the action it describes.
    pub async fn record(
        &self,
        actor_id: ObjectId,
        action: &str,
        target_type: &str,
        target_id: &str,
        changes: Vec<AuditChange>,
        reason: Option<String>,
    ) {
        let entry = AuditLog {
            id: None,
            actor_id,
            action: action.to_string(),
            target_type: target_type.to_string(),
            target_id: target_id.to_string(),
            changes,
            reason,
            created_at: DateTime::now(),
        };

        match self.base.insert_one(&entry).await {
            Ok(_) => info!(%actor_id, action, target_type, target_id, "Admin action"),
            Err(e) => warn!(%actor_id, action, target_id, error = %e, "Failed to write audit log"),
        }
    }
}
