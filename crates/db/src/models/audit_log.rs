use bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

/// Record of an admin action against enrollments, payments or coupons.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub actor_id: ObjectId,
    pub action: String,
    pub target_type: String,
    pub target_id: String,
    #[serde(default)]
    pub changes: Vec<AuditChange>,
    pub reason: Option<String>,
    pub created_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditChange {
    pub field: String,
    pub old_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
}

impl AuditChange {
    pub fn new(
        field: &str,
        old_value: impl Serialize,
        new_value: impl Serialize,
    ) -> Self {
        Self {
            field: field.to_string(),
            old_value: serde_json::to_value(old_value).ok(),
            new_value: serde_json::to_value(new_value).ok(),
        }
    }
}

impl AuditLog {
    pub const COLLECTION: &'static str = "audit_logs";
}
