use bson::{DateTime, doc};
use coursehub_db::models::{User, UserRole};
use mongodb::Database;

use super::base::{BaseDao, DaoError, DaoResult};

pub struct UserDao {
    pub base: BaseDao<User>,
}

impl UserDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, User::COLLECTION),
        }
    }

    pub async fn create(
        &self,
        email: String,
        display_name: String,
        password_hash: String,
        role: UserRole,
    ) -> DaoResult<User> {
        let now = DateTime::now();
        let user = User {
            id: None,
            email: email.trim().to_lowercase(),
            display_name,
            password_hash: Some(password_hash),
            role,
            created_at: now,
            updated_at: now,
        };

        let id = self.base.insert_one(&user).await?;
        self.base.find_by_id(id).await
    }

    pub async fn find_by_email(&self, email: &str) -> DaoResult<User> {
        self.base
            .find_one(doc! { "email": email.trim().to_lowercase() })
            .await?
            .ok_or(DaoError::NotFound)
    }

    pub async fn update_display_name(
        &self,
        user_id: bson::oid::ObjectId,
        display_name: String,
    ) -> DaoResult<bool> {
        self.base
            .update_by_id(user_id, doc! { "$set": { "display_name": display_name } })
            .await
    }
}
