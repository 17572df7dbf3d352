use mongodb::{Database, IndexModel, options::IndexOptions};
use tracing::info;

use crate::models::{
    AuditLog, Coupon, EmailOutbox, Enrollment, ManualPayment, Payment, Review, User,
};

pub async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    create_indexes(
        db,
        User::COLLECTION,
        vec![index_unique(bson::doc! { "email": 1 })],
    )
    .await?;

    // One enrollment per user and course, whichever batch it landed in. The
    // others serve the per-batch and admin listing queries.
    create_indexes(
        db,
        Enrollment::COLLECTION,
        vec![
            index_unique(bson::doc! { "user_id": 1, "course_id": 1 }),
            index(bson::doc! { "course_id": 1, "batch_number": 1, "status": 1 }),
            index(bson::doc! { "enrollment_source": 1, "enrolled_at": -1 }),
        ],
    )
    .await?;

    create_indexes(
        db,
        Payment::COLLECTION,
        vec![
            index_unique(bson::doc! { "order_id": 1 }),
            index(bson::doc! { "user_id": 1, "course_id": 1 }),
            index(bson::doc! { "status": 1, "created_at": -1 }),
        ],
    )
    .await?;

    create_indexes(
        db,
        Coupon::COLLECTION,
        vec![
            index_unique(bson::doc! { "code": 1 }),
            index(bson::doc! { "status": 1, "created_at": -1 }),
        ],
    )
    .await?;

    create_indexes(
        db,
        ManualPayment::COLLECTION,
        vec![
            index(bson::doc! { "status": 1, "created_at": -1 }),
            index(bson::doc! { "user_id": 1, "created_at": -1 }),
        ],
    )
    .await?;

    create_indexes(
        db,
        Review::COLLECTION,
        vec![index(bson::doc! { "course_id": 1, "created_at": -1 })],
    )
    .await?;

    create_indexes(
        db,
        EmailOutbox::COLLECTION,
        vec![index(bson::doc! { "status": 1, "attempts": 1, "created_at": 1 })],
    )
    .await?;

    create_indexes(
        db,
        AuditLog::COLLECTION,
        vec![
            index(bson::doc! { "target_type": 1, "target_id": 1, "created_at": -1 }),
            index(bson::doc! { "actor_id": 1, "created_at": -1 }),
        ],
    )
    .await?;

    info!("All indexes ensured");
    Ok(())
}

fn index(keys: bson::Document) -> IndexModel {
    IndexModel::builder().keys(keys).build()
}

fn index_unique(keys: bson::Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).build())
        .build()
}

async fn create_indexes(
    db: &Database,
    collection: &str,
    indexes: Vec<IndexModel>,
) -> Result<(), mongodb::error::Error> {
    db.collection::<bson::Document>(collection)
        .create_indexes(indexes)
        .await?;
    info!(collection, "Indexes created");
    Ok(())
}
