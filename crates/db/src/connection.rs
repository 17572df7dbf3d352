use coursehub_config::DatabaseSettings;
use mongodb::{Client, Database, options::ClientOptions};
use tracing::info;

/// Builds a client for the configured deployment without touching the network.
///
/// The driver connects lazily, so the returned handle is usable even when the
/// server is not up yet; the first operation surfaces any connection error.
pub async fn open(settings: &DatabaseSettings) -> Result<Database, mongodb::error::Error> {
    let mut client_options = ClientOptions::parse(&settings.url).await?;
    client_options.app_name = Some("coursehub".to_string());
    client_options.max_pool_size = settings.max_pool_size;
    client_options.min_pool_size = settings.min_pool_size;

    let client = Client::with_options(client_options)?;
    Ok(client.database(&settings.name))
}

/// Opens the database and pings it so startup fails fast on a bad URL.
pub async fn connect(settings: &DatabaseSettings) -> Result<Database, mongodb::error::Error> {
    let db = open(settings).await?;

    db.client()
        .database("admin")
        .run_command(bson::doc! { "ping": 1 })
        .await?;

    info!(db = %settings.name, "Connected to MongoDB");
    Ok(db)
}
