use std::time::Duration;

use coursehub_api::{build_router, state::AppState};
use coursehub_config::Settings;
use coursehub_db::{connect, indexes::ensure_indexes};
use coursehub_services::Catalog;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (silently ignore if missing)
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "coursehub_api=debug,coursehub_services=debug,coursehub_db=debug,tower_http=debug"
                .into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::load()?;
    info!("Starting Coursehub API on {}:{}", settings.app.host, settings.app.port);
    info!(
        progress_tracking = settings.features.progress_tracking,
        coupons = settings.features.coupons,
        paypal = settings.features.paypal,
        email = settings.email.is_configured(),
        "Feature flags"
    );

    let catalog = Catalog::load(&settings.catalog.path)?;

    let db = connect(&settings.database).await?;
    ensure_indexes(&db).await?;

    let app_state = AppState::new(db, settings.clone(), catalog);

    // Re-sends queued emails whose first attempt failed.
    app_state
        .notifier
        .clone()
        .spawn_retry_loop(Duration::from_secs(settings.email.outbox_retry_secs));

    let app = build_router(app_state);

    let addr = format!("{}:{}", settings.app.host, settings.app.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
