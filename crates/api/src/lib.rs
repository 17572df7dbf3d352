pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;

use axum::{
    Router,
    http::HeaderValue,
    routing::{delete, get, post, put},
};
use state::AppState;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let allow_origin = if allowed.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(allowed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.settings.app.cors_origins);

    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/logout", post(routes::auth::logout))
        .route("/refresh", post(routes::auth::refresh))
        .route("/me", get(routes::auth::me).put(routes::auth::update_me));

    // Catalog browsing is public; only review submission needs a login.
    let course_routes = Router::new()
        .route("/", get(routes::course::list))
        .route("/{course_id}", get(routes::course::get))
        .route("/{course_id}/batch", get(routes::course::batches))
        .route(
            "/{course_id}/review",
            get(routes::course::reviews).post(routes::course::submit_review),
        );

    let coupon_routes = Router::new().route("/validate", post(routes::coupon::validate));

    let checkout_routes = Router::new()
        .route("/paypal", post(routes::checkout::paypal))
        .route("/free", post(routes::checkout::free));

    let enrollment_routes = Router::new()
        .route("/", get(routes::enrollment::mine))
        .route("/{course_id}", get(routes::enrollment::for_course))
        .route(
            "/{course_id}/progress",
            put(routes::enrollment::update_progress),
        );

    let manual_payment_routes = Router::new()
        .route(
            "/",
            get(routes::manual_payment::mine).post(routes::manual_payment::submit),
        );

    let admin_coupon_routes = Router::new()
        .route(
            "/",
            get(routes::admin::list_coupons).post(routes::admin::create_coupon),
        )
        .route(
            "/{coupon_id}",
            get(routes::admin::get_coupon).delete(routes::admin::delete_coupon),
        )
        .route("/{coupon_id}/activate", post(routes::admin::activate_coupon))
        .route(
            "/{coupon_id}/deactivate",
            post(routes::admin::deactivate_coupon),
        )
        .route("/{coupon_id}/email", post(routes::admin::email_coupon));

    let admin_enrollment_routes = Router::new()
        .route(
            "/",
            get(routes::admin::list_enrollments).post(routes::admin::create_enrollment),
        )
        .route("/{enrollment_id}", delete(routes::admin::delete_enrollment))
        .route(
            "/{enrollment_id}/progress",
            put(routes::admin::override_progress),
        );

    let admin_payment_routes = Router::new()
        .route("/", get(routes::admin::list_payments))
        .route("/orphaned", get(routes::admin::orphaned_payments))
        .route(
            "/{payment_id}/status",
            put(routes::admin::update_payment_status),
        );

    let admin_manual_payment_routes = Router::new()
        .route("/", get(routes::admin::list_manual_payments))
        .route(
            "/{manual_payment_id}/verify",
            post(routes::admin::verify_manual_payment),
        )
        .route(
            "/{manual_payment_id}/archive",
            post(routes::admin::archive_manual_payment),
        )
        .route(
            "/{manual_payment_id}/reject",
            post(routes::admin::reject_manual_payment),
        )
        .route(
            "/{manual_payment_id}/restore",
            post(routes::admin::restore_manual_payment),
        );

    let admin_routes = Router::new()
        .nest("/coupon", admin_coupon_routes)
        .nest("/enrollment", admin_enrollment_routes)
        .nest("/payment", admin_payment_routes)
        .nest("/manual-payment", admin_manual_payment_routes)
        .route("/progress", get(routes::admin::progress_overview));

    let api = Router::new()
        .nest("/auth", auth_routes)
        .nest("/course", course_routes)
        .nest("/coupon", coupon_routes)
        .nest("/checkout", checkout_routes)
        .nest("/enrollment", enrollment_routes)
        .nest("/manual-payment", manual_payment_routes)
        .nest("/admin", admin_routes);

    let health = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api)
        .merge(health)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
