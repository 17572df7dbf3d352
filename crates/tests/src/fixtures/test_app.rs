use async_trait::async_trait;
use coursehub_api::{build_router, state::AppState};
use coursehub_config::Settings;
use coursehub_db::indexes::ensure_indexes;
use coursehub_services::{
    Catalog,
    email::{EmailError, EmailTransport, OutgoingEmail},
};
use mongodb::{Client, Database, options::ClientOptions};
use std::{
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};
use tokio::net::TcpListener;

pub const ADMIN_EMAIL: &str = "admin@coursehub.test";

/// Two courses: `rust-101` at 49.00 with a one-seat first batch, and
/// `async-201` at 99.00 with a single ten-seat batch.
pub const CATALOG: &str = r#"{
    "courses": [
        {
            "id": "rust-101",
            "title": "Rust from Scratch",
            "price_cents": 4900,
            "currency": "USD",
            "batches": [
                {
                    "batch_number": 1,
                    "start_date": "2026-01-10",
                    "max_capacity": 1,
                    "class_links": { "meeting_url": "https://meet.example.com/rust-1" }
                },
                {
                    "batch_number": 2,
                    "start_date": "2026-03-10",
                    "max_capacity": 20,
                    "class_links": { "meeting_url": "https://meet.example.com/rust-2" }
                }
            ]
        },
        {
            "id": "async-201",
            "title": "Async Rust in Practice",
            "price_cents": 9900,
            "currency": "USD",
            "batches": [
                { "batch_number": 1, "start_date": "2026-02-01", "max_capacity": 10 }
            ]
        }
    ]
}"#;

/// Captures outgoing mail instead of calling the email provider.
#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<OutgoingEmail>>,
    pub failing: AtomicBool,
}

impl RecordingTransport {
    pub fn sent_to(&self, email: &str) -> Vec<OutgoingEmail> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.to_email == email)
            .cloned()
            .collect()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl EmailTransport for RecordingTransport {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), EmailError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(EmailError::Rejected {
                status: 503,
                body: "provider unavailable".to_string(),
            });
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

/// A running test application with its own MongoDB database.
pub struct TestApp {
    pub addr: SocketAddr,
    pub base_url: String,
    pub db: Database,
    pub settings: Settings,
    pub state: AppState,
    pub mail: Arc<RecordingTransport>,
    pub client: reqwest::Client,
}

impl TestApp {
    /// Spawn a test server with every feature switched on.
    ///
    /// Requires a running MongoDB at localhost:27019.
    /// Set COURSEHUB__DATABASE__URL to override the connection string.
    /// Each test gets a unique database name for isolation.
    pub async fn spawn() -> Self {
        Self::spawn_with_settings(|_| {}).await
    }

    /// Spawn a test server with customized settings.
    ///
    /// The `mutator` closure receives a `&mut Settings` after the test
    /// defaults are applied.
    pub async fn spawn_with_settings(mutator: impl FnOnce(&mut Settings)) -> Self {
        let db_name = format!("coursehub_test_{}", uuid::Uuid::new_v4().simple());

        let mut settings = Settings::load().expect("Failed to load settings");
        settings.database.name = db_name.clone();
        settings.jwt.secret = "test-secret-key-for-jwt-signing-minimum-32-chars".to_string();
        settings.admin.emails = vec![ADMIN_EMAIL.to_string()];
        settings.features.coupons = true;
        settings.features.paypal = true;
        settings.features.progress_tracking = true;
        settings.paypal.verify_orders = false;
        settings.paypal.currency = "USD".to_string();
        settings.email.max_attempts = 3;

        mutator(&mut settings);

        let client_options = ClientOptions::parse(&settings.database.url)
            .await
            .expect("Failed to parse MongoDB URL");
        let mongo_client =
            Client::with_options(client_options).expect("Failed to create MongoDB client");
        let db = mongo_client.database(&db_name);

        ensure_indexes(&db).await.expect("Failed to create indexes");

        let catalog = Catalog::from_json(CATALOG).expect("Invalid test catalog");
        let mail = Arc::new(RecordingTransport::default());
        let transport: Arc<dyn EmailTransport> = mail.clone();
        let state = AppState::with_transport(db.clone(), settings.clone(), catalog, transport);
        let app = build_router(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let base_url = format!("http://{}", addr);
        let client = reqwest::Client::builder()
            .build()
            .expect("Failed to build HTTP client");

        Self {
            addr,
            base_url,
            db,
            settings,
            state,
            mail,
            client,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let db = self.db.clone();
        // Best effort cleanup: drop the test database
        tokio::spawn(async move {
            let _ = db.drop().await;
        });
    }
}
