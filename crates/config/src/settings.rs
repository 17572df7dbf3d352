use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub app: AppSettings,
    pub database: DatabaseSettings,
    pub jwt: JwtSettings,
    pub admin: AdminSettings,
    pub features: FeatureFlags,
    pub paypal: PayPalSettings,
    pub email: EmailSettings,
    pub catalog: CatalogSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSettings {
    pub host: String,
    pub port: u16,
    pub public_url: String,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub name: String,
    pub max_pool_size: Option<u32>,
    pub min_pool_size: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub access_token_ttl_secs: u64,
    pub refresh_token_ttl_secs: u64,
    pub issuer: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AdminSettings {
    /// Accounts registered with one of these emails get the admin role.
    pub emails: Vec<String>,
}

impl AdminSettings {
    pub fn is_admin_email(&self, email: &str) -> bool {
        self.emails.iter().any(|e| e.eq_ignore_ascii_case(email))
    }
}

/// Feature switches read once at startup. A missing value means the
/// feature is off and the matching endpoints degrade instead of failing.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct FeatureFlags {
    #[serde(default)]
    pub progress_tracking: bool,
    #[serde(default)]
    pub coupons: bool,
    #[serde(default)]
    pub paypal: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PayPalSettings {
    pub client_id: String,
    pub client_secret: String,
    pub api_base: String,
    pub currency: String,
    /// Re-fetch every order from PayPal before trusting the client confirmation.
    pub verify_orders: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmailSettings {
    pub api_url: String,
    pub service_id: String,
    pub template_id: String,
    pub public_key: String,
    pub private_key: Option<String>,
    pub sender_name: String,
    pub outbox_retry_secs: u64,
    pub max_attempts: u32,
}

impl EmailSettings {
    pub fn is_configured(&self) -> bool {
        !self.service_id.is_empty() && !self.template_id.is_empty() && !self.public_key.is_empty()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogSettings {
    pub path: String,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::default()
                    .separator("__")
                    .prefix("COURSEHUB")
                    .list_separator(",")
                    .with_list_parse_key("admin.emails")
                    .with_list_parse_key("app.cors_origins")
                    .try_parsing(true),
            )
            .set_default("app.host", "0.0.0.0")?
            .set_default("app.port", 3000)?
            .set_default("app.public_url", "http://localhost:5173")?
            .set_default("app.cors_origins", Vec::<String>::new())?
            .set_default("database.url", "mongodb://localhost:27019")?
            .set_default("database.name", "coursehub")?
            .set_default("jwt.secret", "change-me-in-production")?
            .set_default("jwt.access_token_ttl_secs", 3600)?
            .set_default("jwt.refresh_token_ttl_secs", 604800)?
            .set_default("jwt.issuer", "coursehub")?
            .set_default("admin.emails", Vec::<String>::new())?
            .set_default("features.progress_tracking", false)?
            .set_default("features.coupons", false)?
            .set_default("features.paypal", false)?
            .set_default("paypal.client_id", "")?
            .set_default("paypal.client_secret", "")?
            .set_default("paypal.api_base", "https://api-m.sandbox.paypal.com")?
            .set_default("paypal.currency", "USD")?
            .set_default("paypal.verify_orders", false)?
            .set_default("email.api_url", "https://api.emailjs.com")?
            .set_default("email.service_id", "")?
            .set_default("email.template_id", "")?
            .set_default("email.public_key", "")?
            .set_default("email.private_key", None::<String>)?
            .set_default("email.sender_name", "Coursehub")?
            .set_default("email.outbox_retry_secs", 300)?
            .set_default("email.max_attempts", 5)?
            .set_default("catalog.path", "config/catalog.json")?
            .build()?;

        config.try_deserialize()
    }
}
