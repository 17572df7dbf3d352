use async_trait::async_trait;
use coursehub_config::EmailSettings;
use serde_json::json;
use tracing::debug;

use super::EmailError;

#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to_email: String,
    pub to_name: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), EmailError>;
}

/// Sends through the EmailJS REST API using a single generic template whose
/// parameters carry the already rendered subject and bodies.
pub struct EmailJsTransport {
    settings: EmailSettings,
    client: reqwest::Client,
}

impl EmailJsTransport {
    pub fn new(settings: &EmailSettings) -> Self {
        Self {
            settings: settings.clone(),
            client: reqwest::Client::new(),
        }
    }

    fn payload(&self, email: &OutgoingEmail) -> serde_json::Value {
        let mut body = json!({
            "service_id": self.settings.service_id,
            "template_id": self.settings.template_id,
            "user_id": self.settings.public_key,
            "template_params": {
                "to_email": email.to_email,
                "to_name": email.to_name,
                "from_name": self.settings.sender_name,
                "subject": email.subject,
                "message_html": email.html,
                "message": email.text,
            },
        });
        if let Some(ref private_key) = self.settings.private_key {
            body["accessToken"] = json!(private_key);
        }
        body
    }
}

#[async_trait]
impl EmailTransport for EmailJsTransport {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), EmailError> {
        if !self.settings.is_configured() {
            return Err(EmailError::NotConfigured);
        }

        let resp = self
            .client
            .post(format!("{}/api/v1.0/email/send", self.settings.api_url))
            .json(&self.payload(email))
            .send()
            .await
            .map_err(|e| EmailError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(EmailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(to = %email.to_email, subject = %email.subject, "Email sent via EmailJS");
        Ok(())
    }
}
