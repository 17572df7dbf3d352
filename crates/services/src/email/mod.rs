pub mod templates;
pub mod transport;

use std::{sync::Arc, time::Duration};

use bson::{DateTime, oid::ObjectId};
use coursehub_db::models::{Course, EmailKind, EmailOutbox, Enrollment, OutboxStatus};
use mongodb::Database;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::dao::email_outbox::EmailOutboxDao;

pub use templates::{CouponEmail, EnrollmentEmail, RenderedEmail, format_money};
pub use transport::{EmailJsTransport, EmailTransport, OutgoingEmail};

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Email delivery is not configured")]
    NotConfigured,
    #[error("Email transport error: {0}")]
    Transport(String),
    #[error("Email provider rejected the message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Result of the inline delivery attempt. Only `Sent` means the recipient
/// has the message; `Queued` entries are picked up by the retry loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum Delivery {
    Sent,
    Queued(String),
    Failed(String),
}

impl Delivery {
    /// Warning text for the caller's response, if the email did not go out.
    pub fn warning(&self) -> Option<String> {
        match self {
            Delivery::Sent => None,
            Delivery::Queued(reason) => Some(format!(
                "Confirmation email not sent yet ({reason}); it will be retried"
            )),
            Delivery::Failed(reason) => Some(format!("Confirmation email failed: {reason}")),
        }
    }
}

/// Writes every notification to the outbox before trying to deliver it, so
/// a send failure never undoes or blocks the action that triggered it.
pub struct NotificationDispatcher {
    outbox: EmailOutboxDao,
    transport: Arc<dyn EmailTransport>,
    max_attempts: u32,
}

impl NotificationDispatcher {
    pub fn new(db: &Database, transport: Arc<dyn EmailTransport>, max_attempts: u32) -> Self {
        Self {
            outbox: EmailOutboxDao::new(db),
            transport,
            max_attempts: max_attempts.max(1),
        }
    }

    pub async fn dispatch(
        &self,
        kind: EmailKind,
        to_email: &str,
        to_name: &str,
        rendered: RenderedEmail,
        related_id: Option<String>,
    ) -> Delivery {
        let now = DateTime::now();
        let entry = EmailOutbox {
            id: None,
            kind,
            to_email: to_email.to_string(),
            to_name: to_name.to_string(),
            subject: rendered.subject,
            html_body: rendered.html,
            text_body: rendered.text,
            related_id,
            status: OutboxStatus::Pending,
            attempts: 0,
            last_error: None,
            sent_at: None,
            created_at: now,
            updated_at: now,
        };
        let email = outgoing(&entry);

        let stored = match self.outbox.enqueue(&entry).await {
            Ok(stored) => stored.id,
            Err(e) => {
                error!(to = %to_email, ?kind, error = %e, "Failed to queue email, sending without outbox");
                None
            }
        };

        match self.transport.send(&email).await {
            Ok(()) => {
                if let Some(id) = stored {
                    self.mark_sent(id).await;
                }
                info!(to = %to_email, ?kind, "Email sent");
                Delivery::Sent
            }
            Err(EmailError::NotConfigured) if stored.is_some() => {
                // Left pending without spending an attempt.
                warn!(to = %to_email, ?kind, "Email not configured, message left in outbox");
                Delivery::Queued(EmailError::NotConfigured.to_string())
            }
            Err(e) => {
                warn!(to = %to_email, ?kind, error = %e, "Email delivery failed");
                match stored {
                    Some(id) => {
                        if let Err(db_err) = self.outbox.mark_failed(id, &e.to_string()).await {
                            warn!(%id, error = %db_err, "Failed to record email failure");
                        }
                        Delivery::Queued(e.to_string())
                    }
                    None => Delivery::Failed(e.to_string()),
                }
            }
        }
    }

    pub async fn enrollment_confirmation(
        &self,
        course: &Course,
        enrollment: &Enrollment,
        student_name: &str,
        dashboard_url: &str,
    ) -> Delivery {
        let batch = course.batch(enrollment.batch_number);
        let rendered = EnrollmentEmail {
            student_name,
            course_title: &course.title,
            batch_number: enrollment.batch_number,
            start_date: batch.and_then(|b| b.start_date),
            meeting_url: batch.and_then(|b| b.class_links.meeting_url.as_deref()),
            amount_paid_cents: enrollment.amount_paid_cents,
            currency: &course.currency,
            dashboard_url,
        }
        .render();

        self.dispatch(
            EmailKind::EnrollmentConfirmation,
            &enrollment.user_email,
            student_name,
            rendered,
            Some(enrollment.id.clone()),
        )
        .await
    }

    async fn mark_sent(&self, id: ObjectId) {
        if let Err(e) = self.outbox.mark_sent(id).await {
            warn!(%id, error = %e, "Failed to mark email as sent");
        }
    }

    /// One pass over the outbox. Returns how many entries were delivered.
    pub async fn retry_due(&self) -> usize {
        let due = match self.outbox.due(self.max_attempts, 50).await {
            Ok(due) => due,
            Err(e) => {
                error!(error = %e, "Failed to read email outbox");
                return 0;
            }
        };

        let mut sent = 0;
        for entry in due {
            let Some(id) = entry.id else { continue };
            match self.transport.send(&outgoing(&entry)).await {
                Ok(()) => {
                    self.mark_sent(id).await;
                    sent += 1;
                }
                Err(EmailError::NotConfigured) => {
                    // Nothing will succeed until the transport is configured.
                    break;
                }
                Err(e) => {
                    warn!(%id, attempts = entry.attempts + 1, error = %e, "Email retry failed");
                    if let Err(db_err) = self.outbox.mark_failed(id, &e.to_string()).await {
                        warn!(%id, error = %db_err, "Failed to record email failure");
                    }
                }
            }
        }
        sent
    }

    /// Retries outbox entries every `every` until the runtime shuts down.
    pub fn spawn_retry_loop(self: Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let sent = self.retry_due().await;
                if sent > 0 {
                    info!(sent, "Delivered queued emails");
                }
            }
        })
    }
}

fn outgoing(entry: &EmailOutbox) -> OutgoingEmail {
    OutgoingEmail {
        to_email: entry.to_email.clone(),
        to_name: entry.to_name.clone(),
        subject: entry.subject.clone(),
        html: entry.html_body.clone(),
        text: entry.text_body.clone(),
    }
}
