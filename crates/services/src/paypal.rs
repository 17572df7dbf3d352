use coursehub_config::PayPalSettings;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ---- DTO types -----------------------------------------------------------

/// What the checkout widget hands back after the buyer approved and the
/// order was captured client-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    pub order_id: String,
    /// Capture id.
    pub payment_id: Option<String>,
    pub payer_email: Option<String>,
    pub payer_name: Option<String>,
    /// Decimal string as PayPal reports it, e.g. `"49.99"`.
    pub amount: String,
    pub currency: Option<String>,
}

/// A capture we are willing to record as a payment.
#[derive(Debug, Clone, Serialize)]
pub struct CapturedOrder {
    pub order_id: String,
    pub capture_id: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
    pub payer_email: Option<String>,
    pub payer_name: Option<String>,
    /// True when the order was re-fetched from PayPal.
    pub verified: bool,
}

// ---- Error type ----------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PayPalError {
    #[error("PayPal is not configured")]
    NotConfigured,
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Amount mismatch: expected {expected_cents} cents, got {actual_cents}")]
    AmountMismatch {
        expected_cents: i64,
        actual_cents: i64,
    },
    #[error("Currency mismatch: expected {expected}, got {actual}")]
    CurrencyMismatch { expected: String, actual: String },
    #[error("Order {order_id} is {status}, not COMPLETED")]
    NotCompleted { order_id: String, status: String },
    #[error("PayPal API error: {0}")]
    ApiError(String),
}

/// Parses a PayPal decimal amount into cents. At most two fraction digits.
pub fn parse_amount_cents(value: &str) -> Result<i64, PayPalError> {
    let invalid = || PayPalError::InvalidAmount(value.to_string());
    let value = value.trim();
    let (whole, fraction) = value.split_once('.').unwrap_or((value, ""));

    if whole.is_empty()
        || !whole.bytes().all(|b| b.is_ascii_digit())
        || fraction.len() > 2
        || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(invalid());
    }

    let whole: i64 = whole.parse().map_err(|_| invalid())?;
    let fraction: i64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().map_err(|_| invalid())? * 10,
        _ => fraction.parse().map_err(|_| invalid())?,
    };

    whole
        .checked_mul(100)
        .and_then(|c| c.checked_add(fraction))
        .ok_or_else(invalid)
}

// ---- Orders API responses (only the fields we read) ----------------------

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    status: String,
    #[serde(default)]
    purchase_units: Vec<PurchaseUnit>,
    payer: Option<Payer>,
}

#[derive(Debug, Deserialize)]
struct PurchaseUnit {
    payments: Option<UnitPayments>,
}

#[derive(Debug, Deserialize)]
struct UnitPayments {
    #[serde(default)]
    captures: Vec<Capture>,
}

#[derive(Debug, Deserialize)]
struct Capture {
    id: String,
    amount: Money,
}

#[derive(Debug, Deserialize)]
struct Money {
    currency_code: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct Payer {
    email_address: Option<String>,
    name: Option<PayerName>,
}

#[derive(Debug, Deserialize)]
struct PayerName {
    given_name: Option<String>,
    surname: Option<String>,
}

impl OrderResponse {
    fn into_captured(self) -> Result<CapturedOrder, PayPalError> {
        if self.status != "COMPLETED" {
            return Err(PayPalError::NotCompleted {
                order_id: self.id,
                status: self.status,
            });
        }

        let capture = self
            .purchase_units
            .into_iter()
            .filter_map(|u| u.payments)
            .flat_map(|p| p.captures)
            .next()
            .ok_or_else(|| PayPalError::ApiError("Order has no capture".to_string()))?;

        let payer_name = self.payer.as_ref().and_then(|p| p.name.as_ref()).map(|n| {
            [n.given_name.as_deref(), n.surname.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ")
        });

        Ok(CapturedOrder {
            order_id: self.id,
            capture_id: Some(capture.id),
            amount_cents: parse_amount_cents(&capture.amount.value)?,
            currency: capture.amount.currency_code,
            payer_email: self.payer.and_then(|p| p.email_address),
            payer_name,
            verified: true,
        })
    }
}

// ---- Service -------------------------------------------------------------

pub struct PayPalService {
    settings: PayPalSettings,
    client: reqwest::Client,
}

impl PayPalService {
    pub fn new(settings: &PayPalSettings) -> Self {
        Self {
            settings: settings.clone(),
            client: reqwest::Client::new(),
        }
    }

    pub fn currency(&self) -> &str {
        &self.settings.currency
    }

    /// Turns a client confirmation into a capture we can record. With
    /// `verify_orders` on, the order is re-read from PayPal and the client's
    /// copy is only used for the order id.
    pub async fn confirm(
        &self,
        confirmation: &PaymentConfirmation,
        expected_cents: i64,
    ) -> Result<CapturedOrder, PayPalError> {
        let captured = if self.settings.verify_orders {
            self.fetch_order(&confirmation.order_id).await?
        } else {
            CapturedOrder {
                order_id: confirmation.order_id.clone(),
                capture_id: confirmation.payment_id.clone(),
                amount_cents: parse_amount_cents(&confirmation.amount)?,
                currency: confirmation
                    .currency
                    .clone()
                    .unwrap_or_else(|| self.settings.currency.clone()),
                payer_email: confirmation.payer_email.clone(),
                payer_name: confirmation.payer_name.clone(),
                verified: false,
            }
        };

        self.check(&captured, expected_cents)?;
        Ok(captured)
    }

    fn check(&self, captured: &CapturedOrder, expected_cents: i64) -> Result<(), PayPalError> {
        if !captured.currency.eq_ignore_ascii_case(&self.settings.currency) {
            return Err(PayPalError::CurrencyMismatch {
                expected: self.settings.currency.clone(),
                actual: captured.currency.clone(),
            });
        }
        if captured.amount_cents != expected_cents {
            warn!(
                order_id = %captured.order_id,
                expected_cents,
                actual_cents = captured.amount_cents,
                "PayPal amount mismatch"
            );
            return Err(PayPalError::AmountMismatch {
                expected_cents,
                actual_cents: captured.amount_cents,
            });
        }
        Ok(())
    }

    // ---- Orders API ------------------------------------------------------

    async fn access_token(&self) -> Result<String, PayPalError> {
        if self.settings.client_id.is_empty() || self.settings.client_secret.is_empty() {
            return Err(PayPalError::NotConfigured);
        }

        let resp = self
            .client
            .post(format!("{}/v1/oauth2/token", self.settings.api_base))
            .basic_auth(&self.settings.client_id, Some(&self.settings.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| PayPalError::ApiError(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(PayPalError::ApiError(format!(
                "Token request failed with {}",
                resp.status()
            )));
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| PayPalError::ApiError(e.to_string()))?;
        Ok(token.access_token)
    }

    async fn fetch_order(&self, order_id: &str) -> Result<CapturedOrder, PayPalError> {
        let token = self.access_token().await?;

        let resp = self
            .client
            .get(format!(
                "{}/v2/checkout/orders/{}",
                self.settings.api_base, order_id
            ))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| PayPalError::ApiError(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(PayPalError::ApiError(format!(
                "Order lookup for {order_id} failed with {}",
                resp.status()
            )));
        }

        let order: OrderResponse = resp
            .json()
            .await
            .map_err(|e| PayPalError::ApiError(e.to_string()))?;
        let captured = order.into_captured()?;

        info!(order_id = %captured.order_id, amount_cents = captured.amount_cents, "PayPal order verified");
        Ok(captured)
    }
}
