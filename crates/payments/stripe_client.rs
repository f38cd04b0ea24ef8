use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use sha2::Sha256;
use thiserror::Error;
use tracing::error;

use crate::domain::value_objects::{
    plans::{PLAN_METADATA_KEY, ProductPlan},
    provider_subscriptions::{ProviderSubscription, ProviderSubscriptionStatus},
};

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a signed webhook, matching Stripe's own client libraries.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Minimal Stripe client built on reqwest.
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    webhook_secret: String,
}

#[derive(Debug, Error)]
pub enum WebhookVerificationError {
    #[error("invalid stripe-signature header: {0}")]
    MalformedHeader(&'static str),
    #[error("webhook timestamp outside tolerance")]
    StaleTimestamp,
    #[error("no matching v1 signature")]
    SignatureMismatch,
    #[error("invalid event payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl WebhookVerificationError {
    /// Authenticity failures, as opposed to a signed payload we could not decode.
    pub fn is_signature_error(&self) -> bool {
        !matches!(self, WebhookVerificationError::Payload(_))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub created: Option<i64>,
    pub livemode: Option<bool>,
    pub api_version: Option<String>,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

impl StripeEvent {
    pub fn object<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.data.object.clone())?)
    }
}

/// A reference Stripe may send either as a bare id or as an expanded object.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Expandable {
    Id(String),
    Object { id: String },
}

impl Expandable {
    pub fn id(&self) -> &str {
        match self {
            Expandable::Id(id) => id,
            Expandable::Object { id } => id,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: Option<String>,
    pub mode: Option<String>,
    pub customer: Option<Expandable>,
    pub subscription: Option<Expandable>,
    pub client_reference_id: Option<String>,
    pub metadata: Option<HashMap<String, String>>,
}

/// The `data.object` of `customer.subscription.*` events. Only references are trusted.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscriptionRef {
    pub id: String,
    pub customer: Option<Expandable>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeInvoice {
    pub id: Option<String>,
    pub customer: Option<Expandable>,
    pub subscription: Option<Expandable>,
    pub parent: Option<StripeInvoiceParent>,
    pub amount_paid: Option<i64>,
    pub amount_due: Option<i64>,
    pub currency: Option<String>,
    pub attempt_count: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeInvoiceParent {
    pub subscription_details: Option<StripeInvoiceSubscriptionDetails>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeInvoiceSubscriptionDetails {
    pub subscription: Option<Expandable>,
}

impl StripeInvoice {
    /// Newer API versions move the subscription reference under `parent.subscription_details`.
    pub fn subscription_id(&self) -> Option<&str> {
        self.subscription
            .as_ref()
            .or_else(|| {
                self.parent
                    .as_ref()
                    .and_then(|parent| parent.subscription_details.as_ref())
                    .and_then(|details| details.subscription.as_ref())
            })
            .map(Expandable::id)
    }
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub customer: Option<Expandable>,
    pub status: String,
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub items: StripeSubscriptionItems,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StripeSubscriptionItems {
    pub data: Vec<StripeSubscriptionItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscriptionItem {
    pub current_period_end: Option<i64>,
    pub price: Option<StripePrice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripePrice {
    pub id: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub product: Option<StripeProduct>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StripeProduct {
    Id(String),
    Object {
        id: String,
        #[serde(default)]
        metadata: HashMap<String, String>,
    },
}

impl StripeSubscription {
    /// Period end, falling back to the first item for API versions that moved it there.
    pub fn period_end(&self) -> Option<i64> {
        self.current_period_end.or_else(|| {
            self.items
                .data
                .first()
                .and_then(|item| item.current_period_end)
        })
    }

    /// Plan metadata, most specific source first: product, then price, then the subscription.
    pub fn plan_metadata(&self) -> Option<&str> {
        let price = self.items.data.first().and_then(|item| item.price.as_ref());

        let from_product = price
            .and_then(|price| price.product.as_ref())
            .and_then(|product| match product {
                StripeProduct::Object { metadata, .. } => metadata.get(PLAN_METADATA_KEY),
                StripeProduct::Id(_) => None,
            });
        let from_price = price.and_then(|price| price.metadata.get(PLAN_METADATA_KEY));

        from_product
            .or(from_price)
            .or_else(|| self.metadata.get(PLAN_METADATA_KEY))
            .map(String::as_str)
    }

    pub fn to_provider_subscription(&self) -> ProviderSubscription {
        ProviderSubscription {
            id: self.id.clone(),
            customer: self.customer.as_ref().map(|c| c.id().to_string()),
            status: ProviderSubscriptionStatus::from_str(&self.status),
            current_period_end: self.period_end().and_then(ts_to_datetime),
            plan: ProductPlan::from_metadata(self.plan_metadata()),
        }
    }
}

pub fn ts_to_datetime(ts: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(ts, 0).single()
}

/// Checks a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=<hex>...]`) against the payload.
/// https://stripe.com/docs/webhooks/signatures
pub fn verify_signature(
    payload: &[u8],
    signature_header: &str,
    secret: &str,
    now: i64,
) -> std::result::Result<(), WebhookVerificationError> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in signature_header.split(',') {
        let part = part.trim();
        if let Some(rest) = part.strip_prefix("t=") {
            timestamp = Some(rest);
        } else if let Some(rest) = part.strip_prefix("v1=") {
            signatures.push(rest);
        }
    }

    let timestamp = timestamp.ok_or(WebhookVerificationError::MalformedHeader(
        "missing timestamp",
    ))?;
    if signatures.is_empty() {
        return Err(WebhookVerificationError::MalformedHeader(
            "missing v1 signature",
        ));
    }

    let signed_at: i64 = timestamp
        .parse()
        .map_err(|_| WebhookVerificationError::MalformedHeader("timestamp is not a number"))?;
    if now.abs_diff(signed_at) > SIGNATURE_TOLERANCE_SECS.unsigned_abs() {
        return Err(WebhookVerificationError::StaleTimestamp);
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| WebhookVerificationError::MalformedHeader("unusable webhook secret"))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);

    // Stripe sends one v1 entry per active secret during rotation.
    let matched = signatures.iter().any(|candidate| {
        hex::decode(candidate)
            .map(|provided| mac.clone().verify_slice(&provided).is_ok())
            .unwrap_or(false)
    });

    if !matched {
        return Err(WebhookVerificationError::SignatureMismatch);
    }

    Ok(())
}

impl StripeClient {
    pub fn new(secret_key: String, webhook_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key,
            webhook_secret,
        }
    }

    async fn ensure_success(resp: reqwest::Response, context: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("request-id")
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let (stripe_error_type, stripe_error_code, stripe_error_message) =
            match serde_json::from_str::<StripeErrorEnvelope>(&body) {
                Ok(envelope) => (
                    envelope.error.type_,
                    envelope.error.code,
                    envelope.error.message,
                ),
                Err(_) => (None, None, None),
            };

        error!(
            status = %status,
            stripe_request_id = ?request_id,
            stripe_error_type = ?stripe_error_type,
            stripe_error_code = ?stripe_error_code,
            stripe_error_message = ?stripe_error_message,
            context = %context,
            "stripe api request failed"
        );

        anyhow::bail!(
            "Stripe API request failed: {} (status {}, request_id={:?})",
            context,
            status,
            request_id
        );
    }

    /// Verifies the signature and decodes the event envelope.
    pub fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> std::result::Result<StripeEvent, WebhookVerificationError> {
        verify_signature(
            payload,
            signature_header,
            &self.webhook_secret,
            Utc::now().timestamp(),
        )?;

        Ok(serde_json::from_slice(payload)?)
    }

    pub async fn retrieve_subscription(&self, subscription_id: &str) -> Result<StripeSubscription> {
        // https://stripe.com/docs/api/subscriptions/retrieve
        let resp = self
            .http
            .get(format!(
                "{STRIPE_API_BASE}/subscriptions/{subscription_id}?expand%5B%5D=items.data.price.product"
            ))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "retrieve subscription").await?;

        let subscription: StripeSubscription = resp.json().await?;
        Ok(subscription)
    }
}
