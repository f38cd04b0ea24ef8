use std::sync::Arc;

use entitlement_core::domain::{
    entities::webhook_events::WebhookEventEntity,
    repositories::webhook_events::WebhookEventRepository,
};
use thiserror::Error;
use tracing::{error, info, warn};

use super::{
    event_interpreter::{EventHandler, InterpretError, WebhookOutcome},
    stripe_gateway::StripeGateway,
};

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("invalid webhook signature")]
    InvalidSignature,
    #[error("invalid webhook payload: {0}")]
    InvalidPayload(String),
    #[error(transparent)]
    InfrastructureFailure(#[from] anyhow::Error),
}

impl WebhookError {
    pub fn status_code(&self) -> u16 {
        match self {
            WebhookError::InvalidSignature | WebhookError::InvalidPayload(_) => 400,
            WebhookError::InfrastructureFailure(_) => 500,
        }
    }

    /// Only infrastructure failures are worth a provider retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WebhookError::InfrastructureFailure(_))
    }
}

pub struct BillingWebhookUseCase<L, H, Stripe>
where
    L: WebhookEventRepository + Send + Sync + 'static,
    H: EventHandler + 'static,
    Stripe: StripeGateway + 'static,
{
    ledger: Arc<L>,
    handler: Arc<H>,
    stripe_client: Arc<Stripe>,
}

impl<L, H, Stripe> BillingWebhookUseCase<L, H, Stripe>
where
    L: WebhookEventRepository + Send + Sync + 'static,
    H: EventHandler + 'static,
    Stripe: StripeGateway + 'static,
{
    pub fn new(ledger: Arc<L>, handler: Arc<H>, stripe_client: Arc<Stripe>) -> Self {
        Self {
            ledger,
            handler,
            stripe_client,
        }
    }

    /// Verifies, de-duplicates and applies one delivery. The ledger row is written before the
    /// event runs, so a concurrent duplicate loses the insert and is acknowledged untouched.
    pub async fn handle_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookOutcome, WebhookError> {
        let event = self
            .stripe_client
            .verify_webhook_signature(payload, signature)
            .map_err(|err| {
                warn!(error = %err, "billing_webhook: rejected delivery");
                if err.is_signature_error() {
                    WebhookError::InvalidSignature
                } else {
                    WebhookError::InvalidPayload(err.to_string())
                }
            })?;

        let snapshot: serde_json::Value = serde_json::from_slice(payload)
            .map_err(|err| WebhookError::InvalidPayload(err.to_string()))?;

        if self.ledger.has_processed(&event.id).await? {
            info!(
                event_id = %event.id,
                event_type = %event.type_,
                "billing_webhook: event already processed"
            );
            return Ok(WebhookOutcome::AlreadyProcessed);
        }

        if !self
            .ledger
            .record_tentative(&event.id, &event.type_, snapshot)
            .await?
        {
            info!(
                event_id = %event.id,
                event_type = %event.type_,
                "billing_webhook: concurrent delivery already claimed event"
            );
            return Ok(WebhookOutcome::AlreadyProcessed);
        }

        match self.handler.apply(&event).await {
            Ok(outcome) => {
                info!(
                    event_id = %event.id,
                    event_type = %event.type_,
                    outcome = ?outcome,
                    "billing_webhook: event processed"
                );
                Ok(outcome)
            }
            Err(err) => {
                error!(
                    event_id = %event.id,
                    event_type = %event.type_,
                    error = ?err,
                    "billing_webhook: event processing failed"
                );

                let reason = err.to_string();
                if let Err(ledger_err) = self.ledger.mark_failed(&event.id, &reason).await {
                    error!(
                        event_id = %event.id,
                        db_error = ?ledger_err,
                        "billing_webhook: failed to mark ledger row as failed; it stays recorded \
                         as success and is missing from the reconciliation backlog"
                    );
                    return Err(WebhookError::InfrastructureFailure(ledger_err.context(format!(
                        "event {} failed ({reason}) and its ledger row could not be marked failed",
                        event.id
                    ))));
                }

                Err(match err {
                    InterpretError::MalformedObject { .. } => {
                        WebhookError::InvalidPayload(err.to_string())
                    }
                    InterpretError::Infrastructure(source) => {
                        WebhookError::InfrastructureFailure(source)
                    }
                })
            }
        }
    }

    /// Events whose processing failed and that the provider will not redeliver on its own.
    pub async fn pending_reconciliation(
        &self,
        limit: i64,
    ) -> Result<Vec<WebhookEventEntity>, WebhookError> {
        Ok(self.ledger.list_failed(limit).await?)
    }
}
