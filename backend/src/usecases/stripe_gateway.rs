use anyhow::Result as AnyResult;
use async_trait::async_trait;
use entitlement_core::{
    domain::value_objects::provider_subscriptions::ProviderSubscription,
    payments::stripe_client::{StripeClient, StripeEvent, WebhookVerificationError},
};

/// The slice of the billing provider the entitlement core depends on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StripeGateway: Send + Sync {
    fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<StripeEvent, WebhookVerificationError>;

    /// Live subscription state; never taken from an event payload.
    async fn retrieve_subscription(&self, subscription_id: &str) -> AnyResult<ProviderSubscription>;
}

#[async_trait]
impl StripeGateway for StripeClient {
    fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<StripeEvent, WebhookVerificationError> {
        StripeClient::verify_webhook_signature(self, payload, signature)
    }

    async fn retrieve_subscription(&self, subscription_id: &str) -> AnyResult<ProviderSubscription> {
        let subscription = StripeClient::retrieve_subscription(self, subscription_id).await?;
        Ok(subscription.to_provider_subscription())
    }
}
