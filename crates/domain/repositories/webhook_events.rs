use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::entities::webhook_events::WebhookEventEntity;

/// Persisted idempotency ledger keyed by provider event id.
#[async_trait]
#[automock]
pub trait WebhookEventRepository {
    /// True for any recorded event, whatever its final status.
    async fn has_processed(&self, event_id: &str) -> Result<bool>;

    /// Inserts the ledger row with an optimistic `success` status. Returns `false` when another
    /// delivery already owns the row, in which case the caller must not run the event.
    async fn record_tentative(
        &self,
        event_id: &str,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Result<bool>;

    async fn mark_failed(&self, event_id: &str, error_message: &str) -> Result<()>;

    async fn list_failed(&self, limit: i64) -> Result<Vec<WebhookEventEntity>>;
}
