use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{RunQueryDsl, dsl::exists, insert_into, prelude::*, select, update};
use std::sync::Arc;

use crate::{
    domain::{
        entities::webhook_events::{InsertWebhookEventEntity, WebhookEventEntity},
        repositories::webhook_events::WebhookEventRepository,
        value_objects::enums::webhook_event_statuses::WebhookEventStatus,
    },
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::webhook_events},
};

pub struct WebhookEventPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl WebhookEventPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl WebhookEventRepository for WebhookEventPostgres {
    async fn has_processed(&self, event_id: &str) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let seen = select(exists(
            webhook_events::table.filter(webhook_events::event_id.eq(event_id)),
        ))
        .get_result::<bool>(&mut conn)?;

        Ok(seen)
    }

    async fn record_tentative(
        &self,
        event_id: &str,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let insert_entity = InsertWebhookEventEntity {
            event_id: event_id.to_string(),
            event_type: event_type.to_string(),
            processed_at: Utc::now(),
            payload_snapshot: payload,
            status: WebhookEventStatus::Success.to_string(),
        };

        // The primary key decides the winner between concurrent deliveries.
        let inserted = insert_into(webhook_events::table)
            .values(&insert_entity)
            .on_conflict(webhook_events::event_id)
            .do_nothing()
            .execute(&mut conn)?;

        Ok(inserted == 1)
    }

    async fn mark_failed(&self, event_id: &str, error_message: &str) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(webhook_events::table.filter(webhook_events::event_id.eq(event_id)))
            .set((
                webhook_events::status.eq(WebhookEventStatus::Failed.to_string()),
                webhook_events::error_message.eq(Some(error_message)),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn list_failed(&self, limit: i64) -> Result<Vec<WebhookEventEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = webhook_events::table
            .filter(webhook_events::status.eq(WebhookEventStatus::Failed.to_string()))
            .order(webhook_events::processed_at.desc())
            .limit(limit)
            .select(WebhookEventEntity::as_select())
            .load::<WebhookEventEntity>(&mut conn)?;

        Ok(results)
    }
}
