use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::{
    domain::value_objects::enums::webhook_event_statuses::WebhookEventStatus,
    infra::db::postgres::schema::webhook_events,
};

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = webhook_events, primary_key(event_id))]
pub struct WebhookEventEntity {
    pub event_id: String,
    pub event_type: String,
    pub processed_at: DateTime<Utc>,
    pub payload_snapshot: serde_json::Value,
    pub status: String,
    pub error_message: Option<String>,
}

impl WebhookEventEntity {
    pub fn event_status(&self) -> Option<WebhookEventStatus> {
        WebhookEventStatus::from_str(&self.status)
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = webhook_events)]
pub struct InsertWebhookEventEntity {
    pub event_id: String,
    pub event_type: String,
    pub processed_at: DateTime<Utc>,
    pub payload_snapshot: serde_json::Value,
    pub status: String,
}
