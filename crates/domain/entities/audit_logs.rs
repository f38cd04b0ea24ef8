use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::audit_logs;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = audit_logs)]
pub struct AuditLogEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_id: Option<String>,
    pub action: String,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = audit_logs)]
pub struct InsertAuditLogEntity {
    pub user_id: Uuid,
    pub event_id: Option<String>,
    pub action: String,
    pub details: serde_json::Value,
}
