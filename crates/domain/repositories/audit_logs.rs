use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::entities::audit_logs::InsertAuditLogEntity;

#[async_trait]
#[automock]
pub trait AuditLogRepository {
    /// At most one row per `event_id`; a second insert for the same event is ignored.
    async fn record(&self, entry: InsertAuditLogEntity) -> Result<()>;
}
