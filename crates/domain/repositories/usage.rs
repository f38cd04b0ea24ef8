use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::value_objects::enums::resource_kinds::ResourceKind;

#[async_trait]
#[automock]
pub trait UsageRepository {
    async fn count_by_user(&self, user_id: Uuid, resource_kind: ResourceKind) -> Result<i64>;
}
