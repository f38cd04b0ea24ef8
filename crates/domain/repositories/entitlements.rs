use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::entitlements::EntitlementEntity, value_objects::entitlements::EntitlementPatch,
};

#[async_trait]
#[automock]
pub trait EntitlementRepository {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<EntitlementEntity>>;

    async fn find_by_subscription_id(
        &self,
        external_subscription_id: &str,
    ) -> Result<Option<EntitlementEntity>>;

    /// Merges `patch` into the user's row (creating it if needed) and copies the resulting
    /// plan fields onto the user projection in the same transaction.
    async fn upsert_entitlement(
        &self,
        user_id: Uuid,
        patch: EntitlementPatch,
    ) -> Result<EntitlementEntity>;

    /// Same write as [`upsert_entitlement`](Self::upsert_entitlement), but only applied when the
    /// stored row has no subscription or already holds `subscription_id`. The check and the write
    /// are one statement; `None` means the row belongs to another subscription and was left alone.
    async fn upsert_entitlement_if_current(
        &self,
        user_id: Uuid,
        subscription_id: &str,
        patch: EntitlementPatch,
    ) -> Result<Option<EntitlementEntity>>;
}
