use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::value_objects::entitlements::UserPlanProjection;

#[async_trait]
#[automock]
pub trait AppUserRepository {
    /// Fast-read plan fields from the user's primary record. `None` when the user is unknown.
    async fn find_plan_projection(&self, user_id: Uuid) -> Result<Option<UserPlanProjection>>;
}
