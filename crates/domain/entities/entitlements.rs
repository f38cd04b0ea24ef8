use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::{
        entitlements::EntitlementPatch, enums::entitlement_statuses::EntitlementStatus,
        plans::PlanTier,
    },
    infra::db::postgres::schema::entitlements,
};

#[derive(Debug, Clone, PartialEq, Eq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = entitlements, primary_key(user_id))]
pub struct EntitlementEntity {
    pub user_id: Uuid,
    pub plan: String,
    pub plan_expires_at: Option<DateTime<Utc>>,
    pub external_subscription_id: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EntitlementEntity {
    pub fn plan_tier(&self) -> PlanTier {
        PlanTier::from_str(&self.plan)
    }

    pub fn entitlement_status(&self) -> EntitlementStatus {
        EntitlementStatus::from_str(&self.status)
    }
}

/// Row inserted the first time a user is seen; fields absent from the patch take column defaults.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = entitlements)]
pub struct InsertEntitlementEntity {
    pub user_id: Uuid,
    pub plan: String,
    pub plan_expires_at: Option<DateTime<Utc>>,
    pub external_subscription_id: Option<String>,
    pub status: String,
    pub updated_at: DateTime<Utc>,
}

/// Partial update applied on conflict. `None` fields are skipped by diesel.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = entitlements)]
pub struct UpdateEntitlementEntity {
    pub plan: Option<String>,
    pub plan_expires_at: Option<Option<DateTime<Utc>>>,
    pub external_subscription_id: Option<String>,
    pub status: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl InsertEntitlementEntity {
    pub fn from_patch(user_id: Uuid, patch: &EntitlementPatch, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            plan: patch.plan.unwrap_or_default().to_string(),
            plan_expires_at: patch.plan_expires_at.flatten(),
            external_subscription_id: patch.external_subscription_id.clone(),
            status: patch.status.unwrap_or_default().to_string(),
            updated_at: now,
        }
    }
}

impl UpdateEntitlementEntity {
    pub fn from_patch(patch: &EntitlementPatch, now: DateTime<Utc>) -> Self {
        Self {
            plan: patch.plan.map(|plan| plan.to_string()),
            plan_expires_at: patch.plan_expires_at,
            external_subscription_id: patch.external_subscription_id.clone(),
            status: patch.status.map(|status| status.to_string()),
            updated_at: now,
        }
    }
}
