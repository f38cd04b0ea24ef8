use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    enums::entitlement_statuses::EntitlementStatus,
    plans::{PlanEntitlements, PlanTier},
    provider_subscriptions::ProviderSubscription,
};

/// Fields a single transition is allowed to write. `None` leaves the stored value untouched;
/// `plan_expires_at: Some(None)` clears the expiry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntitlementPatch {
    pub plan: Option<PlanTier>,
    pub plan_expires_at: Option<Option<DateTime<Utc>>>,
    pub external_subscription_id: Option<String>,
    pub status: Option<EntitlementStatus>,
}

impl EntitlementPatch {
    /// Plan, expiry, reference and status all derived from a freshly re-fetched subscription.
    /// Inactive subscriptions keep their reference but grant nothing.
    pub fn from_subscription(subscription: &ProviderSubscription) -> Self {
        let is_active = subscription.status.is_active();

        Self {
            plan: Some(if is_active {
                subscription.plan.tier()
            } else {
                PlanTier::Free
            }),
            plan_expires_at: Some(if is_active {
                subscription.current_period_end
            } else {
                None
            }),
            external_subscription_id: Some(subscription.id.clone()),
            status: Some(subscription.status.entitlement_status()),
        }
    }

    /// Cancellation keeps the last known subscription reference for audit.
    pub fn canceled() -> Self {
        Self {
            plan: Some(PlanTier::Free),
            plan_expires_at: Some(None),
            external_subscription_id: None,
            status: Some(EntitlementStatus::Canceled),
        }
    }

    pub fn status_only(status: EntitlementStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// Plan fields as denormalized onto the user's primary record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPlanProjection {
    pub user_id: Uuid,
    pub plan: PlanTier,
    pub plan_expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanStatusDto {
    pub plan: PlanTier,
    pub effective_plan: PlanTier,
    pub plan_expires_at: Option<DateTime<Utc>>,
    pub is_pro: bool,
    pub is_plus: bool,
    pub attendance_count: i64,
    /// `None` means unlimited.
    pub limit: Option<i64>,
    pub remaining: Option<i64>,
    pub can_create: bool,
    pub entitlements: PlanEntitlements,
}
