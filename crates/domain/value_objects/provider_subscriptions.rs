use chrono::{DateTime, Utc};

use super::{enums::entitlement_statuses::EntitlementStatus, plans::ProductPlan};

/// Subscription status as reported by Stripe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderSubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Unpaid,
    Incomplete,
    IncompleteExpired,
    Canceled,
    Paused,
    Other(String),
}

impl ProviderSubscriptionStatus {
    pub fn from_str(value: &str) -> Self {
        match value {
            "active" => ProviderSubscriptionStatus::Active,
            "trialing" => ProviderSubscriptionStatus::Trialing,
            "past_due" => ProviderSubscriptionStatus::PastDue,
            "unpaid" => ProviderSubscriptionStatus::Unpaid,
            "incomplete" => ProviderSubscriptionStatus::Incomplete,
            "incomplete_expired" => ProviderSubscriptionStatus::IncompleteExpired,
            "canceled" => ProviderSubscriptionStatus::Canceled,
            "paused" => ProviderSubscriptionStatus::Paused,
            other => ProviderSubscriptionStatus::Other(other.to_string()),
        }
    }

    /// Only these statuses grant the paid plan.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ProviderSubscriptionStatus::Active | ProviderSubscriptionStatus::Trialing
        )
    }

    pub fn entitlement_status(&self) -> EntitlementStatus {
        match self {
            ProviderSubscriptionStatus::Active | ProviderSubscriptionStatus::Trialing => {
                EntitlementStatus::Active
            }
            ProviderSubscriptionStatus::PastDue
            | ProviderSubscriptionStatus::Unpaid
            | ProviderSubscriptionStatus::Incomplete => EntitlementStatus::PastDue,
            ProviderSubscriptionStatus::IncompleteExpired
            | ProviderSubscriptionStatus::Canceled
            | ProviderSubscriptionStatus::Paused
            | ProviderSubscriptionStatus::Other(_) => EntitlementStatus::Canceled,
        }
    }
}

/// Authoritative subscription state re-fetched from the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSubscription {
    pub id: String,
    pub customer: Option<String>,
    pub status: ProviderSubscriptionStatus,
    pub current_period_end: Option<DateTime<Utc>>,
    pub plan: ProductPlan,
}
