//! Plan tiers and the pure policy that decides what a user may do.
//!
//! Nothing here performs I/O. Callers pass the stored plan, its expiry, the
//! current time and the current usage count, and re-evaluate on every gated
//! action: elapsed time alone can change the answer.

use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ceiling on attendance records for the free plan.
pub const FREE_ATTENDANCE_LIMIT: i64 = 7;

/// Metadata key read from the provider's product, price or subscription.
pub const PLAN_METADATA_KEY: &str = "plan";

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    #[default]
    Free,
    Plus,
    Pro,
}

impl PlanTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Plus => "plus",
            PlanTier::Pro => "pro",
        }
    }

    /// Stored values that fail to parse grant nothing.
    pub fn from_str(value: &str) -> Self {
        match value {
            "plus" => PlanTier::Plus,
            "pro" => PlanTier::Pro,
            _ => PlanTier::Free,
        }
    }

    pub fn is_paid(&self) -> bool {
        !matches!(self, PlanTier::Free)
    }
}

impl Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Plan tier as advertised by the billing provider's product metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductPlan {
    Mapped(PlanTier),
    Unmapped(String),
    Missing,
}

impl ProductPlan {
    pub fn from_metadata(value: Option<&str>) -> Self {
        let Some(raw) = value else {
            return ProductPlan::Missing;
        };

        match raw.trim().to_ascii_lowercase().as_str() {
            "free" => ProductPlan::Mapped(PlanTier::Free),
            "plus" => ProductPlan::Mapped(PlanTier::Plus),
            "pro" => ProductPlan::Mapped(PlanTier::Pro),
            "" => ProductPlan::Missing,
            _ => ProductPlan::Unmapped(raw.to_string()),
        }
    }

    pub fn tier(&self) -> PlanTier {
        match self {
            ProductPlan::Mapped(tier) => *tier,
            ProductPlan::Unmapped(_) | ProductPlan::Missing => PlanTier::Free,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quota {
    Limited(i64),
    Unlimited,
}

impl Quota {
    pub fn limit(&self) -> Option<i64> {
        match self {
            Quota::Limited(limit) => Some(*limit),
            Quota::Unlimited => None,
        }
    }

    pub fn remaining(&self, current_usage: i64) -> Option<i64> {
        self.limit().map(|limit| (limit - current_usage).max(0))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Export,
    MultiSeason,
    AdvancedStats,
}

/// The plan honored right now. Paid plans lapse to free once `plan_expires_at`
/// is reached, whether or not a cancellation event ever arrived.
pub fn effective_plan(
    stored_plan: PlanTier,
    plan_expires_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> PlanTier {
    match (stored_plan, plan_expires_at) {
        (PlanTier::Free, _) => PlanTier::Free,
        (plan, None) => plan,
        (plan, Some(expires_at)) if expires_at > now => plan,
        _ => PlanTier::Free,
    }
}

pub fn quota(effective_plan: PlanTier) -> Quota {
    match effective_plan {
        PlanTier::Free => Quota::Limited(FREE_ATTENDANCE_LIMIT),
        PlanTier::Plus | PlanTier::Pro => Quota::Unlimited,
    }
}

pub fn can_create(effective_plan: PlanTier, current_usage: i64) -> bool {
    match quota(effective_plan) {
        Quota::Limited(limit) => current_usage < limit,
        Quota::Unlimited => true,
    }
}

pub fn feature_gate(effective_plan: PlanTier, feature: Feature) -> bool {
    match feature {
        Feature::Export | Feature::MultiSeason => effective_plan.is_paid(),
        Feature::AdvancedStats => effective_plan == PlanTier::Pro,
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanEntitlements {
    pub can_export: bool,
    pub can_multi_season: bool,
    pub can_advanced_stats: bool,
}

impl PlanEntitlements {
    pub fn for_plan(effective_plan: PlanTier) -> Self {
        Self {
            can_export: feature_gate(effective_plan, Feature::Export),
            can_multi_season: feature_gate(effective_plan, Feature::MultiSeason),
            can_advanced_stats: feature_gate(effective_plan, Feature::AdvancedStats),
        }
    }
}
