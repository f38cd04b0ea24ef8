use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::{entitlements::UserPlanProjection, plans::PlanTier},
    infra::db::postgres::schema::app_users,
};

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = app_users)]
pub struct AppUserEntity {
    pub id: Uuid,
    pub status: String,
    pub plan: String,
    pub plan_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AppUserEntity {
    pub fn plan_projection(&self) -> UserPlanProjection {
        UserPlanProjection {
            user_id: self.id,
            plan: PlanTier::from_str(&self.plan),
            plan_expires_at: self.plan_expires_at,
        }
    }
}

/// Projection write: both fields are always copied, a `None` expiry is written as NULL.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = app_users, treat_none_as_null = true)]
pub struct SyncUserPlanEntity {
    pub plan: String,
    pub plan_expires_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}
