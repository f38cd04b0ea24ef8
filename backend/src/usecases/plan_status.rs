use std::sync::Arc;

use chrono::{DateTime, Utc};
use entitlement_core::domain::{
    repositories::{app_users::AppUserRepository, usage::UsageRepository},
    value_objects::{
        entitlements::PlanStatusDto,
        enums::resource_kinds::ResourceKind,
        plans::{PlanEntitlements, PlanTier, can_create, effective_plan, quota},
    },
};
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("user not found")]
    UserNotFound,
    #[error("plan limit reached ({current_count}/{limit})")]
    LimitReached { current_count: i64, limit: i64 },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl PlanError {
    pub fn status_code(&self) -> u16 {
        match self {
            PlanError::UserNotFound => 404,
            PlanError::LimitReached { .. } => 403,
            PlanError::Internal(_) => 500,
        }
    }
}

/// Read side of entitlements: answers from the user projection plus a live usage count.
pub struct PlanStatusUseCase<U, R>
where
    U: AppUserRepository + Send + Sync + 'static,
    R: UsageRepository + Send + Sync + 'static,
{
    app_user_repo: Arc<U>,
    usage_repo: Arc<R>,
}

impl<U, R> PlanStatusUseCase<U, R>
where
    U: AppUserRepository + Send + Sync + 'static,
    R: UsageRepository + Send + Sync + 'static,
{
    pub fn new(app_user_repo: Arc<U>, usage_repo: Arc<R>) -> Self {
        Self {
            app_user_repo,
            usage_repo,
        }
    }

    pub async fn get_plan_status(&self, user_id: Uuid) -> Result<PlanStatusDto, PlanError> {
        self.get_plan_status_at(user_id, Utc::now()).await
    }

    pub async fn get_plan_status_at(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<PlanStatusDto, PlanError> {
        let (plan, plan_expires_at, effective) = self.resolve_plan(user_id, now).await?;
        let attendance_count = self.count(user_id, ResourceKind::Attendance).await?;
        let quota = quota(effective);

        Ok(PlanStatusDto {
            plan,
            effective_plan: effective,
            plan_expires_at,
            is_pro: effective == PlanTier::Pro,
            is_plus: effective == PlanTier::Plus,
            attendance_count,
            limit: quota.limit(),
            remaining: quota.remaining(attendance_count),
            can_create: can_create(effective, attendance_count),
            entitlements: PlanEntitlements::for_plan(effective),
        })
    }

    /// Gate for creating one more `resource_kind`. Re-evaluated on every call, so an expired
    /// plan is refused without any webhook having arrived.
    pub async fn require_capacity(
        &self,
        user_id: Uuid,
        resource_kind: ResourceKind,
    ) -> Result<(), PlanError> {
        self.require_capacity_at(user_id, resource_kind, Utc::now())
            .await
    }

    pub async fn require_capacity_at(
        &self,
        user_id: Uuid,
        resource_kind: ResourceKind,
        now: DateTime<Utc>,
    ) -> Result<(), PlanError> {
        let (_, _, effective) = self.resolve_plan(user_id, now).await?;
        let Some(limit) = quota(effective).limit() else {
            return Ok(());
        };

        let current_count = self.count(user_id, resource_kind).await?;
        if can_create(effective, current_count) {
            return Ok(());
        }

        info!(
            %user_id,
            resource_kind = %resource_kind,
            current_count,
            limit,
            "plan_status: quota exhausted"
        );
        Err(PlanError::LimitReached {
            current_count,
            limit,
        })
    }

    async fn resolve_plan(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(PlanTier, Option<DateTime<Utc>>, PlanTier), PlanError> {
        let projection = self
            .app_user_repo
            .find_plan_projection(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "plan_status: failed to load user plan");
                err
            })?
            .ok_or(PlanError::UserNotFound)?;

        let effective = effective_plan(projection.plan, projection.plan_expires_at, now);
        debug!(
            %user_id,
            stored_plan = %projection.plan,
            effective_plan = %effective,
            plan_expires_at = ?projection.plan_expires_at,
            "plan_status: resolved effective plan"
        );

        Ok((projection.plan, projection.plan_expires_at, effective))
    }

    async fn count(&self, user_id: Uuid, resource_kind: ResourceKind) -> Result<i64, PlanError> {
        Ok(self
            .usage_repo
            .count_by_user(user_id, resource_kind)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    resource_kind = %resource_kind,
                    db_error = ?err,
                    "plan_status: failed to count usage"
                );
                err
            })?)
    }
}
