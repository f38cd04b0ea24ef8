use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use diesel::{Connection, OptionalExtension, PgConnection, RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{
        entities::{
            app_users::SyncUserPlanEntity,
            entitlements::{EntitlementEntity, InsertEntitlementEntity, UpdateEntitlementEntity},
        },
        repositories::entitlements::EntitlementRepository,
        value_objects::entitlements::EntitlementPatch,
    },
    infra::db::postgres::{
        postgres_connection::PgPoolSquad,
        schema::{app_users, entitlements},
    },
};

pub struct EntitlementPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl EntitlementPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

/// Copies `{plan, plan_expires_at}` from the entitlement row onto `app_users`.
/// Must run on the same connection, inside the same transaction, as the entitlement write.
pub fn sync_entitlement_to_user(conn: &mut PgConnection, user_id: Uuid) -> Result<()> {
    let entitlement = entitlements::table
        .filter(entitlements::user_id.eq(user_id))
        .select(EntitlementEntity::as_select())
        .first::<EntitlementEntity>(conn)?;

    let changeset = SyncUserPlanEntity {
        plan: entitlement.plan,
        plan_expires_at: entitlement.plan_expires_at,
        updated_at: Utc::now(),
    };

    let updated = update(app_users::table.filter(app_users::id.eq(user_id)))
        .set(&changeset)
        .execute(conn)?;

    if updated == 0 {
        bail!("user projection missing for user {user_id}");
    }

    Ok(())
}

#[async_trait]
impl EntitlementRepository for EntitlementPostgres {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<EntitlementEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = entitlements::table
            .filter(entitlements::user_id.eq(user_id))
            .select(EntitlementEntity::as_select())
            .first::<EntitlementEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn find_by_subscription_id(
        &self,
        external_subscription_id: &str,
    ) -> Result<Option<EntitlementEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = entitlements::table
            .filter(entitlements::external_subscription_id.eq(external_subscription_id))
            .order(entitlements::updated_at.desc())
            .select(EntitlementEntity::as_select())
            .first::<EntitlementEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn upsert_entitlement(
        &self,
        user_id: Uuid,
        patch: EntitlementPatch,
    ) -> Result<EntitlementEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let now = Utc::now();
        let insert_entity = InsertEntitlementEntity::from_patch(user_id, &patch, now);
        let changeset = UpdateEntitlementEntity::from_patch(&patch, now);

        // Single-statement upsert: concurrent events for the same user serialize on the row lock.
        let entitlement = conn.transaction::<_, anyhow::Error, _>(|conn| {
            let entitlement = insert_into(entitlements::table)
                .values(&insert_entity)
                .on_conflict(entitlements::user_id)
                .do_update()
                .set(&changeset)
                .returning(EntitlementEntity::as_returning())
                .get_result::<EntitlementEntity>(conn)?;

            sync_entitlement_to_user(conn, user_id)?;

            Ok(entitlement)
        })?;

        Ok(entitlement)
    }

    async fn upsert_entitlement_if_current(
        &self,
        user_id: Uuid,
        subscription_id: &str,
        patch: EntitlementPatch,
    ) -> Result<Option<EntitlementEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let now = Utc::now();
        let insert_entity = InsertEntitlementEntity::from_patch(user_id, &patch, now);
        let changeset = UpdateEntitlementEntity::from_patch(&patch, now);

        // ON CONFLICT DO UPDATE ... WHERE: the guard is evaluated against the locked row.
        let entitlement = conn.transaction::<_, anyhow::Error, _>(|conn| {
            use diesel::query_dsl::methods::FilterDsl;

            let entitlement = insert_into(entitlements::table)
                .values(&insert_entity)
                .on_conflict(entitlements::user_id)
                .do_update()
                .set(&changeset)
                .filter(
                    entitlements::external_subscription_id
                        .is_null()
                        .or(entitlements::external_subscription_id.eq(subscription_id)),
                )
                .returning(EntitlementEntity::as_returning())
                .get_result::<EntitlementEntity>(conn)
                .optional()?;

            if entitlement.is_some() {
                sync_entitlement_to_user(conn, user_id)?;
            }

            Ok(entitlement)
        })?;

        Ok(entitlement)
    }
}
