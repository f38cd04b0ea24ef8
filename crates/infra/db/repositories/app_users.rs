use anyhow::Result;
use async_trait::async_trait;
use diesel::{OptionalExtension, RunQueryDsl, prelude::*};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{
        entities::app_users::AppUserEntity, repositories::app_users::AppUserRepository,
        value_objects::entitlements::UserPlanProjection,
    },
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::app_users},
};

pub struct AppUserPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl AppUserPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl AppUserRepository for AppUserPostgres {
    async fn find_plan_projection(&self, user_id: Uuid) -> Result<Option<UserPlanProjection>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let user = app_users::table
            .filter(app_users::id.eq(user_id))
            .select(AppUserEntity::as_select())
            .first::<AppUserEntity>(&mut conn)
            .optional()?;

        Ok(user.map(|user| user.plan_projection()))
    }
}
