use anyhow::Result;
use async_trait::async_trait;
use diesel::{RunQueryDsl, prelude::*};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{
        repositories::usage::UsageRepository,
        value_objects::enums::resource_kinds::ResourceKind,
    },
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::attendance_records},
};

pub struct UsagePostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl UsagePostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl UsageRepository for UsagePostgres {
    async fn count_by_user(&self, user_id: Uuid, resource_kind: ResourceKind) -> Result<i64> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let count = match resource_kind {
            ResourceKind::Attendance => attendance_records::table
                .filter(attendance_records::user_id.eq(user_id))
                .count()
                .get_result::<i64>(&mut conn)?,
        };

        Ok(count)
    }
}
