use anyhow::Result;
use async_trait::async_trait;
use diesel::{OptionalExtension, RunQueryDsl, insert_into, prelude::*};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{
        entities::payment_provider_customers::InsertPaymentProviderCustomerEntity,
        repositories::payment_provider_customers::PaymentProviderCustomerRepository,
    },
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::payment_provider_customers},
};

pub struct PaymentProviderCustomerPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PaymentProviderCustomerPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PaymentProviderCustomerRepository for PaymentProviderCustomerPostgres {
    async fn find_user_id_by_customer_ref(
        &self,
        provider: &str,
        customer_ref: &str,
    ) -> Result<Option<Uuid>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let user_id = payment_provider_customers::table
            .filter(payment_provider_customers::provider.eq(provider))
            .filter(payment_provider_customers::customer_ref.eq(customer_ref))
            .select(payment_provider_customers::user_id)
            .first::<Uuid>(&mut conn)
            .optional()?;

        Ok(user_id)
    }

    async fn upsert_customer_ref(
        &self,
        user_id: Uuid,
        provider: &str,
        customer_ref: &str,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let insert_entity = InsertPaymentProviderCustomerEntity {
            user_id,
            provider: provider.to_string(),
            customer_ref: customer_ref.to_string(),
            metadata: json!({}),
        };

        insert_into(payment_provider_customers::table)
            .values(&insert_entity)
            .on_conflict((
                payment_provider_customers::provider,
                payment_provider_customers::customer_ref,
            ))
            .do_update()
            .set(payment_provider_customers::user_id.eq(user_id))
            .execute(&mut conn)?;

        Ok(())
    }
}
