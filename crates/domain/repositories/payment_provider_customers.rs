use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

#[async_trait]
#[automock]
pub trait PaymentProviderCustomerRepository {
    async fn find_user_id_by_customer_ref(
        &self,
        provider: &str,
        customer_ref: &str,
    ) -> Result<Option<Uuid>>;

    async fn upsert_customer_ref(
        &self,
        user_id: Uuid,
        provider: &str,
        customer_ref: &str,
    ) -> Result<()>;
}
