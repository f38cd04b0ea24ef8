use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
};
use entitlement_core::{
    domain::repositories::webhook_events::WebhookEventRepository,
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{
            app_users::AppUserPostgres, audit_logs::AuditLogPostgres,
            entitlements::EntitlementPostgres,
            payment_provider_customers::PaymentProviderCustomerPostgres,
            webhook_events::WebhookEventPostgres,
        },
    },
    payments::stripe_client::StripeClient,
};
use serde::Serialize;
use tracing::warn;

use crate::usecases::{
    event_interpreter::{EventHandler, SubscriptionEventInterpreter, WebhookOutcome},
    stripe_gateway::StripeGateway,
    webhook_ingress::{BillingWebhookUseCase, WebhookError},
};

pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

pub type PostgresEventInterpreter = SubscriptionEventInterpreter<
    EntitlementPostgres,
    PaymentProviderCustomerPostgres,
    AppUserPostgres,
    AuditLogPostgres,
    StripeClient,
>;

pub type PostgresBillingWebhookUseCase =
    BillingWebhookUseCase<WebhookEventPostgres, PostgresEventInterpreter, StripeClient>;

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub outcome: WebhookOutcome,
}

pub fn build_usecase(
    db_pool: Arc<PgPoolSquad>,
    stripe_client: Arc<StripeClient>,
) -> Arc<PostgresBillingWebhookUseCase> {
    let interpreter = SubscriptionEventInterpreter::new(
        Arc::new(EntitlementPostgres::new(Arc::clone(&db_pool))),
        Arc::new(PaymentProviderCustomerPostgres::new(Arc::clone(&db_pool))),
        Arc::new(AppUserPostgres::new(Arc::clone(&db_pool))),
        Arc::new(AuditLogPostgres::new(Arc::clone(&db_pool))),
        Arc::clone(&stripe_client),
    );

    Arc::new(BillingWebhookUseCase::new(
        Arc::new(WebhookEventPostgres::new(Arc::clone(&db_pool))),
        Arc::new(interpreter),
        stripe_client,
    ))
}

pub fn routes<L, H, S>(usecase: Arc<BillingWebhookUseCase<L, H, S>>) -> Router
where
    L: WebhookEventRepository + Send + Sync + 'static,
    H: EventHandler + 'static,
    S: StripeGateway + 'static,
{
    Router::new()
        .route("/webhook", post(handle_webhook::<L, H, S>))
        .with_state(usecase)
}

pub async fn handle_webhook<L, H, S>(
    State(usecase): State<Arc<BillingWebhookUseCase<L, H, S>>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse
where
    L: WebhookEventRepository + Send + Sync + 'static,
    H: EventHandler + 'static,
    S: StripeGateway + 'static,
{
    let Some(signature) = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
    else {
        warn!("billing_webhook: missing stripe-signature header");
        return WebhookError::InvalidSignature.into_response();
    };

    match usecase.handle_webhook(&body, signature).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(WebhookAck {
                received: true,
                outcome,
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}
