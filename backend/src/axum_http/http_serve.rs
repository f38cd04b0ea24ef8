use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Result;
use axum::{
    Router,
    http::{
        HeaderName, Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::get,
};
use entitlement_core::{
    infra::db::postgres::postgres_connection::PgPoolSquad, payments::stripe_client::StripeClient,
};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use crate::{
    axum_http::{
        default_routers,
        routers::{
            self,
            billing_webhook::{PostgresBillingWebhookUseCase, STRIPE_SIGNATURE_HEADER},
        },
    },
    config::config_model::DotEnvyConfig,
};

const RECONCILIATION_SAMPLE: i64 = 20;

pub async fn start(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Result<()> {
    let stripe_client = Arc::new(StripeClient::new(
        config.stripe.secret_key.clone(),
        config.stripe.webhook_secret.clone(),
    ));

    let billing_usecase =
        routers::billing_webhook::build_usecase(Arc::clone(&db_pool), stripe_client);
    report_reconciliation_backlog(&billing_usecase).await;

    let app = Router::new()
        .fallback(default_routers::not_found)
        .nest(
            "/api/v1/billing",
            routers::billing_webhook::routes(billing_usecase),
        )
        .nest(
            "/api/v1/plan",
            routers::plan_status::routes(Arc::clone(&db_pool)),
        )
        .route("/api/v1/health-check", get(default_routers::health_check))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.backend_server.timeout,
        )))
        .layer(RequestBodyLimitLayer::new(
            (config.backend_server.body_limit * 1024 * 1024).try_into()?,
        ))
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([
                    AUTHORIZATION,
                    CONTENT_TYPE,
                    HeaderName::from_static(STRIPE_SIGNATURE_HEADER),
                ])
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.backend_server.port));
    let listener = TcpListener::bind(addr).await?;

    info!("Server is running on port {}", config.backend_server.port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Failed ledger rows are never redelivered; surface them so they can be replayed by hand.
async fn report_reconciliation_backlog(usecase: &PostgresBillingWebhookUseCase) {
    match usecase.pending_reconciliation(RECONCILIATION_SAMPLE).await {
        Ok(failed) if failed.is_empty() => info!("billing_webhook: no failed events pending"),
        Ok(failed) => {
            for event in &failed {
                warn!(
                    event_id = %event.event_id,
                    event_type = %event.event_type,
                    processed_at = %event.processed_at,
                    error_message = ?event.error_message,
                    "billing_webhook: failed event awaiting reconciliation"
                );
            }
        }
        Err(err) => error!(
            error = ?err,
            "billing_webhook: failed to read reconciliation backlog"
        ),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
