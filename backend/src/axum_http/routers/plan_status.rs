use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use entitlement_core::{
    domain::{
        repositories::{app_users::AppUserRepository, usage::UsageRepository},
        value_objects::enums::resource_kinds::ResourceKind,
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{app_users::AppUserPostgres, usage::UsagePostgres},
    },
};
use serde::Serialize;

use crate::{
    auth::AuthUser,
    axum_http::error_responses::ErrorResponse,
    usecases::plan_status::PlanStatusUseCase,
};

#[derive(Debug, Serialize)]
pub struct CapacityResponse {
    pub resource_kind: ResourceKind,
    pub allowed: bool,
}

pub fn routes(db_pool: Arc<PgPoolSquad>) -> Router {
    let app_user_repository = AppUserPostgres::new(Arc::clone(&db_pool));
    let usage_repository = UsagePostgres::new(Arc::clone(&db_pool));

    let usecase =
        PlanStatusUseCase::new(Arc::new(app_user_repository), Arc::new(usage_repository));

    Router::new()
        .route(
            "/status",
            get(get_plan_status::<AppUserPostgres, UsagePostgres>),
        )
        .route(
            "/capacity/:resource_kind",
            get(check_capacity::<AppUserPostgres, UsagePostgres>),
        )
        .with_state(Arc::new(usecase))
}

pub async fn get_plan_status<U, R>(
    State(usecase): State<Arc<PlanStatusUseCase<U, R>>>,
    AuthUser { user_id, .. }: AuthUser,
) -> impl IntoResponse
where
    U: AppUserRepository + Send + Sync + 'static,
    R: UsageRepository + Send + Sync + 'static,
{
    match usecase.get_plan_status(user_id).await {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn check_capacity<U, R>(
    State(usecase): State<Arc<PlanStatusUseCase<U, R>>>,
    AuthUser { user_id, .. }: AuthUser,
    Path(resource_kind): Path<String>,
) -> impl IntoResponse
where
    U: AppUserRepository + Send + Sync + 'static,
    R: UsageRepository + Send + Sync + 'static,
{
    let Some(resource_kind) = ResourceKind::from_str(&resource_kind) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                code: StatusCode::BAD_REQUEST.as_u16(),
                message: format!("Unknown resource kind: {resource_kind}"),
            }),
        )
            .into_response();
    };

    match usecase.require_capacity(user_id, resource_kind).await {
        Ok(()) => (
            StatusCode::OK,
            Json(CapacityResponse {
                resource_kind,
                allowed: true,
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}
