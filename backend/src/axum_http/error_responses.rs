use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::usecases::{plan_status::PlanError, webhook_ingress::WebhookError};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct LimitReachedResponse {
    pub code: u16,
    pub message: String,
    pub current_count: i64,
    pub limit: i64,
}

fn status_of(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn error_body(status: StatusCode, message: String) -> Response {
    let body = Json(ErrorResponse {
        code: status.as_u16(),
        message,
    });

    (status, body).into_response()
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = status_of(self.status_code());
        let message = match self {
            WebhookError::InfrastructureFailure(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        error_body(status, message)
    }
}

impl IntoResponse for PlanError {
    fn into_response(self) -> Response {
        let status = status_of(self.status_code());
        match self {
            PlanError::LimitReached {
                current_count,
                limit,
            } => {
                let body = Json(LimitReachedResponse {
                    code: status.as_u16(),
                    message: "Plan limit reached".to_string(),
                    current_count,
                    limit,
                });
                (status, body).into_response()
            }
            // Internal details stay in the logs.
            PlanError::Internal(_) => error_body(status, "Internal server error".to_string()),
            PlanError::UserNotFound => error_body(status, "User not found".to_string()),
        }
    }
}
