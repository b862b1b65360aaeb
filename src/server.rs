//! HTTP front for the request handler.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Json, Router};
use serde_json::json;

use crate::handler::{JobRequest, RequestHandler};

pub const JOB_ROUTE: &str = "/v1/vaults/:vaultID/jobs/:jobID";

/// Every method on the job route reaches the handler.
pub fn build_router(handler: Arc<RequestHandler>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(JOB_ROUTE, any(job))
        .with_state(handler)
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn job(
    State(handler): State<Arc<RequestHandler>>,
    method: Method,
    Path((vault_id, job_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    let request = JobRequest {
        method: method.as_str().to_string(),
        job_id: job_id.into(),
        vault_id,
        authorization: header_value(header::AUTHORIZATION.as_str()),
        forwarded_for: header_value("x-forwarded-for"),
    };

    let response = handler.handle(request).await;
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if response.body.is_empty() {
        return status.into_response();
    }
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        response.body,
    )
        .into_response()
}
