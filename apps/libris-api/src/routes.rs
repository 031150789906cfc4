//! Health and catalog routes.
//!
//! Holdings display is best-effort and always answers 200; a failing ILS
//! yields empty groups. New-item searches are cached per session and do
//! report ILS failures.

use crate::state::CatalogState;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use libris_holdings::RecordHoldings;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Header carrying the discovery session the new-items cache is keyed on.
pub const SESSION_HEADER: &str = "X-Session-Id";

/// Session used when the caller sends none.
const ANONYMOUS_SESSION: &str = "anonymous";

/// Most records one batch holdings request may name.
pub const MAX_BATCH_RECORDS: usize = 50;

const DEFAULT_DAYS_OLD: u32 = 30;
const MAX_DAYS_OLD: u32 = 365;

/// Error response body, same shape as the other routers.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    status: u16,
}

fn error_response(status: StatusCode, error: &'static str, message: String) -> Response {
    let body = ErrorBody {
        error,
        message,
        status: status.as_u16(),
    };
    (status, Json(body)).into_response()
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_seconds: u64,
    dialect: &'static str,
}

async fn health_handler(State(state): State<CatalogState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        dialect: state.driver.dialect(),
    })
}

async fn record_holdings_handler(
    State(state): State<CatalogState>,
    Path(record_id): Path<String>,
) -> Json<RecordHoldings> {
    let groups = state.holdings.holdings_for_record(&record_id, None).await;
    Json(RecordHoldings { record_id, groups })
}

#[derive(Debug, Deserialize)]
struct BatchQuery {
    /// Comma-separated record ids.
    ids: Option<String>,
}

async fn batch_holdings_handler(
    State(state): State<CatalogState>,
    Query(query): Query<BatchQuery>,
) -> Response {
    let ids: Vec<String> = query
        .ids
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(String::from)
        .collect();
    if ids.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "ids must name at least one record".to_string(),
        );
    }
    if ids.len() > MAX_BATCH_RECORDS {
        return error_response(
            StatusCode::BAD_REQUEST,
            "validation_error",
            format!("ids may name at most {MAX_BATCH_RECORDS} records"),
        );
    }
    Json(state.holdings.holdings_for_records(&ids, None).await).into_response()
}

#[derive(Debug, Deserialize)]
struct NewItemsQuery {
    days: Option<u32>,
}

#[derive(Debug, Serialize)]
struct NewItemsResponse {
    days_old: u32,
    record_ids: Arc<Vec<String>>,
}

async fn new_items_handler(
    State(state): State<CatalogState>,
    headers: HeaderMap,
    Query(query): Query<NewItemsQuery>,
) -> Response {
    let days_old = query.days.unwrap_or(DEFAULT_DAYS_OLD);
    if days_old == 0 || days_old > MAX_DAYS_OLD {
        return error_response(
            StatusCode::BAD_REQUEST,
            "validation_error",
            format!("days must be between 1 and {MAX_DAYS_OLD}"),
        );
    }
    let session = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(ANONYMOUS_SESSION);

    match state
        .new_items
        .get_or_fetch(session, days_old, state.driver.as_ref())
        .await
    {
        Ok(record_ids) => Json(NewItemsResponse {
            days_old,
            record_ids,
        })
        .into_response(),
        Err(e) => {
            tracing::warn!(days_old, error = %e, "New items search failed");
            error_response(StatusCode::BAD_GATEWAY, "ils_error", e.to_string())
        }
    }
}

/// `GET /health`, `GET /records/:record_id/holdings`,
/// `GET /records/holdings?ids=`, `GET /records/new?days=`.
pub fn catalog_router(state: CatalogState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/records/holdings", get(batch_holdings_handler))
        .route("/records/new", get(new_items_handler))
        .route("/records/:record_id/holdings", get(record_holdings_handler))
        .with_state(state)
}
