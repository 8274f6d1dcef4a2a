use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use kubelog_types::{ContainerList, TailResponse, VersionInfo};

use crate::auth::API_KEY_HEADER;
use crate::error::ApiError;
use crate::AppState;

/// Query parameters shared by the HTTP routes. `lines` stays a string so a
/// malformed value falls back to the default instead of rejecting.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RouteQuery {
    pub key: Option<String>,
    pub lines: Option<String>,
}

/// Parse a tail hint, falling back to `default` when absent, non-numeric,
/// or not positive
pub fn parse_tail_lines(raw: Option<&str>, default: i64) -> i64 {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(default)
}

fn header_key(headers: &HeaderMap) -> Option<&str> {
    headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok())
}

pub(crate) async fn healthcheck() -> &'static str {
    "still alive"
}

pub(crate) async fn version() -> Json<VersionInfo> {
    Json(VersionInfo {
        name: "kubelog".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Whole-namespace tail as plain text
pub(crate) async fn legacy_logs(
    State(state): State<AppState>,
    Query(query): Query<RouteQuery>,
    headers: HeaderMap,
) -> Response {
    if let Err(e) = state.auth.check(query.key.as_deref(), header_key(&headers)) {
        return e.into_text_response();
    }

    let lines = parse_tail_lines(query.lines.as_deref(), state.config.legacy_tail_lines);
    match state.cluster.tail_all(lines).await {
        Ok(output) => output.into_response(),
        Err(e) => {
            tracing::error!("legacy tail failed: {e:#}");
            ApiError::Cluster(e).into_text_response()
        }
    }
}

pub(crate) async fn tail_logs(
    State(state): State<AppState>,
    Path((pod, container)): Path<(String, String)>,
    Query(query): Query<RouteQuery>,
    headers: HeaderMap,
) -> Result<Json<TailResponse>, ApiError> {
    state.auth.check(query.key.as_deref(), header_key(&headers))?;

    let lines = parse_tail_lines(query.lines.as_deref(), state.config.tail_lines);
    let logs = state.cluster.tail(&pod, &container, lines).await?;

    Ok(Json(TailResponse {
        pod,
        container,
        logs,
    }))
}

pub(crate) async fn list_containers(
    State(state): State<AppState>,
    Query(query): Query<RouteQuery>,
    headers: HeaderMap,
) -> Result<Json<ContainerList>, ApiError> {
    state.auth.check(query.key.as_deref(), header_key(&headers))?;

    let containers = state.cluster.list_containers().await?;

    Ok(Json(ContainerList {
        namespace: state.cluster.namespace().to_string(),
        containers,
    }))
}
