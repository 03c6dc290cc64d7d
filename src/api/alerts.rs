use crate::api::rest::{ApiError, ApiResult};
use crate::db::models::Alert;
use crate::db::store::AlertStore;
use crate::security::SecurityService;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

pub const DEFAULT_LIMIT: i64 = 50;
pub const MAX_LIMIT: i64 = 500;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<i64>,
}

impl ListParams {
    fn effective_limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

/// Newest alerts first
pub async fn list_alerts(
    State(store): State<Arc<dyn AlertStore>>,
    State(security): State<Arc<SecurityService>>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Vec<Alert>>> {
    security.authorize_headers(&headers)?;
    let alerts = store.list_alerts(params.effective_limit()).await?;
    Ok(Json(alerts))
}

pub async fn get_alert(
    State(store): State<Arc<dyn AlertStore>>,
    State(security): State<Arc<SecurityService>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<Json<Alert>> {
    security.authorize_headers(&headers)?;
    let alert = store.get_alert(id).await?.ok_or_else(|| {
        ApiError::new(StatusCode::NOT_FOUND, format!("Alert not found: {}", id))
    })?;
    Ok(Json(alert))
}
