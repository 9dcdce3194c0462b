use std::sync::Arc;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use shared::protocol::API_PREFIX;
use shared::types::DeviceRecord;
use crate::cache_manager::CacheHandle;
use crate::config::{CacheConfig, Config};

#[derive(Clone)]
pub struct AppState {
    pub cache: CacheHandle,
    pub config: Arc<Config>,
}

#[derive(Serialize)]
pub struct ConfigResponse {
    pub cache: CacheConfig,
    pub ignore_byebye: bool,
    pub interfaces: Vec<String>,
}

#[derive(Deserialize)]
pub struct DeviceQuery {
    #[serde(rename = "type")]
    pub service_type: Option<String>,
}

/// Read-only view of the cache
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(&format!("{API_PREFIX}/config"), get(get_config))
        .route(&format!("{API_PREFIX}/devices"), get(get_devices))
        .route(&format!("{API_PREFIX}/devices/:usn"), get(get_device))
        .with_state(state)
}

async fn get_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    Json(ConfigResponse {
        cache: state.config.cache.clone(),
        ignore_byebye: state.config.relay.ignore_byebye,
        interfaces: state.config.relay.interfaces.iter().map(|i| i.to_string()).collect(),
    })
}

async fn get_devices(
    State(state): State<AppState>,
    Query(params): Query<DeviceQuery>,
) -> Result<Json<Vec<DeviceRecord>>, StatusCode> {
    let devices = if let Some(service_type) = params.service_type {
        state.cache.get_by_type(service_type).await
    } else {
        state.cache.get_all().await
    };

    devices
        .map(Json)
        .map_err(|e| {
            tracing::error!("Failed to query devices: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

async fn get_device(
    State(state): State<AppState>,
    Path(usn): Path<String>,
) -> Result<Json<DeviceRecord>, StatusCode> {
    state
        .cache
        .get_one(usn)
        .await
        .map_err(|e| {
            tracing::error!("Failed to query device: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}
