//! Basic handlers - health check and station listing.

use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::json;

use super::ServerState;
use crate::hub::StationInfo;

/// Health check handler.
pub async fn health_handler(State(state): State<ServerState>) -> Json<serde_json::Value> {
    let uptime = chrono::Utc::now().timestamp() - state.started_at;
    Json(json!({
        "status": "ok",
        "service": "rfidhub",
        "version": rfidhub_core::VERSION,
        "uptime": uptime.max(0),
        "stations": state.hub.len(),
    }))
}

#[derive(Debug, Clone, Serialize)]
pub struct StationsResponse {
    pub stations: Vec<StationInfo>,
    pub count: usize,
}

/// List connected stations.
pub async fn stations_handler(State(state): State<ServerState>) -> Json<StationsResponse> {
    let stations = state.hub.stations();
    Json(StationsResponse {
        count: stations.len(),
        stations,
    })
}
