use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::admin::AdminState;
use crate::failover::{MaintenanceReport, ManagerSnapshot, TargetSnapshot};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub manager: ManagerSnapshot,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let manager = state.manager.snapshot();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: if manager.closed { "closed" } else { "operational" },
        manager,
    })
}

pub async fn get_targets(State(state): State<AdminState>) -> Json<Vec<TargetSnapshot>> {
    Json(state.manager.snapshot().targets)
}

pub async fn enable_target(
    State(state): State<AdminState>,
    Path(address): Path<String>,
) -> Result<Json<TargetSnapshot>, StatusCode> {
    set_disabled(&state, &address, false)
}

pub async fn disable_target(
    State(state): State<AdminState>,
    Path(address): Path<String>,
) -> Result<Json<TargetSnapshot>, StatusCode> {
    set_disabled(&state, &address, true)
}

fn set_disabled(state: &AdminState, address: &str, disabled: bool) -> Result<Json<TargetSnapshot>, StatusCode> {
    if !state.manager.set_disabled(address, disabled) {
        return Err(StatusCode::NOT_FOUND);
    }
    state
        .manager
        .snapshot()
        .targets
        .into_iter()
        .find(|t| t.address == address)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

pub async fn run_maintenance(State(state): State<AdminState>) -> Json<MaintenanceReport> {
    Json(state.manager.run_maintenance().await)
}
