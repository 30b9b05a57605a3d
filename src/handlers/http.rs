use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use crate::handlers::models::LobbyInfo;
use crate::state::server_state::ServerState;
use crate::state::sessions::Sessions;
use crate::utils::config::Config;
use std::sync::Arc;

/// Shared state for the HTTP and UDP handlers
#[derive(Clone)]
pub struct AppState {
    pub state: Arc<ServerState>,
    pub sessions: Arc<Sessions>,
    pub config: Arc<Config>,
}

/// Thin HTTP handler: Get lobby info
pub async fn get_lobby(
    State(app_state): State<AppState>,
    Path(lobby_id): Path<i64>,
) -> Result<Json<LobbyInfo>, StatusCode> {
    let lobby = app_state
        .state
        .find_lobby(lobby_id)
        .await
        .map_err(|_| StatusCode::NOT_FOUND)?;

    Ok(Json(LobbyInfo::snapshot(&lobby).await))
}

/// Thin HTTP handler: List all lobbies
pub async fn list_lobbies(State(app_state): State<AppState>) -> Json<Vec<LobbyInfo>> {
    let mut lobbies_info = Vec::new();

    // Registry lock is released before any lobby is read
    for lobby in app_state.state.all_lobbies().await {
        lobbies_info.push(LobbyInfo::snapshot(&lobby).await);
    }

    Json(lobbies_info)
}
