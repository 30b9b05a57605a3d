use serde::{Deserialize, Serialize};
use crate::state::lobby::{Lobby, LobbyState};

/// HTTP Response DTOs

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LobbyInfo {
    pub lobby_id: i64,
    pub name: String,
    pub is_game: bool,
    pub client_count: usize,
    pub max_clients: usize,
    pub leader_id: usize,
    pub flags: u32,
    pub players: Vec<PlayerInfo>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PlayerInfo {
    pub client_id: usize,
    pub name: String,
}

impl LobbyInfo {
    /// Snapshot of `lobby`; `state` must be that lobby's locked state
    pub fn from_state(lobby: &Lobby, state: &LobbyState) -> Self {
        Self {
            lobby_id: lobby.lobby_id(),
            name: lobby.name().to_string(),
            is_game: lobby.is_game(),
            client_count: state.count_clients(),
            max_clients: state.max_clients(),
            leader_id: state.leader_id(),
            flags: state.settings.flags,
            players: state
                .occupants()
                .map(|(slot, client)| PlayerInfo {
                    client_id: slot,
                    name: client.name.clone(),
                })
                .collect(),
        }
    }

    pub async fn snapshot(lobby: &Lobby) -> Self {
        let state = lobby.read().await;
        Self::from_state(lobby, &state)
    }
}
