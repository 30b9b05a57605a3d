use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use crate::handlers::http::AppState;
use crate::state::client::ClientHandle;
use crate::state::commands::{ClientCommand, LobbyTarget};
use crate::state::error::LobbyError;
use crate::state::lobby::{Lobby, LobbySettings};

pub const ALL_LOBBIES_FULL_MESSAGE: &str = "All lobbies are full.\n\nPlease try again later.";
pub const LOBBY_NOT_FOUND_MESSAGE: &str = "Can't change lobby\n\nThat lobby does not exist.";
pub const GAME_NAME_TAKEN_MESSAGE: &str = "Can't create game\n\nA game with that name already exists.";

/// Thin UDP packet handler - parses a control packet and applies it
pub async fn handle_udp_packet(packet: Value, addr: SocketAddr, app: &AppState) {
    let Some(cmd) = parse_command(&packet) else {
        log::debug!("Unknown packet from {}: {:?}", addr, packet.get("type"));
        return;
    };

    if !cmd.requires_session() {
        execute(cmd, None, addr, app).await;
        return;
    }

    match app.sessions.get(&addr) {
        Some(client) => execute(cmd, Some(client), addr, app).await,
        None => log::debug!("Packet from {} without a session: {:?}", addr, cmd),
    }
}

/// Parse UDP packet into ClientCommand
pub fn parse_command(packet: &Value) -> Option<ClientCommand> {
    let text = |key: &str| packet.get(key).and_then(|v| v.as_str()).map(str::to_string);
    let small = |key: &str, default: u8| {
        packet
            .get(key)
            .and_then(|v| v.as_u64())
            .and_then(|v| u8::try_from(v).ok())
            .unwrap_or(default)
    };

    match packet.get("type").and_then(|v| v.as_str())? {
        "hello" => Some(ClientCommand::Hello {
            name: text("name")?,
            serial_number: packet.get("serial").and_then(|v| v.as_u64()),
        }),
        "leave" => Some(ClientCommand::Leave),
        "change_lobby" => {
            let target = match packet.get("lobby_id").and_then(|v| v.as_i64()) {
                Some(id) => LobbyTarget::Id(id),
                None => LobbyTarget::Name(text("lobby_name")?),
            };
            Some(ClientCommand::ChangeLobby { target })
        }
        "create_game" => Some(ClientCommand::CreateGame {
            name: text("name").unwrap_or_default(),
            password: text("password").unwrap_or_default(),
            episode: small("episode", 1),
            difficulty: small("difficulty", 0),
        }),
        "loading" => Some(ClientCommand::SetLoading {
            loading: packet.get("value").and_then(|v| v.as_bool())?,
        }),
        _ => None,
    }
}

async fn execute(cmd: ClientCommand, client: Option<ClientHandle>, addr: SocketAddr, app: &AppState) {
    match (cmd, client) {
        (ClientCommand::Hello { name, serial_number }, _) => {
            let (client, previous) = app.sessions.connect(addr, &name, serial_number);
            if let Some(previous) = previous {
                leave_current_lobby(app, &previous).await;
            }
            match app.state.add_client_to_available_lobby(&client).await {
                Ok(lobby) => log::info!("Session {} '{}' placed in lobby {}", addr, name, lobby.lobby_id()),
                Err(e) => {
                    log::warn!("Session {} '{}' could not join a lobby: {}", addr, name, e);
                    send_message(app, &client, ALL_LOBBIES_FULL_MESSAGE);
                    app.sessions.disconnect(&addr);
                }
            }
        }
        (ClientCommand::Leave, Some(client)) => {
            app.sessions.disconnect(&addr);
            leave_current_lobby(app, &client).await;
            log::info!("Session {} '{}' closed", addr, client.name);
        }
        (ClientCommand::ChangeLobby { target }, Some(client)) => {
            let destination = match &target {
                LobbyTarget::Id(id) => app.state.find_lobby(*id).await,
                LobbyTarget::Name(name) => app.state.find_lobby_by_name(name).await,
            };
            let destination = match destination {
                Ok(lobby) => lobby,
                Err(_) => {
                    send_message(app, &client, LOBBY_NOT_FOUND_MESSAGE);
                    return;
                }
            };
            enter_lobby(app, &client, &destination).await;
        }
        (ClientCommand::CreateGame { name, password, episode, difficulty }, Some(client)) => {
            let settings = LobbySettings {
                password,
                episode,
                difficulty,
                ..LobbySettings::default()
            };
            let game = match app.state.create_game(&name, app.config.game_max_clients, settings).await {
                Ok(game) => game,
                Err(LobbyError::DuplicateName(_)) => {
                    send_message(app, &client, GAME_NAME_TAKEN_MESSAGE);
                    return;
                }
                Err(e) => {
                    log::error!("Game creation for '{}' failed: {}", client.name, e);
                    return;
                }
            };
            if let Err(e) = app.state.change_client_lobby(&client, &game).await {
                log::warn!("'{}' could not enter the game it created: {}", client.name, e);
                app.state.remove_lobby_if_empty(game.lobby_id()).await;
            }
        }
        (ClientCommand::SetLoading { loading }, Some(client)) => {
            client.set_loading(loading);
        }
        (cmd, None) => log::debug!("Dropped {:?} from {}: no session", cmd, addr),
    }
}

/// Move the client into `destination`, telling it why if that fails
async fn enter_lobby(app: &AppState, client: &ClientHandle, destination: &Arc<Lobby>) {
    match app.state.change_client_lobby(client, destination).await {
        Ok(()) | Err(LobbyError::Full) => {}
        // Torn down after it was looked up
        Err(LobbyError::NotFound(_)) => send_message(app, client, LOBBY_NOT_FOUND_MESSAGE),
        Err(e) => log::error!("Lobby change for '{}' failed: {}", client.name, e),
    }
}

async fn leave_current_lobby(app: &AppState, client: &ClientHandle) {
    if client.lobby_id().is_none() {
        return;
    }
    if let Err(e) = app.state.remove_client_from_lobby(client).await {
        log::warn!("Removing '{}' from its lobby failed: {}", client.name, e);
    }
}

fn send_message(app: &AppState, client: &ClientHandle, text: &str) {
    if let Err(e) = app.state.notifier().notify_message(client, text) {
        log::debug!("Failed to send message to '{}': {}", client.name, e);
    }
}
