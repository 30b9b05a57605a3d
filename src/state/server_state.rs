use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use crate::handlers::notify::Notifier;
use crate::state::client::ClientHandle;
use crate::state::error::{Departure, LobbyError, Transfer};
use crate::state::lobby::{lobby_flags, Lobby, LobbySettings, MAX_LOBBY_CLIENTS};
use crate::utils::config::Config;
use crate::utils::text::parse_serial_number;

pub const LOBBY_FULL_MESSAGE: &str = "Can't change lobby\n\nThe lobby is full.";

/// Registry maps and ID counters - everything behind the registry lock
struct Registry {
    id_to_lobby: BTreeMap<i64, Arc<Lobby>>,
    name_to_lobby: HashMap<String, Arc<Lobby>>,
    next_lobby_id: i64,
    next_game_id: i64,
}

fn check_lobby_size(max_clients: usize) -> Result<(), LobbyError> {
    if max_clients > MAX_LOBBY_CLIENTS {
        return Err(LobbyError::TooManySlots(max_clients));
    }
    Ok(())
}

/// Server-wide lobby registry.
///
/// Lock order: the registry lock is always taken before any lobby lock.
pub struct ServerState {
    registry: RwLock<Registry>,
    notifier: Arc<dyn Notifier>,
}

impl ServerState {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            registry: RwLock::new(Registry {
                id_to_lobby: BTreeMap::new(),
                name_to_lobby: HashMap::new(),
                next_lobby_id: 1,
                next_game_id: -1,
            }),
            notifier,
        }
    }

    /// Registry prepopulated with the persistent public lobbies
    pub async fn with_default_lobbies(config: &Config, notifier: Arc<dyn Notifier>) -> Result<Self, LobbyError> {
        check_lobby_size(config.max_clients_per_lobby)?;
        let state = Self::new(notifier);
        let default_flags = lobby_flags::PUBLIC | lobby_flags::DEFAULT;
        for _ in 0..config.default_lobby_count {
            let settings = LobbySettings::with_flags(default_flags);
            state
                .add_lobby(Arc::new(Lobby::new_lobby("", config.max_clients_per_lobby, settings)))
                .await?;
        }
        for _ in 0..config.episode3_lobby_count {
            let settings = LobbySettings::with_flags(default_flags | lobby_flags::EPISODE_3);
            state
                .add_lobby(Arc::new(Lobby::new_lobby("", config.max_clients_per_lobby, settings)))
                .await?;
        }
        log::info!("Registered {} default lobbies", config.total_default_lobbies());
        Ok(state)
    }

    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    /// Assign the lobby an ID and register it; returns the ID.
    /// The counter step is consumed even if registration fails.
    pub async fn add_lobby(&self, lobby: Arc<Lobby>) -> Result<i64, LobbyError> {
        let mut registry = self.registry.write().await;

        let lobby_id = if lobby.is_game() {
            let id = registry.next_game_id;
            registry.next_game_id -= 1;
            id
        } else {
            let id = registry.next_lobby_id;
            registry.next_lobby_id += 1;
            id
        };
        lobby.set_lobby_id(lobby_id);

        if registry.id_to_lobby.contains_key(&lobby_id) {
            log::error!("Lobby ID {} assigned twice", lobby_id);
            return Err(LobbyError::DuplicateId(lobby_id));
        }
        let name = lobby.name().to_string();
        if !name.is_empty() && registry.name_to_lobby.contains_key(&name) {
            return Err(LobbyError::DuplicateName(name));
        }

        log::debug!("Registered lobby {} {:?}", lobby_id, name);
        if !name.is_empty() {
            registry.name_to_lobby.insert(name, lobby.clone());
        }
        registry.id_to_lobby.insert(lobby_id, lobby);
        Ok(lobby_id)
    }

    /// Build and register a game.
    pub async fn create_game(
        &self,
        name: &str,
        max_clients: usize,
        settings: LobbySettings,
    ) -> Result<Arc<Lobby>, LobbyError> {
        check_lobby_size(max_clients)?;
        let game = Arc::new(Lobby::new_game(name, max_clients, settings));
        let game_id = self.add_lobby(game.clone()).await?;
        log::info!("Created game {} {:?}", game_id, game.name());
        Ok(game)
    }

    pub async fn remove_lobby(&self, lobby_id: i64) {
        let mut registry = self.registry.write().await;
        Self::unregister(&mut registry, lobby_id);
    }

    /// Remove the lobby only if nobody is in it; returns true if it was removed
    pub async fn remove_lobby_if_empty(&self, lobby_id: i64) -> bool {
        let mut registry = self.registry.write().await;
        let Some(lobby) = registry.id_to_lobby.get(&lobby_id).cloned() else {
            return false;
        };
        let mut state = lobby.write().await;
        if state.count_clients() > 0 {
            return false;
        }
        state.closed = true;
        drop(state);
        Self::unregister(&mut registry, lobby_id);
        true
    }

    fn unregister(registry: &mut Registry, lobby_id: i64) {
        let Some(lobby) = registry.id_to_lobby.remove(&lobby_id) else {
            return;
        };
        if !lobby.name().is_empty() {
            registry.name_to_lobby.remove(lobby.name());
        }
        log::info!("Removed lobby {}", lobby_id);
    }

    pub async fn find_lobby(&self, lobby_id: i64) -> Result<Arc<Lobby>, LobbyError> {
        self.registry
            .read()
            .await
            .id_to_lobby
            .get(&lobby_id)
            .cloned()
            .ok_or(LobbyError::NotFound("lobby"))
    }

    pub async fn find_lobby_by_name(&self, name: &str) -> Result<Arc<Lobby>, LobbyError> {
        self.registry
            .read()
            .await
            .name_to_lobby
            .get(name)
            .cloned()
            .ok_or(LobbyError::NotFound("lobby"))
    }

    /// Snapshot of every registered lobby in ID order
    pub async fn all_lobbies(&self) -> Vec<Arc<Lobby>> {
        self.registry.read().await.id_to_lobby.values().cloned().collect()
    }

    pub async fn lobby_count(&self) -> usize {
        self.registry.read().await.id_to_lobby.len()
    }

    /// Put the client in the lowest-ID public lobby with room
    pub async fn add_client_to_available_lobby(&self, client: &ClientHandle) -> Result<Arc<Lobby>, LobbyError> {
        let lobby = {
            let registry = self.registry.read().await;
            let mut joined = None;
            for lobby in registry.id_to_lobby.range(0..).map(|(_, l)| l) {
                if !lobby.read().await.settings.has_flag(lobby_flags::PUBLIC) {
                    continue;
                }
                if lobby.add_client(client).await.is_ok() {
                    joined = Some(lobby.clone());
                    break;
                }
            }
            joined.ok_or(LobbyError::AllLobbiesFull)?
        };

        log::info!(
            "'{}' joined lobby {} as client {}",
            client.name,
            lobby.lobby_id(),
            client.lobby_client_id()
        );
        self.send_lobby_join_notifications(&lobby, client).await;
        Ok(lobby)
    }

    /// Remove the client from its lobby and tell the remaining occupants.
    /// An emptied game is dropped from the registry.
    pub async fn remove_client_from_lobby(&self, client: &ClientHandle) -> Result<Departure, LobbyError> {
        let lobby_id = client.lobby_id().ok_or(LobbyError::NotFound("lobby"))?;
        let lobby = self.find_lobby(lobby_id).await?;

        let departure = lobby.remove_client(client).await?;
        log::info!("'{}' left lobby {}", client.name, lobby_id);
        self.send_lobby_leave_notifications(&lobby, client.lobby_client_id()).await;

        if departure.is_empty() && lobby.is_game() {
            self.remove_lobby_if_empty(lobby_id).await;
        }
        Ok(departure)
    }

    /// Move the client to `destination`, or just add it if it is in no lobby.
    /// A full destination leaves the client where it was and sends it a message.
    pub async fn change_client_lobby(&self, client: &ClientHandle, destination: &Arc<Lobby>) -> Result<(), LobbyError> {
        let old_slot = client.lobby_client_id();
        let current = match client.lobby_id() {
            Some(lobby_id) => self.find_lobby(lobby_id).await.ok(),
            None => None,
        };

        let result = match &current {
            Some(current) => current.move_client_to_lobby(destination, client).await,
            None => destination.add_client(client).await.map(|_| Transfer::Unchanged),
        };

        let transfer = match result {
            Ok(transfer) => transfer,
            Err(LobbyError::Full) => {
                log::info!("'{}' cannot join lobby {}: full", client.name, destination.lobby_id());
                if let Err(e) = self.notifier.notify_message(client, LOBBY_FULL_MESSAGE) {
                    log::debug!("Failed to send lobby-full message to '{}': {}", client.name, e);
                }
                return Err(LobbyError::Full);
            }
            Err(e) => return Err(e),
        };

        if let Some(current) = &current {
            if Arc::ptr_eq(current, destination) {
                return Ok(());
            }
            self.send_lobby_leave_notifications(current, old_slot).await;
            if transfer == (Transfer::Moved { source: Departure::Empty }) && current.is_game() {
                self.remove_lobby_if_empty(current.lobby_id()).await;
            }
        }

        log::info!(
            "'{}' moved to lobby {} as client {}",
            client.name,
            destination.lobby_id(),
            client.lobby_client_id()
        );
        self.send_lobby_join_notifications(destination, client).await;
        Ok(())
    }

    /// Tell the joining client about the lobby and everyone else about the newcomer
    pub async fn send_lobby_join_notifications(&self, lobby: &Lobby, joining_client: &ClientHandle) {
        let state = lobby.read().await;
        for (_, other) in state.occupants() {
            let result = if Arc::ptr_eq(other, joining_client) {
                self.notifier.notify_joined(joining_client, lobby, &state)
            } else {
                self.notifier.notify_player_joined(other, lobby, &state, joining_client)
            };
            if let Err(e) = result {
                log::debug!("Failed to send join notification to '{}': {}", other.name, e);
            }
        }
    }

    pub async fn send_lobby_leave_notifications(&self, lobby: &Lobby, left_slot: usize) {
        let state = lobby.read().await;
        for (_, other) in state.occupants() {
            if let Err(e) = self.notifier.notify_player_left(other, lobby, left_slot) {
                log::debug!("Failed to send leave notification to '{}': {}", other.name, e);
            }
        }
    }

    /// Search the hint lobby first, then every other lobby.
    /// A numeric identifier doubles as a serial number when none is given.
    pub async fn find_client(
        &self,
        identifier: Option<&str>,
        serial_number: Option<u64>,
        hint: Option<&Arc<Lobby>>,
    ) -> Result<ClientHandle, LobbyError> {
        let serial_number = serial_number.or_else(|| identifier.and_then(parse_serial_number));

        if let Some(hint) = hint {
            if let Ok(client) = hint.find_client(identifier, serial_number).await {
                return Ok(client);
            }
        }

        for lobby in self.all_lobbies().await {
            if hint.is_some_and(|hint| Arc::ptr_eq(hint, &lobby)) {
                continue;
            }
            if let Ok(client) = lobby.find_client(identifier, serial_number).await {
                return Ok(client);
            }
        }
        Err(LobbyError::NotFound("client"))
    }
}
