use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use crate::domain::lobbies;
use crate::state::client::{ClientHandle, Item};
use crate::state::error::{Departure, LobbyError, Transfer};
use crate::utils::buffers::{empty_slots, CounterVec, SlotVec};
use crate::utils::text::{truncate_fixed, FIXED_FIELD_CHARS};

/// Slot capacity used when none is configured
pub const DEFAULT_MAX_CLIENTS: usize = 12;

/// Largest slot table a lobby may have
pub const MAX_LOBBY_CLIENTS: usize = 0x100;

/// First item ID issued for slot 0; each later slot starts one stride higher
pub const ITEM_ID_SLOT_BASE: u32 = 0x0001_0000;
/// Widest per-slot item-ID range
pub const ITEM_ID_SLOT_STRIDE: u32 = 0x0020_0000;
/// First item ID issued for game-owned items; slot ranges all end below it
pub const GAME_ITEM_ID_BASE: u32 = 0x0200_0000;

/// Width of each slot's item-ID range in a lobby with `max_clients` slots.
/// The slot ranges together never reach `GAME_ITEM_ID_BASE`.
pub fn item_id_stride(max_clients: usize) -> u32 {
    let slots = u32::try_from(max_clients.max(1)).unwrap_or(u32::MAX);
    ((GAME_ITEM_ID_BASE - ITEM_ID_SLOT_BASE) / slots).min(ITEM_ID_SLOT_STRIDE)
}

/// First item ID of `slot`'s range, or None if it would leave the slot space
pub fn slot_item_id_base(slot: usize, stride: u32) -> Option<u32> {
    let base = u32::try_from(slot)
        .ok()?
        .checked_mul(stride)?
        .checked_add(ITEM_ID_SLOT_BASE)?;
    (base.checked_add(stride)? <= GAME_ITEM_ID_BASE).then_some(base)
}

/// Lobby flag bits
pub mod lobby_flags {
    pub const PUBLIC: u32 = 0x0000_0001;
    pub const DEFAULT: u32 = 0x0000_0002;
    pub const EPISODE_3: u32 = 0x0000_0004;
    pub const CHEATS_ENABLED: u32 = 0x0000_0008;
    pub const QUEST_IN_PROGRESS: u32 = 0x0000_0010;
}

/// Provisional ID a game carries until the registry assigns a real one
const PROVISIONAL_GAME_ID: i64 = -1;

static NEXT_LOBBY_SEQ: AtomicU64 = AtomicU64::new(1);

/// Game configuration stored with a lobby. None of it is interpreted here except `flags`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbySettings {
    pub min_level: u32,
    pub max_level: u32,
    pub version: u8,
    pub section_id: u8,
    pub episode: u8,
    pub difficulty: u8,
    pub mode: u8,
    pub event: u8,
    pub block: u8,
    pub lobby_type: u8,
    pub flags: u32,
    pub variations: [u32; 0x20],
    pub loading_quest_id: u32,
    pub password: String,
}

impl Default for LobbySettings {
    fn default() -> Self {
        Self {
            min_level: 0,
            max_level: u32::MAX,
            version: 0,
            section_id: 0,
            episode: 1,
            difficulty: 0,
            mode: 0,
            event: 0,
            block: 0,
            lobby_type: 0,
            flags: 0,
            variations: [0; 0x20],
            loading_quest_id: 0,
            password: String::new(),
        }
    }
}

impl LobbySettings {
    pub fn with_flags(flags: u32) -> Self {
        Self { flags, ..Self::default() }
    }

    pub fn has_flag(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }
}

/// Mutable lobby state - everything behind the lobby lock
#[derive(Debug)]
pub struct LobbyState {
    pub(crate) clients: SlotVec,
    pub(crate) leader_id: usize,
    pub(crate) next_item_id: CounterVec,
    pub(crate) item_id_stride: u32,
    pub(crate) next_game_item_id: u32,
    pub(crate) floor_items: HashMap<u32, Item>,
    /// Set once the lobby has been dropped from the registry; no one may join after
    pub(crate) closed: bool,
    pub settings: LobbySettings,
}

impl LobbyState {
    pub(crate) fn new(max_clients: usize, settings: LobbySettings) -> Self {
        if max_clients > MAX_LOBBY_CLIENTS {
            log::warn!("Lobby size {} capped at {}", max_clients, MAX_LOBBY_CLIENTS);
        }
        let max_clients = max_clients.min(MAX_LOBBY_CLIENTS);
        let stride = item_id_stride(max_clients);
        Self {
            clients: empty_slots(max_clients),
            leader_id: 0,
            next_item_id: (0..max_clients)
                .map_while(|slot| slot_item_id_base(slot, stride))
                .collect(),
            item_id_stride: stride,
            next_game_item_id: GAME_ITEM_ID_BASE,
            floor_items: HashMap::new(),
            closed: false,
            settings,
        }
    }

    pub fn max_clients(&self) -> usize {
        self.clients.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn leader_id(&self) -> usize {
        self.leader_id
    }

    pub fn client(&self, slot: usize) -> Option<&ClientHandle> {
        self.clients.get(slot).and_then(Option::as_ref)
    }

    /// Occupied slots in increasing index order
    pub fn occupants(&self) -> impl Iterator<Item = (usize, &ClientHandle)> {
        self.clients
            .iter()
            .enumerate()
            .filter_map(|(slot, c)| c.as_ref().map(|c| (slot, c)))
    }

    pub fn count_clients(&self) -> usize {
        self.clients.iter().filter(|c| c.is_some()).count()
    }

    pub fn floor_item(&self, item_id: u32) -> Option<&Item> {
        self.floor_items.get(&item_id)
    }

    pub fn floor_item_count(&self) -> usize {
        self.floor_items.len()
    }

    /// Next item ID for `owner_slot`, or a game-owned ID if the slot is out of range
    pub fn generate_item_id(&mut self, owner_slot: usize) -> u32 {
        lobbies::generate_item_id(self, owner_slot)
    }

    pub fn assign_item_ids_for_player(&mut self, slot: usize, inventory: &mut [Item]) {
        lobbies::assign_item_ids_for_player(self, slot, inventory)
    }
}

/// A public lobby or a game instance.
///
/// `seq` gives a stable total order over lobbies; any code that locks two
/// lobbies must lock the lower `seq` first.
#[derive(Debug)]
pub struct Lobby {
    seq: u64,
    lobby_id: AtomicI64,
    name: String,
    state: RwLock<LobbyState>,
}

impl Lobby {
    /// A public lobby; the registry assigns its ID
    pub fn new_lobby(name: &str, max_clients: usize, settings: LobbySettings) -> Self {
        Self::build(0, name, max_clients, settings)
    }

    /// A game instance; the registry assigns its (negative) ID
    pub fn new_game(name: &str, max_clients: usize, settings: LobbySettings) -> Self {
        Self::build(PROVISIONAL_GAME_ID, name, max_clients, settings)
    }

    fn build(lobby_id: i64, name: &str, max_clients: usize, mut settings: LobbySettings) -> Self {
        settings.password = truncate_fixed(&settings.password, FIXED_FIELD_CHARS);
        Self {
            seq: NEXT_LOBBY_SEQ.fetch_add(1, Ordering::Relaxed),
            lobby_id: AtomicI64::new(lobby_id),
            name: truncate_fixed(name, FIXED_FIELD_CHARS),
            state: RwLock::new(LobbyState::new(max_clients, settings)),
        }
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn lobby_id(&self) -> i64 {
        self.lobby_id.load(Ordering::Acquire)
    }

    pub(crate) fn set_lobby_id(&self, lobby_id: i64) {
        self.lobby_id.store(lobby_id, Ordering::Release);
    }

    pub fn is_game(&self) -> bool {
        self.lobby_id() < 0
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, LobbyState> {
        self.state.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, LobbyState> {
        self.state.write().await
    }

    pub async fn max_clients(&self) -> usize {
        self.state.read().await.max_clients()
    }

    pub async fn leader_id(&self) -> usize {
        self.state.read().await.leader_id
    }

    pub async fn count_clients(&self) -> usize {
        self.state.read().await.count_clients()
    }

    pub async fn any_client_loading(&self) -> bool {
        self.state.read().await.occupants().any(|(_, c)| c.is_loading())
    }

    /// Snapshot of occupied slots
    pub async fn occupants(&self) -> Vec<(usize, ClientHandle)> {
        self.state
            .read()
            .await
            .occupants()
            .map(|(slot, c)| (slot, c.clone()))
            .collect()
    }

    pub async fn settings(&self) -> LobbySettings {
        self.state.read().await.settings.clone()
    }

    pub async fn update_settings<F: FnOnce(&mut LobbySettings)>(&self, f: F) {
        f(&mut self.state.write().await.settings);
    }

    /// Put `client` in the first free slot; returns the slot index
    pub async fn add_client(&self, client: &ClientHandle) -> Result<usize, LobbyError> {
        let mut state = self.state.write().await;
        lobbies::add_client(&mut state, self.lobby_id(), client)
    }

    pub async fn remove_client(&self, client: &ClientHandle) -> Result<Departure, LobbyError> {
        let mut state = self.state.write().await;
        lobbies::remove_client(&mut state, client)
    }

    /// Move `client` from this lobby to `destination` as one step.
    /// On failure the client stays where it was.
    pub async fn move_client_to_lobby(
        &self,
        destination: &Lobby,
        client: &ClientHandle,
    ) -> Result<Transfer, LobbyError> {
        if self.seq == destination.seq {
            return Ok(Transfer::Unchanged);
        }

        let (mut source_state, mut dest_state) = if self.seq < destination.seq {
            let source_state = self.state.write().await;
            let dest_state = destination.state.write().await;
            (source_state, dest_state)
        } else {
            let dest_state = destination.state.write().await;
            let source_state = self.state.write().await;
            (source_state, dest_state)
        };

        let old_slot = lobbies::slot_of(&source_state, client)?;
        lobbies::add_client(&mut dest_state, destination.lobby_id(), client)?;
        let departure = lobbies::vacate_slot(&mut source_state, old_slot);
        Ok(Transfer::Moved { source: departure })
    }

    pub async fn find_client(
        &self,
        identifier: Option<&str>,
        serial_number: Option<u64>,
    ) -> Result<ClientHandle, LobbyError> {
        let state = self.state.read().await;
        lobbies::find_client(&state, identifier, serial_number)
    }

    pub async fn add_item(&self, item: Item) {
        let mut state = self.state.write().await;
        lobbies::add_item(&mut state, item)
    }

    pub async fn remove_item(&self, item_id: u32) -> Result<Item, LobbyError> {
        let mut state = self.state.write().await;
        lobbies::remove_item(&mut state, item_id)
    }

    pub async fn assign_item_ids_for_player(&self, slot: usize, inventory: &mut [Item]) {
        self.state.write().await.assign_item_ids_for_player(slot, inventory)
    }
}

/// Map a lobby event code into the game event code space
pub fn game_event_for_lobby_event(lobby_event: u8) -> u8 {
    match lobby_event {
        e if e > 7 => 0,
        7 => 2,
        2 => 0,
        e => e,
    }
}
