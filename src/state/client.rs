use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

/// `lobby_id` value meaning "not in any lobby"
pub const NO_LOBBY: i64 = 0;

/// Client flag bits
pub mod client_flags {
    pub const LOADING: u32 = 0x0000_0001;
}

/// Shared handle to a connected client. Lobby slots hold these.
pub type ClientHandle = Arc<Client>;

/// Opaque item as carried in inventories and on the floor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Item {
    pub item_id: u32,
    pub data: [u8; 16],
}

impl Item {
    pub fn new(item_id: u32, data: [u8; 16]) -> Self {
        Self { item_id, data }
    }
}

/// A connected client.
///
/// Identity fields are fixed at connect time. The lobby back-references are
/// written by the lobby that holds the client, under that lobby's write lock.
#[derive(Debug)]
pub struct Client {
    pub name: String,
    pub serial_number: Option<u64>,
    pub address: Option<SocketAddr>,
    lobby_id: AtomicI64,
    lobby_client_id: AtomicUsize,
    flags: AtomicU32,
}

impl Client {
    pub fn new(name: impl Into<String>, serial_number: Option<u64>) -> Self {
        Self {
            name: name.into(),
            serial_number,
            address: None,
            lobby_id: AtomicI64::new(NO_LOBBY),
            lobby_client_id: AtomicUsize::new(0),
            flags: AtomicU32::new(0),
        }
    }

    pub fn with_address(mut self, address: SocketAddr) -> Self {
        self.address = Some(address);
        self
    }

    /// Lobby this client currently occupies, if any
    pub fn lobby_id(&self) -> Option<i64> {
        match self.lobby_id.load(Ordering::Acquire) {
            NO_LOBBY => None,
            id => Some(id),
        }
    }

    /// Slot index in the current (or most recently left) lobby
    pub fn lobby_client_id(&self) -> usize {
        self.lobby_client_id.load(Ordering::Acquire)
    }

    pub(crate) fn set_lobby(&self, lobby_id: i64, slot: usize) {
        self.lobby_client_id.store(slot, Ordering::Release);
        self.lobby_id.store(lobby_id, Ordering::Release);
    }

    pub(crate) fn clear_lobby(&self) {
        self.lobby_id.store(NO_LOBBY, Ordering::Release);
    }

    pub fn flags(&self) -> u32 {
        self.flags.load(Ordering::Acquire)
    }

    pub fn is_loading(&self) -> bool {
        self.flags() & client_flags::LOADING != 0
    }

    pub fn set_loading(&self, loading: bool) {
        if loading {
            self.flags.fetch_or(client_flags::LOADING, Ordering::AcqRel);
        } else {
            self.flags.fetch_and(!client_flags::LOADING, Ordering::AcqRel);
        }
    }
}
