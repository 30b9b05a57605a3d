use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use crate::state::client::{Client, ClientHandle};

/// Connected clients keyed by UDP peer address.
/// Uses DashMap so packet handlers never contend on a global lock.
pub struct Sessions {
    clients: DashMap<SocketAddr, ClientHandle>,
}

impl Default for Sessions {
    fn default() -> Self {
        Self::new()
    }
}

impl Sessions {
    pub fn new() -> Self {
        Self {
            clients: DashMap::new(),
        }
    }

    /// Register a client for `addr`, returning the replaced session if there was one
    pub fn connect(
        &self,
        addr: SocketAddr,
        name: &str,
        serial_number: Option<u64>,
    ) -> (ClientHandle, Option<ClientHandle>) {
        let client = Arc::new(Client::new(name, serial_number).with_address(addr));
        let previous = self.clients.insert(addr, client.clone());
        (client, previous)
    }

    pub fn get(&self, addr: &SocketAddr) -> Option<ClientHandle> {
        self.clients.get(addr).map(|entry| entry.value().clone())
    }

    pub fn disconnect(&self, addr: &SocketAddr) -> Option<ClientHandle> {
        self.clients.remove(addr).map(|(_, client)| client)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
