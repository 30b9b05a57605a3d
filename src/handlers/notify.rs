use std::net::{SocketAddr, UdpSocket};
use serde_json::json;
use crate::state::client::Client;
use crate::state::lobby::{Lobby, LobbyState};

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("client has no known address")]
    NoAddress,
    #[error("send failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Sink for membership events.
///
/// Called while the affected lobby's read lock is held, so implementations
/// must not block and must not lock any lobby.
pub trait Notifier: Send + Sync {
    /// `client` has just joined `lobby`
    fn notify_joined(&self, client: &Client, lobby: &Lobby, state: &LobbyState) -> Result<(), NotifyError>;

    /// `new_client` joined the lobby `observer` is in
    fn notify_player_joined(
        &self,
        observer: &Client,
        lobby: &Lobby,
        state: &LobbyState,
        new_client: &Client,
    ) -> Result<(), NotifyError>;

    /// Slot `left_slot` of the lobby `observer` is in was vacated
    fn notify_player_left(&self, observer: &Client, lobby: &Lobby, left_slot: usize) -> Result<(), NotifyError>;

    fn notify_message(&self, client: &Client, text: &str) -> Result<(), NotifyError>;
}

/// Sends JSON event packets to each client's UDP address.
///
/// Holds its own handle to the server socket in non-blocking mode, so a send
/// either completes immediately or fails with `WouldBlock`.
pub struct UdpNotifier {
    socket: UdpSocket,
}

impl UdpNotifier {
    pub fn new(socket: UdpSocket) -> std::io::Result<Self> {
        socket.set_nonblocking(true)?;
        Ok(Self { socket })
    }

    fn send(&self, client: &Client, packet: &serde_json::Value) -> Result<(), NotifyError> {
        let addr: SocketAddr = client.address.ok_or(NotifyError::NoAddress)?;
        let data = serde_json::to_vec(packet)?;
        self.socket.send_to(&data, addr)?;
        Ok(())
    }
}

impl Notifier for UdpNotifier {
    fn notify_joined(&self, client: &Client, lobby: &Lobby, state: &LobbyState) -> Result<(), NotifyError> {
        let players: Vec<_> = state
            .occupants()
            .map(|(slot, c)| json!({ "client_id": slot, "name": c.name }))
            .collect();
        let packet = json!({
            "type": "lobby_joined",
            "lobby_id": lobby.lobby_id(),
            "client_id": client.lobby_client_id(),
            "leader_id": state.leader_id(),
            "is_game": lobby.is_game(),
            "players": players
        });
        self.send(client, &packet)
    }

    fn notify_player_joined(
        &self,
        observer: &Client,
        lobby: &Lobby,
        _state: &LobbyState,
        new_client: &Client,
    ) -> Result<(), NotifyError> {
        let packet = json!({
            "type": "player_joined",
            "lobby_id": lobby.lobby_id(),
            "client_id": new_client.lobby_client_id(),
            "name": new_client.name
        });
        self.send(observer, &packet)
    }

    fn notify_player_left(&self, observer: &Client, lobby: &Lobby, left_slot: usize) -> Result<(), NotifyError> {
        let packet = json!({
            "type": "player_left",
            "lobby_id": lobby.lobby_id(),
            "client_id": left_slot
        });
        self.send(observer, &packet)
    }

    fn notify_message(&self, client: &Client, text: &str) -> Result<(), NotifyError> {
        self.send(client, &json!({ "type": "message", "text": text }))
    }
}

/// Writes events to the log only; for running without a client transport
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify_joined(&self, client: &Client, lobby: &Lobby, state: &LobbyState) -> Result<(), NotifyError> {
        log::info!(
            "'{}' joined lobby {} as client {} ({} present)",
            client.name,
            lobby.lobby_id(),
            client.lobby_client_id(),
            state.count_clients()
        );
        Ok(())
    }

    fn notify_player_joined(
        &self,
        observer: &Client,
        lobby: &Lobby,
        _state: &LobbyState,
        new_client: &Client,
    ) -> Result<(), NotifyError> {
        log::debug!("-> '{}': '{}' joined lobby {}", observer.name, new_client.name, lobby.lobby_id());
        Ok(())
    }

    fn notify_player_left(&self, observer: &Client, lobby: &Lobby, left_slot: usize) -> Result<(), NotifyError> {
        log::debug!("-> '{}': client {} left lobby {}", observer.name, left_slot, lobby.lobby_id());
        Ok(())
    }

    fn notify_message(&self, client: &Client, text: &str) -> Result<(), NotifyError> {
        log::info!("-> '{}': {}", client.name, text);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::lobby::LobbySettings;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::Arc;

    fn local(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), port)
    }

    #[tokio::test]
    async fn test_udp_notifier_requires_address() {
        let notifier = UdpNotifier::new(UdpSocket::bind(local(0)).unwrap()).unwrap();
        let client = Client::new("NoAddr", None);
        let err = notifier.notify_message(&client, "hi").unwrap_err();
        assert!(matches!(err, NotifyError::NoAddress));
    }

    #[tokio::test]
    async fn test_udp_notifier_sends_join_packet() {
        let receiver = tokio::net::UdpSocket::bind(local(0)).await.unwrap();
        let recv_addr = receiver.local_addr().unwrap();
        let notifier = UdpNotifier::new(UdpSocket::bind(local(0)).unwrap()).unwrap();

        let lobby = Lobby::new_lobby("", 4, LobbySettings::default());
        let client = Arc::new(Client::new("Rico", None).with_address(recv_addr));
        lobby.add_client(&client).await.unwrap();

        let state = lobby.read().await;
        notifier.notify_joined(&client, &lobby, &state).unwrap();
        drop(state);

        let mut buf = [0u8; 1024];
        let (len, _) = receiver.recv_from(&mut buf).await.unwrap();
        let packet: serde_json::Value = serde_json::from_slice(&buf[..len]).unwrap();
        assert_eq!(packet["type"], "lobby_joined");
        assert_eq!(packet["client_id"], 0);
        assert_eq!(packet["players"][0]["name"], "Rico");
    }

    #[tokio::test]
    async fn test_log_notifier_never_fails() {
        let lobby = Lobby::new_game("", 4, LobbySettings::default());
        let client = Client::new("Logged", None);
        assert!(LogNotifier.notify_player_left(&client, &lobby, 2).is_ok());
        assert!(LogNotifier.notify_message(&client, "hello").is_ok());
    }
}
