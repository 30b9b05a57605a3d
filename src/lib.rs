pub mod domain;
pub mod handlers;
pub mod server;
pub mod state;
pub mod utils;

pub use handlers::notify::{LogNotifier, Notifier, NotifyError, UdpNotifier};
pub use state::{Client, ClientHandle, Departure, Item, Lobby, LobbyError, LobbySettings, LobbyState, ServerState, Transfer};
pub use utils::config::Config;
