pub mod http;
pub mod models;
pub mod notify;
pub mod udp;

pub use http::AppState;
pub use models::{LobbyInfo, PlayerInfo};
pub use notify::{LogNotifier, Notifier, NotifyError, UdpNotifier};
