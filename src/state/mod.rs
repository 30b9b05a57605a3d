pub mod client;
pub mod commands;
pub mod error;
pub mod lobby;
pub mod server_state;
pub mod sessions;

pub use client::{Client, ClientHandle, Item};
pub use error::{Departure, LobbyError, Transfer};
pub use lobby::{Lobby, LobbySettings, LobbyState};
pub use server_state::ServerState;
pub use sessions::Sessions;
