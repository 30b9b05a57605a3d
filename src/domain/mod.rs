pub mod lobbies;
