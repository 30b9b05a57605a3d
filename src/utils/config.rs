/// Server configuration - immutable after load
#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub udp_port: u16,
    pub default_lobby_count: usize,
    pub episode3_lobby_count: usize,
    pub max_clients_per_lobby: usize,
    pub game_max_clients: usize,
    pub log_file: Option<String>,
    pub log_level: log::LevelFilter,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 8080,
            udp_port: 8081,
            default_lobby_count: 15,
            episode3_lobby_count: 5,
            max_clients_per_lobby: 12,
            game_max_clients: 4,
            log_file: Some("lobby.log".to_string()),
            log_level: log::LevelFilter::Debug,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of persistent lobbies created at startup
    pub fn total_default_lobbies(&self) -> usize {
        self.default_lobby_count + self.episode3_lobby_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.udp_port, 8081);
        assert_eq!(config.max_clients_per_lobby, 12);
        assert_eq!(config.log_level, log::LevelFilter::Debug);
    }

    #[test]
    fn test_total_default_lobbies() {
        let config = Config::default();
        assert_eq!(config.total_default_lobbies(), 20);
    }
}
