use std::sync::Arc;
use lobbyserver::handlers::http::AppState;
use lobbyserver::handlers::notify::UdpNotifier;
use lobbyserver::server;
use lobbyserver::state::server_state::ServerState;
use lobbyserver::state::sessions::Sessions;
use lobbyserver::utils::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load immutable config
    let config = Arc::new(Config::new());
    setup_logging(&config)?;

    // One UDP socket: the async half receives, the std clone sends notifications
    let std_socket = std::net::UdpSocket::bind(format!("0.0.0.0:{}", config.udp_port))?;
    let notifier = Arc::new(UdpNotifier::new(std_socket.try_clone()?)?);
    std_socket.set_nonblocking(true)?;
    let udp_socket = tokio::net::UdpSocket::from_std(std_socket)?;
    log::info!("UDP server bound to 0.0.0.0:{}", config.udp_port);

    let state = Arc::new(ServerState::with_default_lobbies(&config, notifier).await?);

    let app_state = AppState {
        state,
        sessions: Arc::new(Sessions::new()),
        config,
    };

    // Start HTTP and UDP servers
    server::start_servers(app_state, udp_socket).await?;

    Ok(())
}

fn setup_logging(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Utc::now().format("[%Y-%m-%d][%H:%M:%S]"),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(config.log_level)
        .chain(std::io::stdout());
    if let Some(path) = &config.log_file {
        dispatch = dispatch.chain(fern::log_file(path)?);
    }
    dispatch.apply()?;
    Ok(())
}
