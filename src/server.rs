use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;
use log::info;
use tokio::net::{TcpListener, UdpSocket};
use std::sync::Arc;
use crate::handlers::http::{get_lobby, list_lobbies, AppState};
use crate::handlers::udp::handle_udp_packet;

/// Start HTTP and UDP servers
pub async fn start_servers(
    app_state: AppState,
    udp_socket: UdpSocket,
) -> Result<(), Box<dyn std::error::Error>> {
    let http_server = init_http_server(app_state.clone());
    let udp_server = init_udp_server(app_state, udp_socket);

    tokio::try_join!(http_server, udp_server)?;
    Ok(())
}

/// Read-only lobby listing
pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/lobbies", get(list_lobbies))
        .route("/lobbies/:id", get(get_lobby))
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

/// Initialize HTTP server
fn init_http_server(app_state: AppState) -> tokio::task::JoinHandle<()> {
    let http_addr = format!("0.0.0.0:{}", app_state.config.http_port);
    let app = build_router(app_state);
    info!("Starting HTTP server on {}", http_addr);

    tokio::spawn(async move {
        let listener = match TcpListener::bind(&http_addr).await {
            Ok(listener) => {
                info!("HTTP server successfully bound to {}", http_addr);
                listener
            }
            Err(e) => {
                log::error!("Failed to bind HTTP server to {}: {}", http_addr, e);
                return;
            }
        };

        if let Err(e) = axum::serve(listener, app).await {
            log::error!("HTTP server error: {}", e);
        }
    })
}

/// Initialize UDP server
fn init_udp_server(app_state: AppState, socket: UdpSocket) -> tokio::task::JoinHandle<()> {
    let socket = Arc::new(socket);

    tokio::spawn(async move {
        let mut buf = [0u8; 1024];

        loop {
            match socket.recv_from(&mut buf).await {
                Ok((len, addr)) => {
                    let data = &buf[..len];
                    match serde_json::from_slice::<serde_json::Value>(data) {
                        Ok(packet) => handle_udp_packet(packet, addr, &app_state).await,
                        Err(e) => log::debug!("Malformed packet from {}: {}", addr, e),
                    }
                }
                Err(e) => {
                    log::error!("UDP recv error: {}", e);
                }
            }
        }
    })
}
