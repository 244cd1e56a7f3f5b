use crate::api::AppState;
use crate::channel::WsChannel;
use axum::{
    extract::{ws::WebSocket, ConnectInfo, State, WebSocketUpgrade},
    response::Response,
};
use std::net::{IpAddr, SocketAddr};
use tracing::debug;

pub async fn throughput_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    // A dual-stack listener reports IPv4 clients as `::ffff:a.b.c.d`
    let peer_ip = addr.ip().to_canonical();
    ws.on_upgrade(move |socket| handle_websocket(socket, peer_ip, state))
}

async fn handle_websocket(socket: WebSocket, peer_ip: IpAddr, state: AppState) {
    let mut channel = WsChannel::new(socket, peer_ip);
    let outcome = state.coordinator.run(&mut channel).await;

    debug!(
        session = %outcome.session_id,
        state = outcome.state.as_str(),
        failure = ?outcome.failure,
        "Session finished"
    );
}
