use crate::channel::error::{ChannelError, ChannelResult};
use crate::channel::ControlChannel;
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use std::net::IpAddr;
use tracing::debug;

/// Control channel over an upgraded axum WebSocket
pub struct WsChannel {
    socket: WebSocket,
    peer_ip: IpAddr,
}

impl WsChannel {
    pub fn new(socket: WebSocket, peer_ip: IpAddr) -> Self {
        Self { socket, peer_ip }
    }
}

#[async_trait]
impl ControlChannel for WsChannel {
    async fn recv_text(&mut self) -> ChannelResult<String> {
        loop {
            match self.socket.recv().await {
                Some(Ok(Message::Text(text))) => return Ok(text),
                Some(Ok(Message::Binary(data))) => {
                    return Ok(String::from_utf8_lossy(&data).into_owned())
                }
                Some(Ok(Message::Close(_))) | None => return Err(ChannelError::Closed),
                // Ping/pong are answered by the socket itself
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(ChannelError::ReceiveFailed(e.to_string())),
            }
        }
    }

    async fn send_text(&mut self, text: String) -> ChannelResult<()> {
        self.socket
            .send(Message::Text(text))
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))
    }

    async fn close(&mut self) {
        if let Err(e) = self.socket.send(Message::Close(None)).await {
            debug!("Ignoring close error for {}: {}", self.peer_ip, e);
        }
    }

    fn peer_ip(&self) -> IpAddr {
        self.peer_ip
    }
}
