mod error;
mod websocket;

pub use error::{ChannelError, ChannelResult};
pub use websocket::WsChannel;

use async_trait::async_trait;
use std::net::IpAddr;

/// A bidirectional, turn-taking text message channel to the remote client
#[async_trait]
pub trait ControlChannel: Send {
    /// Wait for the next text message from the peer
    async fn recv_text(&mut self) -> ChannelResult<String>;

    async fn send_text(&mut self, text: String) -> ChannelResult<()>;

    /// Close the channel. Errors are ignored, the peer may already be gone.
    async fn close(&mut self);

    /// Address of the remote client
    fn peer_ip(&self) -> IpAddr;
}
