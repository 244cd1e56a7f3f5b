use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Channel closed by peer")]
    Closed,

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    #[error("Timeout after {0:?}")]
    Timeout(std::time::Duration),
}

pub type ChannelResult<T> = Result<T, ChannelError>;
