use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Startup error: {0}")]
    Startup(#[from] crate::process::StartupError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] crate::analysis::AnalysisError),

    #[error("Channel error: {0}")]
    Channel(#[from] crate::channel::ChannelError),

    #[error("Invalid start message: {0}")]
    InvalidStart(String),

    #[error("Missing field in start message: {0}")]
    MissingField(&'static str),

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::InvalidStart(err.to_string())
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
