//! Measurement sessions.
//!
//! A session is one start-to-response exchange on a control channel:
//!
//! ```text
//! client                      server
//!   | -- {"MTU", "RTT", "SERVER_IP"} -->|  start capturer + bandwidth server
//!   |<-- "throughput servers up" ------ |
//!   |        (client runs transfer)     |
//!   | -- anything --------------------->|  stop tools, analyze
//!   |<-- {"THPT_AVG", ..., "BUF_DELAY"} |
//! ```

mod coordinator;
pub mod error;
mod state_machine;
mod types;

pub use coordinator::SessionCoordinator;
pub use error::{SessionError, SessionResult};
pub use state_machine::SessionStateMachine;
pub use types::{
    MeasurementResult, Session, SessionConfig, SessionEvent, SessionOutcome, SessionParams,
    SessionState, READY_MARKER,
};
