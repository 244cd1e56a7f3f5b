//! Remote-controlled TCP throughput measurement server.
//!
//! A client connects over a WebSocket, asks for a measurement, and runs its
//! transfer against the bandwidth server this crate starts alongside a packet
//! capturer. Once the client signals it is done, both tools are stopped and
//! their output is turned into a [`session::MeasurementResult`] that goes back
//! over the same socket.

pub mod analysis;
pub mod api;
pub mod artifact;
pub mod channel;
pub mod metrics;
pub mod process;
pub mod session;
