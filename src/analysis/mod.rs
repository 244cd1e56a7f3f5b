//! Analysis of a finished measurement.
//!
//! The session only talks to [`AnalysisGateway`]; [`ToolAnalyzer`] is the
//! default implementation, reading iperf3 server output directly and asking
//! tshark for per-packet fields of the capture.

mod analyzer;
mod error;
mod gateway;
pub mod iperf;
pub mod tshark;
mod types;

pub use analyzer::{AnalyzerConfig, ToolAnalyzer};
pub use error::{AnalysisError, AnalysisResult};
pub use gateway::AnalysisGateway;
pub use types::{BufferDelayMetrics, EfficiencyMetrics, ThroughputMetrics};
