//! Metrics and observability module
//!
//! Provides Prometheus-compatible metrics for measurement sessions.
//!
//! Key metrics exposed:
//! - Sessions started, completed, failed (by phase)
//! - Results that could not be delivered to the client
//! - Session duration

pub mod exporter;
pub mod recorder;

pub use exporter::{metrics_route, render_metrics, start_metrics_server, MetricsConfig, MetricsError};
pub use recorder::{init_metrics, SessionMetrics};
