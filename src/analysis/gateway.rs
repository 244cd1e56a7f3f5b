use crate::analysis::error::AnalysisResult;
use crate::analysis::types::{BufferDelayMetrics, EfficiencyMetrics, ThroughputMetrics};
use async_trait::async_trait;
use std::net::IpAddr;
use std::path::Path;

/// Computes session metrics from the files a measurement leaves behind.
///
/// Implementations only read the files they are handed. Every error is
/// fatal to the rest of the session's analysis.
#[async_trait]
pub trait AnalysisGateway: Send + Sync {
    /// Throughput and transfer-time figures from the bandwidth tool output
    async fn compute_throughput(
        &self,
        tool_output: &Path,
        mtu: Option<u32>,
    ) -> AnalysisResult<ThroughputMetrics>;

    /// Transmitted/retransmitted volume of the server's traffic
    async fn compute_efficiency(
        &self,
        capture: &Path,
        server_ip: &str,
    ) -> AnalysisResult<EfficiencyMetrics>;

    /// Loaded round-trip time against the client's baseline `rtt_ms`
    async fn compute_buffer_delay(
        &self,
        capture: &Path,
        server_ip: &str,
        client_ip: IpAddr,
        rtt_ms: u32,
    ) -> AnalysisResult<BufferDelayMetrics>;
}
