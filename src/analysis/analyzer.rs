use crate::analysis::error::{AnalysisError, AnalysisResult};
use crate::analysis::gateway::AnalysisGateway;
use crate::analysis::iperf;
use crate::analysis::tshark::{self, Tshark};
use crate::analysis::types::{BufferDelayMetrics, EfficiencyMetrics, ThroughputMetrics};
use async_trait::async_trait;
use std::net::IpAddr;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// tshark binary used to read the capture back
    pub tshark_program: String,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            tshark_program: "tshark".to_string(),
        }
    }
}

/// Default analysis backed by iperf3 text output and tshark field extraction
#[derive(Debug, Clone)]
pub struct ToolAnalyzer {
    tshark: Tshark,
}

impl Default for ToolAnalyzer {
    fn default() -> Self {
        Self::new(AnalyzerConfig::default())
    }
}

impl ToolAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self {
            tshark: Tshark::new(config.tshark_program),
        }
    }
}

/// Efficiency from the server's payload volume
pub fn efficiency_metrics(transmitted: u64, retransmitted: u64) -> AnalysisResult<EfficiencyMetrics> {
    if transmitted == 0 {
        return Err(AnalysisError::NoSamples(
            "no payload sent by the server in capture".into(),
        ));
    }

    let delivered = transmitted.saturating_sub(retransmitted);
    Ok(EfficiencyMetrics {
        transmitted_bytes: transmitted,
        retransmitted_bytes: retransmitted,
        efficiency_percent: delivered as f64 / transmitted as f64 * 100.0,
    })
}

/// Buffer delay of the loaded path over the baseline RTT
pub fn buffer_delay_metrics(average_rtt_ms: f64, baseline_rtt_ms: u32) -> BufferDelayMetrics {
    let baseline = f64::from(baseline_rtt_ms.max(1));
    BufferDelayMetrics {
        average_rtt_ms,
        buffer_delay_percent: (average_rtt_ms - baseline) / baseline * 100.0,
    }
}

#[async_trait]
impl AnalysisGateway for ToolAnalyzer {
    async fn compute_throughput(
        &self,
        tool_output: &Path,
        mtu: Option<u32>,
    ) -> AnalysisResult<ThroughputMetrics> {
        let output = tokio::fs::read_to_string(tool_output)
            .await
            .map_err(|source| AnalysisError::Unreadable {
                path: tool_output.to_path_buf(),
                source,
            })?;

        let metrics = iperf::throughput_metrics(&output, mtu)?;
        debug!(
            average_mbps = metrics.average_mbps,
            intervals = metrics.speed_plot.len(),
            "Throughput parsed"
        );
        Ok(metrics)
    }

    async fn compute_efficiency(
        &self,
        capture: &Path,
        server_ip: &str,
    ) -> AnalysisResult<EfficiencyMetrics> {
        let server = tshark::parse_ip(server_ip)?;

        let sent = self
            .tshark
            .extract(capture, &tshark::server_payload_filter(server), "tcp.len")
            .await?;
        let resent = self
            .tshark
            .extract(capture, &tshark::server_retransmission_filter(server), "tcp.len")
            .await?;

        efficiency_metrics(tshark::sum_field(&sent)?, tshark::sum_field(&resent)?)
    }

    async fn compute_buffer_delay(
        &self,
        capture: &Path,
        server_ip: &str,
        client_ip: IpAddr,
        rtt_ms: u32,
    ) -> AnalysisResult<BufferDelayMetrics> {
        let server = tshark::parse_ip(server_ip)?;

        let samples = self
            .tshark
            .extract(
                capture,
                &tshark::ack_rtt_filter(server, client_ip),
                "tcp.analysis.ack_rtt",
            )
            .await?;

        let average_rtt_secs = tshark::mean_field(&samples)?.ok_or_else(|| {
            AnalysisError::NoSamples(format!("no RTT samples from {client_ip} to {server}"))
        })?;

        Ok(buffer_delay_metrics(average_rtt_secs * 1000.0, rtt_ms))
    }
}
