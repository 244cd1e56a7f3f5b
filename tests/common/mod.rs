//! Shared fixtures: a scripted control channel and a recording analysis backend

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use thpt_probe::analysis::{
    AnalysisError, AnalysisGateway, AnalysisResult, BufferDelayMetrics, EfficiencyMetrics,
    ThroughputMetrics,
};
use thpt_probe::artifact::{ArtifactConfig, ArtifactManager};
use thpt_probe::channel::{ChannelError, ChannelResult, ControlChannel};
use thpt_probe::process::{ProcessConfig, ProcessPairController, ToolCommand};
use thpt_probe::session::{SessionConfig, SessionCoordinator};

pub const CLIENT_IP: &str = "192.0.2.10";

pub const RESULT_KEYS: [&str; 11] = [
    "THPT_AVG",
    "THPT_IDEAL",
    "TRANSFER_AVG",
    "TRANSFER_IDEAL",
    "TCP_TTR",
    "SPEED_PLOT",
    "TRANS_BYTES",
    "RETX_BYTES",
    "TCP_EFF",
    "AVE_RTT",
    "BUF_DELAY",
];

/// Control channel that replays queued inbound messages and records
/// everything sent
pub struct ScriptedChannel {
    inbound: VecDeque<String>,
    /// Block forever once the script runs out instead of reporting a close
    hang_when_empty: bool,
    /// Zero-based index of the send that fails
    fail_send_at: Option<usize>,
    sends_attempted: usize,
    pub sent: Vec<String>,
    pub closed: bool,
}

impl ScriptedChannel {
    pub fn new(inbound: &[&str]) -> Self {
        Self {
            inbound: inbound.iter().map(|m| m.to_string()).collect(),
            hang_when_empty: false,
            fail_send_at: None,
            sends_attempted: 0,
            sent: Vec::new(),
            closed: false,
        }
    }

    pub fn hanging(mut self) -> Self {
        self.hang_when_empty = true;
        self
    }

    pub fn failing_send_at(mut self, index: usize) -> Self {
        self.fail_send_at = Some(index);
        self
    }

    /// The final message, parsed as a result object
    pub fn result(&self) -> serde_json::Map<String, serde_json::Value> {
        let last = self.sent.last().expect("nothing was sent");
        serde_json::from_str::<serde_json::Value>(last)
            .expect("result is not JSON")
            .as_object()
            .expect("result is not an object")
            .clone()
    }
}

#[async_trait]
impl ControlChannel for ScriptedChannel {
    async fn recv_text(&mut self) -> ChannelResult<String> {
        match self.inbound.pop_front() {
            Some(message) => Ok(message),
            None if self.hang_when_empty => std::future::pending().await,
            None => Err(ChannelError::Closed),
        }
    }

    async fn send_text(&mut self, text: String) -> ChannelResult<()> {
        let index = self.sends_attempted;
        self.sends_attempted += 1;

        if self.closed || self.fail_send_at == Some(index) {
            return Err(ChannelError::SendFailed("connection reset by peer".into()));
        }
        self.sent.push(text);
        Ok(())
    }

    async fn close(&mut self) {
        self.closed = true;
    }

    fn peer_ip(&self) -> IpAddr {
        CLIENT_IP.parse().unwrap()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    Throughput { mtu: Option<u32> },
    Efficiency { server_ip: String },
    BufferDelay { server_ip: String, client_ip: IpAddr, rtt_ms: u32 },
}

/// Analysis backend returning canned metrics and recording every call
#[derive(Default)]
pub struct RecordingGateway {
    pub fail_throughput: bool,
    pub fail_efficiency: bool,
    /// Watch the tool output for this long during the throughput call
    pub watch_output_for: Option<Duration>,
    pub calls: Mutex<Vec<GatewayCall>>,
    /// Whether the tool output kept growing while being analyzed
    pub output_grew: Mutex<Option<bool>>,
}

impl RecordingGateway {
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().clone()
    }
}

fn file_len(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

#[async_trait]
impl AnalysisGateway for RecordingGateway {
    async fn compute_throughput(
        &self,
        tool_output: &Path,
        mtu: Option<u32>,
    ) -> AnalysisResult<ThroughputMetrics> {
        self.calls.lock().push(GatewayCall::Throughput { mtu });

        if let Some(window) = self.watch_output_for {
            let before = file_len(tool_output);
            tokio::time::sleep(window).await;
            *self.output_grew.lock() = Some(file_len(tool_output) != before);
        }

        if self.fail_throughput {
            return Err(AnalysisError::NoSamples(
                "no interval lines in bandwidth tool output".into(),
            ));
        }

        Ok(ThroughputMetrics {
            average_mbps: 90.0,
            ideal_mbps: 94.9,
            transfer_time_avg_secs: 3.2,
            transfer_time_ideal_secs: 3.0,
            transfer_time_ratio: 1.07,
            speed_plot: vec![100.0, 80.0, 90.0],
        })
    }

    async fn compute_efficiency(
        &self,
        _capture: &Path,
        server_ip: &str,
    ) -> AnalysisResult<EfficiencyMetrics> {
        self.calls.lock().push(GatewayCall::Efficiency {
            server_ip: server_ip.to_string(),
        });

        if self.fail_efficiency {
            return Err(AnalysisError::Parse("truncated capture".into()));
        }

        Ok(EfficiencyMetrics {
            transmitted_bytes: 33_554_432,
            retransmitted_bytes: 28_960,
            efficiency_percent: 99.91,
        })
    }

    async fn compute_buffer_delay(
        &self,
        _capture: &Path,
        server_ip: &str,
        client_ip: IpAddr,
        rtt_ms: u32,
    ) -> AnalysisResult<BufferDelayMetrics> {
        self.calls.lock().push(GatewayCall::BufferDelay {
            server_ip: server_ip.to_string(),
            client_ip,
            rtt_ms,
        });

        Ok(BufferDelayMetrics {
            average_rtt_ms: 24.0,
            buffer_delay_percent: 20.0,
        })
    }
}

/// Tools that just sit there until killed
pub fn idle_tools() -> ProcessConfig {
    ProcessConfig {
        capturer: ToolCommand::new("sleep", &["30"]),
        bandwidth_server: ToolCommand::new("sleep", &["30"]),
        server_port: 5999,
        warmup: Duration::ZERO,
    }
}

pub struct Fixture {
    pub dir: TempDir,
    pub gateway: Arc<RecordingGateway>,
    pub coordinator: SessionCoordinator,
}

impl Fixture {
    pub fn new(tools: ProcessConfig, gateway: RecordingGateway, config: SessionConfig) -> Self {
        let dir = TempDir::new().unwrap();
        let gateway = Arc::new(gateway);

        let artifacts = ArtifactManager::new(ArtifactConfig {
            temp_dir: dir.path().join("reverse_mode"),
            debug_dir: dir.path().join("debug"),
            ..Default::default()
        });

        let coordinator = SessionCoordinator::new(
            ProcessPairController::new(tools),
            artifacts,
            gateway.clone(),
            config,
        );

        Self {
            dir,
            gateway,
            coordinator,
        }
    }

    pub fn simple() -> Self {
        Self::new(idle_tools(), RecordingGateway::default(), SessionConfig::default())
    }

    pub fn tool_output_path(&self) -> PathBuf {
        self.coordinator.artifacts().tool_output_path()
    }

    /// Files archived into the debug directory
    pub fn debug_archives(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(self.dir.path().join("debug")) {
            Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
            Err(_) => Vec::new(),
        }
    }
}
