use crate::analysis::{BufferDelayMetrics, EfficiencyMetrics, ThroughputMetrics};
use crate::session::error::{SessionError, SessionResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Sent once the capturer and bandwidth server are up
pub const READY_MARKER: &str = "throughput servers up";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingStart,
    Measuring,
    AwaitingCompletion,
    Analyzing,
    Responding,
    Done,
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::AwaitingStart => "awaiting_start",
            SessionState::Measuring => "measuring",
            SessionState::AwaitingCompletion => "awaiting_completion",
            SessionState::Analyzing => "analyzing",
            SessionState::Responding => "responding",
            SessionState::Done => "done",
            SessionState::Closed => "closed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Done | SessionState::Closed)
    }
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    StartReceived,
    ProcessesReady,
    CompletionReceived,
    AnalysisFinished,
    Failed { error: String },
    ResponseSent,
    ResponseUndeliverable,
    ChannelLost,
}

/// Client parameters carried by the start message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParams {
    pub mtu: Option<u32>,
    pub rtt_ms: u32,
    pub server_ip: Option<String>,
}

impl SessionParams {
    pub const DEFAULT_RTT_MS: u32 = 1;

    /// Parse a start message. Only a message that is not a JSON object is
    /// rejected; missing or malformed `MTU`/`RTT` fall back to defaults.
    pub fn parse(raw: &str) -> SessionResult<Self> {
        let value: Value = serde_json::from_str(raw)?;
        let fields = value
            .as_object()
            .ok_or_else(|| SessionError::InvalidStart("expected a JSON object".into()))?;

        Ok(Self {
            mtu: fields.get("MTU").and_then(positive_u32),
            rtt_ms: fields
                .get("RTT")
                .and_then(positive_u32)
                .unwrap_or(Self::DEFAULT_RTT_MS),
            server_ip: fields
                .get("SERVER_IP")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    pub fn server_ip(&self) -> SessionResult<&str> {
        self.server_ip
            .as_deref()
            .ok_or(SessionError::MissingField("SERVER_IP"))
    }
}

fn positive_u32(value: &Value) -> Option<u32> {
    let n = match value {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    u32::try_from(n).ok().filter(|n| *n > 0)
}

/// Metrics returned to the client. Unset fields serialize as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasurementResult {
    #[serde(rename = "THPT_AVG")]
    pub throughput_avg: Option<f64>,
    #[serde(rename = "THPT_IDEAL")]
    pub throughput_ideal: Option<f64>,
    #[serde(rename = "TRANSFER_AVG")]
    pub transfer_avg: Option<f64>,
    #[serde(rename = "TRANSFER_IDEAL")]
    pub transfer_ideal: Option<f64>,
    #[serde(rename = "TCP_TTR")]
    pub tcp_ttr: Option<f64>,
    #[serde(rename = "SPEED_PLOT")]
    pub speed_plot: Option<Vec<f64>>,
    #[serde(rename = "TRANS_BYTES")]
    pub transmitted_bytes: Option<u64>,
    #[serde(rename = "RETX_BYTES")]
    pub retransmitted_bytes: Option<u64>,
    #[serde(rename = "TCP_EFF")]
    pub tcp_efficiency: Option<f64>,
    #[serde(rename = "AVE_RTT")]
    pub average_rtt: Option<f64>,
    #[serde(rename = "BUF_DELAY")]
    pub buffer_delay: Option<f64>,
}

impl MeasurementResult {
    pub fn merge_throughput(&mut self, metrics: ThroughputMetrics) {
        self.throughput_avg = Some(metrics.average_mbps);
        self.throughput_ideal = Some(metrics.ideal_mbps);
        self.transfer_avg = Some(metrics.transfer_time_avg_secs);
        self.transfer_ideal = Some(metrics.transfer_time_ideal_secs);
        self.tcp_ttr = Some(metrics.transfer_time_ratio);
        self.speed_plot = Some(metrics.speed_plot);
    }

    pub fn merge_efficiency(&mut self, metrics: EfficiencyMetrics) {
        self.transmitted_bytes = Some(metrics.transmitted_bytes);
        self.retransmitted_bytes = Some(metrics.retransmitted_bytes);
        self.tcp_efficiency = Some(metrics.efficiency_percent);
    }

    pub fn merge_buffer_delay(&mut self, metrics: BufferDelayMetrics) {
        self.average_rtt = Some(metrics.average_rtt_ms);
        self.buffer_delay = Some(metrics.buffer_delay_percent);
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn is_complete(&self) -> bool {
        self.throughput_avg.is_some()
            && self.throughput_ideal.is_some()
            && self.transfer_avg.is_some()
            && self.transfer_ideal.is_some()
            && self.tcp_ttr.is_some()
            && self.speed_plot.is_some()
            && self.transmitted_bytes.is_some()
            && self.retransmitted_bytes.is_some()
            && self.tcp_efficiency.is_some()
            && self.average_rtt.is_some()
            && self.buffer_delay.is_some()
    }
}

/// One measurement attempt on one control channel
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub capture_file: PathBuf,
    pub tool_output_file: PathBuf,
    /// Start message as received, parsed once the transfer is done
    pub start_message: String,
    pub client_ip: IpAddr,
}

#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Give up waiting for the client's completion signal after this long.
    /// `None` waits indefinitely.
    pub completion_timeout: Option<Duration>,
}

/// What a finished session reports to its caller
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub session_id: String,
    pub state: SessionState,
    pub result: MeasurementResult,
    /// Error that sent the session down the failure path, if any
    pub failure: Option<String>,
}

impl SessionOutcome {
    pub fn is_clean(&self) -> bool {
        self.state == SessionState::Done && self.failure.is_none()
    }
}
