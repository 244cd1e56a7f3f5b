/// Throughput figures derived from the bandwidth tool's output
#[derive(Debug, Clone, PartialEq)]
pub struct ThroughputMetrics {
    /// Mean interval throughput, Mbit/s
    pub average_mbps: f64,
    /// Best achievable throughput, Mbit/s
    pub ideal_mbps: f64,
    /// Seconds to move the measured volume at the average rate
    pub transfer_time_avg_secs: f64,
    /// Seconds to move the measured volume at the ideal rate
    pub transfer_time_ideal_secs: f64,
    /// Actual over ideal transfer time
    pub transfer_time_ratio: f64,
    /// Per-interval throughput, Mbit/s
    pub speed_plot: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EfficiencyMetrics {
    pub transmitted_bytes: u64,
    pub retransmitted_bytes: u64,
    /// Share of transmitted bytes that were not retransmissions, percent
    pub efficiency_percent: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BufferDelayMetrics {
    pub average_rtt_ms: f64,
    /// Increase of the loaded RTT over the baseline RTT, percent
    pub buffer_delay_percent: f64,
}
