//! Parsing of iperf3 server text output.

use crate::analysis::error::{AnalysisError, AnalysisResult};
use crate::analysis::types::ThroughputMetrics;

/// TCP/IP header bytes per segment
const TCP_IP_HEADERS: f64 = 40.0;

/// Ethernet framing bytes per frame (preamble, header, FCS, inter-frame gap)
const ETHERNET_FRAMING: f64 = 38.0;

/// One per-interval report line
#[derive(Debug, Clone, PartialEq)]
pub struct Interval {
    pub start_secs: f64,
    pub end_secs: f64,
    pub transfer_megabits: f64,
    pub rate_mbps: f64,
}

/// Collect the per-interval lines of the first test in `output`.
///
/// Summary lines are skipped. When parallel streams produced `[SUM]` lines,
/// only those are returned.
pub fn parse_intervals(output: &str) -> Vec<Interval> {
    let mut streams = Vec::new();
    let mut sums = Vec::new();

    for line in output.lines() {
        let trimmed = line.trim();

        // "- - - -" separates the interval reports from the summary
        if trimmed.starts_with("- -") {
            if !streams.is_empty() || !sums.is_empty() {
                break;
            }
            continue;
        }

        if trimmed.ends_with("sender") || trimmed.ends_with("receiver") {
            continue;
        }

        if let Some(interval) = parse_interval_line(trimmed) {
            if trimmed.starts_with("[SUM]") {
                sums.push(interval);
            } else {
                streams.push(interval);
            }
        }
    }

    if sums.is_empty() {
        streams
    } else {
        sums
    }
}

fn parse_interval_line(line: &str) -> Option<Interval> {
    if !line.starts_with('[') {
        return None;
    }

    let tokens: Vec<&str> = line.split_whitespace().collect();
    let sec = tokens.iter().position(|t| *t == "sec")?;
    if sec == 0 || tokens.len() < sec + 5 {
        return None;
    }

    let (start, end) = tokens[sec - 1].split_once('-')?;
    let start_secs = start.parse().ok()?;
    let end_secs = end.parse().ok()?;

    let transfer: f64 = tokens[sec + 1].parse().ok()?;
    let transfer_megabits = transfer * bytes_multiplier(tokens[sec + 2])? * 8.0 / 1e6;

    let rate: f64 = tokens[sec + 3].parse().ok()?;
    let rate_mbps = rate * bits_multiplier(tokens[sec + 4])? / 1e6;

    Some(Interval {
        start_secs,
        end_secs,
        transfer_megabits,
        rate_mbps,
    })
}

fn bytes_multiplier(unit: &str) -> Option<f64> {
    match unit {
        "Bytes" => Some(1.0),
        "KBytes" => Some(1024.0),
        "MBytes" => Some(1024.0 * 1024.0),
        "GBytes" => Some(1024.0 * 1024.0 * 1024.0),
        "TBytes" => Some(1024.0 * 1024.0 * 1024.0 * 1024.0),
        _ => None,
    }
}

fn bits_multiplier(unit: &str) -> Option<f64> {
    match unit {
        "bits/sec" => Some(1.0),
        "Kbits/sec" => Some(1e3),
        "Mbits/sec" => Some(1e6),
        "Gbits/sec" => Some(1e9),
        "Tbits/sec" => Some(1e12),
        _ => None,
    }
}

/// Payload share of an Ethernet frame carrying a full `mtu`-sized segment
pub fn ethernet_efficiency(mtu: u32) -> Option<f64> {
    let mtu = f64::from(mtu);
    if mtu <= TCP_IP_HEADERS {
        return None;
    }
    Some((mtu - TCP_IP_HEADERS) / (mtu + ETHERNET_FRAMING))
}

/// Derive the throughput figures of a session from iperf3 server output
pub fn throughput_metrics(output: &str, mtu: Option<u32>) -> AnalysisResult<ThroughputMetrics> {
    let intervals = parse_intervals(output);
    if intervals.is_empty() {
        return Err(AnalysisError::NoSamples(
            "no interval lines in bandwidth tool output".into(),
        ));
    }

    let speed_plot: Vec<f64> = intervals.iter().map(|i| i.rate_mbps).collect();
    let average_mbps = speed_plot.iter().sum::<f64>() / speed_plot.len() as f64;
    let peak_mbps = speed_plot.iter().copied().fold(0.0, f64::max);

    if average_mbps <= 0.0 {
        return Err(AnalysisError::Parse("measured throughput is zero".into()));
    }

    let ideal_mbps = match mtu.and_then(ethernet_efficiency) {
        Some(efficiency) => peak_mbps * efficiency,
        None => peak_mbps,
    };

    let total_megabits: f64 = intervals.iter().map(|i| i.transfer_megabits).sum();
    let transfer_time_avg_secs = total_megabits / average_mbps;
    let transfer_time_ideal_secs = total_megabits / ideal_mbps;
    let transfer_time_ratio = if transfer_time_ideal_secs > 0.0 {
        transfer_time_avg_secs / transfer_time_ideal_secs
    } else {
        0.0
    };

    Ok(ThroughputMetrics {
        average_mbps,
        ideal_mbps,
        transfer_time_avg_secs,
        transfer_time_ideal_secs,
        transfer_time_ratio,
        speed_plot,
    })
}
