//! Field extraction from capture files through tshark.

use crate::analysis::error::{AnalysisError, AnalysisResult};
use std::net::IpAddr;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

/// Display-filter term matching `ip` in the given direction.
///
/// IPv4-mapped IPv6 addresses match the IPv4 header, which is where the
/// capture sees them.
fn address_match(ip: IpAddr, direction: &str) -> String {
    match ip.to_canonical() {
        IpAddr::V4(v4) => format!("ip.{direction}=={v4}"),
        IpAddr::V6(v6) => format!("ipv6.{direction}=={v6}"),
    }
}

pub fn parse_ip(raw: &str) -> AnalysisResult<IpAddr> {
    raw.trim()
        .parse()
        .map_err(|_| AnalysisError::InvalidAddress(raw.to_string()))
}

/// Payload-carrying segments sent by `server`
pub fn server_payload_filter(server: IpAddr) -> String {
    format!("{} && tcp.len>0", address_match(server, "src"))
}

/// Retransmitted payload segments sent by `server`
pub fn server_retransmission_filter(server: IpAddr) -> String {
    format!(
        "{} && tcp.analysis.retransmission",
        server_payload_filter(server)
    )
}

/// Client-to-server segments carrying an RTT measurement
pub fn ack_rtt_filter(server: IpAddr, client: IpAddr) -> String {
    format!(
        "{} && {} && tcp.analysis.ack_rtt",
        address_match(client, "src"),
        address_match(server, "dst")
    )
}

/// First value of each non-empty line; tshark joins repeated fields with ','
fn field_values(output: &str) -> impl Iterator<Item = &str> {
    output
        .lines()
        .filter_map(|line| line.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

pub fn sum_field(output: &str) -> AnalysisResult<u64> {
    field_values(output).try_fold(0u64, |acc, value| {
        value
            .parse::<u64>()
            .map(|v| acc.saturating_add(v))
            .map_err(|_| AnalysisError::Parse(format!("expected integer field, got {value:?}")))
    })
}

/// Mean of the field values, or `None` when there are none
pub fn mean_field(output: &str) -> AnalysisResult<Option<f64>> {
    let mut total = 0.0;
    let mut count = 0usize;

    for value in field_values(output) {
        total += value
            .parse::<f64>()
            .map_err(|_| AnalysisError::Parse(format!("expected numeric field, got {value:?}")))?;
        count += 1;
    }

    Ok((count > 0).then(|| total / count as f64))
}

/// Runs `tshark -r <capture> -Y <filter> -T fields -e <field>`
#[derive(Debug, Clone)]
pub struct Tshark {
    program: String,
}

impl Tshark {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub async fn extract(&self, capture: &Path, filter: &str, field: &str) -> AnalysisResult<String> {
        if let Err(source) = tokio::fs::metadata(capture).await {
            return Err(AnalysisError::Unreadable {
                path: capture.to_path_buf(),
                source,
            });
        }

        debug!(program = %self.program, filter, field, "Extracting capture field");

        let output = Command::new(&self.program)
            .arg("-r")
            .arg(capture)
            .args(["-Y", filter, "-T", "fields", "-e", field])
            .output()
            .await
            .map_err(|source| AnalysisError::ToolSpawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(AnalysisError::ToolFailed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
