use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thpt_probe::analysis::{AnalyzerConfig, ToolAnalyzer};
use thpt_probe::api::create_api_server;
use thpt_probe::artifact::{ArtifactConfig, ArtifactManager};
use thpt_probe::metrics::{start_metrics_server, MetricsConfig};
use thpt_probe::process::{ProcessConfig, ProcessPairController, ToolCommand};
use thpt_probe::session::{SessionConfig, SessionCoordinator};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Throughput measurement server
#[derive(Parser, Debug)]
#[command(name = "thpt-server", version, about, long_about = None)]
struct Cli {
    /// Address for the WebSocket/HTTP listener
    #[arg(long, env = "THPT_LISTEN", default_value = "0.0.0.0:3001")]
    listen: SocketAddr,

    /// Port the bandwidth server listens on
    #[arg(long, env = "THPT_IPERF_PORT", default_value_t = 5201)]
    iperf_port: u16,

    /// Bandwidth server binary
    #[arg(long, env = "THPT_IPERF_BIN", default_value = "iperf3")]
    iperf_bin: String,

    /// Packet capture binary, also used to read captures back
    #[arg(long, env = "THPT_TSHARK_BIN", default_value = "tshark")]
    tshark_bin: String,

    /// Seconds the capturer gets before the client is told to start
    #[arg(long, env = "THPT_WARMUP_SECS", default_value_t = 10)]
    warmup_secs: u64,

    /// Give up on a client that never signals completion (seconds)
    #[arg(long, env = "THPT_COMPLETION_TIMEOUT_SECS")]
    completion_timeout_secs: Option<u64>,

    /// Directory for the in-flight capture and tool output
    #[arg(long, env = "THPT_TEMP_DIR", default_value = "tempfiles/reverse_mode")]
    temp_dir: PathBuf,

    /// Directory for archived output of failed sessions (defaults to the temp dir)
    #[arg(long, env = "THPT_DEBUG_DIR")]
    debug_dir: Option<PathBuf>,

    /// Dedicated Prometheus listener; metrics are always served on /metrics
    #[arg(long, env = "THPT_METRICS_LISTEN")]
    metrics_listen: Option<SocketAddr>,
}

impl Cli {
    fn coordinator(&self) -> SessionCoordinator {
        let process_config = ProcessConfig {
            capturer: ToolCommand::new(self.tshark_bin.clone(), &["-w", "{file}"]),
            bandwidth_server: ToolCommand::new(self.iperf_bin.clone(), &["-s", "--port", "{port}"]),
            server_port: self.iperf_port,
            warmup: Duration::from_secs(self.warmup_secs),
        };

        let artifact_config = ArtifactConfig {
            temp_dir: self.temp_dir.clone(),
            debug_dir: self.debug_dir.clone().unwrap_or_else(|| self.temp_dir.clone()),
            ..Default::default()
        };

        let analyzer = ToolAnalyzer::new(AnalyzerConfig {
            tshark_program: self.tshark_bin.clone(),
        });

        SessionCoordinator::new(
            ProcessPairController::new(process_config),
            ArtifactManager::new(artifact_config),
            Arc::new(analyzer),
            SessionConfig {
                completion_timeout: self.completion_timeout_secs.map(Duration::from_secs),
            },
        )
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = start_metrics_server(MetricsConfig {
        listen_addr: cli.metrics_listen,
    }) {
        warn!("Metrics disabled: {}", e);
    }

    let app = create_api_server(cli.coordinator());

    let listener = tokio::net::TcpListener::bind(cli.listen)
        .await
        .with_context(|| format!("Failed to bind to {}", cli.listen))?;

    info!(
        listen = %cli.listen,
        iperf_port = cli.iperf_port,
        temp_dir = %cli.temp_dir.display(),
        "Throughput server running at ws://{}/throughput",
        cli.listen
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}
