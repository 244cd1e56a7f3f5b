use crate::process::error::{StartupError, StartupResult};
use crate::process::types::{ProcessConfig, ToolCommand};
use std::fs::File;
use std::path::Path;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::{debug, error, info};

/// The capturer and the bandwidth server of one session.
///
/// Both halves are owned here and only ever stopped together. Children are
/// spawned with `kill_on_drop`, so dropping a pair without calling
/// [`ProcessPair::stop`] still terminates them.
#[derive(Debug, Default)]
pub struct ProcessPair {
    capturer: Option<Child>,
    server: Option<Child>,
}

impl ProcessPair {
    /// Kill and reap both processes. Safe to call any number of times.
    pub async fn stop(&mut self) {
        let halves = [
            ("capturer", &mut self.capturer),
            ("bandwidth server", &mut self.server),
        ];

        for (name, slot) in halves {
            if let Some(mut child) = slot.take() {
                if let Err(e) = child.kill().await {
                    debug!("Ignoring {} termination error: {}", name, e);
                }
            }
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.capturer.is_none() && self.server.is_none()
    }

    pub fn capturer_pid(&self) -> Option<u32> {
        self.capturer.as_ref().and_then(|c| c.id())
    }

    pub fn server_pid(&self) -> Option<u32> {
        self.server.as_ref().and_then(|c| c.id())
    }
}

/// Starts and stops the capturer/bandwidth-server pair
#[derive(Debug, Clone, Default)]
pub struct ProcessPairController {
    config: ProcessConfig,
}

impl ProcessPairController {
    pub fn new(config: ProcessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    /// Launch the capturer on `capture_file`, then the bandwidth server with
    /// its combined output in `tool_output_file`, then wait out the warm-up.
    ///
    /// On failure nothing from the attempted pair is left running.
    pub async fn start(
        &self,
        capture_file: &Path,
        tool_output_file: &Path,
    ) -> StartupResult<ProcessPair> {
        let mut pair = ProcessPair::default();

        if let Err(e) = self.launch(&mut pair, capture_file, tool_output_file) {
            error!("Failed to start throughput test: {}", e);
            pair.stop().await;
            return Err(e);
        }

        debug!(
            "Waiting {:?} for the capturer to come online",
            self.config.warmup
        );
        tokio::time::sleep(self.config.warmup).await;
        info!(
            capturer_pid = ?pair.capturer_pid(),
            server_pid = ?pair.server_pid(),
            "Throughput test started"
        );

        Ok(pair)
    }

    fn launch(
        &self,
        pair: &mut ProcessPair,
        capture_file: &Path,
        tool_output_file: &Path,
    ) -> StartupResult<()> {
        let port = self.config.server_port;

        pair.capturer = Some(spawn(
            &self.config.capturer,
            Some(capture_file),
            port,
            Stdio::inherit(),
            Stdio::inherit(),
        )?);

        let output_error = |source| StartupError::OutputFile {
            path: tool_output_file.to_path_buf(),
            source,
        };
        let stdout = File::create(tool_output_file).map_err(output_error)?;
        let stderr = stdout.try_clone().map_err(output_error)?;

        pair.server = Some(spawn(
            &self.config.bandwidth_server,
            None,
            port,
            Stdio::from(stdout),
            Stdio::from(stderr),
        )?);

        Ok(())
    }
}

fn spawn(
    tool: &ToolCommand,
    file: Option<&Path>,
    port: u16,
    stdout: Stdio,
    stderr: Stdio,
) -> StartupResult<Child> {
    let args = tool.render_args(file, port);
    debug!(program = %tool.program, ?args, "Spawning");

    Command::new(&tool.program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr)
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| StartupError::Spawn {
            program: tool.program.clone(),
            source,
        })
}
