use std::path::Path;
use std::time::Duration;

/// Placeholder replaced by the capture target path
pub const FILE_PLACEHOLDER: &str = "{file}";

/// Placeholder replaced by the bandwidth server port
pub const PORT_PLACEHOLDER: &str = "{port}";

/// An external tool invocation with placeholder-aware arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Expand `{file}` and `{port}` in every argument
    pub fn render_args(&self, file: Option<&Path>, port: u16) -> Vec<String> {
        let file = file
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_default();
        let port = port.to_string();

        self.args
            .iter()
            .map(|arg| {
                arg.replace(FILE_PLACEHOLDER, &file)
                    .replace(PORT_PLACEHOLDER, &port)
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct ProcessConfig {
    /// Packet capturer, writes to `{file}`
    pub capturer: ToolCommand,
    /// Bandwidth server, listens on `{port}`
    pub bandwidth_server: ToolCommand,
    pub server_port: u16,
    /// Time the capturer gets to attach before traffic begins
    pub warmup: Duration,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            capturer: ToolCommand::new("tshark", &["-w", FILE_PLACEHOLDER]),
            bandwidth_server: ToolCommand::new("iperf3", &["-s", "--port", PORT_PLACEHOLDER]),
            server_port: 5201,
            warmup: Duration::from_secs(10),
        }
    }
}
