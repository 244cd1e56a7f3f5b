mod controller;
mod error;
mod types;

pub use controller::{ProcessPair, ProcessPairController};
pub use error::{StartupError, StartupResult};
pub use types::{ProcessConfig, ToolCommand};
