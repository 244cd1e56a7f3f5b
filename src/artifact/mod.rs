mod manager;

pub use manager::{ArtifactConfig, ArtifactManager, DEBUG_FILE_FORMAT};
