use crate::process::{StartupError, StartupResult};
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Timestamp pattern used for archived debug files
pub const DEBUG_FILE_FORMAT: &str = "%Y-%m-%d-%H-%M-%S.log";

/// Numbered names tried after the plain timestamp is taken
const MAX_ARCHIVE_SUFFIX: u32 = 1000;

#[derive(Debug, Clone)]
pub struct ArtifactConfig {
    /// Directory holding the in-flight capture and tool-output files
    pub temp_dir: PathBuf,
    /// Directory receiving timestamped copies of failed sessions' output
    pub debug_dir: PathBuf,
    pub capture_file_name: String,
    pub tool_output_file_name: String,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            temp_dir: PathBuf::from("tempfiles/reverse_mode"),
            debug_dir: PathBuf::from("tempfiles/reverse_mode"),
            capture_file_name: "thpt_temp.pcap".to_string(),
            tool_output_file_name: "thpt_temp_file".to_string(),
        }
    }
}

/// Owns the on-disk files of a session: preparing them before the tools
/// start and keeping a copy around when a session fails.
#[derive(Debug, Clone, Default)]
pub struct ArtifactManager {
    config: ArtifactConfig,
}

impl ArtifactManager {
    pub fn new(config: ArtifactConfig) -> Self {
        Self { config }
    }

    pub fn capture_path(&self) -> PathBuf {
        self.config.temp_dir.join(&self.config.capture_file_name)
    }

    pub fn tool_output_path(&self) -> PathBuf {
        self.config.temp_dir.join(&self.config.tool_output_file_name)
    }

    /// Create (or truncate) `path` so the capturer can write to it even when
    /// it runs as a different user.
    pub fn prepare(&self, path: &Path) -> StartupResult<()> {
        let prepare_error = |source| StartupError::Prepare {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(prepare_error)?;
        }
        fs::File::create(path).map_err(prepare_error)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o666))
                .map_err(prepare_error)?;
        }

        debug!("Prepared {}", path.display());
        Ok(())
    }

    /// Copy `source` into the debug directory under a timestamped name.
    ///
    /// Archives made within the same second get a `-N` suffix instead of
    /// replacing each other. Returns the archive path, or `None` if archiving
    /// failed. Failures are logged only.
    pub fn archive(&self, source: &Path) -> Option<PathBuf> {
        match self.copy_to_debug_dir(source) {
            Ok(target) => {
                debug!("Archived {} to {}", source.display(), target.display());
                Some(target)
            }
            Err(e) => {
                warn!("Failed to archive {}: {}", source.display(), e);
                None
            }
        }
    }

    fn copy_to_debug_dir(&self, source: &Path) -> io::Result<PathBuf> {
        let mut input = File::open(source)?;
        fs::create_dir_all(&self.config.debug_dir)?;

        let stamp = chrono::Local::now().format(DEBUG_FILE_FORMAT).to_string();
        let stem = stamp.trim_end_matches(".log");

        for suffix in 0..=MAX_ARCHIVE_SUFFIX {
            let name = match suffix {
                0 => stamp.clone(),
                n => format!("{stem}-{n}.log"),
            };
            let target = self.config.debug_dir.join(name);

            match OpenOptions::new().write(true).create_new(true).open(&target) {
                Ok(mut output) => {
                    io::copy(&mut input, &mut output)?;
                    return Ok(target);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            }
        }

        Err(io::Error::new(
            ErrorKind::AlreadyExists,
            format!("every archive name for {stem} is taken"),
        ))
    }

    /// Append a failure description to `path`, best effort
    pub fn append_failure(&self, path: &Path, detail: &str) {
        let appended = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| writeln!(file, "{detail}"));

        if let Err(e) = appended {
            warn!("Failed to record failure in {}: {}", path.display(), e);
        }
    }
}
