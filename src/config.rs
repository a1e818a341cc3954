use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

/// Runtime configuration for the import pipeline. Passed explicitly so the
/// pipeline stays deterministic under test; there is no ambient global state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root of managed upload storage; rehomed assets land under
    /// `upload_dir/courses/{course}/lessons/{lesson}/images/`.
    pub upload_dir: PathBuf,
    /// Scratch space where package archives are extracted.
    pub scorm_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("./uploads"),
            scorm_dir: PathBuf::from("./uploads/scorm"),
        }
    }
}

impl Config {
    pub fn trace_loaded(&self) {
        info!(
            upload_dir = %self.upload_dir.display(),
            scorm_dir = %self.scorm_dir.display(),
            "Loaded Config"
        );
        debug!(?self, "Config loaded (full debug)");
    }
}
