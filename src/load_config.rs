use std::fs;
use std::path::Path;

use anyhow::Result;
use serde::Deserialize;
use tracing::{error, info};

use crate::config::Config;

#[derive(Deserialize)]
struct StaticConfig {
    #[serde(default = "default_upload_dir")]
    upload_dir: std::path::PathBuf,
    #[serde(default)]
    scorm_dir: Option<std::path::PathBuf>,
}

fn default_upload_dir() -> std::path::PathBuf {
    std::path::PathBuf::from("./uploads")
}

/// Loads the static YAML config file and returns a fully resolved [`Config`].
/// When `scorm_dir` is omitted it defaults to `{upload_dir}/scorm`.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let static_conf: StaticConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    let scorm_dir = static_conf
        .scorm_dir
        .unwrap_or_else(|| static_conf.upload_dir.join("scorm"));

    let config = Config {
        upload_dir: static_conf.upload_dir,
        scorm_dir,
    };
    config.trace_loaded();

    Ok(config)
}
