use std::io::Write;
use std::path::{Path, PathBuf};

use crate::api::dto::CaptureConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to {action} capture config '{path:?}': {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse capture config '{path:?}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize capture config: {0}")]
    Serialize(#[source] serde_json::Error),
}

fn io_error(action: &'static str, path: &Path) -> impl FnOnce(std::io::Error) -> ConfigError {
    let path = path.to_path_buf();
    move |source| ConfigError::Io {
        action,
        path,
        source,
    }
}

/// Loads the capture config at `path`, or the platform defaults when the
/// file does not exist.
pub fn load_config(path: &Path) -> Result<CaptureConfig, ConfigError> {
    if !path.exists() {
        log::debug!(path:? = path; "No capture config found, using defaults");
        return Ok(CaptureConfig::default_for_platform());
    }

    let raw = std::fs::read_to_string(path).map_err(io_error("read", path))?;

    serde_json::from_str::<CaptureConfig>(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn save_config(path: &Path, config: &CaptureConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_error("create directory for", path))?;
    }

    let json = serde_json::to_string_pretty(config).map_err(ConfigError::Serialize)?;

    // Atomic-ish write: write to temp then rename.
    let tmp = path.with_extension("json.tmp");
    {
        let mut f = std::fs::File::create(&tmp).map_err(io_error("create", &tmp))?;
        f.write_all(json.as_bytes())
            .map_err(io_error("write", &tmp))?;
        f.flush().map_err(io_error("flush", &tmp))?;
    }
    std::fs::rename(&tmp, path).map_err(io_error("move", path))?;

    Ok(())
}
