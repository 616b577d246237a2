//! Settings file loading.
//!
//! The file is RON and mirrors [`EngineSettings`]; every section and field is
//! optional:
//!
//! ```ron
//! (
//!     fetch: (request_timeout: 60),
//!     download: (workers: 16),
//!     compress: (
//!         workers: Some(2),
//!         retry: (large_file_threshold: 52428800, fallback_profile: aggressive),
//!     ),
//! )
//! ```
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bundler_engine::EngineSettings;
use engine_logging::engine_info;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
}

/// Defaults when `path` is `None`; otherwise the parsed file.
pub fn load_settings(path: Option<&Path>) -> Result<EngineSettings, ConfigError> {
    let Some(path) = path else {
        return Ok(EngineSettings::default());
    };
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let settings = parse_settings(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    engine_info!("Loaded settings from {:?}", path);
    Ok(settings)
}

pub fn parse_settings(text: &str) -> Result<EngineSettings, ron::error::SpannedError> {
    ron::from_str(text)
}
