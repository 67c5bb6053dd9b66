// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, VerifyError};

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** apply
/// environment overrides or validate. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file, apply environment overrides and validate.
///
/// A missing file is not an error when `path` is the default location: the
/// harness then runs on defaults plus environment, which is how CI jobs
/// configure it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let mut raw = if !path.exists() && path == default_config_path() {
        debug!(path = %path.display(), "no config file; using defaults");
        RawConfigFile::default()
    } else {
        load_from_path(path)?
    };

    apply_env_overrides(&mut raw, |key| std::env::var(key).ok())?;
    ConfigFile::try_from(raw)
}

/// Apply the environment variables understood by the acceptance harness.
///
/// `lookup` abstracts `std::env::var` so tests can supply a fixed map.
///
/// | Variable | Field |
/// |---|---|
/// | `SERVER_URI` | `[server].uri` |
/// | `PLATFORM_TYPE` | `[platform].kind` |
/// | `PLATFORM_SUFFIX` | `[platform].route_suffix` |
/// | `BINDER` | `[platform].binder` |
/// | `MAX_WAIT_TIME` | `[timing].max_wait_time` (seconds) |
/// | `DEPLOY_PAUSE_TIME` | `[timing].poll_interval` (seconds) |
/// | `DEPLOY_PAUSE_RETRIES` | `[timing].deploy_pause_retries` |
pub fn apply_env_overrides<F>(raw: &mut RawConfigFile, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(uri) = lookup("SERVER_URI") {
        raw.server.uri = uri;
    }
    if let Some(kind) = lookup("PLATFORM_TYPE") {
        raw.platform.kind = kind.parse().map_err(VerifyError::ConfigError)?;
    }
    if let Some(suffix) = lookup("PLATFORM_SUFFIX") {
        raw.platform.route_suffix = suffix;
    }
    if let Some(binder) = lookup("BINDER") {
        raw.platform.binder = binder.parse().map_err(VerifyError::ConfigError)?;
    }
    if let Some(secs) = lookup("MAX_WAIT_TIME") {
        raw.timing.max_wait_time = secs;
    }
    if let Some(secs) = lookup("DEPLOY_PAUSE_TIME") {
        raw.timing.poll_interval = secs;
    }
    if let Some(retries) = lookup("DEPLOY_PAUSE_RETRIES") {
        raw.timing.deploy_pause_retries = retries.trim().parse().map_err(|e| {
            VerifyError::ConfigError(format!("DEPLOY_PAUSE_RETRIES '{retries}': {e}"))
        })?;
    }
    Ok(())
}

/// Default config location: `DataflowVerify.toml` in the working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("DataflowVerify.toml")
}
