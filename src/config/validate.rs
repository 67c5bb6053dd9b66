// src/config/validate.rs

use regex::Regex;

use crate::config::duration::parse_duration;
use crate::config::model::{ConfigFile, RawConfigFile, Timing};
use crate::errors::{Result, VerifyError};
use crate::types::PlatformKind;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::VerifyError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_server(&raw)?;
        validate_platform(&raw)?;
        validate_markers(&raw)?;
        let timing = validate_timing(&raw)?;
        Ok(ConfigFile::new_unchecked(
            raw.server,
            raw.platform,
            timing,
            raw.markers,
            raw.registration,
        ))
    }
}

fn validate_server(cfg: &RawConfigFile) -> Result<()> {
    let uri = cfg.server.uri.trim();
    if uri.is_empty() {
        return Err(VerifyError::ConfigError(
            "[server].uri must not be empty".to_string(),
        ));
    }
    if !(uri.starts_with("http://") || uri.starts_with("https://")) {
        return Err(VerifyError::ConfigError(format!(
            "[server].uri must be an http(s) URI (got '{uri}')"
        )));
    }
    Ok(())
}

fn validate_platform(cfg: &RawConfigFile) -> Result<()> {
    match cfg.platform.kind {
        PlatformKind::Kubernetes => {
            let has_namespace = cfg
                .platform
                .namespace
                .as_deref()
                .is_some_and(|ns| !ns.trim().is_empty());
            if !has_namespace {
                return Err(VerifyError::ConfigError(
                    "[platform].namespace is required when kind = \"kubernetes\"".to_string(),
                ));
            }
        }
        PlatformKind::CloudFoundry => {
            if cfg.platform.route_suffix.trim().is_empty() {
                return Err(VerifyError::ConfigError(
                    "[platform].route_suffix must not be empty when kind = \"cloudfoundry\""
                        .to_string(),
                ));
            }
        }
        PlatformKind::Local => {}
    }
    Ok(())
}

fn validate_markers(cfg: &RawConfigFile) -> Result<()> {
    for pattern in cfg.markers.error.iter() {
        if let Err(e) = Regex::new(pattern) {
            return Err(VerifyError::ConfigError(format!(
                "[markers].error contains an invalid regex '{pattern}': {e}"
            )));
        }
    }
    Ok(())
}

fn validate_timing(cfg: &RawConfigFile) -> Result<Timing> {
    let field = |name: &str, value: &str| {
        parse_duration(value)
            .map_err(|e| VerifyError::ConfigError(format!("[timing].{name}: {e}")))
    };

    let timing = Timing {
        max_wait_time: field("max_wait_time", &cfg.timing.max_wait_time)?,
        poll_interval: field("poll_interval", &cfg.timing.poll_interval)?,
        log_poll_interval: field("log_poll_interval", &cfg.timing.log_poll_interval)?,
        deploy_pause_retries: cfg.timing.deploy_pause_retries,
    };

    if timing.max_wait_time.is_zero() {
        return Err(VerifyError::ConfigError(
            "[timing].max_wait_time must be greater than zero".to_string(),
        ));
    }
    if timing.poll_interval.is_zero() || timing.log_poll_interval.is_zero() {
        return Err(VerifyError::ConfigError(
            "[timing] poll intervals must be greater than zero".to_string(),
        ));
    }
    if timing.poll_interval > timing.max_wait_time {
        return Err(VerifyError::ConfigError(format!(
            "[timing].poll_interval ({:?}) must not exceed max_wait_time ({:?})",
            timing.poll_interval, timing.max_wait_time
        )));
    }
    if timing.deploy_pause_retries == 0 {
        return Err(VerifyError::ConfigError(
            "[timing].deploy_pause_retries must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(timing)
}
