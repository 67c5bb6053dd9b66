// src/logging.rs

//! Logging setup for `dataflow-verify` using `tracing` + `tracing-subscriber`.
//!
//! The filter comes from, in order:
//! 1. `--log-level` (applies to this crate; dependencies stay at `warn`),
//! 2. `DATAFLOW_VERIFY_LOG`, taken as full filter directives
//!    (e.g. `info,dataflow_verify::poll=trace`),
//! 3. `warn,dataflow_verify=info`.
//!
//! Logs go to stderr; stdout carries only command results.

use anyhow::{Result, anyhow};
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

pub const LOG_ENV: &str = "DATAFLOW_VERIFY_LOG";
const DEFAULT_DIRECTIVES: &str = "warn,dataflow_verify=info";

/// Install the global subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = build_filter(cli_level, std::env::var(LOG_ENV).ok().as_deref())?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to install log subscriber: {e}"))
}

/// Filter for the given CLI level and environment value.
///
/// A malformed environment value is reported rather than silently replaced.
pub fn build_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> Result<EnvFilter> {
    if let Some(level) = cli_level {
        return Ok(EnvFilter::new(format!(
            "warn,dataflow_verify={}",
            directive(level)
        )));
    }
    match env.map(str::trim).filter(|s| !s.is_empty()) {
        Some(directives) => EnvFilter::try_new(directives)
            .map_err(|e| anyhow!("invalid {LOG_ENV} value '{directives}': {e}")),
        None => Ok(EnvFilter::new(DEFAULT_DIRECTIVES)),
    }
}

fn directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}
