// src/errors.rs

//! Crate-wide error type and helpers.
//!
//! Errors fall into four families:
//! - configuration / IO problems while setting up a session,
//! - structural defects (a bad composed-task definition, an illegal
//!   lifecycle transition) that are never retried,
//! - await failures (timeout, fail-fast, cancellation) raised by the poll loop,
//! - assertion failures comparing expected and observed executions.

use std::time::Duration;

use thiserror::Error;

use crate::composed::DefinitionError;
use crate::scenario::AssertionFailure;

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid composed task definition: {0}")]
    Definition(#[from] DefinitionError),

    #[error("Illegal lifecycle transition for '{unit}': {from} -> {to}")]
    IllegalTransition {
        unit: String,
        from: String,
        to: String,
    },

    #[error("Ledger rejected execution {id}: {reason}")]
    Ledger { id: i64, reason: String },

    #[error("{what} did not converge within {timeout:?} (last observed: {last})")]
    Timeout {
        what: String,
        timeout: Duration,
        last: String,
    },

    #[error("{what} failed fast: {cause} (last observed: {last})")]
    FailedFast {
        what: String,
        cause: String,
        last: String,
    },

    #[error("{what} was cancelled")]
    Cancelled { what: String },

    #[error(transparent)]
    Assertion(#[from] AssertionFailure),

    #[error("Platform request failed: {0}")]
    Platform(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VerifyError {
    /// Structural errors indicate a defect in the scenario itself; retrying
    /// cannot make them pass.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            VerifyError::Definition(_) | VerifyError::IllegalTransition { .. }
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, VerifyError>;
