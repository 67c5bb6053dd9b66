// src/config/mod.rs

//! Session configuration for dataflow-verify.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk and apply environment overrides (`loader.rs`).
//! - Validate timing and platform invariants (`validate.rs`).
//! - Parse human duration strings such as `"30s"` (`duration.rs`).

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use duration::parse_duration;
pub use loader::{apply_env_overrides, default_config_path, load_and_validate, load_from_path};
pub use model::{
    ConfigFile, MarkerSection, PlatformSection, RawConfigFile, RegistrationSection, ServerSection,
    Timing, TimingSection,
};
