// src/logs/mod.rs

//! Log access for the apps under test.
//!
//! - [`window`] keeps an append-only, offset-tracked copy of each log source
//!   so error markers are only scanned once, plus the per-scenario
//!   [`LogBook`] that dumps every window when a scenario fails.
//! - [`markers`] compiles the configured error-marker regexes.
//! - [`adapter`] turns a [`LogTarget`] into an HTTP fetch or a platform CLI
//!   invocation, depending on the platform selected for the session.
//! - [`command`] runs those CLI invocations.
//! - [`monitor`] ties a fetch strategy, the markers and a scenario's book
//!   together for use inside poll suppliers.

pub mod adapter;
pub mod command;
pub mod markers;
pub mod monitor;
pub mod window;

pub use adapter::{LogFetcher, LogRequest, LogTarget, PlatformLogAdapter};
pub use markers::{ErrorMarkers, MarkerHit};
pub use monitor::LogMonitor;
pub use window::{LogBook, LogWindow};
