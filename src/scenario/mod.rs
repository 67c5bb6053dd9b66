// src/scenario/mod.rs

//! One verification scenario end to end.
//!
//! [`ScenarioSession`] owns everything a scenario touches (log windows,
//! execution ledger, lifecycle tracking, the "apps registered" flag) and
//! exposes the awaits a test body is written in terms of. [`verify`]
//! compares a composed task's predicted outcomes with what was recorded.

pub mod session;
pub mod verify;

pub use session::{LogProbe, ScenarioSession, TeardownReport};
pub use verify::{AssertionFailure, VerificationReport, verify_outcomes};
