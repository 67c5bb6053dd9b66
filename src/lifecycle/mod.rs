// src/lifecycle/mod.rs

//! Deployment lifecycle of streams and tasks.
//!
//! - [`state`] defines the states and the allowed-edges table.
//! - [`machine`] validates observed transitions per unit.
//! - [`address`] decides whether every instance of a unit is reachable,
//!   which is what separates `deployed` from `partial`.
//! - [`await_state`] composes the machine with the poll loop.

pub mod address;
pub mod await_state;
pub mod machine;
pub mod state;

pub use address::{AddressResolver, Resolution};
pub use await_state::{
    AwaitContext, StateSnapshot, await_history, error_marker_found, release_status,
    state_is_error, state_predicate,
};
pub use machine::{LifecycleStateMachine, ValidationResult};
pub use state::DeploymentState;
