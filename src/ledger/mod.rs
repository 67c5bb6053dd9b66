// src/ledger/mod.rs

//! Parent/child task execution tracking used by verification assertions.

pub mod execution;
pub mod store;

pub use execution::Execution;
pub use store::ExecutionLedger;
