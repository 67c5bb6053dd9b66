// src/poll/mod.rs

//! The single polling primitive every await in the harness goes through.
//!
//! - [`predicate`] holds composable success / fail-fast conditions over a
//!   polled snapshot.
//! - [`poll_loop`] is the bounded-retry engine: call the supplier, check
//!   fail-fast, check success, sleep, repeat until the timeout.
//!
//! Cancellation uses `tokio_util`'s `CancellationToken`; a scenario that
//! aborts cancels its token and every in-flight poll returns
//! [`PollOutcome::Cancelled`] right away.

pub mod poll_loop;
pub mod predicate;

pub use poll_loop::{FailFastCause, PollLoop, PollOptions, PollOutcome, SupplierError};
pub use predicate::{
    AwaitCondition, AwaitPredicate, CountSnapshot, LogSnapshot, StatusSnapshot, Verdict,
    count_at_least, log_contains, status_in, status_is,
};
pub use tokio_util::sync::CancellationToken;
