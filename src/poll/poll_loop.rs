// src/poll/poll_loop.rs

//! Bounded-retry polling engine.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Timing;
use crate::errors::VerifyError;
use crate::poll::predicate::{AwaitPredicate, Verdict};

/// Error returned by a poll supplier.
///
/// Plain `anyhow` errors convert to [`SupplierError::Transient`]: a
/// collaborator that is not reachable yet is retried until the timeout.
/// Suppliers return [`SupplierError::Fatal`] for states that can never
/// converge (malformed status, illegal transition).
#[derive(Debug)]
pub enum SupplierError {
    Transient(anyhow::Error),
    Fatal(anyhow::Error),
}

impl SupplierError {
    pub fn transient(err: impl Into<anyhow::Error>) -> Self {
        SupplierError::Transient(err.into())
    }

    pub fn fatal(err: impl Into<anyhow::Error>) -> Self {
        SupplierError::Fatal(err.into())
    }
}

impl From<anyhow::Error> for SupplierError {
    fn from(err: anyhow::Error) -> Self {
        SupplierError::Transient(err)
    }
}

/// Timing and naming for one await.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOptions {
    /// What is being awaited, used in logs and errors
    /// (e.g. `"stream 'ticktock' deployed"`).
    pub description: String,
    /// Total wall-clock bound, supplier time included.
    pub timeout: Duration,
    /// Pause between ticks.
    pub interval: Duration,
}

impl PollOptions {
    pub fn new(description: impl Into<String>, timeout: Duration, interval: Duration) -> Self {
        Self {
            description: description.into(),
            timeout,
            interval,
        }
    }

    /// Status-poll defaults from config (`max_wait_time`, `poll_interval`).
    pub fn from_timing(description: impl Into<String>, timing: &Timing) -> Self {
        Self::new(description, timing.max_wait_time, timing.poll_interval)
    }

    /// Log-poll defaults from config (`max_wait_time`, `log_poll_interval`).
    pub fn for_logs(description: impl Into<String>, timing: &Timing) -> Self {
        Self::new(description, timing.max_wait_time, timing.log_poll_interval)
    }
}

/// Why a poll stopped early.
#[derive(Debug)]
pub enum FailFastCause {
    /// A fail-fast condition of the predicate fired.
    Predicate { name: String },
    /// The supplier reported a fatal error.
    Fatal(anyhow::Error),
}

impl fmt::Display for FailFastCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailFastCause::Predicate { name } => write!(f, "fail-fast condition fired: {name}"),
            FailFastCause::Fatal(err) => write!(f, "fatal supplier error: {err:#}"),
        }
    }
}

/// Result of one await.
#[derive(Debug)]
pub enum PollOutcome<S> {
    Success {
        snapshot: S,
        attempts: u32,
        elapsed: Duration,
    },
    Timeout {
        last: Option<S>,
        attempts: u32,
        elapsed: Duration,
    },
    FailedFast {
        cause: FailFastCause,
        last: Option<S>,
        attempts: u32,
    },
    Cancelled {
        last: Option<S>,
        attempts: u32,
    },
}

impl<S: fmt::Debug> PollOutcome<S> {
    pub fn is_success(&self) -> bool {
        matches!(self, PollOutcome::Success { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, PollOutcome::Timeout { .. })
    }

    pub fn is_failed_fast(&self) -> bool {
        matches!(self, PollOutcome::FailedFast { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PollOutcome::Cancelled { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            PollOutcome::Success { attempts, .. }
            | PollOutcome::Timeout { attempts, .. }
            | PollOutcome::FailedFast { attempts, .. }
            | PollOutcome::Cancelled { attempts, .. } => *attempts,
        }
    }

    /// Last snapshot seen, if any tick produced one.
    pub fn last_snapshot(&self) -> Option<&S> {
        match self {
            PollOutcome::Success { snapshot, .. } => Some(snapshot),
            PollOutcome::Timeout { last, .. }
            | PollOutcome::FailedFast { last, .. }
            | PollOutcome::Cancelled { last, .. } => last.as_ref(),
        }
    }

    /// Convert into the crate error taxonomy.
    ///
    /// A fatal supplier error that already is a [`VerifyError`] (e.g. an
    /// illegal transition) is surfaced unchanged.
    pub fn into_result(self, options: &PollOptions) -> Result<S, VerifyError> {
        let describe = |last: &Option<S>| match last {
            Some(s) => format!("{s:?}"),
            None => "nothing".to_string(),
        };

        match self {
            PollOutcome::Success { snapshot, .. } => Ok(snapshot),
            PollOutcome::Timeout { last, .. } => Err(VerifyError::Timeout {
                what: options.description.clone(),
                timeout: options.timeout,
                last: describe(&last),
            }),
            PollOutcome::FailedFast {
                cause: FailFastCause::Fatal(err),
                last,
                ..
            } => match err.downcast::<VerifyError>() {
                Ok(verify) => Err(verify),
                Err(err) => Err(VerifyError::FailedFast {
                    what: options.description.clone(),
                    cause: format!("{err:#}"),
                    last: describe(&last),
                }),
            },
            PollOutcome::FailedFast { cause, last, .. } => Err(VerifyError::FailedFast {
                what: options.description.clone(),
                cause: cause.to_string(),
                last: describe(&last),
            }),
            PollOutcome::Cancelled { .. } => Err(VerifyError::Cancelled {
                what: options.description.clone(),
            }),
        }
    }
}

/// The polling engine.
///
/// A `PollLoop` is cheap to clone; clones share the cancellation token.
#[derive(Debug, Clone, Default)]
pub struct PollLoop {
    cancel: Option<CancellationToken>,
}

impl PollLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self {
            cancel: Some(cancel),
        }
    }

    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancel.as_ref()
    }

    /// Poll `supply` until `predicate` is satisfied, a fail-fast condition
    /// fires, the supplier fails fatally, the timeout elapses or the token is
    /// cancelled.
    ///
    /// The supplier is called at most once per tick and never concurrently
    /// with itself. Transient supplier errors are logged and retried.
    pub async fn run<S, F, Fut>(
        &self,
        options: &PollOptions,
        predicate: &AwaitPredicate<S>,
        mut supply: F,
    ) -> PollOutcome<S>
    where
        S: fmt::Debug + 'static,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<S, SupplierError>>,
    {
        let started = Instant::now();
        let deadline = started + options.timeout;
        let mut attempts: u32 = 0;
        let mut transient_errors: u32 = 0;
        let mut last: Option<S> = None;

        debug!(
            what = %options.description,
            timeout_ms = options.timeout.as_millis() as u64,
            interval_ms = options.interval.as_millis() as u64,
            until = %predicate.success_condition().name(),
            "await started"
        );

        loop {
            if self.is_cancelled() {
                info!(what = %options.description, attempts, "await cancelled");
                return PollOutcome::Cancelled { last, attempts };
            }

            attempts += 1;

            let supplied = match self.race(timeout_at(deadline, supply())).await {
                None => {
                    info!(what = %options.description, attempts, "await cancelled during tick");
                    return PollOutcome::Cancelled { last, attempts };
                }
                Some(Err(_elapsed)) => {
                    debug!(what = %options.description, attempts, "supplier overran deadline");
                    break;
                }
                Some(Ok(result)) => result,
            };

            match supplied {
                Ok(snapshot) => match predicate.evaluate(&snapshot) {
                    Verdict::FailFast(name) => {
                        warn!(
                            what = %options.description,
                            attempts,
                            condition = %name,
                            snapshot = ?snapshot,
                            "await failed fast"
                        );
                        return PollOutcome::FailedFast {
                            cause: FailFastCause::Predicate { name },
                            last: Some(snapshot),
                            attempts,
                        };
                    }
                    Verdict::Satisfied => {
                        let elapsed = started.elapsed();
                        debug!(
                            what = %options.description,
                            attempts,
                            elapsed_ms = elapsed.as_millis() as u64,
                            "await satisfied"
                        );
                        return PollOutcome::Success {
                            snapshot,
                            attempts,
                            elapsed,
                        };
                    }
                    Verdict::Pending => {
                        debug!(
                            what = %options.description,
                            attempts,
                            snapshot = ?snapshot,
                            "condition not met yet"
                        );
                        last = Some(snapshot);
                    }
                },
                Err(SupplierError::Transient(err)) => {
                    transient_errors += 1;
                    debug!(
                        what = %options.description,
                        attempts,
                        error = %format!("{err:#}"),
                        "transient supplier error; retrying"
                    );
                }
                Err(SupplierError::Fatal(err)) => {
                    warn!(
                        what = %options.description,
                        attempts,
                        error = %format!("{err:#}"),
                        "fatal supplier error; aborting await"
                    );
                    return PollOutcome::FailedFast {
                        cause: FailFastCause::Fatal(err),
                        last,
                        attempts,
                    };
                }
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let pause = options.interval.min(deadline - now);
            if self.race(sleep(pause)).await.is_none() {
                info!(what = %options.description, attempts, "await cancelled while sleeping");
                return PollOutcome::Cancelled { last, attempts };
            }
            if Instant::now() >= deadline {
                break;
            }
        }

        let elapsed = started.elapsed();
        warn!(
            what = %options.description,
            attempts,
            transient_errors,
            elapsed_ms = elapsed.as_millis() as u64,
            last = ?last,
            "await timed out"
        );
        PollOutcome::Timeout {
            last,
            attempts,
            elapsed,
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| c.is_cancelled())
    }

    /// Run `fut` unless the token fires first.
    async fn race<T>(&self, fut: impl Future<Output = T>) -> Option<T> {
        match &self.cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => None,
                value = fut => Some(value),
            },
            None => Some(fut.await),
        }
    }
}
