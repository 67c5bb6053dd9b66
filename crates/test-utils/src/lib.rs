//! Shared fixtures for the integration tests: config and execution
//! builders, a scripted orchestration client and a scripted log fetcher.

pub mod builders;
pub mod fake_client;
pub mod fake_logs;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Ceiling for any single awaited operation in a test. Scenario configs
/// built by [`builders::ConfigFileBuilder`] time out well below it.
pub const TEST_DEADLINE: Duration = Duration::from_secs(5);

/// Initialise tracing for tests, once per test binary.
///
/// Output goes through the test writer, so it only shows for failing tests
/// (or with `--nocapture`). Override the filter with e.g.
/// `RUST_LOG=dataflow_verify::poll=trace`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("warn,dataflow_verify=debug"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Await `f`, panicking if it outlives [`TEST_DEADLINE`].
///
/// A hung poll loop then fails the test instead of stalling the suite.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(TEST_DEADLINE, f).await {
        Ok(value) => value,
        Err(_) => panic!("test step did not finish within {TEST_DEADLINE:?}"),
    }
}
