#![allow(dead_code)]

pub use dataflow_verify_test_utils::builders;
pub use dataflow_verify_test_utils::fake_client;
pub use dataflow_verify_test_utils::fake_logs;
pub use dataflow_verify_test_utils::{init_tracing, with_timeout};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;
