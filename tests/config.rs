// tests/config.rs

mod common;
use crate::common::builders::ConfigFileBuilder;
use crate::common::{TestResult, init_tracing};

use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

use dataflow_verify::config::{
    ConfigFile, RawConfigFile, apply_env_overrides, load_from_path, parse_duration,
};
use dataflow_verify::errors::VerifyError;
use dataflow_verify::types::{Binder, PlatformKind};

fn write_config(contents: &str) -> Result<tempfile::NamedTempFile, std::io::Error> {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
    file.write_all(contents.as_bytes())?;
    Ok(file)
}

#[test]
fn loads_a_full_config_file() -> TestResult {
    init_tracing();
    let file = write_config(
        r#"
[server]
uri = "http://scdf.example.com:9393"

[platform]
kind = "kubernetes"
binder = "kafka"
namespace = "scdf"
app_host = ".apps.example.com"

[timing]
max_wait_time = "2m"
poll_interval = "3s"
log_poll_interval = "250ms"
deploy_pause_retries = 40

[markers]
error = ["APPLICATION FAILED TO START", "OutOfMemoryError"]
"#,
    )?;

    let cfg = ConfigFile::try_from(load_from_path(file.path())?)?;

    assert_eq!(cfg.server.uri, "http://scdf.example.com:9393");
    assert_eq!(cfg.platform.kind, PlatformKind::Kubernetes);
    assert_eq!(cfg.platform.binder, Binder::Kafka);
    assert_eq!(cfg.platform.namespace.as_deref(), Some("scdf"));
    assert_eq!(cfg.timing.max_wait_time, Duration::from_secs(120));
    assert_eq!(cfg.timing.poll_interval, Duration::from_secs(3));
    assert_eq!(cfg.timing.log_poll_interval, Duration::from_millis(250));
    assert_eq!(cfg.timing.deploy_budget(), Duration::from_secs(120));
    assert_eq!(cfg.markers.error.len(), 2);
    assert_eq!(
        cfg.registration.stream_apps_uri_for(cfg.platform.binder),
        "https://dataflow.spring.io/kafka-maven-latest"
    );
    Ok(())
}

#[test]
fn an_empty_file_means_local_defaults() -> TestResult {
    let file = write_config("")?;
    let cfg = ConfigFile::try_from(load_from_path(file.path())?)?;

    assert_eq!(cfg.server.uri, "http://localhost:9393");
    assert_eq!(cfg.platform.kind, PlatformKind::Local);
    assert_eq!(cfg.timing.max_wait_time, Duration::from_secs(30));
    assert_eq!(cfg.timing.deploy_pause_retries, 25);
    assert!(!cfg.markers.error.is_empty());
    Ok(())
}

#[test]
fn environment_overrides_the_file() -> TestResult {
    let mut raw = RawConfigFile::default();
    let env: HashMap<&str, &str> = HashMap::from([
        ("SERVER_URI", "https://dataflow.internal"),
        ("PLATFORM_TYPE", "cloudfoundry"),
        ("PLATFORM_SUFFIX", "cfapps.io"),
        ("BINDER", "kafka"),
        ("MAX_WAIT_TIME", "600"),
        ("DEPLOY_PAUSE_TIME", "10"),
        ("DEPLOY_PAUSE_RETRIES", "60"),
    ]);

    apply_env_overrides(&mut raw, |key| env.get(key).map(|v| v.to_string()))?;
    let cfg = ConfigFile::try_from(raw)?;

    assert_eq!(cfg.server.uri, "https://dataflow.internal");
    assert_eq!(cfg.platform.kind, PlatformKind::CloudFoundry);
    assert_eq!(cfg.platform.route_suffix, "cfapps.io");
    assert_eq!(cfg.platform.binder, Binder::Kafka);
    assert_eq!(cfg.timing.max_wait_time, Duration::from_secs(600));
    assert_eq!(cfg.timing.poll_interval, Duration::from_secs(10));
    assert_eq!(cfg.timing.deploy_budget(), Duration::from_secs(600));
    Ok(())
}

#[test]
fn bad_environment_values_are_reported() {
    let mut raw = RawConfigFile::default();
    let err = apply_env_overrides(&mut raw, |key| {
        (key == "PLATFORM_TYPE").then(|| "mainframe".to_string())
    })
    .expect_err("unknown platform");
    assert!(matches!(err, VerifyError::ConfigError(ref msg) if msg.contains("mainframe")));

    let mut raw = RawConfigFile::default();
    let err = apply_env_overrides(&mut raw, |key| {
        (key == "DEPLOY_PAUSE_RETRIES").then(|| "many".to_string())
    })
    .expect_err("non-numeric retries");
    assert!(matches!(err, VerifyError::ConfigError(_)));
}

#[test]
fn invalid_configs_are_rejected() {
    let invalid = |raw: RawConfigFile, needle: &str| match ConfigFile::try_from(raw) {
        Err(VerifyError::ConfigError(msg)) => {
            assert!(msg.contains(needle), "'{msg}' should mention '{needle}'")
        }
        other => panic!("expected config error mentioning '{needle}', got {other:?}"),
    };

    invalid(ConfigFileBuilder::new().with_server_uri("").raw(), "uri");
    invalid(ConfigFileBuilder::new().with_server_uri("ftp://x").raw(), "http");
    invalid(
        ConfigFileBuilder::new()
            .with_platform(PlatformKind::Kubernetes)
            .raw(),
        "namespace",
    );
    invalid(
        ConfigFileBuilder::new()
            .with_platform(PlatformKind::CloudFoundry)
            .with_route_suffix(" ")
            .raw(),
        "route_suffix",
    );
    invalid(ConfigFileBuilder::new().with_markers(&["(unclosed"]).raw(), "regex");
    invalid(ConfigFileBuilder::new().with_max_wait("0s").raw(), "max_wait_time");
    invalid(ConfigFileBuilder::new().with_max_wait("soon").raw(), "max_wait_time");
    invalid(
        ConfigFileBuilder::new()
            .with_max_wait("1s")
            .with_poll_interval("2s")
            .raw(),
        "must not exceed",
    );
    invalid(ConfigFileBuilder::new().with_deploy_retries(0).raw(), "deploy_pause_retries");
}

#[test]
fn malformed_toml_is_a_toml_error() -> TestResult {
    let file = write_config("[server\nuri = 1")?;
    assert!(matches!(
        load_from_path(file.path()),
        Err(VerifyError::TomlError(_))
    ));
    assert!(matches!(
        load_from_path("/definitely/not/here.toml"),
        Err(VerifyError::IoError(_))
    ));
    Ok(())
}

#[test]
fn durations_parse_with_units() {
    assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
    assert_eq!(parse_duration("30"), Ok(Duration::from_secs(30)));
    assert_eq!(parse_duration(" 5s "), Ok(Duration::from_secs(5)));
    assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
    assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
    assert!(parse_duration("").is_err());
    assert!(parse_duration("ms").is_err());
    assert!(parse_duration("3 weeks").is_err());
}
