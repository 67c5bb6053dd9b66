#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use dataflow_verify::client::{AppStatus, ExecutionStatus, InstanceStatus, TaskExecution, UnitStatus};
use dataflow_verify::config::{ConfigFile, RawConfigFile};
use dataflow_verify::types::PlatformKind;

/// Builder for `ConfigFile` to simplify test setup.
///
/// Starts from a local-platform config with short timings so awaits settle
/// (or time out) within a test's budget.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        let mut config = RawConfigFile::default();
        config.timing.max_wait_time = "500ms".to_string();
        config.timing.poll_interval = "10ms".to_string();
        config.timing.log_poll_interval = "10ms".to_string();
        config.timing.deploy_pause_retries = 50;
        Self { config }
    }

    pub fn with_server_uri(mut self, uri: &str) -> Self {
        self.config.server.uri = uri.to_string();
        self
    }

    pub fn with_platform(mut self, kind: PlatformKind) -> Self {
        self.config.platform.kind = kind;
        self
    }

    /// Kubernetes platform in `namespace`.
    pub fn kubernetes(mut self, namespace: &str) -> Self {
        self.config.platform.kind = PlatformKind::Kubernetes;
        self.config.platform.namespace = Some(namespace.to_string());
        self
    }

    pub fn with_app_host(mut self, host: &str) -> Self {
        self.config.platform.app_host = Some(host.to_string());
        self
    }

    pub fn with_route_suffix(mut self, suffix: &str) -> Self {
        self.config.platform.route_suffix = suffix.to_string();
        self
    }

    pub fn with_max_wait(mut self, value: &str) -> Self {
        self.config.timing.max_wait_time = value.to_string();
        self
    }

    pub fn with_poll_interval(mut self, value: &str) -> Self {
        self.config.timing.poll_interval = value.to_string();
        self
    }

    pub fn with_deploy_retries(mut self, retries: u32) -> Self {
        self.config.timing.deploy_pause_retries = retries;
        self
    }

    pub fn with_markers(mut self, markers: &[&str]) -> Self {
        self.config.markers.error = markers.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A unit whose apps each have one instance in `state`, reachable under
/// `http://<deployment id>:<port>` through the `url` attribute.
pub fn unit_status(name: &str, state: &str, apps: &[&str]) -> UnitStatus {
    apps.iter()
        .enumerate()
        .fold(UnitStatus::new(name, state), |unit, (i, app)| {
            unit.with_app(
                AppStatus::new(*app, state).with_instance(
                    InstanceStatus::new(format!("{app}-0"), state)
                        .with_attribute("url", format!("http://{app}:{}", 20000 + i)),
                ),
            )
        })
}

/// A unit whose instances have no address yet.
pub fn unresolved_status(name: &str, state: &str, apps: &[&str]) -> UnitStatus {
    apps.iter().fold(UnitStatus::new(name, state), |unit, app| {
        unit.with_app(
            AppStatus::new(*app, state).with_instance(InstanceStatus::new(format!("{app}-0"), state)),
        )
    })
}

/// Fixed timestamp `n` seconds into 2024.
pub fn at(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .expect("valid timestamp")
        + chrono::Duration::seconds(n)
}

/// Builder for server-side `TaskExecution`s.
pub struct TaskExecutionBuilder {
    execution: TaskExecution,
}

impl TaskExecutionBuilder {
    pub fn new(id: i64, task: &str) -> Self {
        Self {
            execution: TaskExecution::running(id, task),
        }
    }

    pub fn parent(mut self, parent_id: i64) -> Self {
        self.execution.parent_execution_id = Some(parent_id);
        self
    }

    /// Finished with `exit_code`.
    pub fn exit(mut self, exit_code: i32) -> Self {
        self.execution.exit_code = Some(exit_code);
        self.execution.end_time = Some(at(self.execution.execution_id));
        self.execution.status = if exit_code == 0 {
            ExecutionStatus::Complete
        } else {
            ExecutionStatus::Error
        };
        self
    }

    pub fn jobs(mut self, ids: &[i64]) -> Self {
        self.execution.job_execution_ids.extend_from_slice(ids);
        self
    }

    pub fn build(self) -> TaskExecution {
        self.execution
    }
}
