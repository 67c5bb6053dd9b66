// src/client/mod.rs

//! The orchestration server as seen by the harness.
//!
//! [`DataFlowClient`] is the collaborator boundary: the verification core
//! only ever talks to the platform through it. [`http::HttpDataFlowClient`]
//! is the REST implementation; tests use a scripted fake.

pub mod http;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::BoxFuture;

pub use http::HttpDataFlowClient;

/// Deployment properties or launch properties, kept ordered so that requests
/// and logs are stable.
pub type Properties = BTreeMap<String, String>;

/// Runtime status of a stream (or any deployable unit).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitStatus {
    pub name: String,
    /// Platform-reported state string (`"deployed"`, `"partial"`, ...).
    pub state: String,
    pub apps: Vec<AppStatus>,
}

impl UnitStatus {
    pub fn new(name: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: state.into(),
            apps: Vec::new(),
        }
    }

    pub fn with_app(mut self, app: AppStatus) -> Self {
        self.apps.push(app);
        self
    }

    pub fn instance_count(&self) -> usize {
        self.apps.iter().map(|a| a.instances.len()).sum()
    }
}

/// One app of a unit, keyed by its deployment id (`ticktock-log-v1`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppStatus {
    pub deployment_id: String,
    pub state: String,
    pub instances: Vec<InstanceStatus>,
}

impl AppStatus {
    pub fn new(deployment_id: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            deployment_id: deployment_id.into(),
            state: state.into(),
            instances: Vec::new(),
        }
    }

    pub fn with_instance(mut self, instance: InstanceStatus) -> Self {
        self.instances.push(instance);
        self
    }
}

/// One running instance of an app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceStatus {
    pub instance_id: String,
    pub state: String,
    /// Raw platform attributes (`url`, `pod.name`, `guid`, ...).
    pub attributes: BTreeMap<String, String>,
}

impl InstanceStatus {
    pub fn new(instance_id: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            state: state.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// Coarse task execution status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecutionStatus {
    Running,
    Complete,
    Error,
    Unknown,
}

impl ExecutionStatus {
    pub fn from_platform(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "RUNNING" | "STARTED" | "STARTING" => ExecutionStatus::Running,
            "COMPLETE" | "COMPLETED" | "SUCCESS" => ExecutionStatus::Complete,
            "ERROR" | "FAILED" => ExecutionStatus::Error,
            _ => ExecutionStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Running => "RUNNING",
            ExecutionStatus::Complete => "COMPLETE",
            ExecutionStatus::Error => "ERROR",
            ExecutionStatus::Unknown => "UNKNOWN",
        }
    }
}

/// Detail of one task execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskExecution {
    pub execution_id: i64,
    pub task_name: String,
    pub exit_code: Option<i32>,
    pub exit_message: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub parent_execution_id: Option<i64>,
    pub job_execution_ids: Vec<i64>,
    pub status: ExecutionStatus,
}

impl TaskExecution {
    pub fn running(execution_id: i64, task_name: impl Into<String>) -> Self {
        Self {
            execution_id,
            task_name: task_name.into(),
            exit_code: None,
            exit_message: None,
            start_time: None,
            end_time: None,
            parent_execution_id: None,
            job_execution_ids: Vec::new(),
            status: ExecutionStatus::Running,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.end_time.is_some()
    }
}

/// One release of a unit, for update / rollback checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub version: u32,
    /// Release status code (`"DEPLOYED"`, `"DELETED"`, ...).
    pub status_code: String,
}

impl HistoryEntry {
    pub fn new(version: u32, status_code: impl Into<String>) -> Self {
        Self {
            version,
            status_code: status_code.into(),
        }
    }
}

/// A scheduled task launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleInfo {
    pub schedule_name: String,
    pub task_name: String,
    pub properties: Properties,
}

/// REST surface of the orchestration server.
///
/// Every method may fail with a transient error while the platform is not
/// ready; callers that poll wrap the call in a [`crate::poll::PollLoop`].
pub trait DataFlowClient: Send + Sync {
    /// Register the app bundle found at `uri`.
    fn import_apps<'a>(&'a self, uri: &'a str) -> BoxFuture<'a, anyhow::Result<()>>;

    fn create_stream<'a>(
        &'a self,
        name: &'a str,
        definition: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<()>>;

    fn deploy<'a>(
        &'a self,
        unit: &'a str,
        properties: &'a Properties,
    ) -> BoxFuture<'a, anyhow::Result<()>>;

    fn undeploy<'a>(&'a self, unit: &'a str) -> BoxFuture<'a, anyhow::Result<()>>;

    fn status<'a>(&'a self, unit: &'a str) -> BoxFuture<'a, anyhow::Result<UnitStatus>>;

    /// Release history, newest first.
    fn history<'a>(&'a self, unit: &'a str) -> BoxFuture<'a, anyhow::Result<Vec<HistoryEntry>>>;

    fn destroy_stream<'a>(&'a self, name: &'a str) -> BoxFuture<'a, anyhow::Result<()>>;

    fn create_task<'a>(
        &'a self,
        name: &'a str,
        definition: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<()>>;

    /// Launch a task and return the new execution id.
    fn launch<'a>(
        &'a self,
        task: &'a str,
        properties: &'a Properties,
        args: &'a [String],
    ) -> BoxFuture<'a, anyhow::Result<i64>>;

    fn execution_status<'a>(&'a self, id: i64) -> BoxFuture<'a, anyhow::Result<ExecutionStatus>>;

    fn execution<'a>(&'a self, id: i64) -> BoxFuture<'a, anyhow::Result<TaskExecution>>;

    /// All executions of a task (including composed-task children, which are
    /// named `<definition>-<label>`).
    fn executions<'a>(&'a self, task: &'a str)
    -> BoxFuture<'a, anyhow::Result<Vec<TaskExecution>>>;

    fn destroy_task<'a>(&'a self, name: &'a str) -> BoxFuture<'a, anyhow::Result<()>>;

    fn schedule<'a>(
        &'a self,
        schedule_name: &'a str,
        task: &'a str,
        properties: &'a Properties,
    ) -> BoxFuture<'a, anyhow::Result<()>>;

    fn schedules<'a>(&'a self, task: &'a str) -> BoxFuture<'a, anyhow::Result<Vec<ScheduleInfo>>>;

    fn unschedule<'a>(&'a self, schedule_name: &'a str) -> BoxFuture<'a, anyhow::Result<()>>;
}
