// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;

use crate::types::{Binder, PlatformKind};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [server]
/// uri = "http://localhost:9393"
///
/// [platform]
/// kind = "kubernetes"
/// namespace = "scdf"
/// app_host = ".apps.example.com"
///
/// [timing]
/// max_wait_time = "5m"
/// poll_interval = "5s"
///
/// [markers]
/// error = ["APPLICATION FAILED TO START"]
/// ```
///
/// All sections are optional and have defaults matching a local server.
/// This is the *unvalidated* form; see [`ConfigFile`].
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub platform: PlatformSection,

    #[serde(default)]
    pub timing: TimingSection,

    #[serde(default)]
    pub markers: MarkerSection,

    #[serde(default)]
    pub registration: RegistrationSection,
}

/// `[server]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    /// Base URI of the Data Flow server REST API.
    #[serde(default = "default_server_uri")]
    pub uri: String,
}

fn default_server_uri() -> String {
    "http://localhost:9393".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            uri: default_server_uri(),
        }
    }
}

/// `[platform]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformSection {
    #[serde(default)]
    pub kind: PlatformKind,

    #[serde(default)]
    pub binder: Binder,

    /// Kubernetes namespace the apps are deployed into.
    #[serde(default)]
    pub namespace: Option<String>,

    /// Host suffix appended to deployment ids to form app URLs on Kubernetes
    /// (e.g. `".apps.example.com"`).
    #[serde(default)]
    pub app_host: Option<String>,

    /// Route domain for Cloud Foundry apps.
    #[serde(default = "default_route_suffix")]
    pub route_suffix: String,

    /// Path of the log endpoint relative to an app URL (local platform).
    #[serde(default = "default_log_path")]
    pub log_path: String,

    /// Executable used for Kubernetes log retrieval.
    #[serde(default = "default_kubectl")]
    pub kubectl: String,

    /// Executable used for Cloud Foundry log retrieval.
    #[serde(default = "default_cf")]
    pub cf: String,
}

fn default_route_suffix() -> String {
    "local.pcfdev.io".to_string()
}

fn default_log_path() -> String {
    "actuator/logfile".to_string()
}

fn default_kubectl() -> String {
    "kubectl".to_string()
}

fn default_cf() -> String {
    "cf".to_string()
}

impl Default for PlatformSection {
    fn default() -> Self {
        Self {
            kind: PlatformKind::default(),
            binder: Binder::default(),
            namespace: None,
            app_host: None,
            route_suffix: default_route_suffix(),
            log_path: default_log_path(),
            kubectl: default_kubectl(),
            cf: default_cf(),
        }
    }
}

/// `[timing]` section, kept as strings until validation.
#[derive(Debug, Clone, Deserialize)]
pub struct TimingSection {
    /// Upper bound for a single await (`"30s"`).
    #[serde(default = "default_max_wait_time")]
    pub max_wait_time: String,

    /// Pause between status polls (`"5s"`).
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,

    /// Pause between log polls (`"500ms"`).
    #[serde(default = "default_log_poll_interval")]
    pub log_poll_interval: String,

    /// Number of status polls allowed while waiting for a deployment.
    #[serde(default = "default_deploy_pause_retries")]
    pub deploy_pause_retries: u32,
}

fn default_max_wait_time() -> String {
    "30s".to_string()
}

fn default_poll_interval() -> String {
    "5s".to_string()
}

fn default_log_poll_interval() -> String {
    "500ms".to_string()
}

fn default_deploy_pause_retries() -> u32 {
    25
}

impl Default for TimingSection {
    fn default() -> Self {
        Self {
            max_wait_time: default_max_wait_time(),
            poll_interval: default_poll_interval(),
            log_poll_interval: default_log_poll_interval(),
            deploy_pause_retries: default_deploy_pause_retries(),
        }
    }
}

/// `[markers]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct MarkerSection {
    /// Regular expressions which, when found in an app log, abort the
    /// current await immediately.
    #[serde(default = "default_error_markers")]
    pub error: Vec<String>,
}

fn default_error_markers() -> Vec<String> {
    vec![
        "APPLICATION FAILED TO START".to_string(),
        "Application run failed".to_string(),
        r"Exception in thread \S+".to_string(),
    ]
}

impl Default for MarkerSection {
    fn default() -> Self {
        Self {
            error: default_error_markers(),
        }
    }
}

/// `[registration]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RegistrationSection {
    /// App import resource for stream apps; defaults per binder.
    #[serde(default)]
    pub stream_apps_uri: Option<String>,

    /// App import resource for task apps.
    #[serde(default)]
    pub task_apps_uri: Option<String>,
}

impl RegistrationSection {
    /// Effective stream app import URI for the given binder.
    pub fn stream_apps_uri_for(&self, binder: Binder) -> String {
        match (&self.stream_apps_uri, binder) {
            (Some(uri), _) => uri.clone(),
            (None, Binder::Rabbit) => "https://dataflow.spring.io/rabbitmq-maven-latest".to_string(),
            (None, Binder::Kafka) => "https://dataflow.spring.io/kafka-maven-latest".to_string(),
        }
    }

    /// Effective task app import URI.
    pub fn task_apps_uri(&self) -> String {
        self.task_apps_uri
            .clone()
            .unwrap_or_else(|| "https://dataflow.spring.io/task-maven-latest".to_string())
    }
}

/// Parsed timing values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub max_wait_time: Duration,
    pub poll_interval: Duration,
    pub log_poll_interval: Duration,
    pub deploy_pause_retries: u32,
}

impl Timing {
    /// Budget for a deployment await: the retry count times the poll interval.
    pub fn deploy_budget(&self) -> Duration {
        self.poll_interval * self.deploy_pause_retries.max(1)
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            max_wait_time: Duration::from_secs(30),
            poll_interval: Duration::from_secs(5),
            log_poll_interval: Duration::from_millis(500),
            deploy_pause_retries: 25,
        }
    }
}

/// Validated configuration.
///
/// Construct via `ConfigFile::try_from(raw)` (see `validate.rs`) or
/// [`crate::config::load_and_validate`].
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub server: ServerSection,
    pub platform: PlatformSection,
    pub timing: Timing,
    pub markers: MarkerSection,
    pub registration: RegistrationSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        server: ServerSection,
        platform: PlatformSection,
        timing: Timing,
        markers: MarkerSection,
        registration: RegistrationSection,
    ) -> Self {
        Self {
            server,
            platform,
            timing,
            markers,
            registration,
        }
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::new_unchecked(
            ServerSection::default(),
            PlatformSection::default(),
            Timing::default(),
            MarkerSection::default(),
            RegistrationSection::default(),
        )
    }
}
