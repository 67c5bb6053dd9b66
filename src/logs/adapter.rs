// src/logs/adapter.rs

//! Platform-specific log retrieval.
//!
//! The platform is picked once per session ([`PlatformLogAdapter::from_config`])
//! and injected wherever logs are read. Tests substitute their own
//! [`LogFetcher`] that serves canned text.

use anyhow::{Context, anyhow};
use tracing::debug;

use crate::config::ConfigFile;
use crate::logs::command::run_capture;
use crate::types::{BoxFuture, PlatformKind};

/// Identifies one log source: an app, optionally a specific instance, and
/// its resolved address if known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogTarget {
    pub app: String,
    pub instance_id: Option<String>,
    pub address: Option<String>,
}

impl LogTarget {
    pub fn app(app: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            instance_id: None,
            address: None,
        }
    }

    pub fn with_instance(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = Some(instance_id.into());
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Key of this source in a [`crate::logs::LogBook`].
    pub fn source_id(&self) -> String {
        match &self.instance_id {
            Some(instance) => format!("{}/{}", self.app, instance),
            None => self.app.clone(),
        }
    }
}

/// Anything that can produce the current log text for a target.
pub trait LogFetcher: Send + Sync {
    fn fetch<'a>(&'a self, target: &'a LogTarget) -> BoxFuture<'a, anyhow::Result<String>>;
}

/// Concrete retrieval step for a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRequest {
    Http { url: String },
    Command { program: String, args: Vec<String> },
}

/// Log retrieval strategy, one variant per platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformLogAdapter {
    /// `GET <app address>/<log_path>`.
    Http { log_path: String },
    /// `kubectl logs <pod> -n <namespace>`.
    Kubernetes { kubectl: String, namespace: String },
    /// `cf logs <route host> --recent`.
    CloudFoundry { cf: String },
}

impl PlatformLogAdapter {
    pub fn from_config(cfg: &ConfigFile) -> Self {
        match cfg.platform.kind {
            PlatformKind::Local => PlatformLogAdapter::Http {
                log_path: cfg.platform.log_path.clone(),
            },
            PlatformKind::Kubernetes => PlatformLogAdapter::Kubernetes {
                kubectl: cfg.platform.kubectl.clone(),
                namespace: cfg.platform.namespace.clone().unwrap_or_default(),
            },
            PlatformKind::CloudFoundry => PlatformLogAdapter::CloudFoundry {
                cf: cfg.platform.cf.clone(),
            },
        }
    }

    /// Work out how to fetch logs for `target` without performing any IO.
    pub fn request(&self, target: &LogTarget) -> anyhow::Result<LogRequest> {
        match self {
            PlatformLogAdapter::Http { log_path } => {
                let address = target.address.as_deref().ok_or_else(|| {
                    anyhow!("app '{}' has no resolved address to fetch logs from", target.app)
                })?;
                Ok(LogRequest::Http {
                    url: format!(
                        "{}/{}",
                        address.trim_end_matches('/'),
                        log_path.trim_start_matches('/')
                    ),
                })
            }
            PlatformLogAdapter::Kubernetes { kubectl, namespace } => {
                let pod = match &target.instance_id {
                    Some(instance) => instance.clone(),
                    None => format!("deployment/{}", target.app),
                };
                Ok(LogRequest::Command {
                    program: kubectl.clone(),
                    args: vec![
                        "logs".to_string(),
                        pod,
                        "-n".to_string(),
                        namespace.clone(),
                    ],
                })
            }
            PlatformLogAdapter::CloudFoundry { cf } => {
                let host = target
                    .address
                    .as_deref()
                    .and_then(route_host)
                    .unwrap_or_else(|| target.app.clone());
                Ok(LogRequest::Command {
                    program: cf.clone(),
                    args: vec!["logs".to_string(), host, "--recent".to_string()],
                })
            }
        }
    }
}

impl LogFetcher for PlatformLogAdapter {
    fn fetch<'a>(&'a self, target: &'a LogTarget) -> BoxFuture<'a, anyhow::Result<String>> {
        Box::pin(async move {
            match self.request(target)? {
                LogRequest::Http { url } => {
                    debug!(%url, "fetching app log over http");
                    let fetch_url = url.clone();
                    tokio::task::spawn_blocking(move || -> anyhow::Result<String> {
                        let agent = ureq::Agent::new_with_defaults();
                        let body = agent
                            .get(&fetch_url)
                            .call()?
                            .into_body()
                            .read_to_string()?;
                        Ok(body)
                    })
                    .await
                    .context("log fetch task panicked")?
                    .with_context(|| format!("fetching log from {url}"))
                }
                LogRequest::Command { program, args } => run_capture(&program, &args).await,
            }
        })
    }
}

/// First DNS label of an address: `http://ticktock-log.cfapps.io` → `ticktock-log`.
fn route_host(address: &str) -> Option<String> {
    let without_scheme = address.split("://").nth(1).unwrap_or(address);
    let host = without_scheme.split(['/', ':']).next()?;
    let first = host.split('.').next()?;
    if first.is_empty() {
        None
    } else {
        Some(first.to_string())
    }
}
