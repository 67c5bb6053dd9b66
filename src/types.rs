use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use serde::Deserialize;

/// Boxed, sendable future returned by the pluggable collaborator traits
/// (orchestration client, log fetcher).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Deployment platform the orchestration server is running on.
///
/// The platform decides how application addresses are derived and how logs
/// are fetched; it is selected once per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    /// Apps run as local processes and expose their own log endpoint.
    Local,
    /// Apps run as pods; logs come from `kubectl logs`.
    Kubernetes,
    /// Apps run on a PaaS; logs come from `cf logs --recent`.
    CloudFoundry,
}

impl Default for PlatformKind {
    fn default() -> Self {
        PlatformKind::Local
    }
}

impl FromStr for PlatformKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['_', '-'], "").as_str() {
            "local" => Ok(PlatformKind::Local),
            "kubernetes" | "k8s" => Ok(PlatformKind::Kubernetes),
            "cloudfoundry" | "cf" => Ok(PlatformKind::CloudFoundry),
            other => Err(format!(
                "invalid platform kind: {other} (expected \"local\", \"kubernetes\" or \"cloudfoundry\")"
            )),
        }
    }
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformKind::Local => write!(f, "local"),
            PlatformKind::Kubernetes => write!(f, "kubernetes"),
            PlatformKind::CloudFoundry => write!(f, "cloudfoundry"),
        }
    }
}

/// Message broker the stream apps are bound to; decides which app bundle is
/// imported at registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Binder {
    Rabbit,
    Kafka,
}

impl Default for Binder {
    fn default() -> Self {
        Binder::Rabbit
    }
}

impl FromStr for Binder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rabbit" => Ok(Binder::Rabbit),
            "kafka" => Ok(Binder::Kafka),
            other => Err(format!(
                "invalid binder: {other} (expected \"rabbit\" or \"kafka\")"
            )),
        }
    }
}
