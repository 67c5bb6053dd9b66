// src/lifecycle/address.rs

//! Per-instance address resolution.
//!
//! A unit is only trusted as `deployed` once every instance of every app
//! resolves to an address. How an address is derived depends on the
//! platform.

use crate::client::{AppStatus, InstanceStatus, UnitStatus};
use crate::config::ConfigFile;
use crate::logs::LogTarget;
use crate::types::PlatformKind;

/// Derives app instance addresses the way each platform exposes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressResolver {
    kind: PlatformKind,
    app_host: Option<String>,
    route_suffix: String,
}

/// How much of a unit resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Resolution {
    pub resolved: usize,
    pub instances: usize,
}

impl Resolution {
    /// At least one instance, and all of them resolved.
    pub fn is_complete(&self) -> bool {
        self.instances > 0 && self.resolved == self.instances
    }
}

impl AddressResolver {
    pub fn new(kind: PlatformKind, app_host: Option<String>, route_suffix: impl Into<String>) -> Self {
        Self {
            kind,
            app_host,
            route_suffix: route_suffix.into(),
        }
    }

    pub fn from_config(cfg: &ConfigFile) -> Self {
        Self::new(
            cfg.platform.kind,
            cfg.platform.app_host.clone(),
            cfg.platform.route_suffix.clone(),
        )
    }

    pub fn kind(&self) -> PlatformKind {
        self.kind
    }

    /// Address of one instance, if it can be reached.
    ///
    /// - local: the instance's `url` attribute;
    /// - kubernetes: `https://<id><app_host>` where `<id>` is the instance id
    ///   for multi-instance apps and the deployment id otherwise; without an
    ///   `app_host`, the `url` attribute the deployer publishes;
    /// - cloudfoundry: `http://<deployment id>.<route suffix>`.
    ///
    /// Platform-derived addresses additionally require the instance itself to
    /// report `deployed`.
    pub fn resolve(&self, app: &AppStatus, instance: &InstanceStatus) -> Option<String> {
        match self.kind {
            PlatformKind::Local => url_attribute(instance),
            PlatformKind::Kubernetes => {
                if !is_deployed(instance) {
                    return None;
                }
                let Some(host) = self.app_host.as_deref() else {
                    return url_attribute(instance);
                };
                let id = if app.instances.len() > 1 {
                    &instance.instance_id
                } else {
                    &app.deployment_id
                };
                Some(format!("https://{id}{host}"))
            }
            PlatformKind::CloudFoundry => {
                if !is_deployed(instance) || self.route_suffix.is_empty() {
                    return None;
                }
                Some(format!(
                    "http://{}.{}",
                    app.deployment_id,
                    self.route_suffix.trim_start_matches('.')
                ))
            }
        }
    }

    pub fn resolution(&self, status: &UnitStatus) -> Resolution {
        status
            .apps
            .iter()
            .flat_map(|app| app.instances.iter().map(move |i| (app, i)))
            .fold(Resolution::default(), |mut acc, (app, instance)| {
                acc.instances += 1;
                if self.resolve(app, instance).is_some() {
                    acc.resolved += 1;
                }
                acc
            })
    }

    /// One log target per instance, carrying the address when it resolved.
    pub fn log_targets(&self, status: &UnitStatus) -> Vec<LogTarget> {
        let mut targets = Vec::new();
        for app in &status.apps {
            for instance in &app.instances {
                let mut target =
                    LogTarget::app(&app.deployment_id).with_instance(&instance.instance_id);
                if let Some(address) = self.resolve(app, instance) {
                    target = target.with_address(address);
                }
                targets.push(target);
            }
        }
        targets
    }
}

fn is_deployed(instance: &InstanceStatus) -> bool {
    instance.state.eq_ignore_ascii_case("deployed")
}

fn url_attribute(instance: &InstanceStatus) -> Option<String> {
    instance
        .attribute("url")
        .filter(|url| !url.trim().is_empty())
        .map(|url| url.trim_end_matches('/').to_string())
}
