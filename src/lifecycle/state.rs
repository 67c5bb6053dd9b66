// src/lifecycle/state.rs

use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a deployable unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeploymentState {
    None,
    Deploying,
    Partial,
    Deployed,
    Updating,
    Deleted,
    Undeployed,
    Error,
}

impl DeploymentState {
    pub const ALL: [DeploymentState; 8] = [
        DeploymentState::None,
        DeploymentState::Deploying,
        DeploymentState::Partial,
        DeploymentState::Deployed,
        DeploymentState::Updating,
        DeploymentState::Deleted,
        DeploymentState::Undeployed,
        DeploymentState::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentState::None => "none",
            DeploymentState::Deploying => "deploying",
            DeploymentState::Partial => "partial",
            DeploymentState::Deployed => "deployed",
            DeploymentState::Updating => "updating",
            DeploymentState::Deleted => "deleted",
            DeploymentState::Undeployed => "undeployed",
            DeploymentState::Error => "error",
        }
    }

    /// Whether `self -> to` is an allowed edge.
    ///
    /// Staying in the same state is always allowed: a poller observes the
    /// same state many times in a row.
    ///
    /// `partial` is a `deployed` unit whose instances do not all resolve yet,
    /// so it is reachable wherever `deployed` is, and from `deployed` itself
    /// when an instance drops out. It leaves the same way `deployed` does.
    pub fn can_transition_to(self, to: DeploymentState) -> bool {
        use DeploymentState::*;

        if self == to || to == Error {
            return true;
        }
        if to == Partial && self.can_transition_to(Deployed) {
            return true;
        }

        matches!(
            (self, to),
            (None, Deploying)
                | (None, Undeployed)
                | (Deploying, Partial)
                | (Deploying, Deployed)
                | (Partial, Deployed)
                | (Partial, Undeployed)
                | (Partial, Updating)
                | (Deployed, Updating)
                | (Deployed, Undeployed)
                | (Updating, Deleted)
                | (Deleted, Deployed)
                | (Undeployed, Deploying)
        )
    }
}

impl FromStr for DeploymentState {
    type Err = String;

    /// Parse a platform-reported state. Case-insensitive; `failed` is
    /// reported as `error` and `incomplete` as `partial`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(DeploymentState::None),
            "deploying" => Ok(DeploymentState::Deploying),
            "partial" | "incomplete" => Ok(DeploymentState::Partial),
            "deployed" => Ok(DeploymentState::Deployed),
            "updating" => Ok(DeploymentState::Updating),
            "deleted" => Ok(DeploymentState::Deleted),
            "undeployed" => Ok(DeploymentState::Undeployed),
            "error" | "failed" => Ok(DeploymentState::Error),
            other => Err(format!("unknown deployment state: {other}")),
        }
    }
}

impl fmt::Display for DeploymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
