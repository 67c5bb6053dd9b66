// src/lifecycle/machine.rs

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::lifecycle::state::DeploymentState;

/// Result of validating one observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Accepted {
        from: DeploymentState,
        to: DeploymentState,
    },
    Rejected {
        from: DeploymentState,
        to: DeploymentState,
        reason: String,
    },
}

impl ValidationResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ValidationResult::Accepted { .. })
    }
}

#[derive(Debug, Default)]
struct UnitTrack {
    current: Option<DeploymentState>,
    /// Distinct states in the order they were first entered.
    path: Vec<DeploymentState>,
}

/// Validates externally observed lifecycle transitions, per unit.
///
/// Observations are taken through `&self` so a poll supplier can share the
/// machine; the lock is never held across an await point.
#[derive(Debug, Default)]
pub struct LifecycleStateMachine {
    units: Mutex<HashMap<String, UnitTrack>>,
}

impl LifecycleStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `reported` for `unit` if it is reachable from the unit's
    /// current state. A rejected observation leaves the state unchanged.
    ///
    /// The first observation of a unit is its baseline and is always
    /// accepted: the unit may have been deployed before the scenario started
    /// watching it.
    pub fn observe(&self, unit: &str, reported: DeploymentState) -> ValidationResult {
        let mut units = self.units.lock().unwrap_or_else(|e| e.into_inner());
        let track = units.entry(unit.to_string()).or_default();
        let from = track.current.unwrap_or(DeploymentState::None);

        if track.current.is_some() && !from.can_transition_to(reported) {
            warn!(unit, %from, to = %reported, "illegal lifecycle transition observed");
            return ValidationResult::Rejected {
                from,
                to: reported,
                reason: format!("no edge {from} -> {reported}"),
            };
        }

        if track.current != Some(reported) {
            debug!(unit, %from, to = %reported, "lifecycle transition");
            track.path.push(reported);
        }
        track.current = Some(reported);
        ValidationResult::Accepted { from, to: reported }
    }

    /// Like [`Self::observe`] but takes the raw platform status string.
    pub fn observe_str(&self, unit: &str, reported: &str) -> ValidationResult {
        match reported.parse::<DeploymentState>() {
            Ok(state) => self.observe(unit, state),
            Err(reason) => ValidationResult::Rejected {
                from: self.current(unit),
                to: DeploymentState::Error,
                reason,
            },
        }
    }

    /// Current state of `unit`; `none` if never observed.
    pub fn current(&self, unit: &str) -> DeploymentState {
        self.units
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(unit)
            .and_then(|t| t.current)
            .unwrap_or(DeploymentState::None)
    }

    /// Distinct states `unit` went through, in order.
    pub fn path(&self, unit: &str) -> Vec<DeploymentState> {
        self.units
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(unit)
            .map(|t| t.path.clone())
            .unwrap_or_default()
    }

    /// Forget `unit`, e.g. after it was destroyed.
    pub fn reset(&self, unit: &str) {
        self.units
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(unit);
    }

    pub fn clear(&self) {
        self.units.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Check a complete observed sequence, starting from `none`.
    pub fn validate_sequence(states: &[DeploymentState]) -> ValidationResult {
        let mut from = DeploymentState::None;
        for &to in states {
            if !from.can_transition_to(to) {
                return ValidationResult::Rejected {
                    from,
                    to,
                    reason: format!("no edge {from} -> {to}"),
                };
            }
            from = to;
        }
        ValidationResult::Accepted {
            from: DeploymentState::None,
            to: from,
        }
    }
}
