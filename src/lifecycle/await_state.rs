// src/lifecycle/await_state.rs

//! Awaiting lifecycle states and release history through the poll loop.

use anyhow::anyhow;
use tracing::info;

use crate::client::{DataFlowClient, HistoryEntry};
use crate::errors::VerifyError;
use crate::lifecycle::address::AddressResolver;
use crate::lifecycle::machine::{LifecycleStateMachine, ValidationResult};
use crate::lifecycle::state::DeploymentState;
use crate::logs::{LogMonitor, MarkerHit};
use crate::poll::{
    AwaitCondition, AwaitPredicate, PollLoop, PollOptions, StatusSnapshot, SupplierError,
    status_is,
};

/// Collaborators shared by every lifecycle await of a scenario.
#[derive(Clone, Copy)]
pub struct AwaitContext<'a> {
    pub client: &'a dyn DataFlowClient,
    pub resolver: &'a AddressResolver,
    pub poll: &'a PollLoop,
    /// When set, the unit's app logs are refreshed every tick and an error
    /// marker fails the await.
    pub logs: Option<&'a LogMonitor>,
}

/// What one status tick saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateSnapshot {
    pub unit: String,
    /// State as reported by the platform.
    pub reported: DeploymentState,
    /// State after the address-resolution check (`deployed` may become
    /// `partial`).
    pub effective: DeploymentState,
    pub resolved_instances: usize,
    pub instances: usize,
    pub marker: Option<MarkerHit>,
}

impl StatusSnapshot for StateSnapshot {
    fn status(&self) -> &str {
        self.effective.as_str()
    }
}

/// `effective` state is `error`.
pub fn state_is_error() -> AwaitCondition<StateSnapshot> {
    AwaitCondition::new("state is error", |s: &StateSnapshot| {
        s.effective == DeploymentState::Error
    })
}

/// An error marker showed up in one of the unit's logs.
pub fn error_marker_found() -> AwaitCondition<StateSnapshot> {
    AwaitCondition::new("error marker in app log", |s: &StateSnapshot| {
        s.marker.is_some()
    })
}

/// Default predicate for awaiting `target`: success on the effective state,
/// fail fast on `error` and on log markers.
pub fn state_predicate(target: DeploymentState) -> AwaitPredicate<StateSnapshot> {
    let predicate = AwaitPredicate::until(status_is(target.as_str()));
    let predicate = if target == DeploymentState::Error {
        predicate
    } else {
        predicate.fail_fast_on(state_is_error())
    };
    predicate.fail_fast_on(error_marker_found())
}

impl LifecycleStateMachine {
    /// Poll the unit's status until it reaches `target`.
    ///
    /// Every tick the reported state is downgraded from `deployed` to
    /// `partial` unless all instances resolve, then observed. An illegal
    /// transition aborts the await with [`VerifyError::IllegalTransition`].
    pub async fn await_state(
        &self,
        ctx: AwaitContext<'_>,
        unit: &str,
        target: DeploymentState,
        options: &PollOptions,
    ) -> Result<StateSnapshot, VerifyError> {
        let predicate = state_predicate(target);
        self.await_state_with(ctx, unit, &predicate, options).await
    }

    /// [`Self::await_state`] with a caller-supplied predicate.
    pub async fn await_state_with(
        &self,
        ctx: AwaitContext<'_>,
        unit: &str,
        predicate: &AwaitPredicate<StateSnapshot>,
        options: &PollOptions,
    ) -> Result<StateSnapshot, VerifyError> {
        let supply = || {
            let unit = unit.to_string();
            async move { self.tick(ctx, unit).await }
        };

        let outcome = ctx.poll.run(options, predicate, supply).await;
        let result = outcome.into_result(options);
        if let Ok(snapshot) = &result {
            info!(
                unit,
                state = %snapshot.effective,
                instances = snapshot.instances,
                "unit reached expected state"
            );
        }
        result
    }

    async fn tick(
        &self,
        ctx: AwaitContext<'_>,
        unit: String,
    ) -> Result<StateSnapshot, SupplierError> {
        let status = ctx.client.status(&unit).await?;

        let reported: DeploymentState = status.state.parse().map_err(|e: String| {
            SupplierError::fatal(anyhow!("unit '{unit}' reported a malformed state: {e}"))
        })?;

        let resolution = ctx.resolver.resolution(&status);
        let effective = if reported == DeploymentState::Deployed && !resolution.is_complete() {
            DeploymentState::Partial
        } else {
            reported
        };

        if let ValidationResult::Rejected { from, to, .. } = self.observe(&unit, effective) {
            return Err(SupplierError::fatal(VerifyError::IllegalTransition {
                unit,
                from: from.to_string(),
                to: to.to_string(),
            }));
        }

        let marker = match ctx.logs {
            Some(logs) => logs.check(&ctx.resolver.log_targets(&status)).await,
            None => None,
        };

        Ok(StateSnapshot {
            unit,
            reported,
            effective,
            resolved_instances: resolution.resolved,
            instances: resolution.instances,
            marker,
        })
    }
}

/// Release `version` is in status `status_code`.
pub fn release_status(version: u32, status_code: impl Into<String>) -> AwaitCondition<Vec<HistoryEntry>> {
    let status_code = status_code.into();
    AwaitCondition::new(
        format!("release {version} is {status_code}"),
        move |history: &Vec<HistoryEntry>| {
            history
                .iter()
                .any(|h| h.version == version && h.status_code.eq_ignore_ascii_case(&status_code))
        },
    )
}

/// Poll a unit's release history until `predicate` holds, e.g. after an
/// update (`release_status(2, "DEPLOYED").and(release_status(1, "DELETED"))`).
pub async fn await_history(
    ctx: AwaitContext<'_>,
    unit: &str,
    predicate: &AwaitPredicate<Vec<HistoryEntry>>,
    options: &PollOptions,
) -> Result<Vec<HistoryEntry>, VerifyError> {
    let supply = || {
        let unit = unit.to_string();
        async move { Ok::<_, SupplierError>(ctx.client.history(&unit).await?) }
    };
    ctx.poll.run(options, predicate, supply).await.into_result(options)
}
