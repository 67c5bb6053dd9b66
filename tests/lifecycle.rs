// tests/lifecycle.rs

mod common;
use crate::common::builders::{unit_status, unresolved_status};
use crate::common::fake_client::FakeClient;
use crate::common::fake_logs::FakeLogFetcher;
use crate::common::{TestResult, init_tracing, with_timeout};

use std::sync::Arc;
use std::time::Duration;

use dataflow_verify::client::{AppStatus, HistoryEntry, InstanceStatus, UnitStatus};
use dataflow_verify::errors::VerifyError;
use dataflow_verify::lifecycle::{
    AddressResolver, AwaitContext, DeploymentState, LifecycleStateMachine, ValidationResult,
    await_history, release_status,
};
use dataflow_verify::logs::{ErrorMarkers, LogMonitor};
use dataflow_verify::poll::{AwaitPredicate, PollLoop, PollOptions};
use dataflow_verify::types::PlatformKind;

fn opts(what: &str) -> PollOptions {
    PollOptions::new(what, Duration::from_millis(300), Duration::from_millis(5))
}

fn local() -> AddressResolver {
    AddressResolver::new(PlatformKind::Local, None, "")
}

#[tokio::test]
async fn deployed_is_only_trusted_once_every_instance_resolves() -> TestResult {
    init_tracing();
    let client = FakeClient::new();
    client.push_status(UnitStatus::new("ticktock", "deploying"));
    client.push_status(unresolved_status("ticktock", "deployed", &["ticktock-time", "ticktock-log"]));
    client.push_status(unit_status("ticktock", "deployed", &["ticktock-time", "ticktock-log"]));

    let (resolver, poll, machine) = (local(), PollLoop::new(), LifecycleStateMachine::new());
    let ctx = AwaitContext {
        client: &client,
        resolver: &resolver,
        poll: &poll,
        logs: None,
    };

    let snapshot = with_timeout(machine.await_state(
        ctx,
        "ticktock",
        DeploymentState::Deployed,
        &opts("ticktock deployed"),
    ))
    .await?;

    assert_eq!(snapshot.effective, DeploymentState::Deployed);
    assert_eq!((snapshot.resolved_instances, snapshot.instances), (2, 2));
    assert_eq!(
        machine.path("ticktock"),
        vec![
            DeploymentState::Deploying,
            DeploymentState::Partial,
            DeploymentState::Deployed
        ]
    );
    assert_eq!(client.status_reads(), 3);
    Ok(())
}

#[tokio::test]
async fn one_unresolved_instance_keeps_the_unit_partial() -> TestResult {
    init_tracing();
    let client = FakeClient::new();
    client.push_status(
        UnitStatus::new("ticktock", "deployed").with_app(
            AppStatus::new("ticktock-log", "deployed")
                .with_instance(
                    InstanceStatus::new("ticktock-log-0", "deployed")
                        .with_attribute("url", "http://localhost:20001"),
                )
                .with_instance(InstanceStatus::new("ticktock-log-1", "deployed")),
        ),
    );

    let (resolver, poll, machine) = (local(), PollLoop::new(), LifecycleStateMachine::new());
    let ctx = AwaitContext {
        client: &client,
        resolver: &resolver,
        poll: &poll,
        logs: None,
    };

    let result = with_timeout(machine.await_state(
        ctx,
        "ticktock",
        DeploymentState::Deployed,
        &opts("ticktock deployed"),
    ))
    .await;

    match result {
        Err(VerifyError::Timeout { last, .. }) => {
            assert!(last.contains("effective: Partial"), "last = {last}");
            assert!(last.contains("resolved_instances: 1"), "last = {last}");
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(machine.current("ticktock"), DeploymentState::Partial);
    Ok(())
}

#[tokio::test]
async fn an_illegal_transition_aborts_without_retrying() -> TestResult {
    init_tracing();
    let client = FakeClient::new();
    client.push_status(unit_status("ticktock", "deployed", &["ticktock-log"]));
    client.push_status(UnitStatus::new("ticktock", "deploying"));

    let (resolver, poll, machine) = (local(), PollLoop::new(), LifecycleStateMachine::new());
    let ctx = AwaitContext {
        client: &client,
        resolver: &resolver,
        poll: &poll,
        logs: None,
    };

    let err = with_timeout(machine.await_state(
        ctx,
        "ticktock",
        DeploymentState::Undeployed,
        &opts("ticktock undeployed"),
    ))
    .await
    .expect_err("deployed -> deploying is not an edge");

    assert!(err.is_structural());
    match err {
        VerifyError::IllegalTransition { unit, from, to } => {
            assert_eq!(unit, "ticktock");
            assert_eq!(from, "deployed");
            assert_eq!(to, "deploying");
        }
        other => panic!("expected illegal transition, got {other:?}"),
    }
    assert_eq!(machine.current("ticktock"), DeploymentState::Deployed);
    assert_eq!(client.status_reads(), 2);
    Ok(())
}

#[tokio::test]
async fn a_rollout_waits_for_addresses_after_the_old_release_is_deleted() -> TestResult {
    init_tracing();
    let apps = ["ticktock-time", "ticktock-log"];
    let client = FakeClient::new();
    client.push_status(unit_status("ticktock", "deployed", &apps));
    client.push_status(UnitStatus::new("ticktock", "updating"));
    client.push_status(UnitStatus::new("ticktock", "deleted"));
    client.push_status(unresolved_status("ticktock", "deployed", &apps));
    client.push_status(unit_status("ticktock", "deployed", &apps));

    let (resolver, poll, machine) = (local(), PollLoop::new(), LifecycleStateMachine::new());
    let ctx = AwaitContext {
        client: &client,
        resolver: &resolver,
        poll: &poll,
        logs: None,
    };

    let deleted = with_timeout(machine.await_state(
        ctx,
        "ticktock",
        DeploymentState::Deleted,
        &opts("old release deleted"),
    ))
    .await?;
    assert_eq!(deleted.effective, DeploymentState::Deleted);

    let deployed = with_timeout(machine.await_state(
        ctx,
        "ticktock",
        DeploymentState::Deployed,
        &opts("new release deployed"),
    ))
    .await?;
    assert_eq!((deployed.resolved_instances, deployed.instances), (2, 2));

    use DeploymentState::{Deleted, Deployed, Partial, Updating};
    assert_eq!(
        machine.path("ticktock"),
        vec![Deployed, Updating, Deleted, Partial, Deployed]
    );
    assert_eq!(client.status_reads(), 5);
    Ok(())
}

#[tokio::test]
async fn an_instance_dropping_out_is_waited_through() -> TestResult {
    init_tracing();
    let client = FakeClient::new();
    client.push_status(unit_status("ticktock", "deployed", &["ticktock-log"]));
    client.push_status(unresolved_status("ticktock", "deployed", &["ticktock-log"]));
    client.push_status(UnitStatus::new("ticktock", "undeployed"));

    let (resolver, poll, machine) = (local(), PollLoop::new(), LifecycleStateMachine::new());
    let ctx = AwaitContext {
        client: &client,
        resolver: &resolver,
        poll: &poll,
        logs: None,
    };

    let snapshot = with_timeout(machine.await_state(
        ctx,
        "ticktock",
        DeploymentState::Undeployed,
        &opts("ticktock undeployed"),
    ))
    .await?;

    assert_eq!(snapshot.effective, DeploymentState::Undeployed);
    assert_eq!(
        machine.path("ticktock"),
        vec![
            DeploymentState::Deployed,
            DeploymentState::Partial,
            DeploymentState::Undeployed
        ]
    );
    Ok(())
}

#[tokio::test]
async fn an_error_state_fails_fast() -> TestResult {
    init_tracing();
    let client = FakeClient::new();
    client.push_status(UnitStatus::new("ticktock", "deploying"));
    client.push_status(UnitStatus::new("ticktock", "FAILED"));

    let (resolver, poll, machine) = (local(), PollLoop::new(), LifecycleStateMachine::new());
    let ctx = AwaitContext {
        client: &client,
        resolver: &resolver,
        poll: &poll,
        logs: None,
    };

    let err = with_timeout(machine.await_state(
        ctx,
        "ticktock",
        DeploymentState::Deployed,
        &opts("ticktock deployed"),
    ))
    .await
    .expect_err("error state");

    match err {
        VerifyError::FailedFast { what, cause, .. } => {
            assert_eq!(what, "ticktock deployed");
            assert!(cause.contains("state is error"), "cause = {cause}");
        }
        other => panic!("expected fail-fast, got {other:?}"),
    }
    assert_eq!(machine.current("ticktock"), DeploymentState::Error);
    Ok(())
}

#[tokio::test]
async fn an_error_marker_in_the_app_log_fails_fast() -> TestResult {
    init_tracing();
    let client = FakeClient::new();
    client.push_status(unit_status("ticktock", "deploying", &["ticktock-log"]));

    let fetcher = FakeLogFetcher::new();
    fetcher.push("ticktock-log/ticktock-log-0", "Starting LogSink\n");
    fetcher.push(
        "ticktock-log/ticktock-log-0",
        "Starting LogSink\n***************************\nAPPLICATION FAILED TO START\n",
    );
    let markers = ErrorMarkers::from_patterns(&["APPLICATION FAILED TO START"])?;
    let logs = LogMonitor::new(Arc::new(fetcher.clone()), markers);

    let (resolver, poll, machine) = (local(), PollLoop::new(), LifecycleStateMachine::new());
    let ctx = AwaitContext {
        client: &client,
        resolver: &resolver,
        poll: &poll,
        logs: Some(&logs),
    };

    let err = with_timeout(machine.await_state(
        ctx,
        "ticktock",
        DeploymentState::Deployed,
        &opts("ticktock deployed"),
    ))
    .await
    .expect_err("marker in log");

    match err {
        VerifyError::FailedFast { cause, last, .. } => {
            assert!(cause.contains("error marker"), "cause = {cause}");
            assert!(last.contains("APPLICATION FAILED TO START"), "last = {last}");
        }
        other => panic!("expected fail-fast, got {other:?}"),
    }
    assert_eq!(fetcher.fetched().len(), 2);
    assert_eq!(
        fetcher.fetched()[0].address.as_deref(),
        Some("http://ticktock-log:20000")
    );
    assert!(logs.contains("ticktock-log/ticktock-log-0", "FAILED TO START"));
    Ok(())
}

#[tokio::test]
async fn malformed_states_are_fatal_and_status_errors_are_retried() -> TestResult {
    init_tracing();
    let client = FakeClient::new();
    client.push_status_error("ticktock", "503 Service Unavailable");
    client.push_status(UnitStatus::new("ticktock", "exploded"));

    let (resolver, poll, machine) = (local(), PollLoop::new(), LifecycleStateMachine::new());
    let ctx = AwaitContext {
        client: &client,
        resolver: &resolver,
        poll: &poll,
        logs: None,
    };

    let err = with_timeout(machine.await_state(
        ctx,
        "ticktock",
        DeploymentState::Deployed,
        &opts("ticktock deployed"),
    ))
    .await
    .expect_err("malformed state");

    match err {
        VerifyError::FailedFast { cause, .. } => {
            assert!(cause.contains("malformed state"), "cause = {cause}")
        }
        other => panic!("expected fail-fast, got {other:?}"),
    }
    assert_eq!(client.status_reads(), 2);
    Ok(())
}

#[tokio::test]
async fn release_history_is_awaited() -> TestResult {
    init_tracing();
    let client = FakeClient::new();
    client.push_history(
        "ticktock",
        vec![HistoryEntry::new(2, "DEPLOYING"), HistoryEntry::new(1, "DEPLOYED")],
    );
    client.push_history(
        "ticktock",
        vec![HistoryEntry::new(2, "DEPLOYED"), HistoryEntry::new(1, "DELETED")],
    );

    let (resolver, poll) = (local(), PollLoop::new());
    let ctx = AwaitContext {
        client: &client,
        resolver: &resolver,
        poll: &poll,
        logs: None,
    };
    let predicate =
        AwaitPredicate::until(release_status(2, "deployed").and(release_status(1, "DELETED")));

    let history = with_timeout(await_history(ctx, "ticktock", &predicate, &opts("ticktock history")))
        .await?;

    assert_eq!(history[0], HistoryEntry::new(2, "DEPLOYED"));
    assert_eq!(client.calls_to("history").len(), 2);
    Ok(())
}

#[test]
fn kubernetes_and_cloudfoundry_addresses() {
    let single = AppStatus::new("ticktock-log-v1", "deployed")
        .with_instance(InstanceStatus::new("ticktock-log-v1-abc", "deployed"));
    let multi = AppStatus::new("ticktock-time-v1", "deployed")
        .with_instance(InstanceStatus::new("ticktock-time-v1-0", "deployed"))
        .with_instance(InstanceStatus::new("ticktock-time-v1-1", "deploying"));

    let k8s = AddressResolver::new(
        PlatformKind::Kubernetes,
        Some(".apps.example.com".to_string()),
        "",
    );
    assert_eq!(
        k8s.resolve(&single, &single.instances[0]).as_deref(),
        Some("https://ticktock-log-v1.apps.example.com")
    );
    assert_eq!(
        k8s.resolve(&multi, &multi.instances[0]).as_deref(),
        Some("https://ticktock-time-v1-0.apps.example.com")
    );
    assert_eq!(k8s.resolve(&multi, &multi.instances[1]), None);

    let status = UnitStatus::new("ticktock", "deployed")
        .with_app(single.clone())
        .with_app(multi);
    let resolution = k8s.resolution(&status);
    assert_eq!((resolution.resolved, resolution.instances), (2, 3));
    assert!(!resolution.is_complete());

    let k8s_no_host = AddressResolver::new(PlatformKind::Kubernetes, None, "");
    let with_url = AppStatus::new("ticktock-log-v1", "deployed").with_instance(
        InstanceStatus::new("ticktock-log-v1-abc", "deployed")
            .with_attribute("url", "http://10.0.0.7:8080/"),
    );
    assert_eq!(
        k8s_no_host.resolve(&with_url, &with_url.instances[0]).as_deref(),
        Some("http://10.0.0.7:8080")
    );

    let cf = AddressResolver::new(PlatformKind::CloudFoundry, None, "cfapps.io");
    assert_eq!(
        cf.resolve(&single, &single.instances[0]).as_deref(),
        Some("http://ticktock-log-v1.cfapps.io")
    );

    let targets = cf.log_targets(&UnitStatus::new("ticktock", "deployed").with_app(single));
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].source_id(), "ticktock-log-v1/ticktock-log-v1-abc");
    assert_eq!(
        targets[0].address.as_deref(),
        Some("http://ticktock-log-v1.cfapps.io")
    );

    assert!(!local().resolution(&UnitStatus::new("empty", "deployed")).is_complete());
}

#[test]
fn observed_sequences_are_checked_against_the_edge_table() {
    use DeploymentState::{Deleted, Deployed, Deploying, Error, Partial, Undeployed, Updating};

    assert!(
        LifecycleStateMachine::validate_sequence(&[
            Deploying, Partial, Deployed, Updating, Deleted, Deployed, Undeployed, Deploying,
        ])
        .is_accepted()
    );
    assert!(LifecycleStateMachine::validate_sequence(&[Deploying, Deploying, Error]).is_accepted());
    assert!(
        !LifecycleStateMachine::validate_sequence(&[Deployed, Updating, Deleted, Deleted])
            .is_accepted(),
        "sequences start from none"
    );

    match LifecycleStateMachine::validate_sequence(&[Deploying, Deployed, Deploying]) {
        ValidationResult::Rejected { from, to, .. } => {
            assert_eq!((from, to), (Deployed, Deploying));
        }
        other => panic!("expected rejection, got {other:?}"),
    }

    let machine = LifecycleStateMachine::new();
    assert!(machine.observe("s", Deployed).is_accepted(), "first observation is the baseline");
    assert!(machine.observe("s", Updating).is_accepted());
    assert!(!machine.observe("s", Partial).is_accepted());
    assert_eq!(machine.current("s"), Updating);
    assert!(Deleted.can_transition_to(Partial));
    assert!(Deployed.can_transition_to(Partial));
    assert!(Partial.can_transition_to(Updating));
    assert!(!Undeployed.can_transition_to(Partial));
    assert!(!machine.observe_str("s", "exploded").is_accepted());
    assert!(machine.observe_str("s", "Deleted").is_accepted());
    assert_eq!(machine.path("s"), vec![Deployed, Updating, Deleted]);

    machine.reset("s");
    assert_eq!(machine.current("s"), DeploymentState::None);

    assert_eq!("FAILED".parse::<DeploymentState>(), Ok(Error));
    assert_eq!("incomplete".parse::<DeploymentState>(), Ok(Partial));
    assert!("exploded".parse::<DeploymentState>().is_err());
}
