// tests/scenario_session.rs

mod common;
use crate::common::builders::{ConfigFileBuilder, TaskExecutionBuilder, unit_status};
use crate::common::fake_client::FakeClient;
use crate::common::fake_logs::FakeLogFetcher;
use crate::common::{TestResult, init_tracing, with_timeout};

use std::collections::BTreeSet;
use std::sync::Arc;

use dataflow_verify::client::{Properties, TaskExecution, UnitStatus};
use dataflow_verify::composed::ComposedTaskGraph;
use dataflow_verify::errors::VerifyError;
use dataflow_verify::lifecycle::DeploymentState;
use dataflow_verify::logs::LogTarget;
use dataflow_verify::poll::CancellationToken;
use dataflow_verify::scenario::ScenarioSession;

const CTR: &str = "t1: A && scenario 'FAILED'->t3: A && <t4: A || t5: A> && t6: A";

fn session(client: &FakeClient, fetcher: &FakeLogFetcher) -> ScenarioSession {
    ScenarioSession::new(
        ConfigFileBuilder::new().build(),
        Arc::new(client.clone()),
        Arc::new(fetcher.clone()),
    )
    .expect("session")
}

fn set(labels: &[&str]) -> BTreeSet<String> {
    labels.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn apps_are_registered_once_per_session() -> TestResult {
    init_tracing();
    let client = FakeClient::new();
    let mut first = session(&client, &FakeLogFetcher::new());

    first.ensure_apps_registered().await?;
    first.ensure_apps_registered().await?;
    assert!(first.apps_registered());
    assert_eq!(client.calls_to("import_apps").len(), 2, "stream and task bundles");

    let mut second = session(&client, &FakeLogFetcher::new());
    assert!(!second.apps_registered());
    second.ensure_apps_registered().await?;
    assert_eq!(client.calls_to("import_apps").len(), 4);
    Ok(())
}

#[tokio::test]
async fn stream_deploy_log_and_undeploy() -> TestResult {
    init_tracing();
    let client = FakeClient::new();
    client.push_status(UnitStatus::new("ticktock", "deploying"));
    client.push_status(unit_status("ticktock", "deployed", &["ticktock-log"]));

    let fetcher = FakeLogFetcher::new();
    fetcher.push("ticktock-log/ticktock-log-0", "booting\n");
    fetcher.push(
        "ticktock-log/ticktock-log-0",
        "booting\nStarted LogSinkApplication in 3.1 seconds\n",
    );

    let mut session = session(&client, &fetcher);
    session
        .create_stream("ticktock", "time | log")
        .await?;

    let deployed = with_timeout(session.deploy_stream("ticktock", &Properties::new())).await?;
    assert_eq!(deployed.effective, DeploymentState::Deployed);
    assert_eq!(deployed.instances, 1);

    let targets = session.app_targets("ticktock").await?;
    assert_eq!(targets.len(), 1);
    let probe = with_timeout(session.await_log_contains(&targets[0], "Started LogSink")).await?;
    assert_eq!(probe.source_id, "ticktock-log/ticktock-log-0");
    assert!(probe.marker.is_none());

    client.push_status(UnitStatus::new("ticktock", "undeployed"));
    let undeployed = with_timeout(session.undeploy_stream("ticktock")).await?;
    assert_eq!(undeployed.effective, DeploymentState::Undeployed);
    assert_eq!(
        session.machine().path("ticktock"),
        vec![
            DeploymentState::Deploying,
            DeploymentState::Deployed,
            DeploymentState::Undeployed
        ]
    );

    let report = session.teardown(false).await;
    assert_eq!(report.dumped, 0);
    assert_eq!(report.cleaned, 1);
    assert!(report.errors.is_empty());
    assert_eq!(client.calls_to("destroy_stream"), vec!["destroy_stream ticktock"]);
    assert_eq!(session.machine().current("ticktock"), DeploymentState::None);
    Ok(())
}

#[tokio::test]
async fn a_marker_aborts_a_log_await() -> TestResult {
    init_tracing();
    let fetcher = FakeLogFetcher::new();
    fetcher.push("http/0", "starting\nException in thread main java.lang.IllegalStateException\n");
    let session = session(&FakeClient::new(), &fetcher);

    let target = LogTarget::app("http").with_instance("0");
    let err = with_timeout(session.await_log_contains(&target, "Started"))
        .await
        .expect_err("marker before expected text");

    match err {
        VerifyError::FailedFast { cause, .. } => assert!(cause.contains("error marker")),
        other => panic!("expected fail-fast, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn composed_task_children_match_the_graph() -> TestResult {
    init_tracing();
    let client = FakeClient::new();
    client.set_next_id(100);
    client.push_execution(TaskExecution::running(100, "ctr"));
    client.push_execution(TaskExecutionBuilder::new(100, "ctr").exit(0).build());
    client.push_executions(
        "ctr-t1",
        vec![TaskExecutionBuilder::new(101, "ctr-t1").parent(100).exit(0).build()],
    );
    client.push_executions(
        "ctr-scenario",
        vec![
            TaskExecutionBuilder::new(102, "ctr-scenario")
                .parent(100)
                .exit(1)
                .build(),
        ],
    );
    client.push_executions(
        "ctr-t3",
        vec![
            TaskExecutionBuilder::new(103, "ctr-t3")
                .parent(100)
                .exit(0)
                .jobs(&[7])
                .build(),
        ],
    );

    let mut session = session(&client, &FakeLogFetcher::new());
    let graph = ComposedTaskGraph::parse(CTR)?;
    session.create_task("ctr", CTR).await?;

    let id = session.launch_task("ctr", &Properties::new(), &[]).await?;
    assert_eq!(id, 100);
    assert!(!session.ledger().is_complete("ctr", 1));

    let parent = with_timeout(session.await_execution(id)).await?;
    assert_eq!(parent.exit_code, Some(0));
    assert!(session.ledger().is_complete("ctr", 1));

    let report = session.verify_composed(&graph, id, "ctr").await?;
    assert_eq!(report.outcomes.ran, set(&["t1", "scenario", "t3"]));
    assert_eq!(report.outcomes.skipped, set(&["t4", "t5", "t6"]));
    assert_eq!(report.exit_codes.get("scenario"), Some(&1));
    assert_eq!(session.ledger().by_parent(100).len(), 3);
    assert_eq!(session.ledger().job_count("ctr-t3"), 1);

    let report = session.teardown(false).await;
    assert_eq!(report.cleaned, 1);
    assert!(session.ledger().is_empty());
    Ok(())
}

#[tokio::test]
async fn diverging_children_are_an_assertion_failure() -> TestResult {
    init_tracing();
    let client = FakeClient::new();
    client.set_next_id(200);
    for (id, label, code) in [(201, "t1", 0), (202, "scenario", 1), (203, "t4", 0)] {
        let task = format!("ctr-{label}");
        client.push_executions(
            &task,
            vec![TaskExecutionBuilder::new(id, &task).parent(200).exit(code).build()],
        );
    }

    let mut session = session(&client, &FakeLogFetcher::new());
    let graph = ComposedTaskGraph::parse(CTR)?;
    let id = session.launch_task("ctr", &Properties::new(), &[]).await?;

    let err = session
        .verify_composed(&graph, id, "ctr")
        .await
        .expect_err("t4 must not run after scenario failed");

    match err {
        VerifyError::Assertion(failure) => {
            assert_eq!(failure.parent_id, 200);
            assert_eq!(failure.missing, set(&["t3"]));
            assert_eq!(failure.unexpected, set(&["t4"]));
            assert_eq!(failure.parent_exit_code, None);
        }
        other => panic!("expected assertion failure, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn task_executions_are_awaited_and_recorded() -> TestResult {
    init_tracing();
    let client = FakeClient::new();
    client.push_executions("timestamp", vec![TaskExecution::running(1, "timestamp")]);
    client.push_executions(
        "timestamp",
        vec![
            TaskExecutionBuilder::new(2, "timestamp").exit(0).build(),
            TaskExecutionBuilder::new(1, "timestamp").exit(0).build(),
        ],
    );

    let mut session = session(&client, &FakeLogFetcher::new());
    let executions = with_timeout(session.await_task_complete("timestamp", 2)).await?;

    assert_eq!(
        executions.iter().map(|e| e.execution_id).collect::<Vec<_>>(),
        vec![1, 2]
    );
    assert!(session.ledger().is_complete("timestamp", 2));
    assert_eq!(client.calls_to("executions").len(), 2);
    Ok(())
}

#[tokio::test]
async fn schedules_are_awaited_and_removed_on_teardown() -> TestResult {
    init_tracing();
    let client = FakeClient::new();
    let mut session = session(&client, &FakeLogFetcher::new());
    let properties = Properties::from([(
        "scheduler.cron.expression".to_string(),
        "0/1 * * * *".to_string(),
    )]);

    session.create_task("timestamp", "timestamp").await?;
    session
        .schedule_task("every-minute", "timestamp", &properties)
        .await?;
    let schedule = with_timeout(session.await_schedule("timestamp", "every-minute")).await?;
    assert_eq!(schedule.task_name, "timestamp");
    assert_eq!(schedule.properties, properties);

    let report = session.teardown(false).await;
    assert_eq!(report.cleaned, 2);
    assert_eq!(client.calls_to("unschedule"), vec!["unschedule every-minute"]);
    assert_eq!(client.calls_to("destroy_task"), vec!["destroy_task timestamp"]);
    Ok(())
}

#[tokio::test]
async fn failed_teardown_dumps_logs_and_carries_on() -> TestResult {
    init_tracing();
    let client = FakeClient::new();
    client.fail_on("destroy_stream");
    let fetcher = FakeLogFetcher::new();
    fetcher.push("ticktock-log", "something went wrong\n");

    let mut session = session(&client, &fetcher);
    session.create_stream("ticktock", "time | log").await?;
    session.create_task("timestamp", "timestamp").await?;
    session.logs().refresh(&LogTarget::app("ticktock-log")).await?;

    let report = session.teardown(true).await;

    assert_eq!(report.dumped, 1);
    assert_eq!(report.cleaned, 1);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("ticktock"));
    assert_eq!(client.calls_to("destroy_task").len(), 1);
    assert!(session.logs().sources().is_empty());
    Ok(())
}

#[tokio::test]
async fn a_cancelled_session_stops_awaiting() -> TestResult {
    init_tracing();
    let client = FakeClient::new();
    client.push_status(UnitStatus::new("ticktock", "deploying"));
    let cancel = CancellationToken::new();
    let session = session(&client, &FakeLogFetcher::new()).with_cancellation(cancel.clone());

    cancel.cancel();
    let result =
        with_timeout(session.await_stream_state("ticktock", DeploymentState::Deployed)).await;

    assert!(matches!(result, Err(VerifyError::Cancelled { .. })));
    assert_eq!(client.status_reads(), 0);
    Ok(())
}
