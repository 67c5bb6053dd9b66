// src/lib.rs

pub mod cli;
pub mod client;
pub mod composed;
pub mod config;
pub mod errors;
pub mod ledger;
pub mod lifecycle;
pub mod logging;
pub mod logs;
pub mod poll;
pub mod scenario;
pub mod types;

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Result, anyhow};
use tracing::{debug, info};

use crate::cli::{CliArgs, Command};
use crate::composed::ComposedTaskGraph;
use crate::config::{ConfigFile, load_and_validate};
use crate::lifecycle::DeploymentState;
use crate::poll::CancellationToken;
use crate::scenario::ScenarioSession;

/// High-level entry point used by `main.rs`.
///
/// Offline commands (`graph`, `expect`) never touch the config or the
/// server. The await commands build a [`ScenarioSession`] against the
/// configured server, cancelled on Ctrl-C.
pub async fn run(args: CliArgs) -> Result<()> {
    match args.command {
        Command::Graph { definition } => {
            let graph = ComposedTaskGraph::parse(&definition)?;
            print!("{graph}");
            println!("order: {}", graph.topological_labels()?.join(", "));
            Ok(())
        }
        Command::Expect { definition, exits } => {
            let graph = ComposedTaskGraph::parse(&definition)?;
            let actual: BTreeMap<String, i32> = exits.into_iter().collect();
            for label in actual.keys() {
                if !graph.labels().contains(label) {
                    return Err(anyhow!("'{label}' is not a label of the definition"));
                }
            }
            let outcomes = graph.expected_outcomes(&actual);
            println!("ran:     {}", join(&outcomes.ran));
            println!("skipped: {}", join(&outcomes.skipped));
            println!("failed:  {}", outcomes.failed);
            Ok(())
        }
        Command::CheckConfig => {
            let cfg = load_and_validate(PathBuf::from(&args.config))?;
            print_config(&cfg);
            Ok(())
        }
        Command::AwaitStream { name, state } => {
            let target: DeploymentState = state.parse().map_err(|e: String| anyhow!(e))?;
            let session = session_for(&args.config)?;
            let snapshot = session.await_stream_state(&name, target).await?;
            println!(
                "stream '{}' is {} ({}/{} instances resolved)",
                snapshot.unit,
                snapshot.effective,
                snapshot.resolved_instances,
                snapshot.instances
            );
            Ok(())
        }
        Command::AwaitTask { name, count } => {
            let mut session = session_for(&args.config)?;
            let executions = session.await_task_complete(&name, count).await?;
            for execution in &executions {
                println!(
                    "execution {} of '{}': exit code {}",
                    execution.execution_id,
                    execution.task_name,
                    execution
                        .exit_code
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "-".to_string())
                );
            }
            Ok(())
        }
    }
}

/// Load config and build a session whose awaits stop on Ctrl-C.
fn session_for(config_path: &str) -> Result<ScenarioSession> {
    let cfg = load_and_validate(PathBuf::from(config_path))?;
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("Ctrl-C received; cancelling awaits");
            cancel.cancel();
        });
    }
    Ok(ScenarioSession::from_config(cfg)?.with_cancellation(cancel))
}

fn join(labels: &std::collections::BTreeSet<String>) -> String {
    if labels.is_empty() {
        "-".to_string()
    } else {
        labels.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}

/// Print the effective configuration.
fn print_config(cfg: &ConfigFile) {
    println!("dataflow-verify config");
    println!("  server.uri = {}", cfg.server.uri);
    println!("  platform.kind = {}", cfg.platform.kind);
    println!("  platform.binder = {:?}", cfg.platform.binder);
    if let Some(ref namespace) = cfg.platform.namespace {
        println!("  platform.namespace = {namespace}");
    }
    if let Some(ref app_host) = cfg.platform.app_host {
        println!("  platform.app_host = {app_host}");
    }
    println!("  platform.route_suffix = {}", cfg.platform.route_suffix);
    println!("  platform.log_path = {}", cfg.platform.log_path);
    println!("  timing.max_wait_time = {:?}", cfg.timing.max_wait_time);
    println!("  timing.poll_interval = {:?}", cfg.timing.poll_interval);
    println!("  timing.log_poll_interval = {:?}", cfg.timing.log_poll_interval);
    println!(
        "  timing.deploy_pause_retries = {} (budget {:?})",
        cfg.timing.deploy_pause_retries,
        cfg.timing.deploy_budget()
    );
    println!("  markers.error ({}):", cfg.markers.error.len());
    for marker in &cfg.markers.error {
        println!("    - {marker}");
    }
    println!(
        "  registration.stream_apps = {}",
        cfg.registration.stream_apps_uri_for(cfg.platform.binder)
    );
    println!("  registration.task_apps = {}", cfg.registration.task_apps_uri());

    debug!("config check complete");
}
