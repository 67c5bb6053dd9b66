// src/scenario/session.rs

use std::sync::Arc;

use anyhow::anyhow;
use tracing::{info, warn};

use crate::client::{
    DataFlowClient, HistoryEntry, HttpDataFlowClient, Properties, ScheduleInfo, TaskExecution,
};
use crate::composed::ComposedTaskGraph;
use crate::config::ConfigFile;
use crate::errors::{Result, VerifyError};
use crate::ledger::{Execution, ExecutionLedger};
use crate::lifecycle::{
    AddressResolver, AwaitContext, DeploymentState, LifecycleStateMachine, StateSnapshot,
    await_history,
};
use crate::logs::{ErrorMarkers, LogFetcher, LogMonitor, LogTarget, MarkerHit, PlatformLogAdapter};
use crate::poll::{
    AwaitCondition, AwaitPredicate, CancellationToken, LogSnapshot, PollLoop, PollOptions,
    SupplierError, count_at_least, log_contains,
};
use crate::scenario::verify::{VerificationReport, verify_outcomes};

/// Log text of one source plus any error marker found in the newest part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogProbe {
    pub source_id: String,
    pub text: String,
    pub marker: Option<MarkerHit>,
}

impl LogSnapshot for LogProbe {
    fn log_text(&self) -> &str {
        &self.text
    }
}

/// What teardown did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// Log windows dumped because the scenario failed.
    pub dumped: usize,
    /// Units (schedules, streams, tasks) removed.
    pub cleaned: usize,
    /// Cleanup calls that failed; teardown carries on past them.
    pub errors: Vec<String>,
}

/// All state one verification scenario owns.
///
/// Nothing here is shared between sessions: the registration flag, the log
/// windows and the ledger all live and die with the session.
pub struct ScenarioSession {
    config: ConfigFile,
    client: Arc<dyn DataFlowClient>,
    logs: LogMonitor,
    resolver: AddressResolver,
    machine: LifecycleStateMachine,
    ledger: ExecutionLedger,
    poll: PollLoop,
    apps_registered: bool,
    streams: Vec<String>,
    tasks: Vec<String>,
    schedules: Vec<String>,
}

impl ScenarioSession {
    /// Build a session around explicit collaborators.
    pub fn new(
        config: ConfigFile,
        client: Arc<dyn DataFlowClient>,
        fetcher: Arc<dyn LogFetcher>,
    ) -> Result<Self> {
        let markers = ErrorMarkers::from_patterns(&config.markers.error)
            .map_err(|e| VerifyError::ConfigError(format!("invalid error marker: {e}")))?;
        let resolver = AddressResolver::from_config(&config);

        info!(
            server = %config.server.uri,
            platform = %config.platform.kind,
            "scenario session started"
        );

        Ok(Self {
            config,
            client,
            logs: LogMonitor::new(fetcher, markers),
            resolver,
            machine: LifecycleStateMachine::new(),
            ledger: ExecutionLedger::new(),
            poll: PollLoop::new(),
            apps_registered: false,
            streams: Vec::new(),
            tasks: Vec::new(),
            schedules: Vec::new(),
        })
    }

    /// Session against the configured server, with the platform's log
    /// strategy.
    pub fn from_config(config: ConfigFile) -> Result<Self> {
        let client = Arc::new(HttpDataFlowClient::new(config.server.uri.clone()));
        let fetcher = Arc::new(PlatformLogAdapter::from_config(&config));
        Self::new(config, client, fetcher)
    }

    /// Abort in-flight awaits when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.poll = PollLoop::with_cancellation(cancel);
        self
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn client(&self) -> &dyn DataFlowClient {
        self.client.as_ref()
    }

    pub fn ledger(&self) -> &ExecutionLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut ExecutionLedger {
        &mut self.ledger
    }

    pub fn machine(&self) -> &LifecycleStateMachine {
        &self.machine
    }

    pub fn logs(&self) -> &LogMonitor {
        &self.logs
    }

    pub fn apps_registered(&self) -> bool {
        self.apps_registered
    }

    fn context(&self) -> AwaitContext<'_> {
        AwaitContext {
            client: self.client.as_ref(),
            resolver: &self.resolver,
            poll: &self.poll,
            logs: Some(&self.logs),
        }
    }

    fn status_options(&self, what: String) -> PollOptions {
        PollOptions::from_timing(what, &self.config.timing)
    }

    /// Import the stream and task app bundles, once per session.
    pub async fn ensure_apps_registered(&mut self) -> Result<()> {
        if self.apps_registered {
            return Ok(());
        }
        let stream_apps = self
            .config
            .registration
            .stream_apps_uri_for(self.config.platform.binder);
        let task_apps = self.config.registration.task_apps_uri();

        self.client.import_apps(&stream_apps).await?;
        self.client.import_apps(&task_apps).await?;
        self.apps_registered = true;
        info!(%stream_apps, %task_apps, "apps registered");
        Ok(())
    }

    pub async fn create_stream(&mut self, name: &str, definition: &str) -> Result<()> {
        self.client.create_stream(name, definition).await?;
        self.streams.push(name.to_string());
        Ok(())
    }

    /// Deploy a stream and wait until every app instance is reachable.
    pub async fn deploy_stream(
        &mut self,
        name: &str,
        properties: &Properties,
    ) -> Result<StateSnapshot> {
        info!(stream = name, properties = properties.len(), "deploying stream");
        self.client.deploy(name, properties).await?;
        self.await_stream_state(name, DeploymentState::Deployed).await
    }

    pub async fn undeploy_stream(&mut self, name: &str) -> Result<StateSnapshot> {
        info!(stream = name, "undeploying stream");
        self.client.undeploy(name).await?;
        self.await_stream_state(name, DeploymentState::Undeployed).await
    }

    /// Wait for a stream to reach `target`.
    ///
    /// Deployments get `deploy_pause_retries` polls; every other state gets
    /// `max_wait_time`.
    pub async fn await_stream_state(
        &self,
        name: &str,
        target: DeploymentState,
    ) -> Result<StateSnapshot> {
        let timing = &self.config.timing;
        let what = format!("stream '{name}' {target}");
        let options = match target {
            DeploymentState::Deployed | DeploymentState::Partial => {
                PollOptions::new(what, timing.deploy_budget(), timing.poll_interval)
            }
            _ => self.status_options(what),
        };
        self.machine
            .await_state(self.context(), name, target, &options)
            .await
    }

    /// Wait for a release history condition after an update or rollback.
    pub async fn await_stream_history(
        &self,
        name: &str,
        predicate: &AwaitPredicate<Vec<HistoryEntry>>,
    ) -> Result<Vec<HistoryEntry>> {
        let options = self.status_options(format!("stream '{name}' history"));
        await_history(self.context(), name, predicate, &options).await
    }

    /// Log targets for every instance of a unit, as currently deployed.
    pub async fn app_targets(&self, unit: &str) -> Result<Vec<LogTarget>> {
        let status = self.client.status(unit).await?;
        Ok(self.resolver.log_targets(&status))
    }

    pub async fn create_task(&mut self, name: &str, definition: &str) -> Result<()> {
        self.client.create_task(name, definition).await?;
        self.tasks.push(name.to_string());
        Ok(())
    }

    /// Launch a task and record the new execution.
    pub async fn launch_task(
        &mut self,
        name: &str,
        properties: &Properties,
        args: &[String],
    ) -> Result<i64> {
        let id = self.client.launch(name, properties, args).await?;
        info!(task = name, execution_id = id, "task launched");
        self.ledger.record(Execution::new(id, name))?;
        Ok(id)
    }

    /// Wait until execution `id` has an end time, then record it.
    pub async fn await_execution(&mut self, id: i64) -> Result<Execution> {
        let options = self.status_options(format!("task execution {id} finished"));
        let predicate = AwaitPredicate::until(AwaitCondition::new(
            "execution has an end time",
            |e: &TaskExecution| e.is_finished(),
        ));

        let client = self.client.as_ref();
        let execution = self
            .poll
            .run(&options, &predicate, || async move {
                Ok::<_, SupplierError>(client.execution(id).await?)
            })
            .await
            .into_result(&options)?;

        let label = self
            .ledger
            .get(id)
            .map(|e| e.label.clone())
            .unwrap_or_else(|| execution.task_name.clone());
        self.ledger
            .record(Execution::from_task_execution(&execution, label))?;
        self.ledger
            .get(id)
            .cloned()
            .ok_or_else(|| VerifyError::Ledger {
                id,
                reason: "missing right after recording".to_string(),
            })
    }

    /// Wait until `task` has at least `count` executions, all finished, and
    /// record them.
    pub async fn await_task_complete(
        &mut self,
        task: &str,
        count: usize,
    ) -> Result<Vec<TaskExecution>> {
        let options = self.status_options(format!("{count} execution(s) of task '{task}'"));
        let predicate = AwaitPredicate::until(count_at_least(count).and(AwaitCondition::new(
            "every execution has an end time",
            |executions: &Vec<TaskExecution>| executions.iter().all(TaskExecution::is_finished),
        )));

        let client = self.client.as_ref();
        let mut executions = self
            .poll
            .run(&options, &predicate, || async move {
                Ok::<_, SupplierError>(client.executions(task).await?)
            })
            .await
            .into_result(&options)?;

        executions.sort_by_key(|e| e.execution_id);
        for execution in &executions {
            if execution
                .parent_execution_id
                .is_some_and(|p| self.ledger.get(p).is_none())
            {
                continue;
            }
            self.ledger
                .record(Execution::from_task_execution(execution, task))?;
        }
        Ok(executions)
    }

    /// Record the child executions of composed task `parent_id`.
    ///
    /// Children are launched as `<definition_name>-<label>` for every leaf of
    /// `graph`. Returns the number of children recorded.
    pub async fn record_children(
        &mut self,
        graph: &ComposedTaskGraph,
        parent_id: i64,
        definition_name: &str,
    ) -> Result<usize> {
        let mut recorded = 0;
        for label in graph.labels() {
            let child = format!("{definition_name}-{label}");
            let mut executions = self.client.executions(&child).await?;
            executions.sort_by_key(|e| e.execution_id);
            for execution in executions
                .iter()
                .filter(|e| e.parent_execution_id == Some(parent_id))
            {
                self.ledger
                    .record(Execution::from_task_execution(execution, &child))?;
                recorded += 1;
            }
        }
        info!(parent_id, definition = definition_name, recorded, "child executions recorded");
        Ok(recorded)
    }

    /// Record the children of `parent_id` and check them against `graph`.
    pub async fn verify_composed(
        &mut self,
        graph: &ComposedTaskGraph,
        parent_id: i64,
        definition_name: &str,
    ) -> Result<VerificationReport> {
        self.record_children(graph, parent_id, definition_name).await?;
        Ok(verify_outcomes(graph, definition_name, parent_id, &self.ledger)?)
    }

    /// Wait until `needle` shows up in the log of `target`.
    ///
    /// Fails fast if an error marker appears in the same log first.
    pub async fn await_log_contains(&self, target: &LogTarget, needle: &str) -> Result<LogProbe> {
        let source_id = target.source_id();
        let options = PollOptions::for_logs(
            format!("log of '{source_id}' contains '{needle}'"),
            &self.config.timing,
        );
        let predicate = AwaitPredicate::until(log_contains(needle)).fail_fast_on(
            AwaitCondition::new("error marker in app log", |p: &LogProbe| p.marker.is_some()),
        );

        let logs = &self.logs;
        let supply = || {
            let source_id = source_id.clone();
            async move {
                let marker = logs.check(std::slice::from_ref(target)).await;
                let text = logs
                    .content(&source_id)
                    .ok_or_else(|| anyhow!("no log fetched yet for '{source_id}'"))?;
                Ok::<_, SupplierError>(LogProbe {
                    source_id,
                    text,
                    marker,
                })
            }
        };

        self.poll
            .run(&options, &predicate, supply)
            .await
            .into_result(&options)
    }

    /// Schedule `task` and remember the schedule for teardown.
    pub async fn schedule_task(
        &mut self,
        schedule_name: &str,
        task: &str,
        properties: &Properties,
    ) -> Result<()> {
        self.client.schedule(schedule_name, task, properties).await?;
        self.schedules.push(schedule_name.to_string());
        Ok(())
    }

    /// Wait until `schedule_name` is listed for `task`.
    pub async fn await_schedule(&self, task: &str, schedule_name: &str) -> Result<ScheduleInfo> {
        let options = self.status_options(format!("schedule '{schedule_name}' of '{task}'"));
        let wanted = schedule_name.to_string();
        let predicate = AwaitPredicate::until(AwaitCondition::new(
            format!("schedule '{schedule_name}' listed"),
            move |schedules: &Vec<ScheduleInfo>| {
                schedules.iter().any(|s| s.schedule_name == wanted)
            },
        ));

        let client = self.client.as_ref();
        let schedules = self
            .poll
            .run(&options, &predicate, || async move {
                Ok::<_, SupplierError>(client.schedules(task).await?)
            })
            .await
            .into_result(&options)?;

        schedules
            .into_iter()
            .find(|s| s.schedule_name == schedule_name)
            .ok_or_else(|| VerifyError::Platform(format!("schedule '{schedule_name}' vanished")))
    }

    /// End the scenario.
    ///
    /// On failure every tracked log window is dumped first. Created
    /// schedules, streams and tasks are removed; a failing cleanup call is
    /// logged and skipped. The ledger, log windows and lifecycle tracking are
    /// then cleared.
    pub async fn teardown(&mut self, failed: bool) -> TeardownReport {
        let mut report = TeardownReport::default();
        if failed {
            report.dumped = self.logs.dump();
        }

        for schedule in std::mem::take(&mut self.schedules) {
            match self.client.unschedule(&schedule).await {
                Ok(()) => report.cleaned += 1,
                Err(err) => report.errors.push(format!("unschedule '{schedule}': {err:#}")),
            }
        }
        for stream in std::mem::take(&mut self.streams) {
            match self.client.destroy_stream(&stream).await {
                Ok(()) => report.cleaned += 1,
                Err(err) => report.errors.push(format!("destroy stream '{stream}': {err:#}")),
            }
            self.machine.reset(&stream);
        }
        for task in std::mem::take(&mut self.tasks) {
            match self.client.destroy_task(&task).await {
                Ok(()) => report.cleaned += 1,
                Err(err) => report.errors.push(format!("destroy task '{task}': {err:#}")),
            }
        }

        for error in &report.errors {
            warn!(%error, "cleanup failed");
        }

        self.ledger.purge();
        self.logs.clear();
        self.machine.clear();
        info!(
            failed,
            dumped = report.dumped,
            cleaned = report.cleaned,
            "scenario torn down"
        );
        report
    }
}
