#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use dataflow_verify::client::{
    DataFlowClient, ExecutionStatus, HistoryEntry, Properties, ScheduleInfo, TaskExecution,
    UnitStatus,
};
use dataflow_verify::types::BoxFuture;

/// A queue of scripted replies. Each read pops the front; the last reply
/// sticks so a poll can keep reading it.
#[derive(Debug)]
pub struct Script<T> {
    replies: VecDeque<Result<T, String>>,
}

impl<T: Clone> Script<T> {
    fn new() -> Self {
        Self {
            replies: VecDeque::new(),
        }
    }

    fn push(&mut self, reply: Result<T, String>) {
        self.replies.push_back(reply);
    }

    fn next(&mut self) -> Option<Result<T, String>> {
        if self.replies.len() > 1 {
            self.replies.pop_front()
        } else {
            self.replies.front().cloned()
        }
    }
}

#[derive(Default)]
struct State {
    statuses: HashMap<String, Script<UnitStatus>>,
    histories: HashMap<String, Script<Vec<HistoryEntry>>>,
    executions: HashMap<String, Script<Vec<TaskExecution>>>,
    execution: HashMap<i64, Script<TaskExecution>>,
    schedules: Vec<ScheduleInfo>,
    next_id: i64,
    failing: HashSet<String>,
    calls: Vec<String>,
    status_reads: usize,
}

/// Scripted `DataFlowClient`.
///
/// - records every call (`"deploy ticktock"`, `"launch timestamp"`, ...);
/// - serves scripted statuses, histories and executions;
/// - fails any operation registered with [`FakeClient::fail_on`].
#[derive(Clone, Default)]
pub struct FakeClient {
    state: Arc<Mutex<State>>,
}

impl FakeClient {
    pub fn new() -> Self {
        let client = Self::default();
        client.state.lock().unwrap().next_id = 1;
        client
    }

    pub fn push_status(&self, status: UnitStatus) {
        let mut state = self.state.lock().unwrap();
        state
            .statuses
            .entry(status.name.clone())
            .or_insert_with(Script::new)
            .push(Ok(status));
    }

    pub fn push_status_error(&self, unit: &str, message: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .statuses
            .entry(unit.to_string())
            .or_insert_with(Script::new)
            .push(Err(message.to_string()));
    }

    pub fn push_history(&self, unit: &str, history: Vec<HistoryEntry>) {
        let mut state = self.state.lock().unwrap();
        state
            .histories
            .entry(unit.to_string())
            .or_insert_with(Script::new)
            .push(Ok(history));
    }

    /// Next listing of `task`'s executions.
    pub fn push_executions(&self, task: &str, executions: Vec<TaskExecution>) {
        let mut state = self.state.lock().unwrap();
        state
            .executions
            .entry(task.to_string())
            .or_insert_with(Script::new)
            .push(Ok(executions));
    }

    /// Next detail read of one execution.
    pub fn push_execution(&self, execution: TaskExecution) {
        let mut state = self.state.lock().unwrap();
        state
            .execution
            .entry(execution.execution_id)
            .or_insert_with(Script::new)
            .push(Ok(execution));
    }

    /// Id handed out by the next `launch`.
    pub fn set_next_id(&self, id: i64) {
        self.state.lock().unwrap().next_id = id;
    }

    /// Make every call of `operation` (`"destroy_stream"`, `"deploy"`, ...)
    /// fail.
    pub fn fail_on(&self, operation: &str) {
        self.state
            .lock()
            .unwrap()
            .failing
            .insert(operation.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls whose operation is `operation`.
    pub fn calls_to(&self, operation: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.split(' ').next() == Some(operation))
            .collect()
    }

    pub fn status_reads(&self) -> usize {
        self.state.lock().unwrap().status_reads
    }

    fn record(&self, operation: &str, subject: &str) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("{operation} {subject}"));
        if state.failing.contains(operation) {
            return Err(anyhow!("{operation} '{subject}' failed (scripted)"));
        }
        Ok(())
    }

    fn unscripted(what: &str, key: &str) -> anyhow::Error {
        anyhow!("no scripted {what} for '{key}'")
    }
}

fn reply<T>(reply: Option<Result<T, String>>, what: &str, key: &str) -> anyhow::Result<T> {
    match reply {
        Some(Ok(value)) => Ok(value),
        Some(Err(message)) => Err(anyhow!(message)),
        None => Err(FakeClient::unscripted(what, key)),
    }
}

impl DataFlowClient for FakeClient {
    fn import_apps<'a>(&'a self, uri: &'a str) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move { self.record("import_apps", uri) })
    }

    fn create_stream<'a>(
        &'a self,
        name: &'a str,
        _definition: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move { self.record("create_stream", name) })
    }

    fn deploy<'a>(
        &'a self,
        unit: &'a str,
        _properties: &'a Properties,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move { self.record("deploy", unit) })
    }

    fn undeploy<'a>(&'a self, unit: &'a str) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move { self.record("undeploy", unit) })
    }

    fn status<'a>(&'a self, unit: &'a str) -> BoxFuture<'a, anyhow::Result<UnitStatus>> {
        Box::pin(async move {
            self.record("status", unit)?;
            let mut state = self.state.lock().unwrap();
            state.status_reads += 1;
            let next = state.statuses.get_mut(unit).and_then(Script::next);
            reply(next, "status", unit)
        })
    }

    fn history<'a>(&'a self, unit: &'a str) -> BoxFuture<'a, anyhow::Result<Vec<HistoryEntry>>> {
        Box::pin(async move {
            self.record("history", unit)?;
            let next = self
                .state
                .lock()
                .unwrap()
                .histories
                .get_mut(unit)
                .and_then(Script::next);
            reply(next, "history", unit)
        })
    }

    fn destroy_stream<'a>(&'a self, name: &'a str) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move { self.record("destroy_stream", name) })
    }

    fn create_task<'a>(
        &'a self,
        name: &'a str,
        _definition: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move { self.record("create_task", name) })
    }

    fn launch<'a>(
        &'a self,
        task: &'a str,
        _properties: &'a Properties,
        _args: &'a [String],
    ) -> BoxFuture<'a, anyhow::Result<i64>> {
        Box::pin(async move {
            self.record("launch", task)?;
            let mut state = self.state.lock().unwrap();
            let id = state.next_id;
            state.next_id += 1;
            Ok(id)
        })
    }

    fn execution_status<'a>(&'a self, id: i64) -> BoxFuture<'a, anyhow::Result<ExecutionStatus>> {
        Box::pin(async move {
            let key = id.to_string();
            self.record("execution_status", &key)?;
            let next = self
                .state
                .lock()
                .unwrap()
                .execution
                .get_mut(&id)
                .and_then(Script::next);
            reply(next, "execution", &key).map(|e| e.status)
        })
    }

    fn execution<'a>(&'a self, id: i64) -> BoxFuture<'a, anyhow::Result<TaskExecution>> {
        Box::pin(async move {
            let key = id.to_string();
            self.record("execution", &key)?;
            let next = self
                .state
                .lock()
                .unwrap()
                .execution
                .get_mut(&id)
                .and_then(Script::next);
            reply(next, "execution", &key)
        })
    }

    fn executions<'a>(
        &'a self,
        task: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<Vec<TaskExecution>>> {
        Box::pin(async move {
            self.record("executions", task)?;
            let next = self
                .state
                .lock()
                .unwrap()
                .executions
                .get_mut(task)
                .and_then(Script::next);
            // A task nobody launched simply has no executions.
            Ok(next.transpose().map_err(|m| anyhow!(m))?.unwrap_or_default())
        })
    }

    fn destroy_task<'a>(&'a self, name: &'a str) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move { self.record("destroy_task", name) })
    }

    fn schedule<'a>(
        &'a self,
        schedule_name: &'a str,
        task: &'a str,
        properties: &'a Properties,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            self.record("schedule", schedule_name)?;
            self.state.lock().unwrap().schedules.push(ScheduleInfo {
                schedule_name: schedule_name.to_string(),
                task_name: task.to_string(),
                properties: properties.clone(),
            });
            Ok(())
        })
    }

    fn schedules<'a>(&'a self, task: &'a str) -> BoxFuture<'a, anyhow::Result<Vec<ScheduleInfo>>> {
        Box::pin(async move {
            self.record("schedules", task)?;
            Ok(self
                .state
                .lock()
                .unwrap()
                .schedules
                .iter()
                .filter(|s| s.task_name == task)
                .cloned()
                .collect())
        })
    }

    fn unschedule<'a>(&'a self, schedule_name: &'a str) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            self.record("unschedule", schedule_name)?;
            self.state
                .lock()
                .unwrap()
                .schedules
                .retain(|s| s.schedule_name != schedule_name);
            Ok(())
        })
    }
}
