// src/client/http.rs

//! REST implementation of [`DataFlowClient`].
//!
//! `ureq` is synchronous, so every request runs on the blocking pool via
//! `spawn_blocking`. Responses are HAL documents; list payloads live under
//! `_embedded.<resourceList>`.

use anyhow::{Context, anyhow};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use tracing::debug;

use crate::client::{
    AppStatus, DataFlowClient, ExecutionStatus, HistoryEntry, InstanceStatus, Properties,
    ScheduleInfo, TaskExecution, UnitStatus,
};
use crate::types::BoxFuture;

/// Client for a Data Flow server at `base_uri`.
#[derive(Debug, Clone)]
pub struct HttpDataFlowClient {
    base_uri: String,
    agent: ureq::Agent,
}

impl HttpDataFlowClient {
    pub fn new(base_uri: impl Into<String>) -> Self {
        Self {
            base_uri: base_uri.into().trim_end_matches('/').to_string(),
            agent: ureq::Agent::new_with_defaults(),
        }
    }

    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_uri, path.trim_start_matches('/'))
    }

    /// Run a blocking request on the blocking pool.
    async fn blocking<T, F>(&self, what: String, f: F) -> anyhow::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&ureq::Agent) -> anyhow::Result<T> + Send + 'static,
    {
        let agent = self.agent.clone();
        debug!(request = %what, "data flow request");
        tokio::task::spawn_blocking(move || f(&agent))
            .await
            .with_context(|| format!("{what}: request task panicked"))?
            .with_context(|| what)
    }

    async fn get_json(&self, path: &str, query: Option<(&str, &str)>) -> anyhow::Result<Value> {
        let url = self.url(path);
        let query = query.map(|(k, v)| (k.to_string(), v.to_string()));
        self.blocking(format!("GET {url}"), move |agent| {
            let mut request = agent.get(&url);
            if let Some((k, v)) = &query {
                request = request.query(k, v);
            }
            let value: Value = request.call()?.into_body().read_json()?;
            Ok(value)
        })
        .await
    }

    async fn post_form(&self, path: &str, form: Vec<(String, String)>) -> anyhow::Result<String> {
        let url = self.url(path);
        self.blocking(format!("POST {url}"), move |agent| {
            let body = agent
                .post(&url)
                .send_form(form.iter().map(|(k, v)| (k.as_str(), v.as_str())))?
                .into_body()
                .read_to_string()?;
            Ok(body)
        })
        .await
    }

    async fn delete(&self, path: &str) -> anyhow::Result<()> {
        let url = self.url(path);
        self.blocking(format!("DELETE {url}"), move |agent| {
            agent.delete(&url).call()?;
            Ok(())
        })
        .await
    }
}

impl DataFlowClient for HttpDataFlowClient {
    fn import_apps<'a>(&'a self, uri: &'a str) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            self.post_form(
                "apps",
                vec![
                    ("uri".to_string(), uri.to_string()),
                    ("force".to_string(), "false".to_string()),
                ],
            )
            .await?;
            Ok(())
        })
    }

    fn create_stream<'a>(
        &'a self,
        name: &'a str,
        definition: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            self.post_form(
                "streams/definitions",
                vec![
                    ("name".to_string(), name.to_string()),
                    ("definition".to_string(), definition.to_string()),
                    ("deploy".to_string(), "false".to_string()),
                ],
            )
            .await?;
            Ok(())
        })
    }

    fn deploy<'a>(
        &'a self,
        unit: &'a str,
        properties: &'a Properties,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            let url = self.url(&format!("streams/deployments/{unit}"));
            let body = properties.clone();
            self.blocking(format!("POST {url}"), move |agent| {
                agent.post(&url).send_json(&body)?;
                Ok(())
            })
            .await
        })
    }

    fn undeploy<'a>(&'a self, unit: &'a str) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move { self.delete(&format!("streams/deployments/{unit}")).await })
    }

    fn status<'a>(&'a self, unit: &'a str) -> BoxFuture<'a, anyhow::Result<UnitStatus>> {
        Box::pin(async move {
            let definition = self
                .get_json(&format!("streams/definitions/{unit}"), None)
                .await?;
            let state = str_field(&definition, "status")
                .ok_or_else(|| anyhow!("stream '{unit}' definition has no status"))?;

            let runtime = self
                .get_json(&format!("runtime/streams/{unit}"), None)
                .await
                .unwrap_or(Value::Null);
            Ok(parse_unit_status(unit, state, &runtime))
        })
    }

    fn history<'a>(&'a self, unit: &'a str) -> BoxFuture<'a, anyhow::Result<Vec<HistoryEntry>>> {
        Box::pin(async move {
            let value = self
                .get_json(&format!("streams/deployments/history/{unit}"), None)
                .await?;
            let releases = value
                .as_array()
                .ok_or_else(|| anyhow!("history for '{unit}' is not a list"))?;
            Ok(releases.iter().filter_map(parse_history_entry).collect())
        })
    }

    fn destroy_stream<'a>(&'a self, name: &'a str) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move { self.delete(&format!("streams/definitions/{name}")).await })
    }

    fn create_task<'a>(
        &'a self,
        name: &'a str,
        definition: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            self.post_form(
                "tasks/definitions",
                vec![
                    ("name".to_string(), name.to_string()),
                    ("definition".to_string(), definition.to_string()),
                ],
            )
            .await?;
            Ok(())
        })
    }

    fn launch<'a>(
        &'a self,
        task: &'a str,
        properties: &'a Properties,
        args: &'a [String],
    ) -> BoxFuture<'a, anyhow::Result<i64>> {
        Box::pin(async move {
            let body = self
                .post_form(
                    "tasks/executions",
                    vec![
                        ("name".to_string(), task.to_string()),
                        ("properties".to_string(), join_properties(properties)),
                        ("arguments".to_string(), args.join(" ")),
                    ],
                )
                .await?;
            parse_launch_response(&body)
                .ok_or_else(|| anyhow!("launch of '{task}' returned no execution id: {body}"))
        })
    }

    fn execution_status<'a>(&'a self, id: i64) -> BoxFuture<'a, anyhow::Result<ExecutionStatus>> {
        Box::pin(async move { Ok(self.execution(id).await?.status) })
    }

    fn execution<'a>(&'a self, id: i64) -> BoxFuture<'a, anyhow::Result<TaskExecution>> {
        Box::pin(async move {
            let value = self
                .get_json(&format!("tasks/executions/{id}"), None)
                .await?;
            parse_execution(&value).ok_or_else(|| anyhow!("malformed task execution {id}"))
        })
    }

    fn executions<'a>(
        &'a self,
        task: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<Vec<TaskExecution>>> {
        Box::pin(async move {
            let value = self
                .get_json("tasks/executions", Some(("name", task)))
                .await?;
            Ok(embedded(&value, "taskExecutionResourceList")
                .iter()
                .filter_map(parse_execution)
                .collect())
        })
    }

    fn destroy_task<'a>(&'a self, name: &'a str) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move { self.delete(&format!("tasks/definitions/{name}")).await })
    }

    fn schedule<'a>(
        &'a self,
        schedule_name: &'a str,
        task: &'a str,
        properties: &'a Properties,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            self.post_form(
                "tasks/schedules",
                vec![
                    ("scheduleName".to_string(), schedule_name.to_string()),
                    ("taskDefinitionName".to_string(), task.to_string()),
                    ("properties".to_string(), join_properties(properties)),
                ],
            )
            .await?;
            Ok(())
        })
    }

    fn schedules<'a>(&'a self, task: &'a str) -> BoxFuture<'a, anyhow::Result<Vec<ScheduleInfo>>> {
        Box::pin(async move {
            let value = self
                .get_json(&format!("tasks/schedules/instances/{task}"), None)
                .await?;
            Ok(embedded(&value, "scheduleInfoResourceList")
                .iter()
                .filter_map(parse_schedule)
                .collect())
        })
    }

    fn unschedule<'a>(&'a self, schedule_name: &'a str) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move { self.delete(&format!("tasks/schedules/{schedule_name}")).await })
    }
}

fn str_field<'v>(value: &'v Value, key: &str) -> Option<&'v str> {
    value.get(key).and_then(Value::as_str)
}

fn embedded<'v>(value: &'v Value, list: &str) -> &'v [Value] {
    value
        .get("_embedded")
        .and_then(|e| e.get(list))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn join_properties(properties: &Properties) -> String {
    properties
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Older servers answer a launch with a bare id, newer ones with an object.
fn parse_launch_response(body: &str) -> Option<i64> {
    let value: Value = serde_json::from_str(body.trim()).ok()?;
    value
        .as_i64()
        .or_else(|| value.get("executionId").and_then(Value::as_i64))
}

fn parse_unit_status(unit: &str, state: &str, runtime: &Value) -> UnitStatus {
    let mut status = UnitStatus::new(unit, state);

    // `/runtime/streams/{name}` answers either one stream resource or a page
    // of them.
    let apps_holder = embedded(runtime, "streamStatusResourceList")
        .iter()
        .find(|s| str_field(s, "name") == Some(unit))
        .unwrap_or(runtime);

    let apps = apps_holder
        .get("applications")
        .map(|a| embedded(a, "appStatusResourceList"))
        .unwrap_or(&[]);

    for app in apps {
        let Some(deployment_id) = str_field(app, "deploymentId") else {
            continue;
        };
        let mut app_status =
            AppStatus::new(deployment_id, str_field(app, "state").unwrap_or("unknown"));

        let instances = app
            .get("instances")
            .map(|i| embedded(i, "appInstanceStatusResourceList"))
            .unwrap_or(&[]);
        for instance in instances {
            let Some(instance_id) = str_field(instance, "instanceId") else {
                continue;
            };
            let mut instance_status =
                InstanceStatus::new(instance_id, str_field(instance, "state").unwrap_or("unknown"));
            if let Some(attributes) = instance.get("attributes").and_then(Value::as_object) {
                for (k, v) in attributes {
                    let v = match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    instance_status = instance_status.with_attribute(k.clone(), v);
                }
            }
            app_status = app_status.with_instance(instance_status);
        }
        status = status.with_app(app_status);
    }

    status
}

fn parse_history_entry(release: &Value) -> Option<HistoryEntry> {
    let version = release.get("version").and_then(Value::as_u64)?;
    let status_code = release
        .get("info")
        .and_then(|i| i.get("status"))
        .and_then(|s| str_field(s, "statusCode"))?;
    Some(HistoryEntry::new(u32::try_from(version).ok()?, status_code))
}

fn parse_execution(value: &Value) -> Option<TaskExecution> {
    let execution_id = value.get("executionId").and_then(Value::as_i64)?;
    let task_name = str_field(value, "taskName").unwrap_or_default();

    Some(TaskExecution {
        execution_id,
        task_name: task_name.to_string(),
        exit_code: value
            .get("exitCode")
            .and_then(Value::as_i64)
            .and_then(|c| i32::try_from(c).ok()),
        exit_message: str_field(value, "exitMessage").map(str::to_string),
        start_time: str_field(value, "startTime").and_then(parse_timestamp),
        end_time: str_field(value, "endTime").and_then(parse_timestamp),
        parent_execution_id: value.get("parentExecutionId").and_then(Value::as_i64),
        job_execution_ids: value
            .get("jobExecutionIds")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
            .unwrap_or_default(),
        status: str_field(value, "taskExecutionStatus")
            .map(ExecutionStatus::from_platform)
            .unwrap_or(ExecutionStatus::Unknown),
    })
}

fn parse_schedule(value: &Value) -> Option<ScheduleInfo> {
    let properties = value
        .get("scheduleProperties")
        .and_then(Value::as_object)
        .map(|props| {
            props
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default();

    Some(ScheduleInfo {
        schedule_name: str_field(value, "scheduleName")?.to_string(),
        task_name: str_field(value, "taskDefinitionName")?.to_string(),
        properties,
    })
}

/// Server timestamps come with or without an offset.
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
