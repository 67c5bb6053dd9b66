// src/ledger/execution.rs

use chrono::{DateTime, Utc};

use crate::client::{ExecutionStatus, TaskExecution};

/// One task execution as tracked by the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    pub id: i64,
    /// Task name, or the child's graph label for composed-task children.
    pub label: String,
    pub parent_id: Option<i64>,
    pub exit_code: Option<i32>,
    pub end_time: Option<DateTime<Utc>>,
    pub job_execution_ids: Vec<i64>,
    pub status: ExecutionStatus,
}

impl Execution {
    /// A running execution with nothing known yet.
    pub fn new(id: i64, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            parent_id: None,
            exit_code: None,
            end_time: None,
            job_execution_ids: Vec::new(),
            status: ExecutionStatus::Running,
        }
    }

    pub fn with_parent(mut self, parent_id: i64) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Mark finished with `exit_code` at `end_time`.
    pub fn finished(mut self, exit_code: i32, end_time: DateTime<Utc>) -> Self {
        self.exit_code = Some(exit_code);
        self.end_time = Some(end_time);
        self.status = if exit_code == 0 {
            ExecutionStatus::Complete
        } else {
            ExecutionStatus::Error
        };
        self
    }

    pub fn with_jobs(mut self, job_execution_ids: impl IntoIterator<Item = i64>) -> Self {
        self.job_execution_ids.extend(job_execution_ids);
        self
    }

    /// Build from a server-side execution, recording it under `label`.
    pub fn from_task_execution(execution: &TaskExecution, label: impl Into<String>) -> Self {
        Self {
            id: execution.execution_id,
            label: label.into(),
            parent_id: execution.parent_execution_id,
            exit_code: execution.exit_code,
            end_time: execution.end_time,
            job_execution_ids: execution.job_execution_ids.clone(),
            status: execution.status,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.end_time.is_some()
    }
}
