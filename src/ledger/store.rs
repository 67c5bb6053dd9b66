// src/ledger/store.rs

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use crate::errors::{Result, VerifyError};
use crate::ledger::execution::Execution;

/// Per-scenario read model of task executions.
///
/// Executions are appended in the order they are first recorded. Recording
/// an id again updates it in place, but only to fill in what was unknown.
#[derive(Debug, Default, Clone)]
pub struct ExecutionLedger {
    executions: Vec<Execution>,
    by_id: HashMap<i64, usize>,
}

impl ExecutionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new execution or progress on a known one.
    ///
    /// Rejected:
    /// - an end time without an exit code;
    /// - a parent that has not been recorded yet (or is the execution
    ///   itself);
    /// - changing the label or parent of a known execution;
    /// - clearing the end time of a known execution;
    /// - changing a known exit code or end time. Re-recording only fills in
    ///   what was unknown.
    pub fn record(&mut self, execution: Execution) -> Result<()> {
        let reject = |reason: String| {
            warn!(id = execution.id, %reason, "ledger rejected execution");
            Err(VerifyError::Ledger {
                id: execution.id,
                reason,
            })
        };

        if execution.end_time.is_some() && execution.exit_code.is_none() {
            return reject("has an end time but no exit code".to_string());
        }

        if let Some(parent) = execution.parent_id {
            if parent == execution.id || !self.by_id.contains_key(&parent) {
                return reject(format!("parent execution {parent} is not recorded"));
            }
        }

        let Some(&slot) = self.by_id.get(&execution.id) else {
            debug!(
                id = execution.id,
                label = %execution.label,
                parent = ?execution.parent_id,
                "recording execution"
            );
            self.by_id.insert(execution.id, self.executions.len());
            self.executions.push(execution);
            return Ok(());
        };

        let known = &self.executions[slot];
        if known.label != execution.label {
            return reject(format!(
                "label changed from '{}' to '{}'",
                known.label, execution.label
            ));
        }
        if known.parent_id != execution.parent_id {
            return reject(format!(
                "parent changed from {:?} to {:?}",
                known.parent_id, execution.parent_id
            ));
        }
        if known.end_time.is_some() && execution.end_time.is_none() {
            return reject("end time cannot be cleared".to_string());
        }
        match (known.exit_code, execution.exit_code) {
            (Some(was), Some(now)) if was != now => {
                return reject(format!("exit code changed from {was} to {now}"));
            }
            _ => {}
        }
        match (known.end_time, execution.end_time) {
            (Some(was), Some(now)) if was != now => {
                return reject(format!("end time changed from {was} to {now}"));
            }
            _ => {}
        }

        let known = &mut self.executions[slot];
        if execution.exit_code.is_some() {
            known.exit_code = execution.exit_code;
        }
        if execution.end_time.is_some() {
            known.end_time = execution.end_time;
        }
        for job in execution.job_execution_ids {
            if !known.job_execution_ids.contains(&job) {
                known.job_execution_ids.push(job);
            }
        }
        known.status = execution.status;
        debug!(
            id = known.id,
            exit_code = ?known.exit_code,
            finished = known.is_finished(),
            "execution updated"
        );
        Ok(())
    }

    pub fn get(&self, id: i64) -> Option<&Execution> {
        self.by_id.get(&id).map(|&slot| &self.executions[slot])
    }

    /// Executions recorded under `label`, oldest first.
    pub fn by_label(&self, label: &str) -> Vec<&Execution> {
        self.executions.iter().filter(|e| e.label == label).collect()
    }

    /// Direct children of `parent_id`, oldest first.
    pub fn by_parent(&self, parent_id: i64) -> Vec<&Execution> {
        self.executions
            .iter()
            .filter(|e| e.parent_id == Some(parent_id))
            .collect()
    }

    /// At least `expected` executions for `label`, all of them finished.
    pub fn is_complete(&self, label: &str, expected: usize) -> bool {
        let executions = self.by_label(label);
        executions.len() >= expected && executions.iter().all(|e| e.is_finished())
    }

    /// Exit codes of the finished children of `parent_id`, keyed by graph
    /// label.
    ///
    /// Composed-task children are named `<definition>-<label>`; the prefix is
    /// stripped when present.
    pub fn child_exit_codes(&self, parent_id: i64, definition_name: &str) -> BTreeMap<String, i32> {
        let prefix = format!("{definition_name}-");
        self.by_parent(parent_id)
            .into_iter()
            .filter_map(|e| {
                let code = e.exit_code?;
                let label = e.label.strip_prefix(&prefix).unwrap_or(&e.label);
                Some((label.to_string(), code))
            })
            .collect()
    }

    /// Number of batch job executions reported for `label`.
    pub fn job_count(&self, label: &str) -> usize {
        self.by_label(label)
            .iter()
            .map(|e| e.job_execution_ids.len())
            .sum()
    }

    pub fn len(&self) -> usize {
        self.executions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Execution> {
        self.executions.iter()
    }

    /// Drop every record; called between scenarios.
    pub fn purge(&mut self) {
        debug!(executions = self.executions.len(), "purging execution ledger");
        self.executions.clear();
        self.by_id.clear();
    }
}
