// src/scenario/verify.rs

//! Comparing predicted composed-task outcomes with the recorded executions.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;
use tracing::info;

use crate::composed::{ComposedTaskGraph, ExpectedOutcomes};
use crate::ledger::ExecutionLedger;

/// Expected and observed sets for a composed task that did not behave as
/// its graph predicts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "composed task '{definition}' (execution {parent_id}) diverged: \
     expected ran {expected_ran:?}, skipped {expected_skipped:?}; \
     observed ran {actual_ran:?} (missing {missing:?}, unexpected {unexpected:?}); \
     expected failure: {expected_failed}, parent exit code: {parent_exit_code:?}"
)]
pub struct AssertionFailure {
    pub definition: String,
    pub parent_id: i64,
    pub expected_ran: BTreeSet<String>,
    pub expected_skipped: BTreeSet<String>,
    pub actual_ran: BTreeSet<String>,
    /// Expected to run but never recorded.
    pub missing: BTreeSet<String>,
    /// Recorded but expected to be skipped (or not part of the graph).
    pub unexpected: BTreeSet<String>,
    pub expected_failed: bool,
    pub parent_exit_code: Option<i32>,
}

/// A composed task that behaved as predicted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    pub definition: String,
    pub parent_id: i64,
    pub outcomes: ExpectedOutcomes,
    /// Child exit codes keyed by graph label.
    pub exit_codes: BTreeMap<String, i32>,
}

/// Check the children of `parent_id` recorded in `ledger` against `graph`.
///
/// The walk is fed the observed child exit codes; the labels it predicts as
/// ran must be exactly the labels that have an execution. If the parent has
/// finished, its exit code must agree with the predicted overall outcome.
pub fn verify_outcomes(
    graph: &ComposedTaskGraph,
    definition_name: &str,
    parent_id: i64,
    ledger: &ExecutionLedger,
) -> Result<VerificationReport, AssertionFailure> {
    let exit_codes = ledger.child_exit_codes(parent_id, definition_name);
    let prefix = format!("{definition_name}-");
    let actual_ran: BTreeSet<String> = ledger
        .by_parent(parent_id)
        .into_iter()
        .map(|e| e.label.strip_prefix(&prefix).unwrap_or(&e.label).to_string())
        .collect();

    let outcomes = graph.expected_outcomes(&exit_codes);
    let parent_exit_code = ledger
        .get(parent_id)
        .filter(|p| p.is_finished())
        .and_then(|p| p.exit_code);

    let missing: BTreeSet<String> = outcomes.ran.difference(&actual_ran).cloned().collect();
    let unexpected: BTreeSet<String> = actual_ran.difference(&outcomes.ran).cloned().collect();
    let status_mismatch = parent_exit_code.is_some_and(|code| (code != 0) != outcomes.failed);

    if !missing.is_empty() || !unexpected.is_empty() || status_mismatch {
        return Err(AssertionFailure {
            definition: definition_name.to_string(),
            parent_id,
            expected_ran: outcomes.ran,
            expected_skipped: outcomes.skipped,
            actual_ran,
            missing,
            unexpected,
            expected_failed: outcomes.failed,
            parent_exit_code,
        });
    }

    info!(
        definition = definition_name,
        parent_id,
        ran = outcomes.ran.len(),
        skipped = outcomes.skipped.len(),
        "composed task behaved as expected"
    );
    Ok(VerificationReport {
        definition: definition_name.to_string(),
        parent_id,
        outcomes,
        exit_codes,
    })
}
