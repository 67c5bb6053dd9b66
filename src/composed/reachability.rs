// src/composed/reachability.rs

//! Which leaves of a composed task are expected to run, given the exit
//! statuses of the leaves that did.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use petgraph::graph::NodeIndex;
use tracing::trace;

use crate::composed::graph::{ComposedTaskGraph, EdgeKind, NodeKind};

/// Exit status of a successful leaf.
pub const COMPLETED: &str = "COMPLETED";
/// Exit status of a failed leaf.
pub const FAILED: &str = "FAILED";

/// Map an exit code to the exit status transitions match on.
pub fn exit_status(exit_code: i32) -> &'static str {
    if exit_code == 0 { COMPLETED } else { FAILED }
}

/// Result of a reachability walk.
///
/// `ran` and `skipped` partition the graph's leaf labels.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExpectedOutcomes {
    pub ran: BTreeSet<String>,
    pub skipped: BTreeSet<String>,
    /// Whether the composed task as a whole is expected to fail.
    pub failed: bool,
}

enum Step {
    Enter(NodeIndex),
    /// One branch (or the top-level flow) concluded at `exit`.
    Arrive { exit: NodeIndex, ok: bool },
}

impl ComposedTaskGraph {
    /// Walk the graph using exit codes. Labels without a reported code are
    /// assumed to complete.
    pub fn expected_outcomes(&self, actual: &BTreeMap<String, i32>) -> ExpectedOutcomes {
        let statuses: HashMap<&str, &str> = actual
            .iter()
            .map(|(label, code)| (label.as_str(), exit_status(*code)))
            .collect();
        self.walk(&statuses)
    }

    /// Walk the graph using explicit exit statuses (`COMPLETED`, `FAILED` or
    /// a custom status a transition names).
    pub fn expected_outcomes_with_status(
        &self,
        actual: &BTreeMap<String, String>,
    ) -> ExpectedOutcomes {
        let statuses: HashMap<&str, &str> = actual
            .iter()
            .map(|(label, status)| (label.as_str(), status.as_str()))
            .collect();
        self.walk(&statuses)
    }

    fn walk(&self, statuses: &HashMap<&str, &str>) -> ExpectedOutcomes {
        let mut ran = BTreeSet::new();
        let mut failed = false;
        let mut arrivals: HashMap<NodeIndex, (usize, bool)> = HashMap::new();
        let mut work = VecDeque::from([Step::Enter(self.start())]);

        while let Some(step) = work.pop_front() {
            match step {
                Step::Enter(idx) => {
                    let node = self.node(idx);
                    match &node.kind {
                        NodeKind::Start => {
                            for (next, _) in self.outgoing(idx) {
                                work.push_back(self.follow(next));
                            }
                        }
                        NodeKind::Leaf { label, .. } => {
                            ran.insert(label.clone());
                            let status = statuses.get(label.as_str()).copied().unwrap_or(COMPLETED);
                            trace!(%label, status, "leaf concluded");
                            work.push_back(self.after_leaf(idx, status));
                        }
                        NodeKind::Split => {
                            for (next, edge) in self.outgoing(idx) {
                                if edge.kind == EdgeKind::Parallel {
                                    work.push_back(self.follow(next));
                                }
                            }
                        }
                        NodeKind::Terminal { fail } => {
                            work.push_back(Step::Arrive {
                                exit: node.exit.unwrap_or(self.end()),
                                ok: !fail,
                            });
                        }
                        // Joins and the end are only reached through arrivals.
                        NodeKind::Join { .. } | NodeKind::End => {
                            work.push_back(Step::Arrive { exit: idx, ok: true });
                        }
                    }
                }
                Step::Arrive { exit, ok } => {
                    let node = self.node(exit);
                    let NodeKind::Join { branches } = node.kind else {
                        // Top level concluded.
                        failed = !ok;
                        break;
                    };
                    let entry = arrivals.entry(exit).or_insert((0, false));
                    entry.0 += 1;
                    entry.1 |= !ok;
                    if entry.0 < branches {
                        continue;
                    }
                    if entry.1 {
                        work.push_back(Step::Arrive {
                            exit: node.exit.unwrap_or(self.end()),
                            ok: false,
                        });
                    } else if let Some(next) = self.sequential_successor(exit) {
                        work.push_back(self.follow(next));
                    }
                }
            }
        }

        let skipped = self
            .labels()
            .iter()
            .filter(|label| !ran.contains(*label))
            .cloned()
            .collect();

        ExpectedOutcomes {
            ran,
            skipped,
            failed,
        }
    }

    /// Choose what happens after a leaf concluded with `status`.
    ///
    /// Specific transitions are tried in declaration order, then the
    /// wildcard. A matching transition suppresses the sequential successor.
    fn after_leaf(&self, idx: NodeIndex, status: &str) -> Step {
        let outgoing = self.outgoing(idx);

        let matched = outgoing
            .iter()
            .find(|(_, edge)| {
                matches!(&edge.kind, EdgeKind::Transition(on) if on.eq_ignore_ascii_case(status))
            })
            .or_else(|| {
                outgoing
                    .iter()
                    .find(|(_, edge)| edge.kind == EdgeKind::WildcardTransition)
            });
        if let Some((target, _)) = matched {
            return Step::Enter(*target);
        }

        if status.eq_ignore_ascii_case(FAILED) {
            return Step::Arrive {
                exit: self.node(idx).exit.unwrap_or(self.end()),
                ok: false,
            };
        }

        match self.sequential_successor(idx) {
            Some(next) => self.follow(next),
            None => Step::Arrive {
                exit: self.node(idx).exit.unwrap_or(self.end()),
                ok: true,
            },
        }
    }

    fn sequential_successor(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.outgoing(idx)
            .into_iter()
            .find(|(_, edge)| edge.kind == EdgeKind::Sequential)
            .map(|(next, _)| next)
    }

    /// Following an edge into a join or the end is a successful arrival.
    fn follow(&self, next: NodeIndex) -> Step {
        match self.node(next).kind {
            NodeKind::Join { .. } | NodeKind::End => Step::Arrive { exit: next, ok: true },
            _ => Step::Enter(next),
        }
    }
}
