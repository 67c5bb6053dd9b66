// src/composed/graph.rs

use std::collections::BTreeSet;
use std::fmt;

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use tracing::debug;

use crate::composed::error::DefinitionError;
use crate::composed::parser::{
    Flow, Node, Sequence, Target, TaskRef, Transition, TransitionOn, parse_definition,
};

/// A node of the composed-task DAG.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Start,
    End,
    Leaf {
        label: String,
        task: String,
        options: Vec<(String, String)>,
    },
    Split,
    Join {
        branches: usize,
    },
    /// `$END` (`fail == false`) or `$FAIL`.
    Terminal {
        fail: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    pub kind: NodeKind,
    /// Where the enclosing flow concludes: the join of the enclosing split,
    /// or the end node at top level.
    pub exit: Option<NodeIndex>,
}

/// Edge kinds.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EdgeKind {
    Sequential,
    Parallel,
    Transition(String),
    WildcardTransition,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeKind::Sequential => f.write_str("->"),
            EdgeKind::Parallel => f.write_str("=>"),
            EdgeKind::Transition(status) => write!(f, "-'{status}'->"),
            EdgeKind::WildcardTransition => f.write_str("-*->"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphEdge {
    pub kind: EdgeKind,
    /// Declaration order; petgraph iterates outgoing edges newest first.
    pub order: usize,
}

/// One edge in printable, comparable form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeView {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
}

/// A parsed composed-task definition.
///
/// Built once from its textual form and immutable afterwards.
#[derive(Debug, Clone)]
pub struct ComposedTaskGraph {
    definition: String,
    graph: DiGraph<GraphNode, GraphEdge>,
    start: NodeIndex,
    end: NodeIndex,
    /// Leaf labels in declaration order.
    labels: Vec<String>,
}

impl ComposedTaskGraph {
    /// Parse `definition` into a graph.
    pub fn parse(definition: &str) -> Result<Self, DefinitionError> {
        let ast = parse_definition(definition)?;

        let mut builder = Builder {
            graph: DiGraph::new(),
            order: 0,
            labels: Vec::new(),
        };
        let start = builder.add(NodeKind::Start, None);
        let end = builder.add(NodeKind::End, None);
        builder.sequence(&ast, start, EdgeKind::Sequential, end);

        let graph = Self {
            definition: definition.trim().to_string(),
            graph: builder.graph,
            start,
            end,
            labels: builder.labels,
        };
        graph.topological_labels()?;

        debug!(
            definition = %graph.definition,
            leaves = graph.labels.len(),
            nodes = graph.graph.node_count(),
            edges = graph.graph.edge_count(),
            "parsed composed task definition"
        );
        Ok(graph)
    }

    pub fn definition(&self) -> &str {
        &self.definition
    }

    /// Leaf labels in declaration order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn label_set(&self) -> BTreeSet<String> {
        self.labels.iter().cloned().collect()
    }

    /// Task name and options of a leaf.
    pub fn leaf(&self, label: &str) -> Option<(&str, &[(String, String)])> {
        self.graph.node_weights().find_map(|n| match &n.kind {
            NodeKind::Leaf {
                label: l,
                task,
                options,
            } if l == label => Some((task.as_str(), options.as_slice())),
            _ => None,
        })
    }

    /// All edges with endpoints named for comparison and display.
    ///
    /// Two graphs parsed from the same definition yield identical lists.
    pub fn edges(&self) -> Vec<EdgeView> {
        let mut edges: Vec<(usize, EdgeView)> = self
            .graph
            .edge_references()
            .map(|e| {
                (
                    e.weight().order,
                    EdgeView {
                        from: self.node_name(e.source()),
                        to: self.node_name(e.target()),
                        kind: e.weight().kind.clone(),
                    },
                )
            })
            .collect();
        edges.sort_by_key(|(order, _)| *order);
        edges.into_iter().map(|(_, e)| e).collect()
    }

    /// Leaf labels in a topological order of the DAG.
    pub fn topological_labels(&self) -> Result<Vec<String>, DefinitionError> {
        let order = toposort(&self.graph, None).map_err(|cycle| DefinitionError::Cycle {
            node: self.node_name(cycle.node_id()),
        })?;
        Ok(order
            .into_iter()
            .filter_map(|idx| match &self.graph[idx].kind {
                NodeKind::Leaf { label, .. } => Some(label.clone()),
                _ => None,
            })
            .collect())
    }

    pub(crate) fn start(&self) -> NodeIndex {
        self.start
    }

    pub(crate) fn end(&self) -> NodeIndex {
        self.end
    }

    pub(crate) fn node(&self, idx: NodeIndex) -> &GraphNode {
        &self.graph[idx]
    }

    /// Outgoing edges of `idx` in declaration order.
    pub(crate) fn outgoing(&self, idx: NodeIndex) -> Vec<(NodeIndex, &GraphEdge)> {
        let mut out: Vec<(NodeIndex, &GraphEdge)> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| (e.target(), e.weight()))
            .collect();
        out.sort_by_key(|(_, edge)| edge.order);
        out
    }

    fn node_name(&self, idx: NodeIndex) -> String {
        match &self.graph[idx].kind {
            NodeKind::Start => "START".to_string(),
            NodeKind::End => "END".to_string(),
            NodeKind::Leaf { label, .. } => label.clone(),
            NodeKind::Split => format!("split#{}", idx.index()),
            NodeKind::Join { .. } => format!("join#{}", idx.index()),
            NodeKind::Terminal { fail: false } => format!("$END#{}", idx.index()),
            NodeKind::Terminal { fail: true } => format!("$FAIL#{}", idx.index()),
        }
    }
}

impl fmt::Display for ComposedTaskGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.definition)?;
        for edge in self.edges() {
            writeln!(f, "  {} {} {}", edge.from, edge.kind, edge.to)?;
        }
        Ok(())
    }
}

struct Builder {
    graph: DiGraph<GraphNode, GraphEdge>,
    order: usize,
    labels: Vec<String>,
}

impl Builder {
    fn add(&mut self, kind: NodeKind, exit: Option<NodeIndex>) -> NodeIndex {
        if let NodeKind::Leaf { label, .. } = &kind {
            self.labels.push(label.clone());
        }
        self.graph.add_node(GraphNode { kind, exit })
    }

    fn connect(&mut self, from: NodeIndex, to: NodeIndex, kind: EdgeKind) {
        let order = self.order;
        self.order += 1;
        self.graph.add_edge(from, to, GraphEdge { kind, order });
    }

    fn leaf(&mut self, task: &TaskRef, exit: NodeIndex) -> NodeIndex {
        self.add(
            NodeKind::Leaf {
                label: task.label.clone(),
                task: task.name.clone(),
                options: task.options.clone(),
            },
            Some(exit),
        )
    }

    /// Wire `seq` between `from` and `exit`. The first edge has kind
    /// `first`, the rest are sequential.
    fn sequence(&mut self, seq: &Sequence, from: NodeIndex, first: EdgeKind, exit: NodeIndex) {
        let mut prev = from;
        let mut kind = first;
        for flow in &seq.flows {
            let (entry, tail) = self.flow(flow, exit);
            self.connect(prev, entry, kind);
            prev = tail;
            kind = EdgeKind::Sequential;
        }
        self.connect(prev, exit, kind);
    }

    /// Returns the flow's entry node and the node its sequential successor
    /// hangs off.
    fn flow(&mut self, flow: &Flow, exit: NodeIndex) -> (NodeIndex, NodeIndex) {
        match &flow.node {
            Node::Task(task) => {
                let leaf = self.leaf(task, exit);
                for transition in &flow.transitions {
                    self.transition(leaf, transition, exit);
                }
                (leaf, leaf)
            }
            Node::Split(branches) => {
                let split = self.add(NodeKind::Split, Some(exit));
                let join = self.add(
                    NodeKind::Join {
                        branches: branches.len(),
                    },
                    Some(exit),
                );
                for branch in branches {
                    self.sequence(branch, split, EdgeKind::Parallel, join);
                }
                (split, join)
            }
        }
    }

    fn transition(&mut self, source: NodeIndex, transition: &Transition, exit: NodeIndex) {
        let kind = match &transition.on {
            TransitionOn::Status(status) => EdgeKind::Transition(status.clone()),
            TransitionOn::Wildcard => EdgeKind::WildcardTransition,
        };
        let target = match &transition.target {
            Target::Task(task) => {
                let leaf = self.leaf(task, exit);
                self.connect(source, leaf, kind);
                // Once the target concludes the enclosing flow is done.
                self.connect(leaf, exit, EdgeKind::Sequential);
                return;
            }
            Target::End => NodeKind::Terminal { fail: false },
            Target::Fail => NodeKind::Terminal { fail: true },
        };
        let terminal = self.add(target, Some(exit));
        self.connect(source, terminal, kind);
    }
}
