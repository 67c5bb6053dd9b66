// src/composed/mod.rs

//! Composed-task definitions.
//!
//! A definition such as `t1: A && <t2: B || t3: C> && t4: D 'FAILED'->t5: E`
//! is tokenized ([`lexer`]), parsed into a syntax tree ([`parser`]), and
//! lowered into a petgraph DAG ([`graph`]). [`reachability`] walks that DAG
//! with observed exit statuses to predict which leaves ran and which were
//! skipped.

pub mod error;
pub mod graph;
pub mod lexer;
pub mod parser;
pub mod reachability;

pub use error::DefinitionError;
pub use graph::{ComposedTaskGraph, EdgeKind, EdgeView, NodeKind};
pub use reachability::{COMPLETED, ExpectedOutcomes, FAILED, exit_status};
