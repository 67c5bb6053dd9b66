// src/composed/error.rs

use thiserror::Error;

/// Why a composed-task definition was rejected.
///
/// Positions are byte offsets into the definition string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("composed task definition is empty")]
    EmptyDefinition,

    #[error("unexpected character '{ch}' at {pos}")]
    UnexpectedCharacter { ch: char, pos: usize },

    #[error("unterminated quoted string starting at {pos}")]
    UnterminatedString { pos: usize },

    #[error("unexpected {found} at {pos}, expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: String,
        pos: usize,
    },

    #[error("unexpected end of definition, expected {expected}")]
    UnexpectedEnd { expected: String },

    #[error("unbalanced split: '<' at {pos} is never closed")]
    UnbalancedSplit { pos: usize },

    #[error("label '{label}' is used more than once")]
    DuplicateLabel { label: String },

    #[error("transition '{status}' on '{label}' follows the wildcard transition")]
    TransitionAfterWildcard { label: String, status: String },

    #[error("'{label}' declares more than one transition for '{status}'")]
    DuplicateTransition { label: String, status: String },

    #[error("transitions are only allowed on tasks, found one on a split at {pos}")]
    TransitionOnSplit { pos: usize },

    #[error("cycle detected in composed task graph at '{node}'")]
    Cycle { node: String },
}
