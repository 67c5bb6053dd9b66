// src/composed/parser.rs

//! Recursive-descent parser producing the definition's syntax tree.
//!
//! ```text
//! sequence   := flow ('&&' flow)*
//! flow       := node transition*
//! node       := split | task
//! split      := '<' sequence ('||' sequence)* '>'
//! task       := [label ':'] name option*
//! transition := (STRING | IDENT | '*') '->' target
//! target     := task | '$END' | '$FAIL'
//! ```

use std::collections::HashSet;

use crate::composed::error::DefinitionError;
use crate::composed::lexer::{Spanned, Token, tokenize};

/// Terminal transition targets.
pub const END_TARGET: &str = "$END";
pub const FAIL_TARGET: &str = "$FAIL";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    pub flows: Vec<Flow>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flow {
    pub node: Node,
    pub transitions: Vec<Transition>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Task(TaskRef),
    Split(Vec<Sequence>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRef {
    pub label: String,
    pub name: String,
    pub options: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOn {
    Status(String),
    Wildcard,
}

impl TransitionOn {
    pub fn describe(&self) -> &str {
        match self {
            TransitionOn::Status(s) => s,
            TransitionOn::Wildcard => "*",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Task(TaskRef),
    End,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub on: TransitionOn,
    pub target: Target,
}

/// Parse a definition into its syntax tree, enforcing label uniqueness and
/// transition ordering rules.
pub fn parse_definition(input: &str) -> Result<Sequence, DefinitionError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(DefinitionError::EmptyDefinition);
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        labels: HashSet::new(),
    };
    let sequence = parser.sequence()?;

    if let Some(extra) = parser.peek() {
        return Err(DefinitionError::UnexpectedToken {
            found: extra.token.to_string(),
            expected: "'&&' or end of definition".to_string(),
            pos: extra.pos,
        });
    }
    Ok(sequence)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    labels: HashSet<String>,
}

impl Parser {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn peek_token(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|s| &s.token)
    }

    fn next(&mut self, expected: &str) -> Result<Spanned, DefinitionError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| DefinitionError::UnexpectedEnd {
                expected: expected.to_string(),
            })?;
        self.pos += 1;
        Ok(token)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek_token(0) == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn sequence(&mut self) -> Result<Sequence, DefinitionError> {
        let mut flows = vec![self.flow()?];
        while self.eat(&Token::And) {
            flows.push(self.flow()?);
        }
        Ok(Sequence { flows })
    }

    fn flow(&mut self) -> Result<Flow, DefinitionError> {
        let node = self.node()?;

        let mut transitions: Vec<Transition> = Vec::new();
        while let Some(on) = self.transition_start() {
            let on_pos = self.peek().map(|s| s.pos).unwrap_or_default();
            let label = match &node {
                Node::Task(task) => task.label.clone(),
                Node::Split(_) => return Err(DefinitionError::TransitionOnSplit { pos: on_pos }),
            };

            if transitions.iter().any(|t| t.on == TransitionOn::Wildcard) {
                return Err(DefinitionError::TransitionAfterWildcard {
                    label,
                    status: on.describe().to_string(),
                });
            }
            if let TransitionOn::Status(status) = &on {
                let duplicate = transitions.iter().any(|t| match &t.on {
                    TransitionOn::Status(s) => s.eq_ignore_ascii_case(status),
                    TransitionOn::Wildcard => false,
                });
                if duplicate {
                    return Err(DefinitionError::DuplicateTransition {
                        label,
                        status: status.clone(),
                    });
                }
            }

            // status token + arrow
            self.pos += 2;
            let target = self.target()?;
            transitions.push(Transition { on, target });
        }

        Ok(Flow { node, transitions })
    }

    /// If the next two tokens open a transition, return its condition
    /// without consuming anything.
    fn transition_start(&self) -> Option<TransitionOn> {
        if self.peek_token(1) != Some(&Token::Arrow) {
            return None;
        }
        match self.peek_token(0)? {
            // `'*'` is as much a wildcard as a bare `*`.
            Token::Str(s) if s == "*" => Some(TransitionOn::Wildcard),
            Token::Str(s) | Token::Ident(s) => Some(TransitionOn::Status(s.clone())),
            Token::Wildcard => Some(TransitionOn::Wildcard),
            _ => None,
        }
    }

    fn node(&mut self) -> Result<Node, DefinitionError> {
        match self.peek_token(0) {
            Some(Token::SplitOpen) => self.split(),
            _ => Ok(Node::Task(self.task()?)),
        }
    }

    fn split(&mut self) -> Result<Node, DefinitionError> {
        let open = self.next("'<'")?;
        let mut branches = vec![self.sequence()?];
        loop {
            match self.peek_token(0) {
                Some(Token::Or) => {
                    self.pos += 1;
                    branches.push(self.sequence()?);
                }
                Some(Token::SplitClose) => {
                    self.pos += 1;
                    return Ok(Node::Split(branches));
                }
                Some(_) => {
                    let found = self.next("'||' or '>'")?;
                    return Err(DefinitionError::UnexpectedToken {
                        found: found.token.to_string(),
                        expected: "'||', '&&' or '>'".to_string(),
                        pos: found.pos,
                    });
                }
                None => return Err(DefinitionError::UnbalancedSplit { pos: open.pos }),
            }
        }
    }

    fn task(&mut self) -> Result<TaskRef, DefinitionError> {
        let first = self.next("a task name")?;
        let first_name = match &first.token {
            Token::Ident(name) => name.clone(),
            _ => return Err(unexpected(&first, "a task name or '<'")),
        };

        let (label, name) = if self.eat(&Token::Colon) {
            let name_token = self.next("a task name after ':'")?;
            match &name_token.token {
                Token::Ident(name) => (first_name, name.clone()),
                _ => return Err(unexpected(&name_token, "a task name after ':'")),
            }
        } else {
            (first_name.clone(), first_name)
        };

        if !self.labels.insert(label.clone()) {
            return Err(DefinitionError::DuplicateLabel { label });
        }

        let mut options = Vec::new();
        while let Some(Token::Option { key, value }) = self.peek_token(0) {
            options.push((key.clone(), value.clone()));
            self.pos += 1;
        }

        Ok(TaskRef {
            label,
            name,
            options,
        })
    }

    fn target(&mut self) -> Result<Target, DefinitionError> {
        match self.peek_token(0) {
            Some(Token::Ident(s)) if s == END_TARGET => {
                self.pos += 1;
                Ok(Target::End)
            }
            Some(Token::Ident(s)) if s == FAIL_TARGET => {
                self.pos += 1;
                Ok(Target::Fail)
            }
            _ => Ok(Target::Task(self.task()?)),
        }
    }
}

fn unexpected(found: &Spanned, expected: &str) -> DefinitionError {
    DefinitionError::UnexpectedToken {
        found: found.token.to_string(),
        expected: expected.to_string(),
        pos: found.pos,
    }
}
