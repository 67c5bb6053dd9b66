// src/poll/predicate.rs

//! Await predicates.
//!
//! An [`AwaitPredicate`] pairs one success condition with any number of
//! fail-fast conditions. Each tick both are evaluated against the same
//! snapshot, fail-fast first.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

type CheckFn<S> = Arc<dyn Fn(&S) -> bool + Send + Sync>;

/// A named boolean condition over a snapshot of type `S`.
pub struct AwaitCondition<S> {
    name: String,
    check: CheckFn<S>,
}

impl<S> Clone for AwaitCondition<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            check: Arc::clone(&self.check),
        }
    }
}

impl<S> fmt::Debug for AwaitCondition<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwaitCondition")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<S: 'static> AwaitCondition<S> {
    pub fn new<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&S) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn evaluate(&self, snapshot: &S) -> bool {
        (self.check)(snapshot)
    }

    pub fn and(self, other: AwaitCondition<S>) -> Self {
        let name = format!("({} and {})", self.name, other.name);
        let (a, b) = (self.check, other.check);
        Self::new(name, move |s| a(s) && b(s))
    }

    pub fn or(self, other: AwaitCondition<S>) -> Self {
        let name = format!("({} or {})", self.name, other.name);
        let (a, b) = (self.check, other.check);
        Self::new(name, move |s| a(s) || b(s))
    }

    pub fn negate(self) -> Self {
        let name = format!("not {}", self.name);
        let a = self.check;
        Self::new(name, move |s| !a(s))
    }
}

/// Snapshots that carry a status string.
pub trait StatusSnapshot {
    fn status(&self) -> &str;
}

/// Snapshots that carry log text.
pub trait LogSnapshot {
    fn log_text(&self) -> &str;
}

/// Snapshots that carry a count (executions, instances, ...).
pub trait CountSnapshot {
    fn count(&self) -> usize;
}

impl StatusSnapshot for String {
    fn status(&self) -> &str {
        self
    }
}

impl LogSnapshot for String {
    fn log_text(&self) -> &str {
        self
    }
}

impl CountSnapshot for usize {
    fn count(&self) -> usize {
        *self
    }
}

impl<T> CountSnapshot for Vec<T> {
    fn count(&self) -> usize {
        self.len()
    }
}

/// Status equals `expected` (ASCII case-insensitive).
pub fn status_is<S>(expected: impl Into<String>) -> AwaitCondition<S>
where
    S: StatusSnapshot + 'static,
{
    let expected = expected.into();
    AwaitCondition::new(format!("status is '{expected}'"), move |s: &S| {
        s.status().eq_ignore_ascii_case(&expected)
    })
}

/// Status is one of `allowed` (ASCII case-insensitive).
pub fn status_in<S, I, T>(allowed: I) -> AwaitCondition<S>
where
    S: StatusSnapshot + 'static,
    I: IntoIterator<Item = T>,
    T: Into<String>,
{
    let allowed: HashSet<String> = allowed
        .into_iter()
        .map(|s| s.into().to_ascii_lowercase())
        .collect();
    let mut listed: Vec<&String> = allowed.iter().collect();
    listed.sort();
    let name = format!("status in {listed:?}");
    AwaitCondition::new(name, move |s: &S| {
        allowed.contains(&s.status().to_ascii_lowercase())
    })
}

/// Log text contains `needle`.
pub fn log_contains<S>(needle: impl Into<String>) -> AwaitCondition<S>
where
    S: LogSnapshot + 'static,
{
    let needle = needle.into();
    AwaitCondition::new(format!("log contains '{needle}'"), move |s: &S| {
        s.log_text().contains(&needle)
    })
}

/// Count is at least `n`.
pub fn count_at_least<S>(n: usize) -> AwaitCondition<S>
where
    S: CountSnapshot + 'static,
{
    AwaitCondition::new(format!("count >= {n}"), move |s: &S| s.count() >= n)
}

/// Result of evaluating an [`AwaitPredicate`] against one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// A fail-fast condition fired; carries its name.
    FailFast(String),
    Satisfied,
    Pending,
}

/// Success condition plus fail-fast conditions.
pub struct AwaitPredicate<S> {
    until: AwaitCondition<S>,
    fail_fast: Vec<AwaitCondition<S>>,
}

impl<S> Clone for AwaitPredicate<S> {
    fn clone(&self) -> Self {
        Self {
            until: self.until.clone(),
            fail_fast: self.fail_fast.clone(),
        }
    }
}

impl<S> fmt::Debug for AwaitPredicate<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwaitPredicate")
            .field("until", &self.until.name)
            .field(
                "fail_fast",
                &self.fail_fast.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl<S: 'static> AwaitPredicate<S> {
    pub fn until(condition: AwaitCondition<S>) -> Self {
        Self {
            until: condition,
            fail_fast: Vec::new(),
        }
    }

    /// Add a fail-fast condition. Conditions are checked in the order added.
    pub fn fail_fast_on(mut self, condition: AwaitCondition<S>) -> Self {
        self.fail_fast.push(condition);
        self
    }

    pub fn success_condition(&self) -> &AwaitCondition<S> {
        &self.until
    }

    pub fn fail_fast_conditions(&self) -> &[AwaitCondition<S>] {
        &self.fail_fast
    }

    /// Fail-fast conditions pre-empt the success condition on the same
    /// snapshot.
    pub fn evaluate(&self, snapshot: &S) -> Verdict {
        if let Some(fired) = self.fail_fast.iter().find(|c| c.evaluate(snapshot)) {
            return Verdict::FailFast(fired.name().to_string());
        }
        if self.until.evaluate(snapshot) {
            Verdict::Satisfied
        } else {
            Verdict::Pending
        }
    }
}
