// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Behavior
//!
//! The `behavior` module provides the `Behavior` trait, the unit of work
//! hosted by a [`Task`]. The task owns the mailbox, the state machine and the
//! links; the behavior only decides what to do with each request.
//!

use crate::{Envelope, Error, Task};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use std::fmt;

/// Work hosted by a task.
///
/// Only [`Behavior::perform`] is required. A behavior that forwards every
/// request somewhere else is a single method:
///
/// ```ignore
/// use flow::{Behavior, Envelope, Error, Task};
/// use async_trait::async_trait;
///
/// struct Forward;
///
/// #[async_trait]
/// impl Behavior for Forward {
///     async fn perform(
///         &mut self,
///         task: &Task,
///         op: Option<&str>,
///         envelope: Envelope,
///     ) -> Result<(), Error> {
///         task.ship(op, envelope).await
///     }
/// }
/// ```
#[async_trait]
pub trait Behavior: Send + Sync + 'static {
    /// Called once, before the worker starts. The task is in the
    /// `Starting` state, so anything received here is only queued.
    async fn pre_start(&mut self, _task: &Task) -> Result<(), Error> {
        Ok(())
    }

    /// Handles one request. Returned errors are routed to the error handler
    /// of the task.
    async fn perform(
        &mut self,
        task: &Task,
        op: Option<&str>,
        envelope: Envelope,
    ) -> Result<(), Error>;

    /// Accepted operations, `None` accepts everything.
    fn inputs(&self) -> Option<Vec<Spec>> {
        None
    }

    /// Labels this behavior ships to. Each one must be linked.
    fn outputs(&self) -> Option<Vec<Spec>> {
        None
    }

    /// Whether the task gets its own worker. Behaviors that return `false`
    /// run on the caller of `receive`.
    fn with_own_worker(&self) -> bool {
        true
    }

    /// Settings shown by `describe`.
    fn options(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    fn set_option(&mut self, key: &str, _value: &str) -> Result<(), Error> {
        Err(Error::Config(format!("Unknown option '{}'.", key)))
    }

    /// Reports pending work the task can not see, such as buffered input.
    fn busy(&self) -> bool {
        false
    }
}

/// Declared input or output of a behavior. A `None` operation matches
/// any operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spec {
    pub op: Option<String>,
    pub type_hint: String,
}

impl Spec {
    pub fn new(op: Option<&str>, type_hint: impl Into<String>) -> Self {
        Self {
            op: op.map(str::to_owned),
            type_hint: type_hint.into(),
        }
    }

    /// Link label an output spec is shipped to.
    pub fn dest(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Whether this spec accepts `op`.
    pub fn accepts(&self, op: Option<&str>) -> bool {
        self.op.is_none() || self.op.as_deref() == op
    }
}

impl fmt::Display for Spec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Spec{{op: {}, type: {}}}",
            self.op.as_deref().unwrap_or("*"),
            self.type_hint
        )
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_spec_accepts() {
        let any = Spec::new(None, "Value");
        assert!(any.accepts(Some("go")));
        assert!(any.accepts(None));
        let go = Spec::new(Some("go"), "Value");
        assert!(go.accepts(Some("go")));
        assert!(!go.accepts(Some("stop")));
        assert!(!go.accepts(None));
        assert_eq!(go.dest(), Some("go"));
        assert_eq!(go.to_string(), "Spec{op: go, type: Value}");
    }
}
