// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Links
//!
//! A `Link` is a statically declared route from a task (or a flow) to a named
//! destination and operation. Links are declared by name and resolved later,
//! once the whole topology exists. The resolved destination is cached as a
//! weak reference so links never keep their targets alive.
//!

use crate::{
    Envelope, Error, Flow, Task,
    flow::FlowInner,
    task::TaskInner,
};

use futures::{FutureExt, future::BoxFuture};

use std::{
    fmt,
    sync::{OnceLock, Weak},
};

/// Name reserved for the egress of the containing flow.
pub const FLOW_EGRESS: &str = "flow";

/// Declared route to a destination.
pub struct Link {
    target_name: String,
    flow_name: Option<String>,
    op: Option<String>,
    target: OnceLock<WeakTarget>,
}

impl Link {
    pub(crate) fn new(target_name: &str, op: Option<&str>, flow_name: Option<&str>) -> Self {
        Self {
            target_name: target_name.to_owned(),
            flow_name: flow_name.map(str::to_owned),
            op: op.map(str::to_owned),
            target: OnceLock::new(),
        }
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    /// Flow the target is looked up in, when it is not the local one.
    pub fn flow_name(&self) -> Option<&str> {
        self.flow_name.as_deref()
    }

    /// Operation requested on the target.
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// The resolved target, `None` until resolved or once the target is gone.
    pub fn target(&self) -> Option<Target> {
        self.target.get().and_then(WeakTarget::upgrade)
    }

    pub fn is_resolved(&self) -> bool {
        self.target.get().is_some()
    }

    /// Caches `target`. The first resolution wins.
    pub(crate) fn set_target(&self, target: &Target) {
        let _ = self.target.set(target.downgrade());
    }

    /// `flow:target:op` as shown by `describe`.
    pub fn destination(&self) -> String {
        format!(
            "{}:{}:{}",
            self.flow_name.as_deref().unwrap_or(""),
            self.target_name,
            self.op.as_deref().unwrap_or("")
        )
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link")
            .field("target_name", &self.target_name)
            .field("flow_name", &self.flow_name)
            .field("op", &self.op)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

/// Resolved destination of a link.
#[derive(Clone)]
pub enum Target {
    /// A task; delivery is `Task::receive`.
    Task(Task),
    /// A flow entered through its routes; delivery is `Flow::receive`.
    Flow(Flow),
    /// The egress of a flow; delivery ships through the flow link named
    /// after the operation.
    Egress(Flow),
}

impl Target {
    pub fn full_name(&self) -> String {
        match self {
            Target::Task(task) => task.full_name().to_string(),
            Target::Flow(flow) => flow.full_name().to_string(),
            Target::Egress(flow) => format!("{}:{}", flow.full_name(), FLOW_EGRESS),
        }
    }

    /// Whether the target accepts `op`.
    pub fn has_input(&self, op: Option<&str>) -> bool {
        match self {
            Target::Task(task) => task.has_input(op),
            Target::Flow(flow) => flow.has_input(op),
            Target::Egress(flow) => flow.has_output(op),
        }
    }

    /// Load score used to pick the least loaded target.
    pub fn backed_up(&self) -> usize {
        match self {
            Target::Task(task) => task.backed_up(),
            Target::Flow(flow) => flow.backed_up(),
            Target::Egress(_) => 0,
        }
    }

    /// Hands `envelope` to the target.
    pub fn deliver<'a>(
        &'a self,
        op: Option<&'a str>,
        envelope: Envelope,
    ) -> BoxFuture<'a, Result<(), Error>> {
        async move {
            match self {
                Target::Task(task) => task.receive(op, envelope).await,
                Target::Flow(flow) => flow.receive(op, envelope).await,
                Target::Egress(flow) => flow.ship(op, envelope).await,
            }
        }
        .boxed()
    }

    fn downgrade(&self) -> WeakTarget {
        match self {
            Target::Task(task) => WeakTarget::Task(task.downgrade()),
            Target::Flow(flow) => WeakTarget::Flow(flow.downgrade()),
            Target::Egress(flow) => WeakTarget::Egress(flow.downgrade()),
        }
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Task(_) => write!(f, "Target::Task({})", self.full_name()),
            Target::Flow(_) => write!(f, "Target::Flow({})", self.full_name()),
            Target::Egress(_) => write!(f, "Target::Egress({})", self.full_name()),
        }
    }
}

enum WeakTarget {
    Task(Weak<TaskInner>),
    Flow(Weak<FlowInner>),
    Egress(Weak<FlowInner>),
}

impl WeakTarget {
    fn upgrade(&self) -> Option<Target> {
        match self {
            WeakTarget::Task(task) => task.upgrade().map(|inner| Target::Task(Task::from_inner(inner))),
            WeakTarget::Flow(flow) => flow.upgrade().map(|inner| Target::Flow(Flow::from_inner(inner))),
            WeakTarget::Egress(flow) => {
                flow.upgrade().map(|inner| Target::Egress(Flow::from_inner(inner)))
            }
        }
    }
}

/// Label as shown to users; the wildcard label is `*`.
pub(crate) fn label_text(label: Option<&str>) -> String {
    label.unwrap_or("*").to_owned()
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_declared_fields() {
        let link = Link::new("b", Some("go"), None);
        assert_eq!(link.target_name(), "b");
        assert_eq!(link.op(), Some("go"));
        assert_eq!(link.flow_name(), None);
        assert!(!link.is_resolved());
        assert!(link.target().is_none());
        assert_eq!(link.destination(), ":b:go");

        let remote = Link::new("b", None, Some("other"));
        assert_eq!(remote.destination(), "other:b:");
    }

    #[test]
    fn test_label_text() {
        assert_eq!(label_text(None), "*");
        assert_eq!(label_text(Some("out")), "out");
    }
}
