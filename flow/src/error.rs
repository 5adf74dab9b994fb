// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Errors module
//!

use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::fmt;

/// Error type for the flow runtime.
#[derive(Clone, Debug, Error, PartialEq, Serialize, Deserialize)]
pub enum Error {
    /// Topology or option error detected while building a flow.
    #[error("Configuration error: {0}")]
    Config(String),
    /// One or more problems found by a validation pass.
    #[error("{}", format_problems(.0))]
    Validation(Vec<Problem>),
    /// The mailbox stayed full for the whole request timeout.
    #[error("Task {0} is busy, try again later.")]
    Busy(String),
    /// The task is draining and does not accept new requests.
    #[error("Task {0} is blocked, try again later.")]
    Blocked(String),
    /// No link (or no resolved target) for the label.
    #[error("No destination found for '{0}'.")]
    NoLink(String),
    /// Attempt to modify a frozen value.
    #[error("Frozen: {0}")]
    Frozen(String),
    /// Trackers with different ids can not be merged.
    #[error("Can not merge {1} into {0}. Different IDs.")]
    TrackerMismatch(String, String),
    /// Named item could not be found.
    #[error("{0} not found.")]
    NotFound(String),
    /// Failure raised by a behavior while performing.
    #[error("{0}")]
    Perform(String),
    /// A behavior panicked while performing.
    #[error("Panic: {0}")]
    Panic(String),
    /// The environment was already shut down.
    #[error("Environment {0} is closed.")]
    Closed(String),
}

/// Category of a validation problem.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProblemKind {
    /// Link target could not be found.
    Link,
    /// Target does not accept the link operation.
    Input,
    /// A declared output has no link.
    Missing,
}

impl fmt::Display for ProblemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProblemKind::Link => write!(f, "link_error"),
            ProblemKind::Input => write!(f, "input_link_error"),
            ProblemKind::Missing => write!(f, "missing_link_error"),
        }
    }
}

/// A single validation problem.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    /// Full name of the task or flow owning the faulty declaration.
    pub task_name: String,
    /// Problem category.
    pub kind: ProblemKind,
    /// Human readable description.
    pub message: String,
}

impl Problem {
    pub fn new(
        task_name: impl Into<String>,
        kind: ProblemKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            task_name: task_name.into(),
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.task_name, self.message)
    }
}

fn format_problems(problems: &[Problem]) -> String {
    let mut lines = vec![format!("{} validation errors.", problems.len())];
    lines.extend(problems.iter().map(|p| p.to_string()));
    lines.join("\n  ")
}
