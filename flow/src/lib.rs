// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Tideflow Runtime
//!
//! A runtime for flow based programs. Work is split into named tasks that
//! exchange immutable envelopes over named links. Tasks are grouped into
//! flows, flows nest inside other flows, and every topology hangs from an
//! environment.
//!
//! ## Overview
//!
//! - A [`Task`] wraps a [`Behavior`]. Requests sent to a task wait in its
//!   mailbox and are performed one at a time, either by the worker of the
//!   task or inline by the caller.
//! - An [`Envelope`] carries a [`Value`] payload and, optionally, a
//!   [`Tracker`] recording every place the envelope went through.
//! - A [`Link`] names where a task ships its output: a sibling task, a flow,
//!   or the egress of the enclosing flow.
//! - A [`Flow`] routes what it receives to its children and ships what its
//!   children send to its egress.
//! - The [`Env`] owns the top level flows and the default `error` and `log`
//!   tasks.
//!
//! ## Getting Started
//!
//! ```ignore
//! use flow::{Env, EnvConfig, Envelope, TaskOptions, behaviors::Relay};
//!
//! let env = Env::create(EnvConfig::default()).await?;
//! let sales = env.flow("sales")?;
//! let reader = sales.task("reader", TaskOptions::running(), |_| Ok(Relay)).await?;
//! reader.link(None, "writer", Some("save"), None)?;
//! // ... create `writer` ...
//! env.prepare()?;
//! reader.receive(None, Envelope::new("hello")).await?;
//! env.flush().await;
//! env.shutdown(true).await;
//! ```
//!
//! ## Errors and logs
//!
//! A failing request never stops its task. The error is sent to the closest
//! error handler: an override on the task or on an enclosing flow, a sibling
//! task named `error`, or the environment default. Log messages are looked up
//! the same way with the name `log`.
//!

mod behavior;
mod config;
mod env;
mod envelope;
mod error;
mod flow;
mod hierarchy;
mod link;
mod mailbox;
mod path;
mod task;
mod tracker;
mod value;
mod worker;

pub mod behaviors;

//
// Data
//

/// Dynamic payload of an envelope, with path based access.
pub use value::{Segment, Value, parse_path};

/// Immutable unit of data exchanged between tasks.
pub use envelope::Envelope;

/// Causal history of an envelope.
pub use tracker::{Stamp, TrackEntry, Tracker};

//
// Topology
//

/// Hierarchical name of a task or a flow, such as `:sales:reader`.
pub use path::FullName;

/// Work performed by a task.
pub use behavior::{Behavior, Spec};

/// Task handle and lifecycle states.
pub use task::{Task, TaskState};

/// Named connection between a task or flow and its destination.
pub use link::{FLOW_EGRESS, Link, Target};

/// Queued requests of a task.
pub use mailbox::{Mailbox, Request};

/// Group of tasks and nested flows.
pub use flow::{Flow, Node};

/// Root of every topology.
pub use env::Env;

/// Container of a task or a flow.
pub use hierarchy::Parent;

//
// Configuration and errors
//

pub use config::{EnvConfig, Severity, TaskOptions};

pub use error::{Error, Problem, ProblemKind};
