// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! Tideflow: a flow based programming runtime.
//! Tasks exchange immutable, tracked envelopes over named links and are
//! grouped into nested flows under a single environment.

pub use flow::{
    Behavior, Env, EnvConfig, Envelope, Error as FlowError, FLOW_EGRESS, Flow,
    FullName, Link, Mailbox, Node, Parent, Problem, ProblemKind, Request,
    Segment, Severity, Spec, Stamp, Target, Task, TaskOptions, TaskState,
    TrackEntry, Tracker, Value, behaviors, parse_path,
};
