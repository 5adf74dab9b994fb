// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Containment hierarchy
//!
//! Tasks live in flows, flows live in flows or in the environment. This
//! module walks that containment tree outward: to find the flow a link
//! names, to find the error handler or the log of a task, and to fall back
//! to the console when nothing is found.
//!

use crate::{
    Env, Flow, FullName, Severity, Task,
    env::EnvInner,
    flow::FlowInner,
    link::Target,
};

use tracing::{debug, error, info, warn};

use std::sync::Weak;

/// Container of a task or a flow.
#[derive(Clone)]
pub enum Parent {
    Flow(Flow),
    Env(Env),
}

impl Parent {
    pub fn full_name(&self) -> FullName {
        match self {
            Parent::Flow(flow) => flow.full_name().clone(),
            Parent::Env(_) => FullName::root(),
        }
    }

    /// Child of this container that a link can target.
    pub fn find_target(&self, name: &str) -> Option<Target> {
        match self {
            Parent::Flow(flow) => flow.find_target(name),
            Parent::Env(env) => env.find_target(name),
        }
    }

    pub(crate) fn downgrade(&self) -> WeakParent {
        match self {
            Parent::Flow(flow) => WeakParent::Flow(flow.downgrade()),
            Parent::Env(env) => WeakParent::Env(env.downgrade()),
        }
    }
}

#[derive(Clone)]
pub(crate) enum WeakParent {
    Flow(Weak<FlowInner>),
    Env(Weak<EnvInner>),
}

impl WeakParent {
    pub(crate) fn upgrade(&self) -> Option<Parent> {
        match self {
            WeakParent::Flow(flow) => flow.upgrade().map(|f| Parent::Flow(Flow::from_inner(f))),
            WeakParent::Env(env) => env.upgrade().map(|e| Parent::Env(Env::from_inner(e))),
        }
    }
}

/// Service a task looks up in its surroundings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Role {
    ErrorHandler,
    Log,
}

impl Role {
    /// Name of the sibling task that plays the role.
    pub(crate) fn task_name(&self) -> &'static str {
        match self {
            Role::ErrorHandler => "error",
            Role::Log => "log",
        }
    }
}

/// Looks up a link target. Without a flow name the target is a child of
/// `scope`; otherwise it is a child of the first flow called `flow_name`
/// found from `scope` outward.
pub(crate) fn find_target(scope: &Parent, target_name: &str, flow_name: Option<&str>) -> Option<Target> {
    match flow_name {
        None => scope.find_target(target_name),
        Some(name) => find_flow(scope, name)?.find_target(target_name),
    }
}

/// Finds a flow by name: a child flow of `scope`, `scope` itself or one of
/// its ancestors, checking each level in turn, then the top level flows of
/// the environment.
pub(crate) fn find_flow(scope: &Parent, name: &str) -> Option<Flow> {
    let mut current = Some(scope.clone());
    while let Some(parent) = current {
        match parent {
            Parent::Flow(flow) => {
                if let Some(child) = flow.find_flow(name) {
                    return Some(child);
                }
                if flow.name() == name {
                    return Some(flow);
                }
                current = flow.parent();
            }
            Parent::Env(env) => return env.find_flow(name),
        }
    }
    None
}

/// Finds the task playing `role` for `asking`, starting in `scope`.
///
/// Each flow on the way out is checked for a child task named after the
/// role and then for an override. The environment defaults end the search.
/// The asking task is never its own handler.
pub(crate) fn lookup(scope: Option<Parent>, role: Role, asking: &FullName) -> Option<Task> {
    let mut current = scope;
    while let Some(parent) = current {
        match parent {
            Parent::Flow(flow) => {
                let found = flow
                    .find_task(role.task_name())
                    .filter(|t| t.full_name() != asking)
                    .or_else(|| flow.override_for(role).filter(|t| t.full_name() != asking));
                if found.is_some() {
                    return found;
                }
                current = flow.parent();
            }
            Parent::Env(env) => {
                return env.default_task(role).filter(|t| t.full_name() != asking);
            }
        }
    }
    None
}

/// Writes a log line straight to the tracing subscriber.
pub(crate) fn emit(level: Severity, origin: &str, message: &str) {
    match level {
        Severity::Debug => debug!("{}> {}", origin, message),
        Severity::Info => info!("{}> {}", origin, message),
        Severity::Warn => warn!("{}> {}", origin, message),
        Severity::Error => error!("{}> {}", origin, message),
        Severity::Fatal => error!(fatal = true, "{}> {}", origin, message),
    }
}
