// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Environment
//!
//! The `env` module provides the `Env` type, the root of every topology. An
//! environment owns the top level flows, the default `error` and `log`
//! tasks every lookup ends at, and the minimum severity forwarded to logs.
//!
//! Cancelling the environment token shuts the environment down, the same as
//! calling [`Env::shutdown`].
//!

use crate::{
    EnvConfig, Envelope, Error, Flow, FullName, Node, Severity, Task, TaskOptions,
    TaskState, Value,
    behaviors::{ErrorHandler, Log},
    flow::most_backed_up,
    hierarchy::{Parent, Role},
    link::Target,
};

use indexmap::IndexMap;
use parking_lot::RwLock;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::debug;

use std::{
    fmt,
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, AtomicU8, Ordering},
    },
};

pub(crate) struct EnvInner {
    config: EnvConfig,
    flows: RwLock<IndexMap<String, Flow>>,
    error_task: RwLock<Option<Task>>,
    log_task: RwLock<Option<Task>>,
    log_level: AtomicU8,
    closed: AtomicBool,
    token: CancellationToken,
    // Ends the token watcher once the last handle is gone.
    _lifetime: DropGuard,
}

/// Handle to an environment.
#[derive(Clone)]
pub struct Env {
    inner: Arc<EnvInner>,
}

impl Env {
    /// Creates an environment with its default `error` and `log` tasks.
    pub async fn create(config: EnvConfig) -> Result<Env, Error> {
        Self::create_with_token(config, CancellationToken::new()).await
    }

    /// Like [`Env::create`], shutting down when `token` is cancelled.
    pub async fn create_with_token(
        config: EnvConfig,
        token: CancellationToken,
    ) -> Result<Env, Error> {
        debug!("Creating environment.");
        let lifetime = CancellationToken::new();
        let env = Env {
            inner: Arc::new(EnvInner {
                log_level: AtomicU8::new(config.log_level.as_u8()),
                config,
                flows: RwLock::new(IndexMap::new()),
                error_task: RwLock::new(None),
                log_task: RwLock::new(None),
                closed: AtomicBool::new(false),
                token,
                _lifetime: lifetime.clone().drop_guard(),
            }),
        };
        let parent = Parent::Env(env.clone());
        let level = env.log_level();
        let error_task = Task::create(
            &parent,
            env.downgrade(),
            &env.inner.config,
            Role::ErrorHandler.task_name(),
            TaskOptions::running(),
            |_| Ok(ErrorHandler),
        )
        .await?;
        let log_task = Task::create(
            &parent,
            env.downgrade(),
            &env.inner.config,
            Role::Log.task_name(),
            TaskOptions::running(),
            |_| Ok(Log::new(level)),
        )
        .await?;
        *env.inner.error_task.write() = Some(error_task);
        *env.inner.log_task.write() = Some(log_task);

        let weak = env.downgrade();
        let token = env.inner.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    if let Some(inner) = weak.upgrade() {
                        debug!("Environment token cancelled.");
                        Env::from_inner(inner).shutdown(false).await;
                    }
                }
                _ = lifetime.cancelled() => {
                    debug!("Environment dropped.");
                }
            }
        });
        Ok(env)
    }

    pub(crate) fn from_inner(inner: Arc<EnvInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<EnvInner> {
        Arc::downgrade(&self.inner)
    }

    pub fn config(&self) -> &EnvConfig {
        &self.inner.config
    }

    /// The environment is the root of every name.
    pub fn full_name(&self) -> FullName {
        FullName::root()
    }

    pub fn token(&self) -> CancellationToken {
        self.inner.token.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Creates a top level flow.
    pub fn flow(&self, name: &str) -> Result<Flow, Error> {
        if self.is_closed() {
            return Err(Error::Closed(name.to_owned()));
        }
        if name.is_empty() || name.contains(':') {
            return Err(Error::Config(format!("Invalid name '{}'.", name)));
        }
        let mut flows = self.inner.flows.write();
        if flows.contains_key(name) {
            return Err(Error::Config(format!("Flow {} already exists.", name)));
        }
        let flow = Flow::new(&Parent::Env(self.clone()), self.downgrade(), name);
        flows.insert(name.to_owned(), flow.clone());
        Ok(flow)
    }

    pub fn find_flow(&self, name: &str) -> Option<Flow> {
        self.inner.flows.read().get(name).cloned()
    }

    pub fn flows(&self) -> Vec<Flow> {
        self.inner.flows.read().values().cloned().collect()
    }

    pub fn flow_count(&self) -> usize {
        self.inner.flows.read().len()
    }

    /// Default error handler.
    pub fn error_handler(&self) -> Option<Task> {
        self.inner.error_task.read().clone()
    }

    /// Default log.
    pub fn log(&self) -> Option<Task> {
        self.inner.log_task.read().clone()
    }

    pub(crate) fn default_task(&self, role: Role) -> Option<Task> {
        match role {
            Role::ErrorHandler => self.error_handler(),
            Role::Log => self.log(),
        }
    }

    /// Target a link declared at the top level resolves to.
    pub fn find_target(&self, name: &str) -> Option<Target> {
        if let Some(flow) = self.find_flow(name) {
            return Some(Target::Flow(flow));
        }
        self.default_tasks()
            .into_iter()
            .find(|t| t.name() == name)
            .map(Target::Task)
    }

    fn default_tasks(&self) -> Vec<Task> {
        self.error_handler().into_iter().chain(self.log()).collect()
    }

    /// Finds a flow or a task by its full name, such as `:sales:reader`.
    pub fn locate(&self, name: &str) -> Option<Node> {
        let name = FullName::from(name);
        match name.level() {
            0 => None,
            1 => {
                let key = name.key();
                self.find_flow(&key).map(Node::Flow).or_else(|| {
                    self.default_tasks()
                        .into_iter()
                        .find(|t| t.name() == key)
                        .map(Node::Task)
                })
            }
            _ => {
                let segments = name.segments();
                self.find_flow(&segments[0])?.locate_segments(&segments[1..])
            }
        }
    }

    /// Task with the given full name.
    pub fn get_task(&self, full_name: &str) -> Result<Task, Error> {
        self.locate(full_name)
            .and_then(|node| node.as_task().cloned())
            .ok_or_else(|| Error::NotFound(format!("Task {}", full_name)))
    }

    /// Every task of every flow.
    pub fn tasks(&self) -> Vec<Task> {
        self.flows().iter().flat_map(Flow::tasks).collect()
    }

    pub fn walk_tasks(&self, mut f: impl FnMut(&Task)) {
        for task in self.tasks() {
            f(&task);
        }
    }

    /// Resolves the links of the default tasks and of every flow.
    pub fn resolve_all_links(&self) {
        for task in self.default_tasks() {
            task.resolve_all_links();
        }
        for flow in self.flows() {
            flow.resolve_all_links();
        }
    }

    /// Checks every link, reporting all problems at once.
    pub fn validate(&self) -> Result<(), Error> {
        let mut problems = Vec::new();
        for task in self.default_tasks() {
            problems.extend(task.validation_problems());
        }
        for flow in self.flows() {
            problems.extend(flow.validation_problems());
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(problems))
        }
    }

    /// Resolves and validates the whole topology.
    pub fn prepare(&self) -> Result<(), Error> {
        self.resolve_all_links();
        self.validate()
    }

    pub fn queue_count(&self) -> usize {
        self.flows().iter().map(Flow::queue_count).sum()
    }

    pub fn busy(&self) -> bool {
        self.flows().iter().any(Flow::busy)
    }

    pub fn start(&self) {
        self.flows().iter().for_each(Flow::start);
    }

    pub fn stop(&self) {
        self.flows().iter().for_each(Flow::stop);
    }

    pub fn wakeup(&self) {
        self.flows().iter().for_each(Flow::wakeup);
    }

    pub fn set_state(&self, state: TaskState) {
        for flow in self.flows() {
            flow.set_state(state);
        }
    }

    /// Steps the stopped task that is the most backed up.
    pub async fn step(&self) -> Option<Task> {
        let best = most_backed_up(self.tasks())?;
        best.step_once().await.then_some(best)
    }

    /// Waits until no task, default ones included, is busy.
    pub async fn flush(&self) {
        loop {
            for flow in self.flows() {
                flow.flush().await;
            }
            for task in self.default_tasks() {
                task.flush().await;
            }
            if !self.busy() && !self.default_tasks().iter().any(Task::busy) {
                break;
            }
        }
    }

    /// Minimum severity forwarded to logs.
    pub fn log_level(&self) -> Severity {
        Severity::from_u8(self.inner.log_level.load(Ordering::Relaxed)).unwrap_or_default()
    }

    /// Changes the minimum severity and tells the default log about it.
    pub async fn set_log_level(&self, level: Severity) -> Result<(), Error> {
        self.inner.log_level.store(level.as_u8(), Ordering::Relaxed);
        match self.log() {
            Some(log) => {
                log.receive(Some("severity"), Envelope::new(Value::from(level.as_str())))
                    .await
            }
            None => Ok(()),
        }
    }

    /// Closes every flow, then the default tasks. With `flush_first`
    /// pending requests are performed before closing.
    pub async fn shutdown(&self, flush_first: bool) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!("Stopping environment...");
        let flows: Vec<Flow> = self.inner.flows.write().drain(..).map(|(_, f)| f).collect();
        for flow in &flows {
            flow.set_state(TaskState::Blocked);
        }
        for flow in &flows {
            flow.shutdown(flush_first).await;
        }
        for task in self.default_tasks() {
            task.shutdown(true).await;
        }
        self.inner.token.cancel();
        debug!("Environment stopped.");
    }

    /// Shuts down and forgets every flow. The environment stays usable.
    pub async fn clear(&self) {
        let flows: Vec<Flow> = self.inner.flows.write().drain(..).map(|(_, f)| f).collect();
        for flow in &flows {
            flow.set_state(TaskState::Blocked);
        }
        for flow in flows {
            flow.clear().await;
        }
    }

    pub fn describe(&self, detail: usize, indent: usize) -> String {
        let i = " ".repeat(indent);
        let mut lines = vec![format!("{}Env {{", i)];
        for flow in self.flows() {
            lines.push(flow.describe(detail, indent + 2));
        }
        lines.push(format!("{}}}", i));
        lines.join("\n")
    }
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Env")
            .field("flows", &self.flow_count())
            .field("log_level", &self.log_level())
            .field("closed", &self.is_closed())
            .finish()
    }
}
