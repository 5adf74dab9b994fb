// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Task
//!
//! A `Task` hosts one [`Behavior`], owns its FIFO mailbox and its outbound
//! links, and runs the state machine that decides when queued requests are
//! performed.
//!
//! ```text
//! Starting -> Running <-> Stopped
//! Running | Stopped -> Blocked
//! Stopped -> Step -> Stopped
//! any -> Closing
//! ```
//!
//! A `Task` value is a handle: cloning it yields another handle to the same
//! task. The mailbox and the state share one lock that is never held across
//! an `.await`.
//!

use crate::{
    Behavior, Env, EnvConfig, Envelope, Error, FullName, Problem, ProblemKind,
    Severity, Spec, TaskOptions, Value,
    env::EnvInner,
    flow,
    hierarchy::{self, Parent, Role, WeakParent},
    link::{Link, Target, label_text},
    mailbox::{Mailbox, Request},
    worker,
};

use futures::{FutureExt, future::BoxFuture};
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::{
    sync::{Mutex as AsyncMutex, Notify},
    task::JoinHandle,
    time::{Instant, timeout},
};
use tracing::{debug, error};

use std::{
    any::Any,
    fmt,
    panic::AssertUnwindSafe,
    sync::{
        Arc, OnceLock, Weak,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};

/// Lifecycle state of a task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Being built; requests are queued but never performed.
    Starting,
    /// Requests are queued and wait for `start` or `step`.
    Stopped,
    /// Requests are performed as they arrive.
    Running,
    /// The worker exits; the task is unusable afterwards.
    Closing,
    /// Queued requests are drained, new ones are refused.
    Blocked,
    /// Performs a single request, then returns to `Stopped`.
    Step,
}

impl TaskState {
    /// Whether a worker takes requests from the mailbox in this state.
    pub fn is_runnable(&self) -> bool {
        matches!(self, TaskState::Running | TaskState::Step | TaskState::Blocked)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskState::Starting => "STARTING",
            TaskState::Stopped => "STOPPED",
            TaskState::Running => "RUNNING",
            TaskState::Closing => "CLOSING",
            TaskState::Blocked => "BLOCKED",
            TaskState::Step => "STEP",
        };
        write!(f, "{}", name)
    }
}

/// Wake up signals shared between a task and its worker.
#[derive(Default)]
pub(crate) struct Signals {
    /// Work may be available, or the state changed.
    pub(crate) wake: Notify,
    /// A request left the mailbox.
    pub(crate) space: Notify,
    /// The worker found nothing to do.
    pub(crate) idle: Notify,
    /// A stepped request finished.
    pub(crate) stepped: Notify,
}

struct Core {
    state: TaskState,
    mailbox: Mailbox,
    current: Option<Request>,
    processed: u64,
}

/// What the behavior declared once built.
struct Profile {
    kind: String,
    inputs: Option<Vec<Spec>>,
    outputs: Option<Vec<Spec>>,
    own_worker: bool,
}

/// Next thing a worker has to do.
pub(crate) enum Next {
    Perform(Request),
    Idle,
    Exit,
}

pub(crate) struct TaskInner {
    name: String,
    full_name: FullName,
    location: String,
    parent: WeakParent,
    env: Weak<EnvInner>,
    profile: OnceLock<Profile>,
    behavior: AsyncMutex<Option<Box<dyn Behavior>>>,
    core: Mutex<Core>,
    links: RwLock<IndexMap<Option<String>, Arc<Link>>>,
    max_queue_count: AtomicUsize,
    request_timeout_ms: AtomicU64,
    idle_wait: Duration,
    step_wait: Duration,
    signals: Arc<Signals>,
    worker: Mutex<Option<JoinHandle<()>>>,
    error_handler: RwLock<Option<Task>>,
    log: RwLock<Option<Task>>,
}

/// Handle to a task.
#[derive(Clone)]
pub struct Task {
    inner: Arc<TaskInner>,
}

impl Task {
    /// Builds a task in `parent`, installs the behavior built by `factory`,
    /// runs its `pre_start` hook and starts its worker.
    pub(crate) async fn create<B, F>(
        parent: &Parent,
        env: Weak<EnvInner>,
        config: &EnvConfig,
        name: &str,
        options: TaskOptions,
        factory: F,
    ) -> Result<Task, Error>
    where
        B: Behavior,
        F: FnOnce(&Task) -> Result<B, Error>,
    {
        let full_name = parent.full_name() / name;
        debug!("Creating task {}.", full_name);
        let request_timeout_ms = options
            .request_timeout_ms
            .unwrap_or(config.request_timeout_ms);
        let task = Task {
            inner: Arc::new(TaskInner {
                name: name.to_owned(),
                location: full_name.to_string(),
                full_name,
                parent: parent.downgrade(),
                env,
                profile: OnceLock::new(),
                behavior: AsyncMutex::new(None),
                core: Mutex::new(Core {
                    state: TaskState::Starting,
                    mailbox: Mailbox::new(),
                    current: None,
                    processed: 0,
                }),
                links: RwLock::new(IndexMap::new()),
                max_queue_count: AtomicUsize::new(options.max_queue_count.unwrap_or(0)),
                request_timeout_ms: AtomicU64::new(request_timeout_ms),
                idle_wait: config.idle_wait(),
                step_wait: config.step_wait(),
                signals: Arc::new(Signals::default()),
                worker: Mutex::new(None),
                error_handler: RwLock::new(None),
                log: RwLock::new(None),
            }),
        };

        let behavior = factory(&task)?;
        let _ = task.inner.profile.set(Profile {
            kind: short_type_name::<B>(),
            inputs: behavior.inputs(),
            outputs: behavior.outputs(),
            own_worker: behavior.with_own_worker(),
        });
        {
            let mut slot = task.inner.behavior.lock().await;
            let behavior = slot.insert(Box::new(behavior));
            if let Err(err) = behavior.pre_start(&task).await {
                error!("Task {} failed to start: {}", task, err);
                return Err(err);
            }
        }

        if task.has_worker() {
            let handle = worker::spawn(&task);
            *task.inner.worker.lock() = Some(handle);
        }
        task.set_state(options.state.unwrap_or(TaskState::Stopped));
        if !task.has_worker() {
            // Requests queued by `pre_start` have no worker to run them.
            loop {
                let next = task.inner.core.lock().mailbox.pop();
                let Some(request) = next else { break };
                task.perform_inline(request).await;
            }
        }
        debug!("Task {} created.", task);
        Ok(task)
    }

    pub(crate) fn from_inner(inner: Arc<TaskInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<TaskInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn signals(&self) -> Arc<Signals> {
        self.inner.signals.clone()
    }

    pub(crate) fn idle_wait(&self) -> Duration {
        self.inner.idle_wait
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn full_name(&self) -> &FullName {
        &self.inner.full_name
    }

    /// Type name of the hosted behavior.
    pub fn kind(&self) -> &str {
        self.inner
            .profile
            .get()
            .map(|p| p.kind.as_str())
            .unwrap_or("?")
    }

    pub fn state(&self) -> TaskState {
        self.inner.core.lock().state
    }

    /// Container of the task, `None` once the container is gone.
    pub fn parent(&self) -> Option<Parent> {
        self.inner.parent.upgrade()
    }

    pub fn env(&self) -> Option<Env> {
        self.inner.env.upgrade().map(Env::from_inner)
    }

    /// Whether the task has its own worker.
    pub fn has_worker(&self) -> bool {
        self.inner
            .profile
            .get()
            .map(|p| p.own_worker)
            .unwrap_or(false)
    }

    pub fn inputs(&self) -> Option<Vec<Spec>> {
        self.inner.profile.get().and_then(|p| p.inputs.clone())
    }

    pub fn outputs(&self) -> Option<Vec<Spec>> {
        self.inner.profile.get().and_then(|p| p.outputs.clone())
    }

    /// Whether the behavior accepts `op`.
    pub fn has_input(&self, op: Option<&str>) -> bool {
        match self.inner.profile.get().and_then(|p| p.inputs.as_ref()) {
            None => true,
            Some(inputs) => inputs.iter().any(|spec| spec.accepts(op)),
        }
    }

    pub fn max_queue_count(&self) -> Option<usize> {
        match self.inner.max_queue_count.load(Ordering::Relaxed) {
            0 => None,
            count => Some(count),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.inner.request_timeout_ms.load(Ordering::Relaxed))
    }

    /// Queues a request, or performs it right away when the task has no
    /// worker.
    ///
    /// A full mailbox makes the caller wait up to the request timeout for
    /// space before failing with [`Error::Busy`]. A blocked task refuses the
    /// request with [`Error::Blocked`]; a closing task drops it.
    pub async fn receive(&self, op: Option<&str>, envelope: Envelope) -> Result<(), Error> {
        debug!("Task {} receive({}).", self, op.unwrap_or(""));
        let envelope = envelope.receive(&self.inner.location, op);
        let inline = {
            let core = self.inner.core.lock();
            match core.state {
                TaskState::Closing => return Ok(()),
                TaskState::Blocked => return Err(Error::Blocked(self.inner.location.clone())),
                state => state != TaskState::Starting && !self.has_worker(),
            }
        };
        if inline {
            self.perform_inline(Request::new(op, envelope)).await;
            return Ok(());
        }

        let deadline = Instant::now() + self.request_timeout();
        let mut request = Some(Request::new(op, envelope));
        loop {
            let space = self.inner.signals.space.notified();
            tokio::pin!(space);
            space.as_mut().enable();
            {
                let mut core = self.inner.core.lock();
                match core.state {
                    TaskState::Closing => return Ok(()),
                    TaskState::Blocked => {
                        return Err(Error::Blocked(self.inner.location.clone()));
                    }
                    _ => {}
                }
                let limit = self.max_queue_count();
                if core.state == TaskState::Starting
                    || limit.map_or(true, |max| core.mailbox.len() < max)
                {
                    if let Some(request) = request.take() {
                        core.mailbox.push(request);
                    }
                    drop(core);
                    self.inner.signals.wake.notify_one();
                    return Ok(());
                }
            }
            let now = Instant::now();
            if now >= deadline {
                debug!("Task {} is busy.", self);
                return Err(Error::Busy(self.inner.location.clone()));
            }
            let _ = timeout(deadline - now, space).await;
        }
    }

    /// Freezes `envelope` and sends it through the link for `label`, or
    /// through the wildcard link when there is none for `label`.
    pub async fn ship(&self, label: Option<&str>, envelope: Envelope) -> Result<(), Error> {
        let envelope = envelope.freeze();
        let link = self
            .find_link(label)
            .ok_or_else(|| Error::NoLink(label_text(label)))?;
        let target = self
            .resolve_link(&link)
            .ok_or_else(|| Error::NoLink(label_text(label)))?;
        debug!("Task {} shipping to {}.", self, link.destination());
        target.deliver(link.op(), envelope).await
    }

    /// Performs the oldest queued request and returns to `Stopped`. Only
    /// a stopped task with queued requests and a worker steps. Waits up to
    /// `max_wait` for the request to finish and returns whether a step was
    /// taken.
    pub async fn step(&self, max_wait: Duration) -> bool {
        if !self.has_worker() {
            return false;
        }
        let stepped = self.inner.signals.stepped.notified();
        tokio::pin!(stepped);
        stepped.as_mut().enable();
        {
            let mut core = self.inner.core.lock();
            if core.state != TaskState::Stopped || core.mailbox.is_empty() {
                return false;
            }
            core.state = TaskState::Step;
        }
        self.inner.signals.wake.notify_one();
        let _ = timeout(max_wait, stepped).await;
        true
    }

    /// `step` with the environment step wait.
    pub async fn step_once(&self) -> bool {
        self.step(self.inner.step_wait).await
    }

    /// Stops performing requests after the current one.
    pub fn stop(&self) {
        self.set_state(TaskState::Stopped);
    }

    pub fn start(&self) {
        self.set_state(TaskState::Running);
    }

    pub fn wakeup(&self) {
        self.inner.signals.wake.notify_one();
    }

    /// Raw state setter. A closing task stays closing.
    pub fn set_state(&self, state: TaskState) {
        {
            let mut core = self.inner.core.lock();
            if core.state == TaskState::Closing {
                return;
            }
            core.state = state;
        }
        debug!("Task {} is {}.", self, state);
        self.wakeup();
    }

    /// Closes the task. With `flush_first` the task is blocked and its
    /// mailbox drained before closing.
    pub async fn shutdown(&self, flush_first: bool) {
        if flush_first {
            self.set_state(TaskState::Blocked);
            self.flush().await;
        }
        self.set_state(TaskState::Closing);
        let handle = self.inner.worker.lock().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                error!("Worker of task {} ended abnormally: {}", self, err);
            }
        }
        self.inner.core.lock().mailbox.clear();
        self.inner.signals.space.notify_waiters();
        debug!("Task {} closed.", self);
    }

    /// Waits until the task is no longer busy.
    pub async fn flush(&self) {
        loop {
            let idle = self.inner.signals.idle.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();
            if !self.busy() {
                return;
            }
            self.wakeup();
            let _ = timeout(self.inner.idle_wait, idle).await;
        }
    }

    /// Load score: 0 when idle, the request count capped at 80 without a
    /// queue limit, a percentage of the limit otherwise.
    pub fn backed_up(&self) -> usize {
        let count = {
            let core = self.inner.core.lock();
            core.mailbox.len() + usize::from(core.current.is_some())
        };
        if count == 0 {
            return 0;
        }
        match self.max_queue_count() {
            None => count.min(80),
            Some(max) => count * 100 / max,
        }
    }

    pub fn queue_count(&self) -> usize {
        self.inner.core.lock().mailbox.len()
    }

    /// Number of requests performed so far.
    pub fn proc_count(&self) -> u64 {
        self.inner.core.lock().processed
    }

    /// Whether a request is queued or being performed, or the behavior
    /// reports pending work.
    pub fn busy(&self) -> bool {
        {
            let core = self.inner.core.lock();
            if core.current.is_some() || !core.mailbox.is_empty() {
                return true;
            }
        }
        match self.inner.behavior.try_lock() {
            Ok(behavior) => behavior.as_ref().is_some_and(|b| b.busy()),
            Err(_) => true,
        }
    }

    /// Declares the link for `label`. `flow_name` names the flow the target
    /// is looked up in.
    pub fn link(
        &self,
        label: Option<&str>,
        target: &str,
        op: Option<&str>,
        flow_name: Option<&str>,
    ) -> Result<(), Error> {
        let mut links = self.inner.links.write();
        let key = label.map(str::to_owned);
        if links.contains_key(&key) {
            return Err(Error::Config(format!(
                "Link {} already exists on {}.",
                label_text(label),
                self
            )));
        }
        links.insert(key, Arc::new(Link::new(target, op, flow_name)));
        Ok(())
    }

    /// Link for `label`, falling back to the wildcard link.
    pub fn find_link(&self, label: Option<&str>) -> Option<Arc<Link>> {
        let links = self.inner.links.read();
        links
            .get(&label.map(str::to_owned))
            .or_else(|| links.get(&None))
            .cloned()
    }

    pub fn links(&self) -> Vec<(Option<String>, Arc<Link>)> {
        self.inner
            .links
            .read()
            .iter()
            .map(|(label, link)| (label.clone(), link.clone()))
            .collect()
    }

    /// Resolves `link` if needed and returns its target.
    pub fn resolve_link(&self, link: &Link) -> Option<Target> {
        if let Some(target) = link.target() {
            return Some(target);
        }
        let target = hierarchy::find_target(&self.parent()?, link.target_name(), link.flow_name())?;
        link.set_target(&target);
        Some(target)
    }

    /// Resolves every unresolved link. Safe to call repeatedly.
    pub fn resolve_all_links(&self) {
        for (_, link) in self.links() {
            let _ = self.resolve_link(&link);
        }
    }

    pub(crate) fn validation_problems(&self) -> Vec<Problem> {
        let location = &self.inner.location;
        let mut problems = Vec::new();
        for (_, link) in self.links() {
            let target = self.resolve_link(&link);
            flow::check_link(location, &link, target, &mut problems);
        }
        for spec in self.outputs().unwrap_or_default() {
            if self.find_link(spec.dest()).is_none() {
                problems.push(Problem::new(
                    location,
                    ProblemKind::Missing,
                    format!("Missing link for '{}'.", label_text(spec.dest())),
                ));
            }
        }
        problems
    }

    /// Sets a task option. `max_queue_count` and `request_timeout` (in
    /// seconds) are handled by the task, anything else by the behavior.
    pub async fn set_option(&self, key: &str, value: &str) -> Result<(), Error> {
        match key {
            "max_queue_count" => {
                let count = value.trim().parse::<usize>().map_err(|e| {
                    Error::Config(format!("Invalid max_queue_count '{}': {}", value, e))
                })?;
                self.inner.max_queue_count.store(count, Ordering::Relaxed);
                Ok(())
            }
            "request_timeout" => {
                let seconds = value
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|s| s.is_finite() && *s >= 0.0)
                    .ok_or_else(|| {
                        Error::Config(format!("Invalid request_timeout '{}'.", value))
                    })?;
                self.inner
                    .request_timeout_ms
                    .store((seconds * 1000.0) as u64, Ordering::Relaxed);
                Ok(())
            }
            _ => match self.inner.behavior.lock().await.as_mut() {
                Some(behavior) => behavior.set_option(key, value),
                None => Err(Error::Config(format!("Unknown option '{}'.", key))),
            },
        }
    }

    /// Indented, human readable description of the task.
    pub fn describe(&self, detail: usize, indent: usize) -> String {
        let i = " ".repeat(indent);
        let mut lines = vec![format!("{}{} ({}) {{", i, self.name(), self.kind())];
        for (label, link) in self.links() {
            lines.push(format!(
                "{}  {} => {}",
                i,
                label_text(label.as_deref()),
                link.destination()
            ));
        }
        if detail >= 1 {
            let (queued, state, current, queue) = {
                let core = self.inner.core.lock();
                (
                    core.mailbox.len(),
                    core.state,
                    core.current.clone(),
                    core.mailbox.snapshot(),
                )
            };
            lines.push(format!(
                "{}  queued: {} ({})",
                i,
                queued,
                if self.busy() { "busy" } else { "idle" }
            ));
            lines.push(format!("{}  state: {}", i, state));
            if let Ok(behavior) = self.inner.behavior.try_lock() {
                for (key, value) in behavior.as_ref().map(|b| b.options()).unwrap_or_default() {
                    lines.push(format!("{}  {} = {}", i, key, value));
                }
            }
            if detail >= 2 {
                if let Some(current) = current {
                    lines.push(format!("{}  processing: {}", i, current.describe(detail)));
                }
                lines.push(format!("{}  queue:", i));
                for request in queue {
                    lines.push(format!("{}    {}", i, request.describe(detail)));
                }
            }
        }
        lines.push(format!("{}}}", i));
        lines.join("\n")
    }

    /// Task failures are reported to, see [`Task::set_error_handler`].
    pub fn error_handler(&self) -> Option<Task> {
        self.inner.error_handler.read().clone().or_else(|| {
            hierarchy::lookup(self.parent(), Role::ErrorHandler, self.full_name())
        })
    }

    pub fn set_error_handler(&self, handler: Option<Task>) {
        *self.inner.error_handler.write() = handler;
    }

    /// Task log messages are sent to.
    pub fn log(&self) -> Option<Task> {
        self.inner
            .log
            .read()
            .clone()
            .or_else(|| hierarchy::lookup(self.parent(), Role::Log, self.full_name()))
    }

    pub fn set_log(&self, log: Option<Task>) {
        *self.inner.log.write() = log;
    }

    /// Sends `[error, full name]` to the error handler, or writes it to the
    /// console when there is no handler.
    ///
    /// Boxed: an inline handler reports its own failures through here, so
    /// `receive` and `handle_error` call each other.
    pub fn handle_error(&self, err: Error) -> BoxFuture<'_, ()> {
        async move {
            let origin = self.inner.location.as_str();
            match self.error_handler() {
                Some(handler) => {
                    let report = Envelope::new(Value::seq([err.to_string(), origin.to_owned()]));
                    if let Err(failure) = handler.receive(None, report).await {
                        error!("[{}] {} (error handler failed: {})", origin, err, failure);
                    }
                }
                None => error!("[{}] {}", origin, err),
            }
        }
        .boxed()
    }

    /// Minimum severity forwarded to logs.
    pub fn log_level(&self) -> Severity {
        self.env().map(|env| env.log_level()).unwrap_or_default()
    }

    /// Sends `[message, origin]` to the log with the severity as operation.
    pub async fn log_msg(&self, level: Severity, message: &str, origin: &str) {
        if level < self.log_level() {
            return;
        }
        match self.log() {
            Some(log) => {
                let entry = Envelope::new(Value::seq([message, origin]));
                if log.receive(Some(level.as_str()), entry).await.is_err() {
                    hierarchy::emit(level, origin, message);
                }
            }
            None => hierarchy::emit(level, origin, message),
        }
    }

    pub async fn debug(&self, message: &str) {
        self.log_msg(Severity::Debug, message, &self.inner.location).await;
    }

    pub async fn info(&self, message: &str) {
        self.log_msg(Severity::Info, message, &self.inner.location).await;
    }

    pub async fn warn(&self, message: &str) {
        self.log_msg(Severity::Warn, message, &self.inner.location).await;
    }

    pub async fn error(&self, message: &str) {
        self.log_msg(Severity::Error, message, &self.inner.location).await;
    }

    pub async fn fatal(&self, message: &str) {
        self.log_msg(Severity::Fatal, message, &self.inner.location).await;
    }

    /// Takes the next request for the worker.
    pub(crate) fn next(&self) -> Next {
        let mut core = self.inner.core.lock();
        if core.state == TaskState::Closing {
            return Next::Exit;
        }
        if !core.state.is_runnable() {
            return Next::Idle;
        }
        match core.mailbox.pop() {
            Some(request) => {
                core.current = Some(request.clone());
                Next::Perform(request)
            }
            None => Next::Idle,
        }
    }

    /// Performs a request taken by [`Task::next`] and records it.
    pub(crate) async fn process(&self, request: Request) {
        if let Err(err) = self.perform(request).await {
            self.handle_error(err).await;
        }
        let stepped = {
            let mut core = self.inner.core.lock();
            core.current = None;
            core.processed += 1;
            if core.state == TaskState::Step {
                core.state = TaskState::Stopped;
                true
            } else {
                false
            }
        };
        if stepped {
            self.inner.signals.stepped.notify_waiters();
        }
        self.inner.signals.space.notify_waiters();
    }

    async fn perform_inline(&self, request: Request) {
        if let Err(err) = self.perform(request).await {
            self.handle_error(err).await;
        }
        self.inner.core.lock().processed += 1;
    }

    /// Runs the behavior. Panics are caught and turned into errors.
    async fn perform(&self, request: Request) -> Result<(), Error> {
        debug!("Task {} perform({}).", self, request.op.as_deref().unwrap_or(""));
        let mut slot = self.inner.behavior.lock().await;
        let Some(behavior) = slot.as_mut() else {
            return Ok(());
        };
        let op = request.op.as_deref();
        match AssertUnwindSafe(behavior.perform(self, op, request.envelope))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => Err(Error::Panic(panic_message(panic))),
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.location)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Task({} {})", self.inner.location, self.state())
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

fn short_type_name<B>() -> String {
    let name = std::any::type_name::<B>();
    let base = name.split('<').next().unwrap_or(name);
    base.rsplit("::").next().unwrap_or(base).to_owned()
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    struct Sample<T>(T);

    #[test]
    fn test_state_display() {
        assert_eq!(TaskState::Running.to_string(), "RUNNING");
        assert_eq!(TaskState::Step.to_string(), "STEP");
        assert!(TaskState::Blocked.is_runnable());
        assert!(!TaskState::Stopped.is_runnable());
        assert!(!TaskState::Starting.is_runnable());
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name::<Sample<Vec<u8>>>(), "Sample");
        assert_eq!(short_type_name::<String>(), "String");
    }

    #[test]
    fn test_panic_message() {
        let caught = std::panic::catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(panic_message(caught), "boom");
        let caught = std::panic::catch_unwind(|| panic!("{} {}", "big", "boom")).unwrap_err();
        assert_eq!(panic_message(caught), "big boom");
    }
}
