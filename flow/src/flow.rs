// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Flow
//!
//! A `Flow` is a named group of tasks and nested flows. From the outside a
//! flow looks like a task: requests enter through its routes and leave
//! through its links. Inside, tasks reach the links of their flow through the
//! reserved target name `flow`.
//!
//! ```ignore
//! let flow = env.flow("sales")?;
//! let reader = flow.task("reader", TaskOptions::default(), |_| Ok(Reader::default())).await?;
//! reader.link(None, "flow", Some("done"), None)?;
//! flow.route(Some("import"), "reader", Some("read"))?;
//! flow.link(Some("done"), "audit", Some("record"))?;
//! ```
//!

use crate::{
    Behavior, Env, Envelope, Error, FullName, Problem, ProblemKind, Task,
    TaskOptions, TaskState,
    env::EnvInner,
    hierarchy::{self, Parent, Role, WeakParent},
    link::{FLOW_EGRESS, Link, Target, label_text},
};

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::debug;

use std::{
    fmt,
    sync::{Arc, Weak},
};

/// Child of a flow.
#[derive(Clone, Debug)]
pub enum Node {
    Task(Task),
    Flow(Flow),
}

impl Node {
    pub fn name(&self) -> &str {
        match self {
            Node::Task(task) => task.name(),
            Node::Flow(flow) => flow.name(),
        }
    }

    pub fn full_name(&self) -> &FullName {
        match self {
            Node::Task(task) => task.full_name(),
            Node::Flow(flow) => flow.full_name(),
        }
    }

    pub fn as_task(&self) -> Option<&Task> {
        match self {
            Node::Task(task) => Some(task),
            Node::Flow(_) => None,
        }
    }

    pub fn as_flow(&self) -> Option<&Flow> {
        match self {
            Node::Flow(flow) => Some(flow),
            Node::Task(_) => None,
        }
    }

    pub fn describe(&self, detail: usize, indent: usize) -> String {
        match self {
            Node::Task(task) => task.describe(detail, indent),
            Node::Flow(flow) => flow.describe(detail, indent),
        }
    }
}

pub(crate) struct FlowInner {
    name: String,
    full_name: FullName,
    location: String,
    parent: WeakParent,
    env: Weak<EnvInner>,
    children: RwLock<IndexMap<String, Node>>,
    routes: RwLock<IndexMap<Option<String>, Arc<Link>>>,
    links: RwLock<IndexMap<Option<String>, Arc<Link>>>,
    error_handler: RwLock<Option<Task>>,
    log: RwLock<Option<Task>>,
}

/// Handle to a flow.
#[derive(Clone)]
pub struct Flow {
    inner: Arc<FlowInner>,
}

impl Flow {
    pub(crate) fn new(parent: &Parent, env: Weak<EnvInner>, name: &str) -> Self {
        let full_name = parent.full_name() / name;
        debug!("Creating flow {}.", full_name);
        Self {
            inner: Arc::new(FlowInner {
                name: name.to_owned(),
                location: full_name.to_string(),
                full_name,
                parent: parent.downgrade(),
                env,
                children: RwLock::new(IndexMap::new()),
                routes: RwLock::new(IndexMap::new()),
                links: RwLock::new(IndexMap::new()),
                error_handler: RwLock::new(None),
                log: RwLock::new(None),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<FlowInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<FlowInner> {
        Arc::downgrade(&self.inner)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn full_name(&self) -> &FullName {
        &self.inner.full_name
    }

    pub fn parent(&self) -> Option<Parent> {
        self.inner.parent.upgrade()
    }

    pub fn env(&self) -> Option<Env> {
        self.inner.env.upgrade().map(Env::from_inner)
    }

    fn check_name(&self, name: &str) -> Result<(), Error> {
        if name.is_empty() || name.contains(':') {
            return Err(Error::Config(format!("Invalid name '{}'.", name)));
        }
        if self.inner.children.read().contains_key(name) {
            return Err(Error::Config(format!(
                "{} already exists in {}.",
                name, self
            )));
        }
        Ok(())
    }

    /// Creates a task hosting the behavior built by `factory`. The task
    /// starts `Stopped` unless `options` says otherwise.
    pub async fn task<B, F>(&self, name: &str, options: TaskOptions, factory: F) -> Result<Task, Error>
    where
        B: Behavior,
        F: FnOnce(&Task) -> Result<B, Error>,
    {
        self.check_name(name)?;
        let env = self
            .env()
            .ok_or_else(|| Error::Closed(self.inner.location.clone()))?;
        let config = env.config().clone();
        let task = Task::create(
            &Parent::Flow(self.clone()),
            self.inner.env.clone(),
            &config,
            name,
            options,
            factory,
        )
        .await?;
        let mut children = self.inner.children.write();
        if children.contains_key(name) {
            return Err(Error::Config(format!(
                "{} already exists in {}.",
                name, self
            )));
        }
        children.insert(name.to_owned(), Node::Task(task.clone()));
        Ok(task)
    }

    /// Creates a nested flow.
    pub fn flow(&self, name: &str) -> Result<Flow, Error> {
        self.check_name(name)?;
        let flow = Flow::new(&Parent::Flow(self.clone()), self.inner.env.clone(), name);
        self.inner
            .children
            .write()
            .insert(name.to_owned(), Node::Flow(flow.clone()));
        Ok(flow)
    }

    /// Declares an ingress route: requests received for `label` go to the
    /// child `target` with operation `op`.
    pub fn route(&self, label: Option<&str>, target: &str, op: Option<&str>) -> Result<(), Error> {
        insert_link(&self.inner.routes, label, Link::new(target, op, None), self)
    }

    /// Declares an egress link, resolved in the container of this flow.
    pub fn link(&self, label: Option<&str>, target: &str, op: Option<&str>) -> Result<(), Error> {
        insert_link(&self.inner.links, label, Link::new(target, op, None), self)
    }

    /// Route for `label`, falling back to the wildcard route.
    pub fn find_route(&self, label: Option<&str>) -> Option<Arc<Link>> {
        find_in(&self.inner.routes, label)
    }

    /// Egress link for `label`, falling back to the wildcard link.
    pub fn find_link(&self, label: Option<&str>) -> Option<Arc<Link>> {
        find_in(&self.inner.links, label)
    }

    pub fn routes(&self) -> Vec<(Option<String>, Arc<Link>)> {
        snapshot(&self.inner.routes)
    }

    pub fn links(&self) -> Vec<(Option<String>, Arc<Link>)> {
        snapshot(&self.inner.links)
    }

    pub fn has_input(&self, op: Option<&str>) -> bool {
        self.find_route(op).is_some()
    }

    pub(crate) fn has_output(&self, op: Option<&str>) -> bool {
        self.find_link(op).is_some()
    }

    fn resolve_route(&self, link: &Link) -> Option<Target> {
        if let Some(target) = link.target() {
            return Some(target);
        }
        let target = self.find_target(link.target_name())?;
        link.set_target(&target);
        Some(target)
    }

    fn resolve_egress(&self, link: &Link) -> Option<Target> {
        if let Some(target) = link.target() {
            return Some(target);
        }
        let target = hierarchy::find_target(&self.parent()?, link.target_name(), link.flow_name())?;
        link.set_target(&target);
        Some(target)
    }

    /// Resolves every route and link of this flow and of everything in it.
    pub fn resolve_all_links(&self) {
        for (_, link) in self.routes() {
            let _ = self.resolve_route(&link);
        }
        for (_, link) in self.links() {
            let _ = self.resolve_egress(&link);
        }
        for child in self.children() {
            match child {
                Node::Task(task) => task.resolve_all_links(),
                Node::Flow(flow) => flow.resolve_all_links(),
            }
        }
    }

    pub(crate) fn validation_problems(&self) -> Vec<Problem> {
        let mut problems = Vec::new();
        for (_, link) in self.routes() {
            let target = self.resolve_route(&link);
            check_link(&self.inner.location, &link, target, &mut problems);
        }
        for (_, link) in self.links() {
            let target = self.resolve_egress(&link);
            check_link(&self.inner.location, &link, target, &mut problems);
        }
        for child in self.children() {
            match child {
                Node::Task(task) => problems.extend(task.validation_problems()),
                Node::Flow(flow) => problems.extend(flow.validation_problems()),
            }
        }
        problems
    }

    /// Checks every link in the flow, reporting all problems at once.
    pub fn validate(&self) -> Result<(), Error> {
        let problems = self.validation_problems();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(problems))
        }
    }

    /// Ingress: stamps the envelope with the flow name and hands it to the
    /// route for `op`.
    pub async fn receive(&self, op: Option<&str>, envelope: Envelope) -> Result<(), Error> {
        debug!("Flow {} receive({}).", self, op.unwrap_or(""));
        let envelope = envelope.receive(&self.inner.location, op);
        let link = self
            .find_route(op)
            .ok_or_else(|| Error::NoLink(label_text(op)))?;
        let target = self
            .resolve_route(&link)
            .ok_or_else(|| Error::NoLink(label_text(op)))?;
        target.deliver(link.op(), envelope).await
    }

    /// Egress: sends the envelope through the flow link for `label`.
    pub async fn ship(&self, label: Option<&str>, envelope: Envelope) -> Result<(), Error> {
        let envelope = envelope.freeze();
        let link = self
            .find_link(label)
            .ok_or_else(|| Error::NoLink(label_text(label)))?;
        let target = self
            .resolve_egress(&link)
            .ok_or_else(|| Error::NoLink(label_text(label)))?;
        debug!("Flow {} shipping to {}.", self, link.destination());
        target.deliver(link.op(), envelope).await
    }

    /// Direct children, in creation order.
    pub fn children(&self) -> Vec<Node> {
        self.inner.children.read().values().cloned().collect()
    }

    pub fn find_task(&self, name: &str) -> Option<Task> {
        match self.inner.children.read().get(name) {
            Some(Node::Task(task)) => Some(task.clone()),
            _ => None,
        }
    }

    pub fn find_flow(&self, name: &str) -> Option<Flow> {
        match self.inner.children.read().get(name) {
            Some(Node::Flow(flow)) => Some(flow.clone()),
            _ => None,
        }
    }

    /// Child a link named `name` resolves to. `flow` is the egress of this
    /// flow unless a child has that name.
    pub fn find_target(&self, name: &str) -> Option<Target> {
        match self.inner.children.read().get(name) {
            Some(Node::Task(task)) => Some(Target::Task(task.clone())),
            Some(Node::Flow(flow)) => Some(Target::Flow(flow.clone())),
            None if name == FLOW_EGRESS => Some(Target::Egress(self.clone())),
            None => None,
        }
    }

    /// Finds a descendant by a name relative to this flow, such as
    /// `inner:task`, or by its full name when `name` starts with `:`.
    pub fn locate(&self, name: &str) -> Option<Node> {
        let target = FullName::from(name);
        if !name.starts_with(':') {
            return self.locate_segments(target.segments());
        }
        if !self.full_name().is_ancestor_of(&target) {
            return None;
        }
        self.locate_segments(&target.segments()[self.full_name().level()..])
    }

    pub(crate) fn locate_segments(&self, segments: &[String]) -> Option<Node> {
        let (first, rest) = segments.split_first()?;
        let node = self.inner.children.read().get(first).cloned()?;
        if rest.is_empty() {
            return Some(node);
        }
        match node {
            Node::Flow(flow) => flow.locate_segments(rest),
            Node::Task(_) => None,
        }
    }

    /// Every task in this flow and its nested flows.
    pub fn tasks(&self) -> Vec<Task> {
        let mut tasks = Vec::new();
        self.collect_tasks(&mut tasks);
        tasks
    }

    fn collect_tasks(&self, tasks: &mut Vec<Task>) {
        for child in self.children() {
            match child {
                Node::Task(task) => tasks.push(task),
                Node::Flow(flow) => flow.collect_tasks(tasks),
            }
        }
    }

    /// Calls `f` for every task in this flow and its nested flows.
    pub fn walk_tasks(&self, mut f: impl FnMut(&Task)) {
        for task in self.tasks() {
            f(&task);
        }
    }

    /// Number of direct children.
    pub fn task_count(&self) -> usize {
        self.inner.children.read().len()
    }

    pub fn queue_count(&self) -> usize {
        self.tasks().iter().map(Task::queue_count).sum()
    }

    pub fn backed_up(&self) -> usize {
        self.tasks().iter().map(Task::backed_up).max().unwrap_or(0)
    }

    pub fn busy(&self) -> bool {
        self.tasks().iter().any(Task::busy)
    }

    pub fn stop(&self) {
        self.tasks().iter().for_each(Task::stop);
    }

    pub fn start(&self) {
        self.tasks().iter().for_each(Task::start);
    }

    pub fn wakeup(&self) {
        self.tasks().iter().for_each(Task::wakeup);
    }

    pub fn set_state(&self, state: TaskState) {
        for task in self.tasks() {
            task.set_state(state);
        }
    }

    /// Steps the stopped task that is the most backed up.
    pub async fn step(&self) -> Option<Task> {
        let best = most_backed_up(self.tasks())?;
        best.step_once().await.then_some(best)
    }

    /// Waits until no task in the flow is busy.
    pub async fn flush(&self) {
        self.wakeup();
        loop {
            for task in self.tasks() {
                task.flush().await;
            }
            if !self.busy() {
                break;
            }
        }
    }

    /// Closes every task and forgets every child.
    pub async fn shutdown(&self, flush_first: bool) {
        let tasks = self.tasks();
        for task in &tasks {
            task.set_state(TaskState::Blocked);
        }
        for task in &tasks {
            task.shutdown(flush_first).await;
        }
        self.inner.children.write().clear();
        debug!("Flow {} closed.", self);
    }

    /// Shuts down and drops the topology of the flow.
    pub async fn clear(&self) {
        self.shutdown(false).await;
        self.inner.routes.write().clear();
        self.inner.links.write().clear();
        *self.inner.error_handler.write() = None;
        *self.inner.log.write() = None;
    }

    pub fn describe(&self, detail: usize, indent: usize) -> String {
        let i = " ".repeat(indent);
        let mut lines = vec![format!("{}{} (Flow) {{", i, self.name())];
        for child in self.children() {
            lines.push(child.describe(detail, indent + 2));
        }
        for (label, link) in self.routes() {
            lines.push(format!(
                "{}  in {} => {}:{}",
                i,
                label_text(label.as_deref()),
                link.target_name(),
                link.op().unwrap_or("")
            ));
        }
        for (label, link) in self.links() {
            lines.push(format!(
                "{}  out {} => {}:{}",
                i,
                label_text(label.as_deref()),
                link.target_name(),
                link.op().unwrap_or("")
            ));
        }
        lines.push(format!("{}}}", i));
        lines.join("\n")
    }

    pub fn error_handler(&self) -> Option<Task> {
        self.inner.error_handler.read().clone().or_else(|| {
            hierarchy::lookup(Some(Parent::Flow(self.clone())), Role::ErrorHandler, self.full_name())
        })
    }

    /// Error handler of the tasks in the flow that have neither their own
    /// nor a sibling task named `error`.
    pub fn set_error_handler(&self, handler: Option<Task>) {
        *self.inner.error_handler.write() = handler;
    }

    pub fn log(&self) -> Option<Task> {
        self.inner.log.read().clone().or_else(|| {
            hierarchy::lookup(Some(Parent::Flow(self.clone())), Role::Log, self.full_name())
        })
    }

    pub fn set_log(&self, log: Option<Task>) {
        *self.inner.log.write() = log;
    }

    pub(crate) fn override_for(&self, role: Role) -> Option<Task> {
        match role {
            Role::ErrorHandler => self.inner.error_handler.read().clone(),
            Role::Log => self.inner.log.read().clone(),
        }
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.location)
    }
}

impl fmt::Debug for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Flow({})", self.inner.location)
    }
}

impl PartialEq for Flow {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

fn insert_link(
    links: &RwLock<IndexMap<Option<String>, Arc<Link>>>,
    label: Option<&str>,
    link: Link,
    owner: &Flow,
) -> Result<(), Error> {
    let mut links = links.write();
    let key = label.map(str::to_owned);
    if links.contains_key(&key) {
        return Err(Error::Config(format!(
            "Link {} already exists on {}.",
            label_text(label),
            owner
        )));
    }
    links.insert(key, Arc::new(link));
    Ok(())
}

fn find_in(
    links: &RwLock<IndexMap<Option<String>, Arc<Link>>>,
    label: Option<&str>,
) -> Option<Arc<Link>> {
    let links = links.read();
    links
        .get(&label.map(str::to_owned))
        .or_else(|| links.get(&None))
        .cloned()
}

fn snapshot(
    links: &RwLock<IndexMap<Option<String>, Arc<Link>>>,
) -> Vec<(Option<String>, Arc<Link>)> {
    links
        .read()
        .iter()
        .map(|(label, link)| (label.clone(), link.clone()))
        .collect()
}

pub(crate) fn check_link(location: &str, link: &Link, target: Option<Target>, problems: &mut Vec<Problem>) {
    match target {
        None => problems.push(Problem::new(
            location,
            ProblemKind::Link,
            format!("Failed to find task '{}'.", link.target_name()),
        )),
        Some(target) if !target.has_input(link.op()) => problems.push(Problem::new(
            location,
            ProblemKind::Input,
            format!(
                "'{}' not allowed on '{}'.",
                link.op().unwrap_or(""),
                target.full_name()
            ),
        )),
        Some(_) => {}
    }
}

/// The stopped task with the highest non zero `backed_up`, first one wins
/// on ties.
pub(crate) fn most_backed_up(tasks: Vec<Task>) -> Option<Task> {
    let mut best: Option<(usize, Task)> = None;
    for task in tasks {
        if task.state() != TaskState::Stopped {
            continue;
        }
        let score = task.backed_up();
        if score > best.as_ref().map_or(0, |(max, _)| *max) {
            best = Some((score, task));
        }
    }
    best.map(|(_, task)| task)
}
