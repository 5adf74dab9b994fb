// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! Topology tests: routing, egress, validation, lookup of handlers and logs.

use async_trait::async_trait;
use flow::{
    Behavior, Env, EnvConfig, Envelope, Error, Node, ProblemKind, Spec, Task,
    TaskOptions, Tracker, Value,
    behaviors::{Collector, CollectorConfig, Merger, MergerConfig, Relay},
};

// Test behaviors

#[derive(Debug, Default)]
pub struct Failing;

#[async_trait]
impl Behavior for Failing {
    async fn perform(
        &mut self,
        _task: &Task,
        _op: Option<&str>,
        _envelope: Envelope,
    ) -> Result<(), Error> {
        Err(Error::Perform("boom".to_owned()))
    }
}

#[derive(Debug, Default)]
pub struct Panicking;

#[async_trait]
impl Behavior for Panicking {
    async fn perform(
        &mut self,
        _task: &Task,
        _op: Option<&str>,
        _envelope: Envelope,
    ) -> Result<(), Error> {
        panic!("kaboom");
    }
}

/// Only accepts `save`.
#[derive(Debug, Default)]
pub struct Strict;

#[async_trait]
impl Behavior for Strict {
    async fn perform(
        &mut self,
        _task: &Task,
        _op: Option<&str>,
        _envelope: Envelope,
    ) -> Result<(), Error> {
        Ok(())
    }

    fn inputs(&self) -> Option<Vec<Spec>> {
        Some(vec![Spec::new(Some("save"), "Value")])
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_envelope_reaches_linked_task() {
    let env = Env::create(EnvConfig::default()).await.unwrap();
    let sales = env.flow("sales").unwrap();
    let sink = Collector::new(CollectorConfig::default());
    let collection = sink.collection();

    let reader = sales
        .task("reader", TaskOptions::running(), |_| Ok(Relay))
        .await
        .unwrap();
    reader.link(None, "writer", Some("save"), None).unwrap();
    sales
        .task("writer", TaskOptions::running(), move |_| Ok(sink))
        .await
        .unwrap();
    env.prepare().unwrap();

    let envelope = Envelope::with_tracker("hello", Tracker::create("test", None));
    reader.receive(None, envelope).await.unwrap();
    env.flush().await;

    let entries = collection.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].op.as_deref(), Some("save"));
    assert_eq!(entries[0].envelope.payload(), &Value::from("hello"));
    assert!(entries[0].envelope.is_frozen());
    assert_eq!(
        entries[0].envelope.tracker().unwrap().sites(),
        vec!["test-", ":sales:reader-", ":sales:writer-save"]
    );
    env.shutdown(true).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_nested_flow_routes_and_egress() {
    let env = Env::create(EnvConfig::default()).await.unwrap();
    let outer = env.flow("outer").unwrap();
    let inner = outer.flow("inner").unwrap();
    let sink = Collector::new(CollectorConfig::default());
    let collection = sink.collection();

    outer.route(None, "inner", None).unwrap();
    inner.route(None, "worker", None).unwrap();
    let worker = inner
        .task("worker", TaskOptions::running(), |_| Ok(Relay))
        .await
        .unwrap();
    worker.link(None, "flow", Some("done"), None).unwrap();
    inner.link(Some("done"), "sink", Some("store")).unwrap();
    outer
        .task("sink", TaskOptions::running(), move |_| Ok(sink))
        .await
        .unwrap();
    env.prepare().unwrap();

    let envelope = Envelope::with_tracker(1, Tracker::create("test", None));
    outer.receive(None, envelope).await.unwrap();
    env.flush().await;

    let entries = collection.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].op.as_deref(), Some("store"));
    assert_eq!(
        entries[0].envelope.tracker().unwrap().sites(),
        vec![
            "test-",
            ":outer-",
            ":outer:inner-",
            ":outer:inner:worker-",
            ":outer:sink-store"
        ]
    );
    env.shutdown(true).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_flow_without_route() {
    let env = Env::create(EnvConfig::default()).await.unwrap();
    let lonely = env.flow("lonely").unwrap();
    let result = lonely.receive(Some("go"), Envelope::new(1)).await;
    assert_eq!(result, Err(Error::NoLink("go".to_owned())));
    env.shutdown(false).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_validation_reports_every_problem() {
    let env = Env::create(EnvConfig::default()).await.unwrap();
    let f = env.flow("f").unwrap();
    let a = f.task("a", TaskOptions::default(), |_| Ok(Relay)).await.unwrap();
    f.task("m", TaskOptions::default(), |_| {
        Ok(Merger::new(MergerConfig::default()))
    })
    .await
    .unwrap();
    f.task("s", TaskOptions::default(), |_| Ok(Strict)).await.unwrap();
    a.link(None, "missing", None, None).unwrap();
    a.link(Some("x"), "s", Some("load"), None).unwrap();
    a.link(Some("y"), "s", Some("save"), None).unwrap();

    let Err(Error::Validation(problems)) = env.prepare() else {
        panic!("validation should fail");
    };
    let kinds: Vec<ProblemKind> = problems.iter().map(|p| p.kind).collect();
    assert_eq!(
        kinds,
        vec![ProblemKind::Link, ProblemKind::Input, ProblemKind::Missing]
    );
    assert_eq!(problems[0].task_name, ":f:a");
    assert_eq!(problems[0].message, "Failed to find task 'missing'.");
    assert_eq!(problems[1].message, "'load' not allowed on ':f:s'.");
    assert_eq!(problems[2].task_name, ":f:m");
    assert_eq!(problems[2].message, "Missing link for '*'.");

    let text = Error::Validation(problems).to_string();
    assert!(text.starts_with("3 validation errors."));
    env.shutdown(false).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_validation_two_unresolved_links_and_missing_output() {
    let env = Env::create(EnvConfig::default()).await.unwrap();
    let f = env.flow("f").unwrap();
    let a = f.task("a", TaskOptions::default(), |_| Ok(Relay)).await.unwrap();
    let b = f.task("b", TaskOptions::default(), |_| Ok(Relay)).await.unwrap();
    f.task("m", TaskOptions::default(), |_| {
        Ok(Merger::new(MergerConfig::default()))
    })
    .await
    .unwrap();
    a.link(None, "nowhere", None, None).unwrap();
    b.link(Some("out"), "gone", Some("save"), None).unwrap();

    let Err(Error::Validation(problems)) = f.validate() else {
        panic!("validation should fail");
    };
    assert_eq!(problems.len(), 3);
    let kinds: Vec<ProblemKind> = problems.iter().map(|p| p.kind).collect();
    assert_eq!(
        kinds,
        vec![ProblemKind::Link, ProblemKind::Link, ProblemKind::Missing]
    );
    let owners: Vec<&str> = problems.iter().map(|p| p.task_name.as_str()).collect();
    assert_eq!(owners, vec![":f:a", ":f:b", ":f:m"]);
    assert_eq!(problems[1].message, "Failed to find task 'gone'.");
    env.shutdown(false).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_duplicates_are_rejected() {
    let env = Env::create(EnvConfig::default()).await.unwrap();
    let f = env.flow("f").unwrap();
    let a = f.task("a", TaskOptions::default(), |_| Ok(Relay)).await.unwrap();
    assert!(matches!(
        f.task("a", TaskOptions::default(), |_| Ok(Relay)).await,
        Err(Error::Config(_))
    ));
    assert!(matches!(f.flow("a"), Err(Error::Config(_))));
    a.link(Some("x"), "b", None, None).unwrap();
    assert!(matches!(a.link(Some("x"), "c", None, None), Err(Error::Config(_))));
    f.route(None, "a", None).unwrap();
    assert!(matches!(f.route(None, "a", None), Err(Error::Config(_))));
    f.link(Some("out"), "a", None).unwrap();
    assert!(matches!(f.link(Some("out"), "a", None), Err(Error::Config(_))));
    env.shutdown(false).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_errors_go_to_sibling_handler() {
    let env = Env::create(EnvConfig::default()).await.unwrap();
    let f = env.flow("f").unwrap();
    let handler = Collector::new(CollectorConfig::default());
    let reports = handler.collection();
    f.task("error", TaskOptions::running(), move |_| Ok(handler))
        .await
        .unwrap();
    let bad = f
        .task("bad", TaskOptions::running(), |_| Ok(Failing))
        .await
        .unwrap();
    let wild = f
        .task("wild", TaskOptions::running(), |_| Ok(Panicking))
        .await
        .unwrap();

    bad.receive(None, Envelope::new(1)).await.unwrap();
    env.flush().await;
    wild.receive(None, Envelope::new(2)).await.unwrap();
    env.flush().await;

    let payloads = reports.payloads();
    assert_eq!(payloads.len(), 2);
    assert_eq!(payloads[0], Value::seq(["boom", ":f:bad"]));
    assert_eq!(payloads[1], Value::seq(["Panic: kaboom", ":f:wild"]));
    // Failing requests still count as performed.
    assert_eq!(bad.proc_count(), 1);
    assert_eq!(wild.proc_count(), 1);
    env.shutdown(true).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_handler_lookup_order() {
    let env = Env::create(EnvConfig::default()).await.unwrap();
    let outer = env.flow("outer").unwrap();
    let inner = outer.flow("inner").unwrap();
    let task = inner
        .task("t", TaskOptions::default(), |_| Ok(Relay))
        .await
        .unwrap();

    // Nothing in the flows: the environment default.
    assert_eq!(task.error_handler(), env.error_handler());
    assert_eq!(task.log(), env.log());

    // A sibling in an enclosing flow.
    let outer_error = outer
        .task("error", TaskOptions::default(), |_| {
            Ok(Collector::new(CollectorConfig::default()))
        })
        .await
        .unwrap();
    assert_eq!(task.error_handler(), Some(outer_error.clone()));
    // A task named `error` is not its own handler.
    assert_eq!(outer_error.error_handler(), env.error_handler());

    // A flow override wins over the enclosing sibling.
    let special = outer
        .task("special", TaskOptions::default(), |_| {
            Ok(Collector::new(CollectorConfig::default()))
        })
        .await
        .unwrap();
    inner.set_error_handler(Some(special.clone()));
    assert_eq!(task.error_handler(), Some(special.clone()));

    // The task override wins over everything.
    task.set_error_handler(Some(outer_error.clone()));
    assert_eq!(task.error_handler(), Some(outer_error));
    task.set_error_handler(None);
    assert_eq!(task.error_handler(), Some(special));
    env.shutdown(false).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_inline_errors_reach_inline_handler_from_spawned_sender() {
    let env = Env::create(EnvConfig::default()).await.unwrap();
    let f = env.flow("f").unwrap();
    let sink = Collector::new(CollectorConfig::default());
    let reports = sink.collection();
    f.task("sink", TaskOptions::running(), move |_| Ok(sink))
        .await
        .unwrap();
    let error = f
        .task("error", TaskOptions::running(), |_| Ok(Relay))
        .await
        .unwrap();
    error.link(None, "sink", None, None).unwrap();
    // No link: every request fails on the caller.
    let lost = f
        .task("lost", TaskOptions::running(), |_| Ok(Relay))
        .await
        .unwrap();

    let sender = lost.clone();
    tokio::spawn(async move { sender.receive(Some("go"), Envelope::new(1)).await })
        .await
        .unwrap()
        .unwrap();
    env.flush().await;

    assert_eq!(lost.proc_count(), 1);
    assert_eq!(error.proc_count(), 1);
    assert_eq!(
        reports.payloads(),
        vec![Value::seq(["No destination found for 'go'.", ":f:lost"])]
    );
    env.shutdown(true).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_sibling_handler_wins_over_flow_override() {
    let env = Env::create(EnvConfig::default()).await.unwrap();
    let f = env.flow("f").unwrap();
    let error = f
        .task("error", TaskOptions::default(), |_| {
            Ok(Collector::new(CollectorConfig::default()))
        })
        .await
        .unwrap();
    let other = f
        .task("other", TaskOptions::default(), |_| {
            Ok(Collector::new(CollectorConfig::default()))
        })
        .await
        .unwrap();
    f.set_error_handler(Some(other.clone()));
    let a = f.task("a", TaskOptions::default(), |_| Ok(Relay)).await.unwrap();

    assert_eq!(a.error_handler(), Some(error.clone()));
    assert_eq!(other.error_handler(), Some(error.clone()));
    // The `error` task skips itself and falls back to the override.
    assert_eq!(error.error_handler(), Some(other));
    env.shutdown(false).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_log_forwarding() {
    let env = Env::create(EnvConfig::default()).await.unwrap();
    let logs = env.flow("logs").unwrap();
    let sink = Collector::new(CollectorConfig::default());
    let entries = sink.collection();
    logs.task("sink", TaskOptions::running(), move |_| Ok(sink))
        .await
        .unwrap();
    env.log()
        .unwrap()
        .link(None, "sink", None, Some("logs"))
        .unwrap();

    let app = env.flow("app").unwrap();
    let task = app
        .task("t", TaskOptions::default(), |_| Ok(Relay))
        .await
        .unwrap();
    env.prepare().unwrap();

    task.info("below the level").await;
    task.warn("disk almost full").await;
    env.flush().await;
    assert_eq!(entries.payloads(), vec![Value::seq(["disk almost full", ":app:t"])]);

    entries.clear();
    env.set_log_level(flow::Severity::Debug).await.unwrap();
    task.debug("details").await;
    env.flush().await;
    assert_eq!(entries.payloads(), vec![Value::seq(["details", ":app:t"])]);
    env.shutdown(true).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_locate_and_describe() {
    let env = Env::create(EnvConfig::default()).await.unwrap();
    let f = env.flow("f").unwrap();
    let a = f.task("a", TaskOptions::default(), |_| Ok(Relay)).await.unwrap();
    f.task("b", TaskOptions::default(), |_| {
        Ok(Collector::new(CollectorConfig::default()))
    })
    .await
    .unwrap();
    let nested = f.flow("nested").unwrap();
    a.link(None, "b", Some("go"), None).unwrap();
    f.route(None, "a", None).unwrap();

    assert!(matches!(env.locate(":f:a"), Some(Node::Task(t)) if t == a));
    assert!(matches!(env.locate(":f:nested"), Some(Node::Flow(n)) if n == nested));
    assert!(matches!(f.locate("b"), Some(Node::Task(_))));
    assert!(env.locate(":f:a:deeper").is_none());
    assert!(matches!(f.locate(":f:a"), Some(Node::Task(t)) if t == a));
    assert!(f.locate(":f").is_none());
    assert!(f.locate(":g:a").is_none());
    assert!(nested.locate(":f:a").is_none());
    assert!(matches!(env.get_task(":f:b"), Ok(t) if t.name() == "b"));
    assert!(matches!(env.get_task(":f:nested"), Err(Error::NotFound(_))));
    assert_eq!(f.tasks().len(), 2);
    assert_eq!(f.task_count(), 3);

    assert_eq!(
        f.describe(0, 0),
        "f (Flow) {\n  a (Relay) {\n    * => :b:go\n  }\n  b (Collector) {\n  }\n  nested (Flow) {\n  }\n  in * => a:\n}"
    );
    env.shutdown(false).await;
}
