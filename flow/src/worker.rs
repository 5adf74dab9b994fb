// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Task worker
//!
//! Each task that asks for one gets a worker: a tokio task that takes
//! requests from the mailbox, one at a time, and performs them. The worker
//! only holds a weak reference to its task, so dropping every handle to a
//! task also ends its worker.
//!
//! The worker never waits in the middle of a request. When there is nothing
//! to do it parks on the wake signal with a bounded timeout.
//!

use crate::{
    Task,
    task::{Next, Signals, TaskInner},
};

use tokio::{task::JoinHandle, time::timeout};
use tracing::debug;

use std::{
    sync::{Arc, Weak},
    time::Duration,
};

/// Starts the worker of `task`.
pub(crate) fn spawn(task: &Task) -> JoinHandle<()> {
    let weak = task.downgrade();
    let signals = task.signals();
    let idle_wait = task.idle_wait();
    tokio::spawn(run(weak, signals, idle_wait))
}

async fn run(weak: Weak<TaskInner>, signals: Arc<Signals>, idle_wait: Duration) {
    debug!("Worker started.");
    loop {
        let Some(inner) = weak.upgrade() else {
            debug!("Task dropped, worker exits.");
            break;
        };
        let task = Task::from_inner(inner);
        match task.next() {
            Next::Exit => {
                debug!("Task {} closing, worker exits.", task);
                break;
            }
            Next::Perform(request) => {
                task.process(request).await;
            }
            Next::Idle => {
                drop(task);
                signals.idle.notify_waiters();
                let _ = timeout(idle_wait, signals.wake.notified()).await;
            }
        }
    }
    signals.idle.notify_waiters();
}
