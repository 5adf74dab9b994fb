// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Mailbox
//!
//! Requests waiting for a task. The mailbox is a plain FIFO queue; locking,
//! capacity and wake ups are handled by the owning [`Task`](crate::Task).
//!

use crate::Envelope;

use std::collections::VecDeque;

/// One pending invocation of a behavior.
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    pub op: Option<String>,
    pub envelope: Envelope,
}

impl Request {
    pub fn new(op: Option<&str>, envelope: Envelope) -> Self {
        Self {
            op: op.map(str::to_owned),
            envelope,
        }
    }

    /// Summary used by `describe`. Higher detail adds the payload and then
    /// the tracker.
    pub fn describe(&self, detail: usize) -> String {
        let op = self.op.as_deref().unwrap_or("");
        if detail <= 2 {
            op.to_owned()
        } else if detail == 3 || self.envelope.tracker().is_none() {
            format!("{}({})", op, self.envelope.payload())
        } else {
            format!(
                "{}({}) {}",
                op,
                self.envelope.payload(),
                self.envelope.tracker().map(|t| t.to_string()).unwrap_or_default()
            )
        }
    }
}

/// FIFO queue of requests.
#[derive(Debug, Default)]
pub struct Mailbox {
    queue: VecDeque<Request>,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends at the back.
    pub fn push(&mut self, request: Request) {
        self.queue.push_back(request);
    }

    /// Takes the oldest request.
    pub fn pop(&mut self) -> Option<Request> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    /// Snapshot of the pending requests, oldest first.
    pub fn snapshot(&self) -> Vec<Request> {
        self.queue.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    use crate::{Tracker, Value};

    #[test]
    fn test_mailbox_is_fifo() {
        let mut mailbox = Mailbox::new();
        for i in 0..5 {
            mailbox.push(Request::new(Some("go"), Envelope::new(i)));
        }
        assert_eq!(mailbox.len(), 5);
        let order: Vec<Value> = std::iter::from_fn(|| mailbox.pop())
            .map(|r| r.envelope.into_payload())
            .collect();
        assert_eq!(order, (0..5).map(Value::from).collect::<Vec<_>>());
        assert!(mailbox.is_empty());
    }

    #[test]
    fn test_describe_request() {
        let plain = Request::new(Some("go"), Envelope::new(7));
        assert_eq!(plain.describe(1), "go");
        assert_eq!(plain.describe(3), "go(7)");
        assert_eq!(plain.describe(4), "go(7)");

        let tracked =
            Request::new(Some("go"), Envelope::with_tracker(7, Tracker::create("t", None)));
        assert!(tracked.describe(4).starts_with("go(7) Tracker{"));
    }
}
