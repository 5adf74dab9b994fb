// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Envelope
//!
//! An `Envelope` is the message shipped between tasks: a [`Value`] payload and
//! an optional [`Tracker`]. Envelopes are values. Reading goes through
//! [`Envelope::get`], "changing" one through [`Envelope::set`], which returns
//! a new envelope sharing every untouched part of the payload.
//!
//! A task freezes every envelope right before it leaves through a link.
//! Frozen envelopes refuse in-place mutation; [`Envelope::thaw`] hands back an
//! unshared, mutable copy.
//!

use crate::{Error, Segment, Tracker, Value};

use std::{fmt, sync::Arc};

/// Immutable message envelope.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Envelope {
    payload: Value,
    tracker: Option<Arc<Tracker>>,
    frozen: bool,
}

impl Envelope {
    /// Wraps `payload` without a tracker.
    pub fn new(payload: impl Into<Value>) -> Self {
        Self {
            payload: payload.into(),
            tracker: None,
            frozen: false,
        }
    }

    /// Wraps `payload` with a tracker attached.
    pub fn with_tracker(payload: impl Into<Value>, tracker: Tracker) -> Self {
        Self {
            payload: payload.into(),
            tracker: Some(Arc::new(tracker)),
            frozen: false,
        }
    }

    /// New envelope with `payload` and the tracker of this one.
    pub fn spawn(&self, payload: impl Into<Value>) -> Self {
        Self {
            payload: payload.into(),
            tracker: self.tracker.clone(),
            frozen: false,
        }
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn into_payload(self) -> Value {
        self.payload
    }

    pub fn tracker(&self) -> Option<&Tracker> {
        self.tracker.as_deref()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Value at `path`, `None` when any segment is missing.
    pub fn get(&self, path: &[Segment]) -> Option<&Value> {
        self.payload.get(path)
    }

    /// New envelope with `value` at `path`. The result is not frozen and keeps
    /// the tracker.
    pub fn set(&self, path: &[Segment], value: impl Into<Value>) -> Result<Envelope, Error> {
        Ok(Self {
            payload: self.payload.set(path, value.into())?,
            tracker: self.tracker.clone(),
            frozen: false,
        })
    }

    /// Same payload, tracker extended with a stamp for `location`.
    pub fn receive(&self, location: &str, op: Option<&str>) -> Envelope {
        match &self.tracker {
            None => self.clone(),
            Some(tracker) => Self {
                payload: self.payload.clone(),
                tracker: Some(Arc::new(tracker.receive(location, op))),
                frozen: self.frozen,
            },
        }
    }

    /// Marks the envelope read-only.
    pub fn freeze(mut self) -> Envelope {
        self.frozen = true;
        self
    }

    /// Deep, unshared copy of the payload, same tracker.
    pub fn thaw(&self) -> Envelope {
        Self {
            payload: self.payload.deep_copy(),
            tracker: self.tracker.clone(),
            frozen: false,
        }
    }

    /// In-place access to the payload of a thawed envelope.
    pub fn payload_mut(&mut self) -> Result<&mut Value, Error> {
        if self.frozen {
            return Err(Error::Frozen(format!("{} is frozen", self.payload)));
        }
        Ok(&mut self.payload)
    }

    /// In-place access to the value at `path` of a thawed envelope.
    pub fn get_mut(&mut self, path: &[Segment]) -> Result<Option<&mut Value>, Error> {
        Ok(self.payload_mut()?.get_mut(path))
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tracker {
            Some(tracker) => write!(f, "Envelope{{{}, tracker: {}}}", self.payload, tracker),
            None => write!(f, "Envelope{{{}}}", self.payload),
        }
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    use crate::parse_path;

    use serde_json::json;

    fn sample() -> Envelope {
        Envelope::new(Value::from(json!({"a": [1, "first"], "b": true, "c": {"d": 1}})))
    }

    #[test]
    fn test_set_get() {
        let envelope = sample();
        let path = parse_path("c.d");
        let updated = envelope.set(&path, 2).unwrap();
        assert_eq!(updated.get(&path), Some(&Value::Int(2)));
        assert_eq!(envelope.get(&path), Some(&Value::Int(1)));
        let other = parse_path("a");
        assert_eq!(updated.get(&other), envelope.get(&other));
        assert!(updated
            .get(&other)
            .unwrap()
            .ptr_eq(envelope.get(&other).unwrap()));
    }

    #[test]
    fn test_get_missing() {
        let envelope = sample();
        assert_eq!(envelope.get(&parse_path("a.9")), None);
        assert_eq!(envelope.get(&parse_path("b.c")), None);
        assert_eq!(envelope.get(&parse_path("z")), None);
    }

    #[test]
    fn test_freeze_thaw() {
        let frozen = sample().freeze();
        assert!(frozen.is_frozen());
        let mut thawed = frozen.thaw();
        assert!(!thawed.is_frozen());
        for path in ["a", "a.0", "a.1", "b", "c.d"] {
            let path = parse_path(path);
            assert_eq!(thawed.get(&path), frozen.get(&path));
        }
        *thawed.get_mut(&parse_path("c.d")).unwrap().unwrap() = Value::Int(9);
        assert_eq!(thawed.get(&parse_path("c.d")), Some(&Value::Int(9)));
        assert_eq!(frozen.get(&parse_path("c.d")), Some(&Value::Int(1)));
        let changed = thawed.set(&parse_path("b"), false).unwrap();
        assert_eq!(frozen.get(&parse_path("b")), Some(&Value::Bool(true)));
        assert_eq!(changed.get(&parse_path("b")), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_frozen_refuses_mutation() {
        let mut frozen = sample().freeze();
        assert!(matches!(frozen.payload_mut(), Err(Error::Frozen(_))));
    }

    #[test]
    fn test_receive() {
        let plain = Envelope::new(5);
        assert_eq!(plain.receive(":f:a", Some("go")), plain);

        let tracked = Envelope::with_tracker(5, Tracker::create("test", None));
        let received = tracked.receive(":f:a", Some("go"));
        assert_eq!(received.payload(), tracked.payload());
        assert_eq!(
            received.tracker().unwrap().sites(),
            vec!["test-".to_owned(), ":f:a-go".to_owned()]
        );
        assert_eq!(tracked.tracker().unwrap().track().len(), 1);
    }

    #[test]
    fn test_spawn_keeps_tracker() {
        let tracked = Envelope::with_tracker(5, Tracker::create("test", None));
        let spawned = tracked.spawn("other");
        assert_eq!(spawned.payload(), &Value::from("other"));
        assert_eq!(spawned.tracker(), tracked.tracker());
    }
}
