// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

use crate::{Behavior, Envelope, Error, Segment, Spec, Task, Tracker, Value, parse_path};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use std::collections::HashMap;

/// Settings of a [`Merger`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MergerConfig {
    /// Payload path whose value groups envelopes. Envelopes are grouped by
    /// tracker id when absent.
    pub match_path: Option<String>,
    /// Number of envelopes merged into one.
    pub count: usize,
}

impl Default for MergerConfig {
    fn default() -> Self {
        Self {
            match_path: None,
            count: 2,
        }
    }
}

/// Joins envelopes that belong together.
///
/// Once `count` envelopes with the same key arrived, their payloads are
/// shipped as one sequence through the wildcard link, carrying the merge of
/// their trackers.
#[derive(Debug, Default)]
pub struct Merger {
    count: usize,
    path: Option<Vec<Segment>>,
    waiting: HashMap<Option<String>, Vec<Envelope>>,
}

impl Merger {
    pub fn new(config: MergerConfig) -> Self {
        Self {
            count: config.count.max(1),
            path: config.match_path.as_deref().map(parse_path),
            waiting: HashMap::new(),
        }
    }

    /// Number of envelopes waiting for partners.
    pub fn waiting(&self) -> usize {
        self.waiting.values().map(Vec::len).sum()
    }

    fn key(&self, envelope: &Envelope) -> Option<String> {
        match &self.path {
            Some(path) => envelope.get(path).map(Value::to_string),
            None => envelope.tracker().map(|t| t.id().to_owned()),
        }
    }

    /// Adds `envelope` to its group and returns the group once complete.
    fn collect(&mut self, envelope: Envelope) -> Option<Vec<Envelope>> {
        let key = self.key(&envelope);
        let group = self.waiting.entry(key.clone()).or_default();
        group.push(envelope);
        if group.len() < self.count {
            return None;
        }
        self.waiting.remove(&key)
    }
}

fn merge(group: Vec<Envelope>) -> Result<Envelope, Error> {
    let mut tracker: Option<Tracker> = None;
    for envelope in &group {
        if let Some(other) = envelope.tracker() {
            tracker = Some(match tracker {
                None => other.clone(),
                Some(current) => current.merge(other)?,
            });
        }
    }
    let payload = Value::seq(group.iter().map(|e| e.payload().clone()));
    Ok(match tracker {
        Some(tracker) => Envelope::with_tracker(payload, tracker),
        None => Envelope::new(payload),
    })
}

#[async_trait]
impl Behavior for Merger {
    async fn perform(
        &mut self,
        task: &Task,
        _op: Option<&str>,
        envelope: Envelope,
    ) -> Result<(), Error> {
        let Some(group) = self.collect(envelope) else {
            return Ok(());
        };
        task.ship(None, merge(group)?).await
    }

    fn outputs(&self) -> Option<Vec<Spec>> {
        Some(vec![Spec::new(None, "Seq")])
    }

    fn options(&self) -> Vec<(String, String)> {
        vec![("count".to_owned(), self.count.to_string())]
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_groups_by_tracker() {
        let mut merger = Merger::new(MergerConfig::default());
        let root = Tracker::create("split", None);
        let left = Envelope::with_tracker(1, root.receive("left", None).receive("join", None));
        let right = Envelope::with_tracker(2, root.receive("right", None).receive("join", None));
        let stranger = Envelope::with_tracker(3, Tracker::create("other", None));

        assert!(merger.collect(left).is_none());
        assert!(merger.collect(stranger).is_none());
        let group = merger.collect(right).unwrap();
        assert_eq!(merger.waiting(), 1);

        let merged = merge(group).unwrap();
        assert_eq!(merged.payload(), &Value::seq([1, 2]));
        let track = merged.tracker().unwrap().track();
        assert_eq!(track.len(), 3);
        assert!(matches!(track[1], crate::TrackEntry::Branch(..)));
    }

    #[test]
    fn test_groups_by_path() {
        let mut merger = Merger::new(MergerConfig {
            match_path: Some("order.id".to_owned()),
            count: 3,
        });
        let item = |id: i64, n: i64| {
            Envelope::new(Value::map([("order", Value::map([("id", id)])), ("n", Value::from(n))]))
        };
        assert!(merger.collect(item(1, 1)).is_none());
        assert!(merger.collect(item(2, 1)).is_none());
        assert!(merger.collect(item(1, 2)).is_none());
        let group = merger.collect(item(1, 3)).unwrap();
        assert_eq!(group.len(), 3);
        let merged = merge(group).unwrap();
        assert!(merged.tracker().is_none());
        assert_eq!(merged.get(&parse_path("2.n")), Some(&Value::Int(3)));
    }

    #[test]
    fn test_config_defaults() {
        let config: MergerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, MergerConfig::default());
        assert!(serde_json::from_str::<MergerConfig>(r#"{"cnt": 2}"#).is_err());
    }
}
