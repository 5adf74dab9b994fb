// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

use crate::{Behavior, Envelope, Error, Task, Value};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use std::sync::Arc;

/// Settings of a [`Collector`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CollectorConfig {
    /// Keeps only the most recent entries when set.
    pub limit: Option<usize>,
    /// Ships every entry on through the wildcard link.
    pub forward: bool,
}

/// One collected request.
#[derive(Clone, Debug, PartialEq)]
pub struct Collected {
    pub op: Option<String>,
    pub envelope: Envelope,
}

/// Shared view of what a [`Collector`] received.
#[derive(Clone, Debug, Default)]
pub struct Collection {
    entries: Arc<Mutex<Vec<Collected>>>,
}

impl Collection {
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn entries(&self) -> Vec<Collected> {
        self.entries.lock().clone()
    }

    pub fn payloads(&self) -> Vec<Value> {
        self.entries
            .lock()
            .iter()
            .map(|c| c.envelope.payload().clone())
            .collect()
    }

    pub fn ops(&self) -> Vec<Option<String>> {
        self.entries.lock().iter().map(|c| c.op.clone()).collect()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

/// In-memory sink. Keeps every request it performs in a [`Collection`].
#[derive(Debug, Default)]
pub struct Collector {
    config: CollectorConfig,
    collection: Collection,
}

impl Collector {
    pub fn new(config: CollectorConfig) -> Self {
        Self {
            config,
            collection: Collection::default(),
        }
    }

    /// Handle to the collected entries, usable after the collector has been
    /// handed to a task.
    pub fn collection(&self) -> Collection {
        self.collection.clone()
    }
}

#[async_trait]
impl Behavior for Collector {
    async fn perform(
        &mut self,
        task: &Task,
        op: Option<&str>,
        envelope: Envelope,
    ) -> Result<(), Error> {
        {
            let mut entries = self.collection.entries.lock();
            entries.push(Collected {
                op: op.map(str::to_owned),
                envelope: envelope.clone(),
            });
            if let Some(limit) = self.config.limit {
                let excess = entries.len().saturating_sub(limit);
                entries.drain(..excess);
            }
        }
        if self.config.forward {
            task.ship(None, envelope).await?;
        }
        Ok(())
    }

    fn options(&self) -> Vec<(String, String)> {
        vec![
            (
                "limit".to_owned(),
                self.config
                    .limit
                    .map(|l| l.to_string())
                    .unwrap_or_else(|| "none".to_owned()),
            ),
            ("forward".to_owned(), self.config.forward.to_string()),
        ]
    }
}
