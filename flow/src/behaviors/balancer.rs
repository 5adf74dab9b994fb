// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

use crate::{Behavior, Envelope, Error, Task};

use async_trait::async_trait;

use std::collections::HashMap;

/// Ships each request to the least backed up link target. Ties go to the
/// target called least recently.
#[derive(Debug, Default)]
pub struct Balancer {
    calls: u64,
    last_called: HashMap<Option<String>, u64>,
}

impl Balancer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Behavior for Balancer {
    async fn perform(
        &mut self,
        task: &Task,
        _op: Option<&str>,
        envelope: Envelope,
    ) -> Result<(), Error> {
        let mut best: Option<(Option<String>, usize, u64)> = None;
        for (label, link) in task.links() {
            let Some(target) = task.resolve_link(&link) else {
                continue;
            };
            let score = target.backed_up();
            let order = self.last_called.get(&label).copied().unwrap_or(0);
            let better = match &best {
                None => true,
                Some((_, best_score, best_order)) => {
                    score < *best_score || (score == *best_score && order < *best_order)
                }
            };
            if better {
                best = Some((label, score, order));
            }
        }
        let Some((label, ..)) = best else {
            return Err(Error::NoLink("*".to_owned()));
        };
        self.calls += 1;
        self.last_called.insert(label.clone(), self.calls);
        task.ship(label.as_deref(), envelope).await
    }
}
