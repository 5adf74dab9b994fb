// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

use crate::{Behavior, Envelope, Error, Task};

use async_trait::async_trait;

/// Ships every request through the link named after its operation. Runs on
/// the caller.
#[derive(Clone, Copy, Debug, Default)]
pub struct Relay;

#[async_trait]
impl Behavior for Relay {
    async fn perform(
        &mut self,
        task: &Task,
        op: Option<&str>,
        envelope: Envelope,
    ) -> Result<(), Error> {
        task.ship(op, envelope).await
    }

    fn with_own_worker(&self) -> bool {
        false
    }
}
