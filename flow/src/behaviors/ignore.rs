// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

use crate::{Behavior, Envelope, Error, Task};

use async_trait::async_trait;

/// Drops every request.
#[derive(Clone, Copy, Debug, Default)]
pub struct Ignore;

#[async_trait]
impl Behavior for Ignore {
    async fn perform(
        &mut self,
        _task: &Task,
        _op: Option<&str>,
        _envelope: Envelope,
    ) -> Result<(), Error> {
        Ok(())
    }

    fn with_own_worker(&self) -> bool {
        false
    }
}
