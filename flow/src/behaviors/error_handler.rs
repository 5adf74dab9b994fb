// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

use crate::{Behavior, Envelope, Error, Severity, Task};

use async_trait::async_trait;

/// Turns error reports into log entries attributed to the failing task.
///
/// Reports are `[error, full name]` sequences, as sent by
/// [`Task::handle_error`]. Anything else is logged as is.
#[derive(Clone, Copy, Debug, Default)]
pub struct ErrorHandler;

#[async_trait]
impl Behavior for ErrorHandler {
    async fn perform(
        &mut self,
        task: &Task,
        _op: Option<&str>,
        envelope: Envelope,
    ) -> Result<(), Error> {
        let payload = envelope.payload();
        match payload.as_seq() {
            Some([error, origin, ..]) => {
                task.log_msg(Severity::Error, &error.to_string(), &origin.to_string())
                    .await
            }
            _ => task.error(&payload.to_string()).await,
        }
        Ok(())
    }

    fn with_own_worker(&self) -> bool {
        false
    }
}
