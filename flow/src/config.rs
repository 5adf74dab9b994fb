// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Configuration
//!
//! Typed configuration for the environment and for tasks. Every struct
//! rejects unknown keys so a misspelled option fails loudly instead of being
//! ignored.
//!

use crate::{Error, TaskState};

use serde::{Deserialize, Serialize};

use std::{fmt, str::FromStr, time::Duration};

/// Log severity, ordered from the most to the least verbose.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug = 0,
    Info = 1,
    #[default]
    Warn = 2,
    Error = 3,
    Fatal = 4,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Debug,
        Severity::Info,
        Severity::Warn,
        Severity::Error,
        Severity::Fatal,
    ];

    /// Operation name used when a log request is sent to a log task.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        }
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    pub fn from_u8(level: u8) -> Option<Severity> {
        Severity::ALL.get(level as usize).copied()
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(level) = s.parse::<u8>() {
            return Severity::from_u8(level)
                .ok_or_else(|| Error::Config(format!("{} is not a severity", s)));
        }
        match s.to_lowercase().as_str() {
            "debug" => Ok(Severity::Debug),
            "info" => Ok(Severity::Info),
            "warn" | "warning" => Ok(Severity::Warn),
            "error" => Ok(Severity::Error),
            "fatal" => Ok(Severity::Fatal),
            _ => Err(Error::Config(format!("{} is not a severity", s))),
        }
    }
}

/// Environment wide settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnvConfig {
    /// Minimum severity forwarded to log tasks.
    pub log_level: Severity,
    /// Default time a sender waits for mailbox space before failing busy.
    pub request_timeout_ms: u64,
    /// Upper bound of a single idle wait of a worker.
    pub idle_wait_ms: u64,
    /// Default time `step` waits for the stepped request to finish.
    pub step_wait_ms: u64,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            log_level: Severity::Warn,
            request_timeout_ms: 0,
            idle_wait_ms: 1000,
            step_wait_ms: 5000,
        }
    }
}

impl EnvConfig {
    /// Parses a TOML document.
    ///
    /// ```ignore
    /// let config = EnvConfig::from_toml_str("log_level = \"info\"\nidle_wait_ms = 100")?;
    /// ```
    pub fn from_toml_str(source: &str) -> Result<Self, Error> {
        toml::from_str(source).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn idle_wait(&self) -> Duration {
        Duration::from_millis(self.idle_wait_ms.max(1))
    }

    pub fn step_wait(&self) -> Duration {
        Duration::from_millis(self.step_wait_ms)
    }
}

/// Options applied to a task when it is created.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TaskOptions {
    /// State the task enters once started. `Stopped` when absent.
    pub state: Option<TaskState>,
    /// Queue length at which senders start to wait. No limit when absent
    /// or zero.
    pub max_queue_count: Option<usize>,
    /// Overrides the environment request timeout.
    pub request_timeout_ms: Option<u64>,
}

impl TaskOptions {
    pub fn running() -> Self {
        Self::default().with_state(TaskState::Running)
    }

    pub fn with_state(mut self, state: TaskState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_max_queue_count(mut self, count: usize) -> Self {
        self.max_queue_count = Some(count);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }
}
