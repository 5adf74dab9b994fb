// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

use crate::{Behavior, Envelope, Error, Severity, Task, Value, hierarchy};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Settings of a [`Log`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Minimum severity written. The environment level when absent.
    pub severity: Option<Severity>,
}

/// Writes log requests to `tracing`.
///
/// The operation is the severity and the payload a `[message, origin]`
/// sequence. The `severity` operation changes the minimum severity written.
/// Entries are forwarded through the wildcard link when there is one.
#[derive(Clone, Debug)]
pub struct Log {
    severity: Severity,
}

impl Log {
    pub fn new(severity: Severity) -> Self {
        Self { severity }
    }

    pub fn from_config(config: &LogConfig, default: Severity) -> Self {
        Self::new(config.severity.unwrap_or(default))
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    fn set_severity(&mut self, value: &Value) -> Result<(), Error> {
        self.severity = match value {
            Value::Int(level) => u8::try_from(*level)
                .ok()
                .and_then(Severity::from_u8)
                .ok_or_else(|| Error::Config(format!("{} is not a severity", level)))?,
            other => other.to_string().parse()?,
        };
        Ok(())
    }

    /// Writes one entry when `level` passes the minimum severity.
    fn record(&self, level: Severity, entry: &Value) {
        if level < self.severity {
            return;
        }
        match entry.as_seq() {
            Some([message, origin, ..]) => {
                hierarchy::emit(level, &origin.to_string(), &message.to_string())
            }
            _ => hierarchy::emit(level, "", &entry.to_string()),
        }
    }
}

#[async_trait]
impl Behavior for Log {
    async fn perform(
        &mut self,
        task: &Task,
        op: Option<&str>,
        envelope: Envelope,
    ) -> Result<(), Error> {
        if op == Some("severity") {
            return self.set_severity(envelope.payload());
        }
        // Unknown operations are always written.
        let level = op
            .and_then(|op| op.parse::<Severity>().ok())
            .unwrap_or(Severity::Fatal);
        self.record(level, envelope.payload());
        if task.find_link(None).is_some() {
            task.ship(None, envelope).await?;
        }
        Ok(())
    }

    fn options(&self) -> Vec<(String, String)> {
        vec![("severity".to_owned(), self.severity.to_string())]
    }

    fn set_option(&mut self, key: &str, value: &str) -> Result<(), Error> {
        match key {
            "severity" => {
                self.severity = value.parse()?;
                Ok(())
            }
            _ => Err(Error::Config(format!("Unknown option '{}'.", key))),
        }
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn test_record_respects_severity() {
        let log = Log::new(Severity::Info);
        log.record(Severity::Warn, &Value::seq(["disk full", ":f:a"]));
        log.record(Severity::Debug, &Value::seq(["hidden detail", ":f:a"]));
        log.record(Severity::Error, &Value::from("plain entry"));
        assert!(logs_contain(":f:a> disk full"));
        assert!(!logs_contain("hidden detail"));
        assert!(logs_contain("> plain entry"));
    }

    #[test]
    fn test_set_severity() {
        let mut log = Log::from_config(&LogConfig::default(), Severity::Warn);
        assert_eq!(log.severity(), Severity::Warn);
        log.set_severity(&Value::from("debug")).unwrap();
        assert_eq!(log.severity(), Severity::Debug);
        log.set_severity(&Value::Int(3)).unwrap();
        assert_eq!(log.severity(), Severity::Error);
        assert!(log.set_severity(&Value::Int(9)).is_err());
        assert!(log.set_option("severity", "loud").is_err());
        log.set_option("severity", "FATAL").unwrap();
        assert_eq!(log.options(), vec![("severity".to_owned(), "fatal".to_owned())]);
    }

    #[test]
    fn test_config_rejects_unknown_keys() {
        let config: LogConfig = serde_json::from_str(r#"{"severity": "info"}"#).unwrap();
        assert_eq!(Log::from_config(&config, Severity::Warn).severity(), Severity::Info);
        assert!(serde_json::from_str::<LogConfig>(r#"{"level": "info"}"#).is_err());
    }
}
