//! Shell session behavior settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};

/// How the engine runs commands on the shell.
///
/// Durations are read and written as milliseconds. The option names used
/// by older configuration files (`idleTimeOut`, `idleCommandTimeOut`,
/// `exitCommands`) are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// How long a command may go without output before it is interrupted.
    #[serde(alias = "idleTimeOut", with = "millis")]
    pub idle_timeout: Duration,

    /// How often an idle keep-alive session re-checks its queue.
    #[serde(alias = "idleCommandTimeOut", with = "millis")]
    pub keepalive_interval: Duration,

    /// Stay open when the queue runs empty instead of exiting.
    pub keep_alive: bool,

    /// Commands written just before `exit`, last one first.
    #[serde(alias = "exitCommands")]
    pub exit_commands: Vec<String>,

    /// Commands queued when the session starts.
    pub commands: Vec<String>,

    /// Pause after installing the prompt before the first command.
    #[serde(with = "millis")]
    pub settle_delay: Duration,

    /// Bytes at the end of the output searched for the prompt.
    pub search_depth: usize,

    /// Fixed prompt marker; a random one is generated when unset.
    pub sentinel: Option<String>,

    /// Log command lifecycle at `info` instead of `debug`.
    pub verbose: bool,

    /// Log raw channel data at `trace`.
    pub debug: bool,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_millis(5000),
            keepalive_interval: Duration::from_millis(100),
            keep_alive: false,
            exit_commands: Vec::new(),
            commands: Vec::new(),
            settle_delay: Duration::from_secs(1),
            search_depth: 1000,
            sentinel: None,
            verbose: false,
            debug: false,
        }
    }
}

impl ShellConfig {
    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.idle_timeout.is_zero() {
            return Err(invalid("idle_timeout must be greater than zero"));
        }
        if self.keep_alive && self.keepalive_interval.is_zero() {
            return Err(invalid("keepalive_interval must be greater than zero"));
        }
        if self.search_depth == 0 {
            return Err(invalid("search_depth must be greater than zero"));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> crate::error::Error {
    SessionError::InvalidConfig {
        message: message.to_string(),
    }
    .into()
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ShellConfig::default();
        assert_eq!(config.idle_timeout, Duration::from_millis(5000));
        assert_eq!(config.keepalive_interval, Duration::from_millis(100));
        assert!(!config.keep_alive);
        assert!(config.exit_commands.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_legacy_option_names() {
        let config: ShellConfig = serde_json::from_str(
            r#"{
                "idleTimeOut": 200,
                "idleCommandTimeOut": 50,
                "keep_alive": true,
                "exitCommands": ["logout"],
                "commands": ["echo $(pwd)", "echo test"]
            }"#,
        )
        .unwrap();

        assert_eq!(config.idle_timeout, Duration::from_millis(200));
        assert_eq!(config.keepalive_interval, Duration::from_millis(50));
        assert!(config.keep_alive);
        assert_eq!(config.exit_commands, vec!["logout"]);
        assert_eq!(config.commands.len(), 2);
        assert_eq!(config.settle_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_round_trip_uses_millis() {
        let config = ShellConfig {
            idle_timeout: Duration::from_millis(1500),
            ..Default::default()
        };
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["idle_timeout"], 1500);
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = ShellConfig {
            idle_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ShellConfig {
            keep_alive: true,
            keepalive_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
