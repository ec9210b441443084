//! Notice: the result record for one command execution.

use std::fmt;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Output carried by Notices the engine synthesizes when the channel is gone.
pub const CHANNEL_CLOSED: &str = "channel is closed";

/// Exit status of a command as far as the engine knows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitStatus {
    /// Still running, or the status probe has not answered yet.
    Pending,

    /// The shell reported this exit code.
    Exited(i32),

    /// The engine gave up on the command: it timed out, was rejected,
    /// or the session ended before it finished.
    Failure,

    /// The status probe answered with something that is not an integer.
    Unrecoverable(String),
}

impl ExitStatus {
    /// The exit code, when the shell reported one.
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Exited(code) => Some(*code),
            _ => None,
        }
    }

    /// True only for an exit code of zero.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Exited(0))
    }

    /// True once the status will no longer change.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Integer view: `-1` when unknown, `1` for engine failures.
    pub fn as_raw(&self) -> i32 {
        match self {
            Self::Pending | Self::Unrecoverable(_) => -1,
            Self::Exited(code) => *code,
            Self::Failure => 1,
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Exited(code) => write!(f, "exit {code}"),
            Self::Failure => write!(f, "failed"),
            Self::Unrecoverable(raw) => write!(f, "unrecoverable status {raw:?}"),
        }
    }
}

/// Progress or result of one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    /// The command text as it was queued.
    pub command: String,

    /// Exit status, `Pending` while the command is still running.
    pub status: ExitStatus,

    /// Time since the command was written to the shell.
    pub elapsed: Duration,

    /// Output with the echoed command line and the prompt removed.
    pub output: String,
}

impl Notice {
    pub fn new(
        command: impl Into<String>,
        status: ExitStatus,
        elapsed: Duration,
        output: impl Into<String>,
    ) -> Self {
        Self {
            command: command.into(),
            status,
            elapsed,
            output: output.into(),
        }
    }

    /// A Notice for output seen while the command is still running.
    pub fn processing(command: impl Into<String>, elapsed: Duration, output: impl Into<String>) -> Self {
        Self::new(command, ExitStatus::Pending, elapsed, output)
    }

    /// A Notice the engine produced because it gave up on the command.
    pub fn failure(command: impl Into<String>, elapsed: Duration, output: impl Into<String>) -> Self {
        Self::new(command, ExitStatus::Failure, elapsed, output)
    }

    /// The Notice handed to commands that cannot be queued any more.
    pub fn channel_closed(command: impl Into<String>) -> Self {
        Self::failure(command, Duration::ZERO, CHANNEL_CLOSED)
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Get the output lines as an iterator.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.output.lines()
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.output)
    }
}

/// Every terminal Notice of a session, in execution order.
///
/// Repeated runs of the same command each keep their own entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notices(Vec<Notice>);

impl Notices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, notice: Notice) {
        self.0.push(notice);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Notice> {
        self.0.iter()
    }

    pub fn last(&self) -> Option<&Notice> {
        self.0.last()
    }

    /// Map view keyed by command text. A command that ran more than once
    /// maps to its latest run, in the position of its first run.
    pub fn by_command(&self) -> IndexMap<&str, &Notice> {
        let mut map = IndexMap::with_capacity(self.0.len());
        for notice in &self.0 {
            map.insert(notice.command.as_str(), notice);
        }
        map
    }

    pub fn into_vec(self) -> Vec<Notice> {
        self.0
    }
}

impl IntoIterator for Notices {
    type Item = Notice;
    type IntoIter = std::vec::IntoIter<Notice>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Notices {
    type Item = &'a Notice;
    type IntoIter = std::slice::Iter<'a, Notice>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
