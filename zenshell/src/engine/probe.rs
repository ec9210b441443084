//! Status capture: the follow-up command that reads `$?`.
//!
//! The shell only reports a command's exit code when asked, and only
//! until the next command runs. After every user command the engine
//! writes [`STATUS_PROBE`], parses the answer and folds it into the
//! Notice of the command it measured.

use std::time::Duration;

use super::notice::{ExitStatus, Notice};
use super::queue::NoticeHandler;

/// The command that prints the previous exit status.
pub const STATUS_PROBE: &str = "echo $?";

/// Parse the probe's output.
///
/// Anything but a single integer is reported as
/// [`ExitStatus::Unrecoverable`] so a caller can tell "ran and failed"
/// from "status unknown".
pub fn parse_status(output: &str) -> ExitStatus {
    let raw = output.trim();
    match raw.parse::<i32>() {
        Ok(code) => ExitStatus::Exited(code),
        Err(_) => ExitStatus::Unrecoverable(raw.to_string()),
    }
}

/// A finished command waiting for its status.
pub struct Origin {
    pub command: String,
    pub output: String,
    pub elapsed: Duration,
    pub handler: Option<NoticeHandler>,
    /// The idle timeout already delivered this command's terminal Notice.
    pub timed_out: bool,
}

impl Origin {
    /// The terminal Notice, once the probe has answered.
    pub fn notice(&self, status: ExitStatus) -> Notice {
        Notice::new(self.command.clone(), status, self.elapsed, self.output.clone())
    }
}
