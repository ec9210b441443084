//! FIFO command queue.

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use super::notice::Notice;

/// Callback receiving a command's Notices: every "processing" update and
/// the terminal one.
pub type NoticeHandler = Box<dyn FnMut(&Notice) + Send + 'static>;

/// A queued command, with an optional handler for its Notices.
pub struct CommandEntry {
    command: String,
    handler: Option<NoticeHandler>,
}

impl CommandEntry {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            handler: None,
        }
    }

    pub fn with_handler(
        command: impl Into<String>,
        handler: impl FnMut(&Notice) + Send + 'static,
    ) -> Self {
        Self {
            command: command.into(),
            handler: Some(Box::new(handler)),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn into_parts(self) -> (String, Option<NoticeHandler>) {
        (self.command, self.handler)
    }

    /// Refuse the command, telling its handler with a `Failure` Notice.
    pub fn reject(self, output: &str) {
        let (command, handler) = self.into_parts();
        if let Some(mut handler) = handler {
            handler(&Notice::failure(command, Duration::ZERO, output));
        }
    }
}

impl fmt::Debug for CommandEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandEntry")
            .field("command", &self.command)
            .field("handler", &self.handler.as_ref().map(|_| "<NoticeHandler>"))
            .finish()
    }
}

impl From<&str> for CommandEntry {
    fn from(command: &str) -> Self {
        Self::new(command)
    }
}

impl From<String> for CommandEntry {
    fn from(command: String) -> Self {
        Self::new(command)
    }
}

/// Pending commands in the order they were queued.
#[derive(Debug, Default)]
pub struct CommandQueue {
    entries: VecDeque<CommandEntry>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: CommandEntry) {
        self.entries.push_back(entry);
    }

    pub fn pop(&mut self) -> Option<CommandEntry> {
        self.entries.pop_front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every pending command, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = CommandEntry> + '_ {
        self.entries.drain(..)
    }
}
