//! Events a session reports to its caller.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::mpsc;

use crate::engine::{Notice, Notices};
use crate::error::Error;

/// Where a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The SSH connection could not be established.
    Connection,

    /// No interactive shell could be allocated.
    Shell,

    /// Reading from or writing to the shell failed mid-session.
    Stream,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connection => "Connection",
            Self::Shell => "Shell",
            Self::Stream => "Stream",
        };
        f.write_str(name)
    }
}

/// Everything a session reports, in the order it happens.
#[derive(Debug)]
pub enum SessionEvent {
    /// The SSH connection is up and authenticated.
    Connect,

    /// The shell channel is allocated.
    Ready,

    /// Output arrived for a command that has not finished.
    CommandProcessing(Notice),

    /// A command finished and its exit status is known.
    CommandComplete(Notice),

    /// A command produced no output for the idle timeout and was
    /// interrupted.
    CommandTimeout(Notice),

    /// The shell ended; carries every terminal Notice of the session.
    End(Notices),

    /// The channel is closed. No events follow.
    Close { had_error: bool },

    /// Something failed. `close` tells whether the session is torn down.
    Error {
        error: Error,
        category: ErrorCategory,
        close: bool,
    },
}

impl SessionEvent {
    /// The Notice carried by command events.
    pub fn notice(&self) -> Option<&Notice> {
        match self {
            Self::CommandProcessing(n) | Self::CommandComplete(n) | Self::CommandTimeout(n) => Some(n),
            _ => None,
        }
    }

    /// Event name as used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Ready => "ready",
            Self::CommandProcessing(_) => "commandProcessing",
            Self::CommandComplete(_) => "commandComplete",
            Self::CommandTimeout(_) => "commandTimeout",
            Self::End(_) => "end",
            Self::Close { .. } => "close",
            Self::Error { .. } => "error",
        }
    }
}

pub(crate) type EventSender = mpsc::UnboundedSender<SessionEvent>;

/// Receiving side of a session's events.
///
/// Yields `None` once the session task has finished and every event
/// has been read.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl EventStream {
    pub(crate) fn channel() -> (EventSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }

    /// Wait for the next event.
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        self.rx.recv().await
    }

    /// Take an event if one is already waiting.
    pub fn try_recv(&mut self) -> Option<SessionEvent> {
        self.rx.try_recv().ok()
    }
}

impl Stream for EventStream {
    type Item = SessionEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio_test::task;
    use tokio_test::{assert_pending, assert_ready};

    use super::*;

    #[test]
    fn test_stream_preserves_order() {
        let (tx, events) = EventStream::channel();
        let mut events = task::spawn(events);

        assert_pending!(events.poll_next());

        tx.send(SessionEvent::Connect).unwrap();
        tx.send(SessionEvent::Ready).unwrap();
        assert!(events.is_woken());

        let first = assert_ready!(events.poll_next());
        assert!(matches!(first, Some(SessionEvent::Connect)));
        let second = assert_ready!(events.poll_next());
        assert!(matches!(second, Some(SessionEvent::Ready)));

        drop(tx);
        assert!(assert_ready!(events.poll_next()).is_none());
    }

    #[test]
    fn test_event_accessors() {
        let notice = Notice::processing("top", Duration::from_millis(5), "load");
        let event = SessionEvent::CommandProcessing(notice);
        assert_eq!(event.name(), "commandProcessing");
        assert_eq!(event.notice().map(|n| n.command.as_str()), Some("top"));
        assert!(SessionEvent::Close { had_error: false }.notice().is_none());
        assert_eq!(ErrorCategory::Stream.to_string(), "Stream");
    }
}
