//! Caller-side handle to a running session.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;
use tokio::sync::mpsc;

use super::runner::Request;
use crate::engine::{CHANNEL_CLOSED, CommandEntry, Notice};

/// Queues commands on a session and ends it.
///
/// Cheap to clone; every clone talks to the same session. Dropping all
/// handles ends the session once its queue has run.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    requests: mpsc::UnboundedSender<Request>,
    writable: Arc<AtomicBool>,
}

impl SessionHandle {
    pub(crate) fn new(requests: mpsc::UnboundedSender<Request>, writable: Arc<AtomicBool>) -> Self {
        Self { requests, writable }
    }

    /// Queue a command. Its Notices arrive on the event stream only.
    ///
    /// Returns `false` when the session no longer accepts commands.
    pub fn exec(&self, command: impl Into<String>) -> bool {
        self.submit(CommandEntry::new(command))
    }

    /// Queue a command and receive its Notices in `handler` as well.
    ///
    /// When the session no longer accepts commands the handler is called
    /// before this returns, with a `Failure` Notice whose output is
    /// [`CHANNEL_CLOSED`].
    pub fn exec_with<F>(&self, command: impl Into<String>, handler: F) -> bool
    where
        F: FnMut(&Notice) + Send + 'static,
    {
        self.submit(CommandEntry::with_handler(command, handler))
    }

    /// Send the exit sequence and close the write side.
    ///
    /// The command in flight and any still queued get `Failure` Notices
    /// when the shell ends.
    pub fn end(&self) -> bool {
        self.is_writable() && self.requests.send(Request::End).is_ok()
    }

    /// Whether the session still accepts commands.
    pub fn is_writable(&self) -> bool {
        self.writable.load(Ordering::Acquire) && !self.requests.is_closed()
    }

    fn submit(&self, entry: CommandEntry) -> bool {
        if !self.is_writable() {
            debug!("refusing {:?}: {}", entry.command(), CHANNEL_CLOSED);
            entry.reject(CHANNEL_CLOSED);
            return false;
        }
        match self.requests.send(Request::Exec(entry)) {
            Ok(()) => true,
            Err(mpsc::error::SendError(request)) => {
                if let Request::Exec(entry) = request {
                    entry.reject(CHANNEL_CLOSED);
                }
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::engine::ExitStatus;

    fn handle() -> (SessionHandle, mpsc::UnboundedReceiver<Request>, Arc<AtomicBool>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let writable = Arc::new(AtomicBool::new(true));
        (SessionHandle::new(tx, writable.clone()), rx, writable)
    }

    #[test]
    fn test_exec_forwards_request() {
        let (handle, mut rx, _) = handle();
        assert!(handle.exec("hostname"));
        assert!(handle.end());

        match rx.try_recv().unwrap() {
            Request::Exec(entry) => assert_eq!(entry.command(), "hostname"),
            other => panic!("unexpected request: {other:?}"),
        }
        assert!(matches!(rx.try_recv().unwrap(), Request::End));
    }

    #[test]
    fn test_exec_on_closed_session_rejects_synchronously() {
        let (handle, _rx, writable) = handle();
        writable.store(false, Ordering::Release);

        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        let accepted = handle.exec_with("ls", move |n: &Notice| {
            *sink.lock().unwrap() = Some(n.clone());
        });

        assert!(!accepted);
        let notice = seen.lock().unwrap().take().unwrap();
        assert_eq!(notice.status, ExitStatus::Failure);
        assert_eq!(notice.output, CHANNEL_CLOSED);
        assert!(!handle.end());
    }

    #[test]
    fn test_exec_after_task_gone() {
        let (handle, rx, _) = handle();
        drop(rx);

        let called = Arc::new(AtomicBool::new(false));
        let flag = called.clone();
        assert!(!handle.exec_with("ls", move |_| flag.store(true, Ordering::SeqCst)));
        assert!(called.load(Ordering::SeqCst));
    }
}
