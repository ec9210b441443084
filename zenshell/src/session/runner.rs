//! The session task: drives a [`ShellEngine`] against a live channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use log::{debug, trace, warn};
use tokio::sync::mpsc;

use crate::channel::{ChannelEvent, ShellChannel};
use crate::engine::{CHANNEL_CLOSED, CommandEntry, Effect, ShellEngine};
use crate::error::Error;
use crate::event::{ErrorCategory, EventSender, SessionEvent};
use crate::transport::{SshConfig, SshTransport};

/// What a [`SessionHandle`](super::SessionHandle) asks of the session task.
#[derive(Debug)]
pub(crate) enum Request {
    Exec(CommandEntry),
    End,
}

/// Shared state between the session task and its handles.
pub(crate) struct Link {
    pub requests: mpsc::UnboundedReceiver<Request>,
    pub events: EventSender,
    pub writable: Arc<AtomicBool>,
}

/// Connect over SSH, open the shell and run the session to completion.
pub(crate) async fn run_ssh(config: SshConfig, engine: ShellEngine, link: Link) {
    let transport = match SshTransport::connect(config).await {
        Ok(transport) => transport,
        Err(error) => return fail(link, error, ErrorCategory::Connection),
    };
    let _ = link.events.send(SessionEvent::Connect);

    let channel = match transport.open_shell().await {
        Ok(channel) => channel,
        Err(error) => {
            if let Err(e) = transport.close().await {
                debug!("disconnect after shell failure: {}", e);
            }
            return fail(link, error, ErrorCategory::Shell);
        }
    };
    let _ = link.events.send(SessionEvent::Ready);

    run_shell(channel, engine, link).await;

    if let Err(e) = transport.close().await {
        warn!("disconnect failed: {}", e);
    }
}

/// The session never got a shell: report and refuse everything queued.
fn fail(mut link: Link, error: Error, category: ErrorCategory) {
    warn!("{} failure: {}", category, error);
    link.writable.store(false, Ordering::Release);
    let _ = link.events.send(SessionEvent::Error {
        error,
        category,
        close: true,
    });
    let _ = link.events.send(SessionEvent::Close { had_error: true });
    reject_pending(&mut link.requests);
}

/// Run the engine on an open shell channel until the channel closes.
pub(crate) async fn run_shell<C: ShellChannel>(mut channel: C, mut engine: ShellEngine, link: Link) {
    let Link {
        mut requests,
        events,
        writable,
    } = link;
    let mut broken = false;
    let mut handles_open = true;

    engine.start(Instant::now());
    flush(&mut channel, &mut engine, &events, &mut broken).await;

    while !engine.is_closed() {
        writable.store(engine.is_writable(), Ordering::Release);
        let accepting = engine.is_writable() && handles_open;
        let idle = engine.idle_deadline();
        let keepalive = engine.keepalive_deadline();

        // Requests before channel data: a command sent before the shell
        // answers must be queued before the queue can run empty
        tokio::select! {
            biased;

            request = requests.recv(), if accepting => match request {
                Some(Request::Exec(entry)) => {
                    if engine.enqueue(entry) {
                        trace!("{} command(s) waiting", engine.queued());
                    }
                }
                Some(Request::End) => {
                    engine.terminate();
                }
                None => {
                    debug!("every session handle dropped");
                    handles_open = false;
                    engine.release();
                }
            },
            event = channel.recv() => {
                let now = Instant::now();
                match event {
                    Some(ChannelEvent::Data(data)) => engine.on_data(&data, now),
                    Some(ChannelEvent::Eof) => engine.on_eof(now),
                    Some(ChannelEvent::Closed) | None => engine.on_close(false, now),
                }
            }
            _ = sleep_until(idle) => engine.on_idle_timeout(Instant::now()),
            _ = sleep_until(keepalive) => engine.on_keepalive(Instant::now()),
        }

        // Handles must see a terminate before its writes are awaited
        writable.store(engine.is_writable(), Ordering::Release);
        flush(&mut channel, &mut engine, &events, &mut broken).await;
    }

    writable.store(false, Ordering::Release);
    reject_pending(&mut requests);
    trace!("session task finished");
}

/// Carry out the engine's effects in order, including any produced while
/// doing so.
async fn flush<C: ShellChannel>(
    channel: &mut C,
    engine: &mut ShellEngine,
    events: &EventSender,
    broken: &mut bool,
) {
    loop {
        let effects = engine.take_effects();
        if effects.is_empty() {
            return;
        }

        for effect in effects {
            let result = match effect {
                Effect::Emit(event) => {
                    // The caller may have dropped the stream; the session runs on
                    let _ = events.send(event);
                    continue;
                }
                _ if *broken => continue,
                Effect::Write(data) => channel.write(&data).await,
                Effect::CloseWrite => channel.close_write().await,
            };
            if let Err(error) = result {
                *broken = true;
                engine.on_stream_error(error, Instant::now());
            }
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending().await,
    }
}

fn reject_pending(requests: &mut mpsc::UnboundedReceiver<Request>) {
    requests.close();
    while let Ok(request) = requests.try_recv() {
        if let Request::Exec(entry) = request {
            debug!("refusing {:?}: {}", entry.command(), CHANNEL_CLOSED);
            entry.reject(CHANNEL_CLOSED);
        }
    }
}
