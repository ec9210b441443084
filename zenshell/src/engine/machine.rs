//! The command execution state machine.
//!
//! [`ShellEngine`] holds all protocol state of one session: the output
//! buffer, the command queue, the command in flight and both timers. It
//! performs no I/O. Every input (channel data, timer expiry, caller
//! request) is a method call that runs to completion and leaves
//! [`Effect`]s behind for the session loop to carry out in order.
//!
//! One step of a command looks like this on the wire:
//!
//! ```text
//! -> uname -s\n
//! <- uname -s\r\nLinux\r\n<marker>
//! -> echo $?\n
//! <- echo $?\r\n0\r\n<marker>
//! ```
//!
//! Only then is the command's Notice complete and the next command
//! written.

use std::mem;
use std::time::{Duration, Instant};

use bytes::Bytes;
use log::{Level, debug, log, trace, warn};

use super::detector::{Boundary, BoundaryDetector};
use super::notice::{CHANNEL_CLOSED, ExitStatus, Notice, Notices};
use super::probe::{Origin, STATUS_PROBE, parse_status};
use super::queue::{CommandEntry, CommandQueue, NoticeHandler};
use super::timers::Timers;
use crate::channel::Sentinel;
use crate::error::{Error, SessionError};
use crate::event::{ErrorCategory, SessionEvent};
use crate::session::ShellConfig;

/// Ctrl-C, sent to a command that stopped producing output.
const INTERRUPT: &[u8] = b"\x03";

/// Something the session loop must do on the engine's behalf.
#[derive(Debug)]
pub enum Effect {
    /// Write bytes to the shell.
    Write(Bytes),

    /// Close the write side of the channel.
    CloseWrite,

    /// Deliver an event to the caller.
    Emit(SessionEvent),
}

/// A user command written to the shell and not yet finished.
struct Running {
    command: String,
    handler: Option<NoticeHandler>,
    started: Instant,
    timed_out: bool,
}

enum InFlight {
    Command(Running),
    Probe(Origin),
}

impl InFlight {
    /// The line the shell echoes back for this step.
    fn echo(&self) -> &str {
        match self {
            Self::Command(running) => &running.command,
            Self::Probe(_) => STATUS_PROBE,
        }
    }
}

/// Protocol state of a single shell session.
pub struct ShellEngine {
    detector: BoundaryDetector,
    queue: CommandQueue,
    timers: Timers,
    inflight: Option<InFlight>,
    notices: Notices,
    effects: Vec<Effect>,
    exit_commands: Vec<String>,
    keep_alive: bool,
    settle_delay: Duration,
    lifecycle: Level,
    trace_data: bool,
    bootstrapped: bool,
    closing: bool,
    ended: bool,
    closed: bool,
}

impl ShellEngine {
    pub fn new(config: &ShellConfig, sentinel: Sentinel) -> Self {
        let mut queue = CommandQueue::new();
        for command in config.commands.iter().filter(|c| !c.trim().is_empty()) {
            queue.push(CommandEntry::new(command.clone()));
        }

        Self {
            detector: BoundaryDetector::new(sentinel, config.search_depth),
            queue,
            timers: Timers::new(config.idle_timeout, config.keepalive_interval),
            inflight: None,
            notices: Notices::new(),
            effects: Vec::new(),
            exit_commands: config.exit_commands.clone(),
            keep_alive: config.keep_alive,
            settle_delay: config.settle_delay,
            lifecycle: if config.verbose { Level::Info } else { Level::Debug },
            trace_data: config.debug,
            bootstrapped: false,
            closing: false,
            ended: false,
            closed: false,
        }
    }

    /// Install the prompt marker. The first prompt that shows it starts
    /// the queue.
    pub fn start(&mut self, now: Instant) {
        debug!(
            "installing prompt marker {:?}",
            self.detector.sentinel().marker()
        );
        let line = self.detector.sentinel().bootstrap_command(self.settle_delay);
        self.write_line(&line);
        self.timers.arm_idle(now + self.settle_delay);
    }

    /// Whether commands can still be queued.
    pub fn is_writable(&self) -> bool {
        !self.closing && !self.closed
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    #[cfg(test)]
    pub fn is_bootstrapped(&self) -> bool {
        self.bootstrapped
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn idle_deadline(&self) -> Option<Instant> {
        self.timers.idle_deadline()
    }

    pub fn keepalive_deadline(&self) -> Option<Instant> {
        self.timers.keepalive_deadline()
    }

    /// Hand the pending effects to the caller, oldest first.
    pub fn take_effects(&mut self) -> Vec<Effect> {
        mem::take(&mut self.effects)
    }

    /// Queue a command. Refused commands are reported to their handler
    /// right away and leave the queue untouched.
    pub fn enqueue(&mut self, entry: CommandEntry) -> bool {
        if !self.is_writable() {
            debug!("refusing {:?}: {}", entry.command(), CHANNEL_CLOSED);
            entry.reject(CHANNEL_CLOSED);
            return false;
        }
        if entry.command().trim().is_empty() {
            entry.reject("empty command");
            return false;
        }
        trace!("queued {:?}", entry.command());
        self.queue.push(entry);
        true
    }

    /// Output arrived from the shell.
    pub fn on_data(&mut self, data: &[u8], now: Instant) {
        if self.closed {
            return;
        }
        if self.trace_data {
            trace!("received: {:?}", String::from_utf8_lossy(data));
        }

        let echo = self.inflight.as_ref().map(InFlight::echo);
        match self.detector.push(data, echo) {
            Boundary::Prompt(output) if !self.closing => self.on_prompt(output, now),
            Boundary::Prompt(output) => self.on_closing_prompt(output, now),
            Boundary::Pending => self.on_pending(now),
        }
    }

    fn on_prompt(&mut self, output: String, now: Instant) {
        self.timers.clear_idle();

        match self.inflight.take() {
            None => {
                if !self.bootstrapped {
                    self.bootstrapped = true;
                    debug!("prompt marker detected, shell ready");
                }
                self.advance(now);
            }
            Some(InFlight::Command(running)) => {
                let elapsed = now.saturating_duration_since(running.started);
                if running.timed_out {
                    debug!("{:?} returned to the prompt after interrupt", running.command);
                    self.advance(now);
                    return;
                }
                self.inflight = Some(InFlight::Probe(Origin {
                    command: running.command,
                    output,
                    elapsed,
                    handler: running.handler,
                    timed_out: false,
                }));
                self.write_line(STATUS_PROBE);
                self.timers.arm_idle(now);
            }
            Some(InFlight::Probe(mut origin)) => {
                if !origin.timed_out {
                    let status = parse_status(&output);
                    if let ExitStatus::Unrecoverable(raw) = &status {
                        warn!("status of {:?} unreadable: {:?}", origin.command, raw);
                    }
                    let notice = origin.notice(status);
                    self.finish(notice, origin.handler.as_mut());
                }
                self.advance(now);
            }
        }
    }

    /// A prompt that arrived after `exit` was written. Nothing new is
    /// started, but the output belongs to the command in flight.
    fn on_closing_prompt(&mut self, output: String, now: Instant) {
        match self.inflight.take() {
            Some(InFlight::Command(running)) if !running.timed_out => {
                trace!("{:?} finished after exit was sent", running.command);
                // No status can be asked for; end of input fails it with this output
                self.inflight = Some(InFlight::Probe(Origin {
                    command: running.command,
                    output,
                    elapsed: now.saturating_duration_since(running.started),
                    handler: running.handler,
                    timed_out: false,
                }));
            }
            Some(InFlight::Probe(mut origin)) if !origin.timed_out => {
                let notice = origin.notice(parse_status(&output));
                self.finish(notice, origin.handler.as_mut());
            }
            _ => trace!("prompt after exit was sent, ignoring"),
        }
    }

    fn on_pending(&mut self, now: Instant) {
        let Some(inflight) = self.inflight.as_mut() else {
            // Output before the first prompt still counts as progress
            if !self.bootstrapped && !self.closing {
                self.timers.arm_idle(now + self.settle_delay);
            }
            return;
        };

        if let InFlight::Command(running) = inflight {
            if !running.timed_out {
                let partial = self.detector.partial(Some(&running.command));
                let elapsed = now.saturating_duration_since(running.started);
                let notice = Notice::processing(running.command.clone(), elapsed, partial);
                if let Some(handler) = running.handler.as_mut() {
                    handler(&notice);
                }
                trace!("{:?} still running after {:?}", notice.command, elapsed);
                self.effects
                    .push(Effect::Emit(SessionEvent::CommandProcessing(notice)));
            }
        }

        if !self.closing {
            self.timers.arm_idle(now);
        }
    }

    /// Start the next queued command, or decide what to do with an
    /// empty queue.
    fn advance(&mut self, now: Instant) {
        self.detector.clear();
        self.timers.clear_keepalive();

        if let Some(entry) = self.queue.pop() {
            let (command, handler) = entry.into_parts();
            log!(self.lifecycle, "running {:?}", command);
            self.write_line(&command);
            self.timers.arm_idle(now);
            self.inflight = Some(InFlight::Command(Running {
                command,
                handler,
                started: now,
                timed_out: false,
            }));
            return;
        }

        self.timers.clear_idle();
        if self.keep_alive {
            self.timers.arm_keepalive(now);
        } else {
            debug!("queue empty, closing shell");
            self.terminate();
        }
    }

    /// The idle timer fired: interrupt whatever is running.
    pub fn on_idle_timeout(&mut self, now: Instant) {
        self.timers.clear_idle();
        if !self.is_writable() {
            return;
        }
        if !self.bootstrapped && self.inflight.is_none() {
            self.on_bootstrap_stall(now);
            return;
        }

        warn!(
            "no output for {:?}, interrupting {:?}",
            self.timers.idle_timeout(),
            self.inflight.as_ref().map(InFlight::echo)
        );
        self.effects.push(Effect::Write(Bytes::from_static(INTERRUPT)));

        let notice = match self.inflight.as_mut() {
            Some(InFlight::Command(running)) if !running.timed_out => {
                running.timed_out = true;
                let partial = self.detector.partial(Some(&running.command));
                let elapsed = now.saturating_duration_since(running.started);
                let notice = Notice::failure(running.command.clone(), elapsed, partial);
                if let Some(handler) = running.handler.as_mut() {
                    handler(&notice);
                }
                notice
            }
            Some(InFlight::Probe(origin)) if !origin.timed_out => {
                origin.timed_out = true;
                let notice = Notice::failure(origin.command.clone(), origin.elapsed, origin.output.clone());
                if let Some(handler) = origin.handler.as_mut() {
                    handler(&notice);
                }
                notice
            }
            _ => return,
        };

        self.notices.push(notice.clone());
        self.emit(SessionEvent::CommandTimeout(notice));
    }

    /// The shell never printed the marker: it is not one that can be
    /// driven. Report it and close.
    fn on_bootstrap_stall(&mut self, now: Instant) {
        let waited = self.settle_delay + self.timers.idle_timeout();
        warn!("prompt marker not seen after {:?}", waited);
        self.emit(SessionEvent::Error {
            error: SessionError::PromptNotDetected(waited).into(),
            category: ErrorCategory::Shell,
            close: true,
        });
        self.terminate();
        self.on_close(true, now);
    }

    /// The keep-alive timer fired: look for commands queued meanwhile.
    pub fn on_keepalive(&mut self, now: Instant) {
        self.timers.clear_keepalive();
        if self.inflight.is_none() && self.is_writable() {
            self.advance(now);
        }
    }

    /// No more commands can arrive: exit as soon as the queue has run,
    /// even in keep-alive mode.
    pub fn release(&mut self) {
        self.keep_alive = false;
        if self.bootstrapped && self.inflight.is_none() && self.queue.is_empty() {
            self.terminate();
        }
    }

    /// Send the exit sequence and close the write side. Runs at most once.
    pub fn terminate(&mut self) -> bool {
        if !self.is_writable() {
            return false;
        }
        debug!("exit and close connection");

        self.timers.clear_all();
        while let Some(command) = self.exit_commands.pop() {
            self.write_line(&command);
        }
        self.write_line("exit");
        self.effects.push(Effect::CloseWrite);
        self.closing = true;
        true
    }

    /// The shell will send nothing more. Every command without a
    /// terminal Notice gets a failure one, then the collection goes out.
    pub fn on_eof(&mut self, now: Instant) {
        if self.ended {
            return;
        }
        self.ended = true;
        self.closing = true;
        self.timers.clear_all();

        match self.inflight.take() {
            Some(InFlight::Command(mut running)) if !running.timed_out => {
                let output = self.detector.take_output(Some(&running.command));
                let elapsed = now.saturating_duration_since(running.started);
                let notice = Notice::failure(mem::take(&mut running.command), elapsed, output);
                self.finish(notice, running.handler.as_mut());
            }
            Some(InFlight::Probe(mut origin)) if !origin.timed_out => {
                let notice = origin.notice(ExitStatus::Failure);
                self.finish(notice, origin.handler.as_mut());
            }
            _ => {}
        }
        self.detector.clear();

        let pending: Vec<CommandEntry> = self.queue.drain().collect();
        for entry in pending {
            let (command, mut handler) = entry.into_parts();
            self.finish(Notice::channel_closed(command), handler.as_mut());
        }

        let notices = mem::take(&mut self.notices);
        debug!("shell ended after {} command(s)", notices.len());
        self.emit(SessionEvent::End(notices));
    }

    /// The channel is gone. Nothing is emitted after this.
    pub fn on_close(&mut self, had_error: bool, now: Instant) {
        if self.closed {
            return;
        }
        self.on_eof(now);
        self.timers.clear_all();
        self.closed = true;
        self.emit(SessionEvent::Close { had_error });
    }

    /// Reading or writing the channel failed; the session is over.
    pub fn on_stream_error(&mut self, error: Error, now: Instant) {
        warn!("shell stream failed: {}", error);
        self.emit(SessionEvent::Error {
            error,
            category: ErrorCategory::Stream,
            close: true,
        });
        self.on_close(true, now);
    }

    /// Deliver a terminal Notice as `commandComplete`.
    fn finish(&mut self, notice: Notice, handler: Option<&mut NoticeHandler>) {
        if let Some(handler) = handler {
            handler(&notice);
        }
        log!(
            self.lifecycle,
            "{:?} finished in {:?} with {}",
            notice.command,
            notice.elapsed,
            notice.status
        );
        self.notices.push(notice.clone());
        self.emit(SessionEvent::CommandComplete(notice));
    }

    fn write_line(&mut self, line: &str) {
        self.effects.push(Effect::Write(Bytes::from(format!("{line}\n"))));
    }

    fn emit(&mut self, event: SessionEvent) {
        self.effects.push(Effect::Emit(event));
    }
}
