//! A scripted stand-in for an interactive POSIX shell.
//!
//! Understands just enough to drive a session: the prompt installation
//! line, `echo`, `true`, `false`, `sleep` (which hangs until Ctrl-C) and
//! `exit`. Everything else is "command not found".

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::{Notify, mpsc};

use zenshell::error::{ChannelError, Result};
use zenshell::{ChannelEvent, ShellChannel};

pub struct MockShell {
    tx: mpsc::UnboundedSender<ChannelEvent>,
    rx: mpsc::UnboundedReceiver<ChannelEvent>,
    line: Vec<u8>,
    prompt: String,
    status: i32,
    sleeping: bool,
    exited: bool,
    writes_left: Option<usize>,
    keeps_prompt: bool,
    exit_gate: Option<ExitGate>,
    history: Arc<Mutex<Vec<String>>>,
}

/// Holds the shell's `exit` write until released.
#[derive(Clone, Default)]
pub struct ExitGate {
    /// Signalled once the `exit` write is waiting.
    pub reached: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl MockShell {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let shell = Self {
            tx,
            rx,
            line: Vec::new(),
            prompt: "$ ".to_string(),
            status: 0,
            sleeping: false,
            exited: false,
            writes_left: None,
            keeps_prompt: false,
            exit_gate: None,
            history: Arc::new(Mutex::new(Vec::new())),
        };
        shell.send("Welcome to the mock shell\r\n");
        shell.send("$ ");
        shell
    }

    /// Fail every write after the first `n`.
    pub fn failing_after(mut self, n: usize) -> Self {
        self.writes_left = Some(n);
        self
    }

    /// Ignore `PS1`: the prompt stays `$ ` forever.
    pub fn keeping_prompt(mut self) -> Self {
        self.keeps_prompt = true;
        self
    }

    /// Block the write of `exit` until the returned gate is released.
    pub fn holding_exit(mut self) -> (Self, ExitGate) {
        let gate = ExitGate::default();
        self.exit_gate = Some(gate.clone());
        (self, gate)
    }

    /// Every line the shell has read, in order.
    pub fn history(&self) -> Arc<Mutex<Vec<String>>> {
        self.history.clone()
    }

    fn send(&self, text: &str) {
        let _ = self
            .tx
            .send(ChannelEvent::Data(Bytes::copy_from_slice(text.as_bytes())));
    }

    fn hang_up(&mut self) {
        if !self.exited {
            self.exited = true;
            let _ = self.tx.send(ChannelEvent::Eof);
            let _ = self.tx.send(ChannelEvent::Closed);
        }
    }

    fn run_line(&mut self, line: &str) {
        self.history.lock().unwrap().push(line.to_string());
        if self.sleeping || self.exited {
            return;
        }

        self.send(&format!("{line}\r\n"));

        if let Some(rest) = line.strip_prefix("export PS1=") {
            if !self.keeps_prompt {
                let quoted = rest.split(';').next().unwrap_or_default();
                self.prompt = quoted.replace('\'', "");
            }
            self.status = 0;
        } else if line == "exit" {
            self.send("logout\r\n");
            self.hang_up();
            return;
        } else if line == "echo $?" {
            self.send(&format!("{}\r\n", self.status));
            self.status = 0;
        } else if let Some(text) = line.strip_prefix("echo ") {
            self.send(&format!("{text}\r\n"));
            self.status = 0;
        } else if line == "true" {
            self.status = 0;
        } else if line == "false" {
            self.status = 1;
        } else if line.starts_with("sleep ") {
            self.sleeping = true;
            return;
        } else {
            self.send(&format!("mock: {line}: command not found\r\n"));
            self.status = 127;
        }

        let prompt = self.prompt.clone();
        self.send(&prompt);
    }

    fn interrupt(&mut self) {
        if self.sleeping {
            self.sleeping = false;
            self.status = 130;
            let prompt = self.prompt.clone();
            self.send(&format!("^C\r\n{prompt}"));
        }
    }

    fn spend_write(&mut self) -> Result<()> {
        match self.writes_left.as_mut() {
            Some(0) => Err(ChannelError::Closed.into()),
            Some(n) => {
                *n -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl ShellChannel for MockShell {
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.spend_write()?;
        if let Some(gate) = self.exit_gate.as_ref().filter(|_| data == b"exit\n") {
            gate.reached.notify_one();
            gate.release.notified().await;
        }
        if self.exited {
            return Err(ChannelError::Closed.into());
        }
        for &byte in data {
            match byte {
                0x03 => self.interrupt(),
                b'\n' => {
                    let line = String::from_utf8_lossy(&self.line).into_owned();
                    self.line.clear();
                    self.run_line(&line);
                }
                _ => self.line.push(byte),
            }
        }
        Ok(())
    }

    async fn close_write(&mut self) -> Result<()> {
        self.hang_up();
        Ok(())
    }

    async fn recv(&mut self) -> Option<ChannelEvent> {
        self.rx.recv().await
    }
}
