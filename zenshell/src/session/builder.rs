//! Builder for shell sessions.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use secrecy::SecretString;
use tokio::sync::mpsc;

use super::config::ShellConfig;
use super::handle::SessionHandle;
use super::runner::{self, Link};
use crate::channel::{Sentinel, ShellChannel};
use crate::engine::ShellEngine;
use crate::error::{Result, SessionError};
use crate::event::{EventStream, SessionEvent};
use crate::transport::{AuthMethod, HostKeyVerification, SshConfig};

/// Builder for constructing shell sessions.
///
/// # Example
///
/// ```rust,no_run
/// use zenshell::SessionBuilder;
///
/// # async fn example() -> Result<(), zenshell::Error> {
/// let (_session, _events) = SessionBuilder::new("192.168.1.1")
///     .username("admin")
///     .password("secret")
///     .command("uname -a")
///     .connect()?;
/// # Ok(())
/// # }
/// ```
pub struct SessionBuilder {
    host: String,
    port: u16,
    username: Option<String>,
    auth: AuthMethod,
    timeout: Duration,
    terminal_width: u32,
    terminal_height: u32,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    shell: ShellConfig,
}

impl SessionBuilder {
    /// Create a new session builder for the specified host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            username: None,
            auth: AuthMethod::None,
            timeout: Duration::from_secs(30),
            terminal_width: 1000,
            terminal_height: 24,
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
            shell: ShellConfig::default(),
        }
    }

    /// Set the SSH port (default: 22).
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the username for authentication.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set password authentication.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.auth = AuthMethod::Password(SecretString::from(password.into()));
        self
    }

    /// Set private key authentication.
    pub fn private_key(mut self, key_path: impl Into<PathBuf>) -> Self {
        self.auth = AuthMethod::PrivateKey {
            path: key_path.into(),
            passphrase: None,
        };
        self
    }

    /// Set private key authentication with passphrase.
    pub fn private_key_with_passphrase(
        mut self,
        key_path: impl Into<PathBuf>,
        passphrase: impl Into<String>,
    ) -> Self {
        self.auth = AuthMethod::PrivateKey {
            path: key_path.into(),
            passphrase: Some(SecretString::from(passphrase.into())),
        };
        self
    }

    /// Authenticate with a PEM/OpenSSH encoded key held in memory.
    pub fn key_data(mut self, pem: impl Into<String>, passphrase: Option<String>) -> Self {
        self.auth = AuthMethod::KeyData {
            pem: SecretString::from(pem.into()),
            passphrase: passphrase.map(SecretString::from),
        };
        self
    }

    /// Set the connection timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set terminal dimensions.
    pub fn terminal_size(mut self, width: u32, height: u32) -> Self {
        self.terminal_width = width;
        self.terminal_height = height;
        self
    }

    /// How to treat the server's host key (default: accept new, reject changed).
    pub fn host_key_verification(mut self, mode: HostKeyVerification) -> Self {
        self.host_key_verification = mode;
        self
    }

    /// Use a known_hosts file other than `~/.ssh/known_hosts`.
    pub fn known_hosts(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    /// Replace all shell settings at once, e.g. with a deserialized config.
    pub fn config(mut self, config: ShellConfig) -> Self {
        self.shell = config;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.shell.idle_timeout = timeout;
        self
    }

    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.shell.keepalive_interval = interval;
        self
    }

    /// Keep the shell open when the queue runs empty.
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.shell.keep_alive = keep_alive;
        self
    }

    /// Add a command written before `exit`. Exit commands run last-added
    /// first.
    pub fn exit_command(mut self, command: impl Into<String>) -> Self {
        self.shell.exit_commands.push(command.into());
        self
    }

    /// Add a command to the initial queue.
    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.shell.commands.push(command.into());
        self
    }

    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.shell.settle_delay = delay;
        self
    }

    /// Use a fixed prompt marker instead of a random one.
    pub fn sentinel(mut self, marker: impl Into<String>) -> Self {
        self.shell.sentinel = Some(marker.into());
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.shell.verbose = verbose;
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.shell.debug = debug;
        self
    }

    /// Start the session in the background.
    ///
    /// Configuration problems are returned here; everything after that
    /// (connection, authentication, shell allocation) is reported on the
    /// returned event stream. Must be called within a tokio runtime.
    pub fn connect(self) -> Result<(SessionHandle, EventStream)> {
        let username = self.username.clone().ok_or_else(|| SessionError::InvalidConfig {
            message: "Username is required".to_string(),
        })?;
        let engine = self.engine()?;

        let ssh = SshConfig {
            port: self.port,
            auth: self.auth,
            timeout: self.timeout,
            terminal_width: self.terminal_width,
            terminal_height: self.terminal_height,
            host_key_verification: self.host_key_verification,
            known_hosts_path: self.known_hosts_path,
            ..SshConfig::new(self.host, username)
        };

        let (handle, link, events) = wire();
        tokio::spawn(runner::run_ssh(ssh, engine, link));
        Ok((handle, events))
    }

    /// Run the session on an already open shell channel instead of
    /// connecting. The SSH settings are ignored.
    ///
    /// Must be called within a tokio runtime.
    pub fn attach<C>(self, channel: C) -> Result<(SessionHandle, EventStream)>
    where
        C: ShellChannel + 'static,
    {
        let engine = self.engine()?;
        let (handle, link, events) = wire();
        let _ = link.events.send(SessionEvent::Ready);
        tokio::spawn(runner::run_shell(channel, engine, link));
        Ok((handle, events))
    }

    fn engine(&self) -> Result<ShellEngine> {
        self.shell.validate()?;
        let sentinel = match &self.shell.sentinel {
            Some(marker) => Sentinel::new(marker.clone())?,
            None => Sentinel::random(),
        };
        Ok(ShellEngine::new(&self.shell, sentinel))
    }
}

fn wire() -> (SessionHandle, Link, EventStream) {
    let (requests_tx, requests) = mpsc::unbounded_channel();
    let (events_tx, events) = EventStream::channel();
    let writable = Arc::new(AtomicBool::new(true));
    let link = Link {
        requests,
        events: events_tx,
        writable: writable.clone(),
    };
    (SessionHandle::new(requests_tx, writable), link, events)
}
