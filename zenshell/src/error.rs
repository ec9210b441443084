//! Error types for zenshell.

use thiserror::Error;

/// Main error type for zenshell operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SSH transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Shell channel errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Session-level errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Transport layer errors (SSH connection, authentication).
#[derive(Error, Debug)]
pub enum TransportError {
    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// SSH key error
    #[error("SSH key error: {0}")]
    Key(String),

    /// The server presented a key that differs from the known_hosts entry
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// Strict verification is on and the host is not in known_hosts
    #[error("Host key for {host}:{port} is not in known_hosts")]
    HostKeyUnknown { host: String, port: u16 },

    /// Reading or writing known_hosts failed
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Shell channel errors.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Failed to open the session channel or request a PTY/shell on it
    #[error("Failed to allocate shell: {0}")]
    ShellRequestFailed(russh::Error),

    /// Channel closed unexpectedly
    #[error("Channel closed")]
    Closed,

    /// SSH protocol error while reading or writing the channel
    #[error("Channel SSH error: {0}")]
    Ssh(russh::Error),

    /// Invalid sentinel pattern
    #[error("Invalid sentinel pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Session layer errors (configuration, lifecycle).
#[derive(Error, Debug)]
pub enum SessionError {
    /// Invalid configuration in the session builder
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// The configured prompt marker cannot be used
    #[error("Invalid sentinel '{marker}': {reason}")]
    InvalidSentinel { marker: String, reason: String },

    /// The shell never showed the prompt marker
    #[error("Prompt marker not seen within {0:?}; the shell may ignore PS1")]
    PromptNotDetected(std::time::Duration),
}

/// Result type alias using zenshell's Error.
pub type Result<T> = std::result::Result<T, Error>;
