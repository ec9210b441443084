//! SSH transport layer wrapping russh.
//!
//! This module owns connection setup, authentication, host key checks
//! and allocation of the interactive shell channel the engine drives.

pub mod config;
mod ssh;

pub use config::{AuthMethod, HostKeyVerification, SshConfig};
pub use ssh::SshTransport;
