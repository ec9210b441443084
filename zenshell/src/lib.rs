//! # Zenshell
//!
//! Async command queue over an interactive SSH shell.
//!
//! Zenshell opens one interactive shell, replaces its prompt with a random
//! marker and runs queued commands one at a time. The marker tells when a
//! command has finished; a follow-up `echo $?` reads its exit status.
//! Every command yields a [`Notice`] with its output, status and run time.
//!
//! ## Features
//!
//! - Async SSH connections via russh
//! - Prompt sentinel boundary detection on the buffer tail, ANSI stripped
//! - Exit status capture for every command
//! - Idle timeout with Ctrl-C interrupt, optional keep-alive mode
//! - Typed event stream plus per-command Notice callbacks
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use zenshell::{SessionBuilder, SessionEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), zenshell::Error> {
//!     let (session, mut events) = SessionBuilder::new("192.168.1.1")
//!         .username("admin")
//!         .password("secret")
//!         .connect()?;
//!
//!     session.exec("uname -a");
//!     session.exec_with("uptime", |notice| println!("{}", notice));
//!
//!     while let Some(event) = events.recv().await {
//!         match event {
//!             SessionEvent::CommandComplete(notice) => {
//!                 println!("{} -> {}", notice.command, notice.status);
//!             }
//!             SessionEvent::Close { .. } => break,
//!             _ => {}
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod engine;
pub mod error;
pub mod event;
pub mod session;
pub mod transport;

// Re-export main types for convenience
pub use channel::{ChannelEvent, ShellChannel};
pub use engine::{CHANNEL_CLOSED, CommandEntry, ExitStatus, Notice, Notices};
pub use error::{Error, Result};
pub use event::{ErrorCategory, EventStream, SessionEvent};
pub use session::{SessionBuilder, SessionHandle, ShellConfig};
pub use transport::{AuthMethod, HostKeyVerification, SshConfig};
