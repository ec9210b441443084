//! Command execution engine.
//!
//! Everything here is synchronous and free of I/O: the session loop feeds
//! channel data and timer expiries into [`ShellEngine`] and performs the
//! [`Effect`]s it leaves behind.

mod detector;
mod machine;
mod notice;
mod probe;
mod queue;
mod timers;

pub use detector::{Boundary, BoundaryDetector};
pub(crate) use machine::{Effect, ShellEngine};
pub use notice::{CHANNEL_CLOSED, ExitStatus, Notice, Notices};
pub use probe::{STATUS_PROBE, parse_status};
pub use queue::{CommandEntry, NoticeHandler};
