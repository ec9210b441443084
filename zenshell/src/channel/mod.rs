//! Channel layer: the shell stream, its output buffer and the prompt
//! sentinel used to find command boundaries in it.

mod adapter;
mod buffer;
mod sentinel;

pub use adapter::{ChannelEvent, ShellChannel};
pub use buffer::PatternBuffer;
pub use sentinel::Sentinel;
