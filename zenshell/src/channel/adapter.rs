//! Duplex byte channel the engine drives.

use std::future::Future;

use bytes::Bytes;
use log::trace;
use russh::client::Msg;
use russh::{Channel, ChannelMsg};

use crate::error::{ChannelError, Result};

/// Something that happened on the shell channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Output from the remote shell.
    Data(Bytes),

    /// The remote side will send no more data.
    Eof,

    /// The channel is fully closed.
    Closed,
}

/// An interactive shell stream.
///
/// Implemented for russh session channels; anything else that behaves
/// like an interactive shell (a local PTY, a scripted test double) can be
/// attached to a session through this trait.
pub trait ShellChannel: Send {
    /// Write raw bytes to the shell's stdin.
    fn write(&mut self, data: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Close the write side of the channel.
    fn close_write(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Wait for the next channel event. `None` means the channel is gone.
    fn recv(&mut self) -> impl Future<Output = Option<ChannelEvent>> + Send;
}

impl ShellChannel for Channel<Msg> {
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.data(data).await.map_err(ChannelError::Ssh)?;
        Ok(())
    }

    async fn close_write(&mut self) -> Result<()> {
        self.eof().await.map_err(ChannelError::Ssh)?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<ChannelEvent> {
        loop {
            match self.wait().await? {
                ChannelMsg::Data { data } => return Some(ChannelEvent::Data(Bytes::copy_from_slice(&data))),
                // The PTY merges stderr already; anything left over is still shell output
                ChannelMsg::ExtendedData { data, .. } => {
                    return Some(ChannelEvent::Data(Bytes::copy_from_slice(&data)));
                }
                ChannelMsg::Eof => return Some(ChannelEvent::Eof),
                ChannelMsg::Close => return Some(ChannelEvent::Closed),
                other => trace!("ignoring channel message: {:?}", other),
            }
        }
    }
}
