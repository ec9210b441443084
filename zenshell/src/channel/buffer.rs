//! Pattern buffer with efficient tail-search optimization.
//!
//! Only the last N bytes of the buffer are searched for the prompt
//! sentinel, rather than the entire output. The sentinel always sits at
//! the very end of a finished command's output, so the tail is enough
//! and large outputs stay cheap to test after every chunk.

use std::fmt;
use std::ops::Range;

use bytes::BytesMut;
use regex::bytes::Regex;
use vte::{Parser, Perform};

/// Buffer for accumulating shell output and searching its tail.
///
/// Incoming bytes are run through a VT parser so escape sequences
/// (colors, bracketed-paste toggles, title updates) never land in the
/// buffer. The parser keeps its state between calls, so a sequence split
/// across two network reads is still removed.
pub struct PatternBuffer {
    /// The accumulated, escape-free output.
    buffer: BytesMut,

    /// VT parser used for stripping escape sequences.
    parser: Parser,

    /// How many bytes from the end to search for patterns.
    search_depth: usize,
}

/// Collects printable text and line control characters, dropping the rest.
struct Printable<'a>(&'a mut BytesMut);

impl Perform for Printable<'_> {
    fn print(&mut self, c: char) {
        let mut utf8 = [0u8; 4];
        self.0.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
    }

    fn execute(&mut self, byte: u8) {
        if matches!(byte, b'\n' | b'\r' | b'\t') {
            self.0.extend_from_slice(&[byte]);
        }
    }
}

impl PatternBuffer {
    /// Create a new pattern buffer with the specified search depth.
    pub fn new(search_depth: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            parser: Parser::new(),
            search_depth,
        }
    }

    /// Extend the buffer with new data, stripping ANSI escape codes.
    pub fn extend(&mut self, data: &[u8]) {
        let mut sink = Printable(&mut self.buffer);
        self.parser.advance(&mut sink, data);
    }

    /// Search only the tail of the buffer for the pattern.
    ///
    /// Returns the byte range of the match relative to the start of the
    /// whole buffer.
    pub fn search_tail(&self, pattern: &Regex) -> Option<Range<usize>> {
        let start = self.buffer.len().saturating_sub(self.search_depth);
        pattern
            .find(&self.buffer[start..])
            .map(|m| start + m.start()..start + m.end())
    }

    /// Drop everything from `len` onwards.
    pub fn truncate(&mut self, len: usize) {
        self.buffer.truncate(len);
    }

    /// Take ownership of the buffer contents and reset.
    pub fn take(&mut self) -> Vec<u8> {
        self.buffer.split().to_vec()
    }

    /// Get a reference to the buffer contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Get the current buffer length.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl fmt::Debug for PatternBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternBuffer")
            .field("len", &self.buffer.len())
            .field("search_depth", &self.search_depth)
            .finish()
    }
}
