//! Prompt sentinel: the marker written into the remote shell's `PS1`.

use std::time::Duration;

use rand::Rng;
use rand::distr::Alphanumeric;
use regex::bytes::Regex;

use crate::error::{ChannelError, Result, SessionError};

const MARKER_PREFIX: &str = "zenshell-";
const TOKEN_LEN: usize = 8;

/// A prompt marker and the compiled pattern that detects it.
///
/// The pattern matches the marker only at the very end of the buffer:
/// the shell prints its prompt last, after all of a command's output.
#[derive(Debug, Clone)]
pub struct Sentinel {
    marker: String,
    pattern: Regex,
}

impl Sentinel {
    /// Generate a marker unique to this session.
    pub fn random() -> Self {
        let token: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LEN)
            .map(char::from)
            .collect();
        let marker = format!("{MARKER_PREFIX}{token}: ");
        let pattern = Self::compile(&marker).expect("escaped marker is a valid pattern");
        Self { marker, pattern }
    }

    /// Use a caller-supplied marker.
    ///
    /// The marker is embedded in single quotes on the remote side, so it
    /// must be at least two characters long and free of quotes,
    /// backslashes and line breaks.
    pub fn new(marker: impl Into<String>) -> Result<Self> {
        let marker = marker.into();
        let reason = if marker.chars().count() < 2 {
            Some("must be at least two characters")
        } else if marker.contains(['\'', '"', '\\']) {
            Some("must not contain quotes or backslashes")
        } else if marker.contains(['\n', '\r']) {
            Some("must not contain line breaks")
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(SessionError::InvalidSentinel {
                marker,
                reason: reason.to_string(),
            }
            .into());
        }

        let pattern = Self::compile(&marker).map_err(ChannelError::InvalidPattern)?;
        Ok(Self { marker, pattern })
    }

    fn compile(marker: &str) -> std::result::Result<Regex, regex::Error> {
        Regex::new(&format!("{}$", regex::escape(marker)))
    }

    /// The literal marker text.
    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Length of the marker in bytes.
    pub fn len(&self) -> usize {
        self.marker.len()
    }

    /// Always false; a sentinel has at least two characters.
    pub fn is_empty(&self) -> bool {
        self.marker.is_empty()
    }

    /// The end-anchored pattern matching the marker.
    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    /// The line that installs the marker as the shell prompt.
    ///
    /// The marker is split into two adjacent quoted words so the shell's
    /// echo of this very line never contains it verbatim.
    pub fn bootstrap_command(&self, settle: Duration) -> String {
        let split = self
            .marker
            .char_indices()
            .map(|(i, _)| i)
            .nth(self.marker.chars().count() / 2)
            .unwrap_or(0);
        let (head, tail) = self.marker.split_at(split);
        format!(
            "export PS1='{head}''{tail}'; unset PROMPT_COMMAND; sleep {}",
            settle.as_secs_f64()
        )
    }
}
