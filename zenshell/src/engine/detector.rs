//! Boundary detection: splitting the shell's output stream into
//! "still running" and "command finished" using the prompt sentinel.

use memchr::memchr;

use crate::channel::{PatternBuffer, Sentinel};

/// What the buffer looks like after a chunk of output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Boundary {
    /// No prompt yet: the command is still producing output.
    Pending,

    /// The prompt arrived. Holds the command's output with the echo and
    /// the sentinel stripped. The buffer has been reset.
    Prompt(String),
}

/// Accumulates shell output and watches its tail for the sentinel.
#[derive(Debug)]
pub struct BoundaryDetector {
    buffer: PatternBuffer,
    sentinel: Sentinel,
}

impl BoundaryDetector {
    pub fn new(sentinel: Sentinel, search_depth: usize) -> Self {
        Self {
            buffer: PatternBuffer::new(search_depth.max(sentinel.len())),
            sentinel,
        }
    }

    pub fn sentinel(&self) -> &Sentinel {
        &self.sentinel
    }

    /// Append a chunk and test for the prompt.
    ///
    /// `echo` is the command line the shell is expected to have echoed
    /// at the start of the buffer, if any.
    pub fn push(&mut self, data: &[u8], echo: Option<&str>) -> Boundary {
        self.buffer.extend(data);

        // A buffer shorter than the marker cannot hold it
        if self.buffer.len() < self.sentinel.len() {
            return Boundary::Pending;
        }

        match self.buffer.search_tail(self.sentinel.pattern()) {
            Some(found) => {
                self.buffer.truncate(found.start);
                let raw = self.buffer.take();
                Boundary::Prompt(normalize(&raw, echo))
            }
            None => Boundary::Pending,
        }
    }

    /// Output received so far for a running command, echo stripped.
    pub fn partial(&self, echo: Option<&str>) -> String {
        normalize(self.buffer.as_slice(), echo)
    }

    /// Drain whatever is buffered, e.g. when the channel ends mid-command.
    pub fn take_output(&mut self, echo: Option<&str>) -> String {
        let raw = self.buffer.take();
        normalize(&raw, echo)
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Remove the echoed command line from the front of `raw`.
///
/// The echo is only stripped when it is really there; a shell with echo
/// disabled leaves the output untouched.
fn strip_echo<'a>(raw: &'a [u8], command: &str) -> &'a [u8] {
    let Some(rest) = raw.strip_prefix(command.as_bytes()) else {
        return raw;
    };
    // The line terminator after the echo may be "\n", "\r\n" or "\r\r\n"
    match memchr(b'\n', rest) {
        Some(nl) if rest[..nl].iter().all(|&b| b == b'\r') => &rest[nl + 1..],
        Some(_) => raw,
        // Echo seen but its line break has not arrived yet
        None if rest.iter().all(|&b| b == b'\r') => &[],
        None => raw,
    }
}

/// Turn raw shell output into Notice output.
fn normalize(raw: &[u8], echo: Option<&str>) -> String {
    let body = match echo {
        Some(command) if !command.is_empty() => strip_echo(raw, command),
        _ => raw,
    };
    let text = String::from_utf8_lossy(body).replace("\r\n", "\n");
    text.trim_start_matches('\r')
        .trim_end_matches(['\r', '\n'])
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKER: &str = "zenshell-test: ";

    fn detector() -> BoundaryDetector {
        BoundaryDetector::new(Sentinel::new(MARKER).unwrap(), 1000)
    }

    #[test]
    fn test_prompt_strips_echo_and_sentinel() {
        let mut detector = detector();
        let boundary = detector.push(b"echo a\r\na\r\nzenshell-test: ", Some("echo a"));
        assert_eq!(boundary, Boundary::Prompt("a".to_string()));
        assert!(detector.is_empty());
    }

    #[test]
    fn test_output_across_chunks() {
        let mut detector = detector();
        assert_eq!(detector.push(b"ls /\r\nbin\r\n", Some("ls /")), Boundary::Pending);
        assert_eq!(detector.partial(Some("ls /")), "bin");
        assert_eq!(detector.push(b"etc\r\nzenshell-", Some("ls /")), Boundary::Pending);
        assert_eq!(
            detector.push(b"test: ", Some("ls /")),
            Boundary::Prompt("bin\netc".to_string())
        );
    }

    #[test]
    fn test_sentinel_only_yields_empty_output() {
        let mut detector = detector();
        assert_eq!(detector.push(MARKER.as_bytes(), None), Boundary::Prompt(String::new()));
        // Running it again on an already-stripped buffer changes nothing
        assert_eq!(detector.push(MARKER.as_bytes(), None), Boundary::Prompt(String::new()));
    }

    #[test]
    fn test_short_buffer_is_pending() {
        let mut detector = detector();
        assert_eq!(detector.push(b"test: ", None), Boundary::Pending);
        assert_eq!(detector.partial(None), "test: ");
    }

    #[test]
    fn test_marker_mid_output_is_not_a_boundary() {
        let mut detector = detector();
        let boundary = detector.push(b"cat log\r\nzenshell-test: earlier\r\n", Some("cat log"));
        assert_eq!(boundary, Boundary::Pending);
    }

    #[test]
    fn test_escape_sequences_around_prompt() {
        let mut detector = detector();
        let boundary = detector.push(
            b"echo hi\r\n\x1b[?2004l\rhi\r\n\x1b[?2004hzenshell-test: ",
            Some("echo hi"),
        );
        assert_eq!(boundary, Boundary::Prompt("hi".to_string()));
    }

    #[test]
    fn test_missing_echo_keeps_output() {
        let mut detector = detector();
        let boundary = detector.push(b"hello\r\nzenshell-test: ", Some("echo hello"));
        assert_eq!(boundary, Boundary::Prompt("hello".to_string()));
    }

    #[test]
    fn test_strip_echo_variants() {
        assert_eq!(strip_echo(b"pwd\r\n/root", "pwd"), b"/root");
        assert_eq!(strip_echo(b"pwd\n/root", "pwd"), b"/root");
        assert_eq!(strip_echo(b"pwd\r\r\n/root", "pwd"), b"/root");
        assert_eq!(strip_echo(b"pwd\r", "pwd"), b"");
        // Prefix match that is not a whole line is output, not echo
        assert_eq!(strip_echo(b"pwdx\n", "pwd"), b"pwdx\n");
    }

    #[test]
    fn test_take_output_mid_command() {
        let mut detector = detector();
        detector.push(b"tail -f x\r\nline 1\r\n", Some("tail -f x"));
        assert_eq!(detector.take_output(Some("tail -f x")), "line 1");
        assert!(detector.is_empty());
    }
}
