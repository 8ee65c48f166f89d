//! Line framing for the serial link.
//!
//! Messages are newline-terminated text. [`LineReader`] accumulates raw
//! UART bytes into complete lines, tolerating `\r\n` endings and
//! resynchronizing after oversized garbage.

use heapless::String;

/// Maximum accepted line length.
///
/// The longest legal line is `BOARD_STATE:` plus 64 snapshot characters.
pub const MAX_LINE_LEN: usize = 96;

/// Byte-fed accumulator producing newline-terminated lines.
#[derive(Debug, Clone)]
pub struct LineReader<const N: usize = MAX_LINE_LEN> {
    buffer: String<N>,
    /// Set while discarding an over-long line up to its terminator.
    overflowed: bool,
}

impl<const N: usize> Default for LineReader<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> LineReader<N> {
    /// Create an empty reader.
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            overflowed: false,
        }
    }

    /// Drop any partial line and start clean.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.overflowed = false;
    }

    /// Feed a single byte.
    ///
    /// Returns `Some(line)` when a complete non-empty line has been
    /// accumulated (terminator stripped). Over-long input discards the
    /// whole line and resynchronizes at the next `\n`.
    pub fn feed(&mut self, byte: u8) -> Option<String<N>> {
        match byte {
            b'\n' => {
                if self.overflowed {
                    self.overflowed = false;
                    self.buffer.clear();
                    return None;
                }
                if self.buffer.is_empty() {
                    return None;
                }
                let line = self.buffer.clone();
                self.buffer.clear();
                Some(line)
            }
            b'\r' => None,
            _ => {
                if self.overflowed {
                    return None;
                }
                if self.buffer.push(byte as char).is_err() {
                    self.overflowed = true;
                    self.buffer.clear();
                }
                None
            }
        }
    }

    /// Feed a slice of bytes, returning the first complete line found.
    ///
    /// Remaining bytes after a complete line are not consumed.
    pub fn feed_bytes(&mut self, bytes: &[u8]) -> Option<(String<N>, usize)> {
        for (i, &byte) in bytes.iter().enumerate() {
            if let Some(line) = self.feed(byte) {
                return Some((line, i + 1));
            }
        }
        None
    }
}
