//! Rolling output buffers
//!
//! Each task keeps one `OutputBuffer` per stream. Appending past capacity
//! drops the oldest characters, so memory stays bounded for the whole life
//! of a task no matter how much the command prints.

use serde::{Serialize, Serializer};

/// Default per-stream capacity, in characters
pub const DEFAULT_BUFFER_CAPACITY: usize = 5000;

/// Bounded, lossy text buffer that keeps the most recent output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputBuffer {
    text: String,

    /// Number of chars in `text` (not bytes)
    chars: usize,

    capacity: usize,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            text: String::new(),
            chars: 0,
            capacity,
        }
    }

    /// Append a chunk, keeping only the trailing `capacity` characters
    pub fn append(&mut self, chunk: &str) {
        if chunk.is_empty() {
            return;
        }

        self.text.push_str(chunk);
        self.chars += chunk.chars().count();

        if self.chars > self.capacity {
            let excess = self.chars - self.capacity;
            let cut = self
                .text
                .char_indices()
                .nth(excess)
                .map(|(idx, _)| idx)
                .unwrap_or(self.text.len());
            self.text.drain(..cut);
            self.chars = self.capacity;
        }
    }

    /// Last `n` characters, and whether anything before them was left out
    pub fn tail(&self, n: usize) -> (&str, bool) {
        if self.chars <= n {
            return (&self.text, false);
        }
        let skip = self.chars - n;
        let start = self
            .text
            .char_indices()
            .nth(skip)
            .map(|(idx, _)| idx)
            .unwrap_or(self.text.len());
        (&self.text[start..], true)
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Length in characters
    pub fn len(&self) -> usize {
        self.chars
    }

    pub fn is_empty(&self) -> bool {
        self.chars == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OutputBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

impl Serialize for OutputBuffer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

/// Incremental UTF-8 decoder for pipe chunks
///
/// A read may end in the middle of a multi-byte character; the incomplete
/// suffix is held back and prefixed to the next chunk. Invalid sequences are
/// replaced with U+FFFD.
#[derive(Debug, Default)]
pub(crate) struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub(crate) fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);

        let mut decoded = String::with_capacity(self.pending.len());
        let mut pos = 0;
        loop {
            match std::str::from_utf8(&self.pending[pos..]) {
                Ok(valid) => {
                    decoded.push_str(valid);
                    pos = self.pending.len();
                    break;
                }
                Err(e) => {
                    let valid_end = pos + e.valid_up_to();
                    decoded.push_str(&String::from_utf8_lossy(&self.pending[pos..valid_end]));
                    match e.error_len() {
                        Some(len) => {
                            decoded.push(char::REPLACEMENT_CHARACTER);
                            pos = valid_end + len;
                        }
                        // Incomplete sequence at the end; wait for more bytes
                        None => {
                            pos = valid_end;
                            break;
                        }
                    }
                }
            }
        }

        self.pending.drain(..pos);
        decoded
    }

    /// Flush whatever is left at end of stream
    pub(crate) fn finish(&mut self) -> String {
        let rest = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&rest).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_within_capacity() {
        let mut buffer = OutputBuffer::with_capacity(10);
        buffer.append("hello");
        buffer.append(" you");
        assert_eq!(buffer.as_str(), "hello you");
        assert_eq!(buffer.len(), 9);
    }

    #[test]
    fn test_append_keeps_trailing_capacity() {
        let mut buffer = OutputBuffer::with_capacity(5);
        buffer.append("abc");
        buffer.append("defg");
        assert_eq!(buffer.as_str(), "cdefg");
        assert_eq!(buffer.len(), 5);

        buffer.append("0123456789");
        assert_eq!(buffer.as_str(), "56789");
    }

    #[test]
    fn test_capacity_bound_holds_on_every_append() {
        let mut buffer = OutputBuffer::new();
        let mut expected = String::new();
        for i in 0..2000 {
            let chunk = format!("line {}\n", i);
            buffer.append(&chunk);
            expected.push_str(&chunk);
            assert!(buffer.len() <= DEFAULT_BUFFER_CAPACITY);
        }

        let tail: String = expected
            .chars()
            .skip(expected.chars().count() - DEFAULT_BUFFER_CAPACITY)
            .collect();
        assert_eq!(buffer.as_str(), tail);
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        let mut buffer = OutputBuffer::with_capacity(3);
        buffer.append("日本語です");
        assert_eq!(buffer.as_str(), "語です");
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_tail() {
        let mut buffer = OutputBuffer::with_capacity(100);
        buffer.append("abcdef");
        assert_eq!(buffer.tail(3), ("def", true));
        assert_eq!(buffer.tail(6), ("abcdef", false));
        assert_eq!(buffer.tail(10), ("abcdef", false));
    }

    #[test]
    fn test_serializes_as_string() {
        let mut buffer = OutputBuffer::new();
        buffer.append("out");
        assert_eq!(serde_json::to_string(&buffer).unwrap(), "\"out\"");
    }

    #[test]
    fn test_decoder_split_multibyte() {
        let bytes = "héllo".as_bytes();
        let mut decoder = Utf8Decoder::default();

        // 'é' is two bytes; split between them
        let first = decoder.decode(&bytes[..2]);
        let second = decoder.decode(&bytes[2..]);
        assert_eq!(first, "h");
        assert_eq!(second, "éllo");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn test_decoder_invalid_bytes() {
        let mut decoder = Utf8Decoder::default();
        let out = decoder.decode(&[b'a', 0xff, b'b']);
        assert_eq!(out, "a\u{fffd}b");
    }

    #[test]
    fn test_decoder_truncated_at_eof() {
        let mut decoder = Utf8Decoder::default();
        assert_eq!(decoder.decode(&[b'x', 0xe6]), "x");
        assert_eq!(decoder.finish(), "\u{fffd}");
    }

    #[test]
    fn test_decoder_invalid_byte_then_split_char() {
        let mut decoder = Utf8Decoder::default();

        let mut out = decoder.decode(&[0xff, b'a', 0xe6]);
        assert_eq!(out, "\u{fffd}a");

        out.push_str(&decoder.decode(&[0x97, 0xa5]));
        out.push_str(&decoder.finish());
        assert_eq!(out, "\u{fffd}a日");
    }
}
