// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

/// Splits a byte stream into complete lines.
///
/// A trailing partial line is held back until a later chunk completes it or
/// [`LineSplitter::finish`] is called at end of stream. Bytes are buffered
/// raw so multi-byte characters split across chunks decode correctly.
#[derive(Debug, Default, Clone)]
pub struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    /// Creates an empty splitter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns the lines it completes, without terminators.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|b| *b == b'\n') {
            self.pending.extend_from_slice(&rest[..pos]);
            lines.push(Self::decode(&self.pending));
            self.pending.clear();
            rest = &rest[pos + 1..];
        }
        self.pending.extend_from_slice(rest);

        lines
    }

    /// Returns the held-back partial line, if any, and resets the splitter.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = Self::decode(&self.pending);
        self.pending.clear();
        Some(line)
    }

    /// Whether a partial line is waiting for its terminator.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    fn decode(bytes: &[u8]) -> String {
        let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
        String::from_utf8_lossy(bytes).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_line_is_held_back() {
        let mut splitter = LineSplitter::new();
        assert_eq!(splitter.push(b"compiling"), Vec::<String>::new());
        assert!(splitter.has_pending());
        assert_eq!(splitter.push(b" app\nready\npart"), vec!["compiling app", "ready"]);
        assert_eq!(splitter.finish(), Some("part".to_string()));
        assert_eq!(splitter.finish(), None);
    }

    #[test]
    fn test_crlf_and_empty_lines() {
        let mut splitter = LineSplitter::new();
        assert_eq!(splitter.push(b"a\r\n\r\nb\n"), vec!["a", "", "b"]);
    }

    #[test]
    fn test_utf8_split_across_chunks() {
        let mut splitter = LineSplitter::new();
        let bytes = "✓ done\n".as_bytes();
        assert!(splitter.push(&bytes[..1]).is_empty());
        assert_eq!(splitter.push(&bytes[1..]), vec!["✓ done"]);
    }
}
