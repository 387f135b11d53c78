// src/exec/splitter.rs

//! Turns an arbitrary stream of byte chunks into complete lines.
//!
//! Chunks arrive in order but are not aligned to line boundaries. The
//! splitter carries the incomplete trailing fragment over to the next chunk
//! and yields every complete line with its terminator (`\n`, optionally
//! preceded by `\r`) stripped.
//!
//! A fragment longer than [`MAX_LINE_LEN`] bytes is emitted as a line of its
//! own and the rest continues on the next line, so a script that never
//! writes a newline cannot grow the buffer without bound. A cut can fall
//! inside a multi-byte character; the halves are decoded lossily.

/// Longest line delivered in one piece.
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Incremental line splitter for one output stream.
#[derive(Debug, Default, Clone)]
pub struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return the lines it completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        while let Some(idx) = rest.iter().position(|&b| b == b'\n') {
            let (head, tail) = rest.split_at(idx);
            self.extend(head, &mut lines);
            lines.push(take_line(&mut self.pending));
            rest = &tail[1..];
        }

        self.extend(rest, &mut lines);
        lines
    }

    /// Append to the fragment, cutting off full-size pieces as lines.
    fn extend(&mut self, bytes: &[u8], lines: &mut Vec<String>) {
        self.pending.extend_from_slice(bytes);
        while self.pending.len() > MAX_LINE_LEN {
            let rest = self.pending.split_off(MAX_LINE_LEN);
            lines.push(String::from_utf8_lossy(&self.pending).into_owned());
            self.pending = rest;
        }
    }

    /// Flush the trailing fragment at end of stream.
    ///
    /// Returns `None` when nothing (or only a bare `\r`) is left over, so a
    /// stream ending in a newline never yields an extra empty line.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = take_line(&mut self.pending);
        if line.is_empty() { None } else { Some(line) }
    }

    /// Drop any buffered fragment without emitting it.
    pub fn reset(&mut self) {
        self.pending.clear();
    }

    /// Bytes currently held back waiting for a terminator.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

fn take_line(buf: &mut Vec<u8>) -> String {
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    let line = String::from_utf8_lossy(buf).into_owned();
    buf.clear();
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carries_partial_lines_across_chunks() {
        let mut splitter = LineSplitter::new();
        let mut lines = Vec::new();
        for chunk in ["ab", "c\nde", "f\n"] {
            lines.extend(splitter.push(chunk.as_bytes()));
        }
        assert_eq!(lines, vec!["abc".to_string(), "def".to_string()]);
        assert_eq!(splitter.finish(), None);
    }

    #[test]
    fn multiple_lines_in_one_chunk() {
        let mut splitter = LineSplitter::new();
        let lines = splitter.push(b"one\ntwo\nthr");
        assert_eq!(lines, vec!["one", "two"]);
        assert_eq!(splitter.pending_len(), 3);
        assert_eq!(splitter.finish().as_deref(), Some("thr"));
        assert_eq!(splitter.pending_len(), 0);
    }

    #[test]
    fn strips_crlf() {
        let mut splitter = LineSplitter::new();
        let mut lines = splitter.push(b"dos\r");
        lines.extend(splitter.push(b"\nunix\n"));
        assert_eq!(lines, vec!["dos", "unix"]);
    }

    #[test]
    fn empty_lines_inside_the_stream_are_kept() {
        let mut splitter = LineSplitter::new();
        assert_eq!(splitter.push(b"\n\nx\n"), vec!["", "", "x"]);
    }

    #[test]
    fn utf8_split_across_chunks_is_reassembled() {
        let bytes = "héllo\n".as_bytes();
        let mut splitter = LineSplitter::new();
        let mut lines = splitter.push(&bytes[..2]);
        lines.extend(splitter.push(&bytes[2..]));
        assert_eq!(lines, vec!["héllo"]);
    }

    #[test]
    fn overlong_fragment_is_cut_at_the_cap() {
        let mut splitter = LineSplitter::new();
        let mut lines = Vec::new();
        for _ in 0..3 {
            lines.extend(splitter.push(&[b'x'; MAX_LINE_LEN]));
        }
        assert_eq!(lines, vec!["x".repeat(MAX_LINE_LEN); 2]);
        assert_eq!(splitter.pending_len(), MAX_LINE_LEN);

        let lines = splitter.push(b"y\n");
        assert_eq!(lines, vec!["x".repeat(MAX_LINE_LEN), "y".to_string()]);
        assert_eq!(splitter.pending_len(), 0);
    }

    #[test]
    fn line_of_exactly_the_cap_stays_whole() {
        let mut splitter = LineSplitter::new();
        let mut chunk = vec![b'z'; MAX_LINE_LEN];
        chunk.push(b'\n');
        let lines = splitter.push(&chunk);
        assert_eq!(lines, vec!["z".repeat(MAX_LINE_LEN)]);
        assert_eq!(splitter.finish(), None);
    }

    #[test]
    fn reset_discards_fragment() {
        let mut splitter = LineSplitter::new();
        splitter.push(b"half");
        splitter.reset();
        assert_eq!(splitter.finish(), None);
    }
}
