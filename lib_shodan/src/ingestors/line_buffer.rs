//! NDJSON line reassembly.
//!
//! Chunks arrive split at arbitrary byte offsets, including inside a record or
//! between `\r` and `\n`. The accumulator only releases a line once its `\n`
//! has been seen, so the lines coming out are identical however the input was
//! chunked.

use bytes::{Bytes, BytesMut};

/// Output of [`LineAccumulator::next_line`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extracted {
    /// One complete line, terminator stripped, never empty.
    Line(Bytes),
    /// A line longer than the limit was dropped; carries its length.
    Oversized(usize),
}

#[derive(Debug)]
pub struct LineAccumulator {
    buf: BytesMut,
    /// Bytes already searched for a terminator.
    scanned: usize,
    max_line_bytes: usize,
    /// Inside an oversized line: drop everything up to the next `\n`.
    skipped: Option<usize>,
}

impl LineAccumulator {
    pub fn new(max_line_bytes: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            scanned: 0,
            max_line_bytes: max_line_bytes.max(1),
            skipped: None,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Next complete line, or `None` until more bytes arrive. Blank lines
    /// (keep-alives) are consumed silently.
    pub fn next_line(&mut self) -> Option<Extracted> {
        loop {
            let Some(offset) = self.buf[self.scanned..].iter().position(|b| *b == b'\n') else {
                self.scanned = self.buf.len();
                if self.buf.len() > self.max_line_bytes {
                    let dropped = self.buf.len();
                    self.buf.clear();
                    self.scanned = 0;
                    self.skipped = Some(self.skipped.unwrap_or(0) + dropped);
                }
                return None;
            };

            let end = self.scanned + offset;
            let mut line = self.buf.split_to(end + 1);
            self.scanned = 0;

            if let Some(dropped) = self.skipped.take() {
                return Some(Extracted::Oversized(dropped + end));
            }

            line.truncate(end);
            if line.last() == Some(&b'\r') {
                line.truncate(end - 1);
            }
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            if line.len() > self.max_line_bytes {
                return Some(Extracted::Oversized(line.len()));
            }
            return Some(Extracted::Line(line.freeze()));
        }
    }

    /// Bytes held for a line whose terminator has not arrived yet.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Drops any partial line and returns how many bytes were discarded.
    pub fn clear(&mut self) -> usize {
        let discarded = self.buf.len() + self.skipped.take().unwrap_or(0);
        self.buf.clear();
        self.scanned = 0;
        discarded
    }
}
