//! Boundary scanning over a byte stream
//!
//! Timelines are located by scanning for the `<tl` opening marker and the
//! `</tl>` closing marker, without regard to case or line structure. The
//! scanner keeps a small buffer and reports absolute byte offsets, so a scan
//! can start at any offset of the underlying stream.

use std::io::{ErrorKind, Read, Seek, SeekFrom};

use log::warn;

use crate::error::Result;
use crate::reader::partition::FilePartition;

/// Bytes a marker needs to be classified: `</tl>`
const LOOKAHEAD: usize = 5;

/// Length of the closing marker
const CLOSE_LEN: u64 = 5;

/// A timeline boundary marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    Open,
    Close,
}

impl Boundary {
    /// Classify the marker starting at `bytes[0]`, if any
    ///
    /// An opening marker must be followed by whitespace, `>` or `/`, so
    /// `<TLLocationIndex>` is not a timeline.
    #[must_use]
    pub fn classify(bytes: &[u8]) -> Option<Self> {
        let is_tl = |t: u8, l: u8| t.eq_ignore_ascii_case(&b't') && l.eq_ignore_ascii_case(&b'l');
        match *bytes {
            [b'<', b'/', t, l, b'>', ..] if is_tl(t, l) => Some(Self::Close),
            [b'<', t, l, next, ..]
                if is_tl(t, l) && (next.is_ascii_whitespace() || next == b'>' || next == b'/') =>
            {
                Some(Self::Open)
            }
            _ => None,
        }
    }
}

/// Buffered scanner reporting boundary markers with their absolute offsets
#[derive(Debug)]
pub struct BoundaryScanner<R> {
    inner: R,
    buf: Vec<u8>,
    /// Absolute offset of `buf[0]`
    base: u64,
    pos: usize,
    chunk_size: usize,
    eof: bool,
}

impl<R: Read + Seek> BoundaryScanner<R> {
    /// Wrap a stream; scanning starts at its current position's offset zero
    #[must_use]
    pub fn new(inner: R, chunk_size: usize) -> Self {
        Self {
            inner,
            buf: Vec::with_capacity(chunk_size + LOOKAHEAD),
            base: 0,
            pos: 0,
            chunk_size: chunk_size.max(LOOKAHEAD),
            eof: false,
        }
    }

    /// Absolute offset of the next byte the scan will examine
    #[must_use]
    pub fn position(&self) -> u64 {
        self.base + self.pos as u64
    }

    /// Restart the scan at `offset`
    pub fn seek(&mut self, offset: u64) -> Result<()> {
        self.inner.seek(SeekFrom::Start(offset))?;
        self.buf.clear();
        self.base = offset;
        self.pos = 0;
        self.eof = false;
        Ok(())
    }

    /// Read `[start, stop)` directly, then resume scanning at `stop`
    pub fn read_range(&mut self, range: FilePartition) -> Result<Vec<u8>> {
        self.inner.seek(SeekFrom::Start(range.start))?;
        let mut bytes = Vec::with_capacity(usize::try_from(range.len()).unwrap_or(0));
        (&mut self.inner).take(range.len()).read_to_end(&mut bytes)?;
        self.seek(range.stop)?;
        Ok(bytes)
    }

    /// Drop consumed bytes and append the next chunk
    fn fill(&mut self) -> Result<()> {
        self.buf.drain(..self.pos);
        self.base += self.pos as u64;
        self.pos = 0;

        let old_len = self.buf.len();
        self.buf.resize(old_len + self.chunk_size, 0);
        let read = loop {
            match self.inner.read(&mut self.buf[old_len..]) {
                Ok(n) => break n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    self.buf.truncate(old_len);
                    return Err(e.into());
                }
            }
        };
        self.buf.truncate(old_len + read);
        if read == 0 {
            self.eof = true;
        }
        Ok(())
    }

    /// Next boundary marker at or after the current position
    pub fn next_boundary(&mut self) -> Result<Option<(Boundary, u64)>> {
        loop {
            let Some(found) = self.buf[self.pos..].iter().position(|&b| b == b'<') else {
                self.pos = self.buf.len();
                if self.eof {
                    return Ok(None);
                }
                self.fill()?;
                continue;
            };
            self.pos += found;

            if self.buf.len() - self.pos < LOOKAHEAD && !self.eof {
                self.fill()?;
                continue;
            }

            let offset = self.position();
            let boundary = Boundary::classify(&self.buf[self.pos..]);
            self.pos += 1;
            if let Some(boundary) = boundary {
                return Ok(Some((boundary, offset)));
            }
        }
    }

    /// Locate the next complete timeline whose opening marker lies before `limit`
    ///
    /// The returned range runs from the opening marker to just past the
    /// closing marker, which may lie beyond `limit`. A timeline opened but
    /// never closed is skipped with a warning.
    pub fn next_timeline(&mut self, limit: Option<u64>) -> Result<Option<FilePartition>> {
        let mut open: Option<u64> = None;
        while let Some((boundary, offset)) = self.next_boundary()? {
            match (boundary, open) {
                (Boundary::Open, _) if limit.is_some_and(|l| offset >= l) && open.is_none() => {
                    return Ok(None);
                }
                (Boundary::Open, Some(unclosed)) => {
                    warn!("Timeline at offset {unclosed} is never closed; skipping it");
                    if limit.is_some_and(|l| offset >= l) {
                        return Ok(None);
                    }
                    open = Some(offset);
                }
                (Boundary::Open, None) => open = Some(offset),
                (Boundary::Close, Some(start)) => {
                    return Ok(Some(FilePartition::new(start, offset + CLOSE_LEN)));
                }
                // A closing marker of a timeline that began before this scan
                (Boundary::Close, None) => {}
            }
        }
        if let Some(unclosed) = open {
            warn!("Timeline at offset {unclosed} is never closed; skipping it");
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn scan_all(text: &str, chunk_size: usize) -> Vec<FilePartition> {
        let mut scanner = BoundaryScanner::new(Cursor::new(text.as_bytes().to_vec()), chunk_size);
        let mut found = Vec::new();
        while let Some(range) = scanner.next_timeline(None).unwrap() {
            found.push(range);
        }
        found
    }

    /// Test marker classification
    #[test]
    fn test_classify() {
        assert_eq!(Boundary::classify(b"<TL id=\"1\">"), Some(Boundary::Open));
        assert_eq!(Boundary::classify(b"<tl>"), Some(Boundary::Open));
        assert_eq!(Boundary::classify(b"<Tl\nid"), Some(Boundary::Open));
        assert_eq!(Boundary::classify(b"</tL>"), Some(Boundary::Close));
        assert_eq!(Boundary::classify(b"<TLLocationIndex>"), None);
        assert_eq!(Boundary::classify(b"<TimelineList>"), None);
        assert_eq!(Boundary::classify(b"<tl"), None);
    }

    /// Test markers are found regardless of line breaks and buffer splits
    #[test]
    fn test_scan_across_chunks() {
        let text = "<TDF><TimelineList><TL id=\"1\"><D>x</D></TL><tl id=\"2\">\n</tl>\n</TimelineList>";
        let first = text.find("<TL ").unwrap() as u64;
        let first_end = (text.find("</TL>").unwrap() + 5) as u64;

        for chunk_size in [1, 5, 7, 64] {
            let found = scan_all(text, chunk_size);
            assert_eq!(found.len(), 2, "chunk size {chunk_size}");
            assert_eq!(found[0], FilePartition::new(first, first_end));
            assert_eq!(&text[found[1].start as usize..found[1].stop as usize], "<tl id=\"2\">\n</tl>");
        }
    }

    /// Test a scan bounded by a limit still returns a timeline that ends past it
    #[test]
    fn test_limit_applies_to_open_marker() {
        let text = "<TL id=\"1\">aaaaaaaaaa</TL><TL id=\"2\"></TL>";
        let mut scanner = BoundaryScanner::new(Cursor::new(text.as_bytes().to_vec()), 8);
        let range = scanner.next_timeline(Some(1)).unwrap().unwrap();
        assert_eq!(range.start, 0);
        assert!(range.stop > 1);
        assert_eq!(scanner.next_timeline(Some(1)).unwrap(), None);
    }

    /// Test an unterminated timeline is skipped
    #[test]
    fn test_unclosed_timeline() {
        let text = "<TL id=\"1\"><D>x</D><TL id=\"2\"></TL>";
        let found = scan_all(text, 16);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].start, text.rfind("<TL").unwrap() as u64);
    }

    /// Test a range read resumes the scan after the range
    #[test]
    fn test_read_range() {
        let text = "<TL id=\"1\"></TL><TL id=\"2\"></TL>";
        let mut scanner = BoundaryScanner::new(Cursor::new(text.as_bytes().to_vec()), 4);
        let bytes = scanner.read_range(FilePartition::new(0, 16)).unwrap();
        assert_eq!(bytes, b"<TL id=\"1\"></TL>");
        let next = scanner.next_timeline(None).unwrap().unwrap();
        assert_eq!(next.start, 16);
    }
}
