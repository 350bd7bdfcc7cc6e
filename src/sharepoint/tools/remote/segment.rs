use std::io::{self, Read};

/// Position of a segment inside an upload session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    /// The whole content fits into one segment; no session is needed.
    Only,
    First,
    Middle,
    Last,
}

/// A slice of upload content together with its offset in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    pub offset: u64,
    pub data: Vec<u8>,
}

impl Segment {
    /// Offset of the byte following this segment.
    pub fn end(&self) -> u64 {
        self.offset + self.data.len() as u64
    }
}

/// Splits a reader into upload segments of at most `chunk_size` bytes.
///
/// One chunk is read ahead so the final segment can be flagged as such.
/// Empty input produces a single empty [`SegmentKind::Only`] segment.
pub struct Segments<R> {
    reader: R,
    chunk_size: usize,
    offset: u64,
    pending: Option<Vec<u8>>,
    started: bool,
    done: bool,
}

impl<R: Read> Segments<R> {
    pub fn new(reader: R, chunk_size: usize) -> Self {
        Self {
            reader,
            chunk_size: chunk_size.max(1),
            offset: 0,
            pending: None,
            started: false,
            done: false,
        }
    }

    fn fill(&mut self) -> io::Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.reader
            .by_ref()
            .take(self.chunk_size as u64)
            .read_to_end(&mut buffer)?;
        Ok(buffer)
    }

    fn advance(&mut self) -> io::Result<Segment> {
        let current = match self.pending.take() {
            Some(buffer) => buffer,
            None => self.fill()?,
        };
        let next = if current.len() < self.chunk_size {
            Vec::new()
        } else {
            self.fill()?
        };

        let first = !self.started;
        let last = next.is_empty();
        let kind = match (first, last) {
            (true, true) => SegmentKind::Only,
            (true, false) => SegmentKind::First,
            (false, false) => SegmentKind::Middle,
            (false, true) => SegmentKind::Last,
        };

        let segment = Segment {
            kind,
            offset: self.offset,
            data: current,
        };
        self.started = true;
        self.offset = segment.end();
        if last {
            self.done = true;
        } else {
            self.pending = Some(next);
        }
        Ok(segment)
    }
}

impl<R: Read> Iterator for Segments<R> {
    type Item = io::Result<Segment>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.advance() {
            Ok(segment) => Some(Ok(segment)),
            Err(error) => {
                self.done = true;
                Some(Err(error))
            }
        }
    }
}
