//! Bounded input buffer for the decoder
//!
//! A fixed-capacity FIFO over a blocking [`Read`] source. The decoder scans
//! and consumes from the front; refills append at the back and compact the
//! unread bytes to the start when the tail runs out of room. Capacity never
//! grows, so a token longer than the buffer is reported rather than buffered.

use std::io::{self, Read};
use tracing::trace;

pub(crate) struct InputBuffer<R> {
    reader: R,
    buf: Box<[u8]>,
    start: usize,
    end: usize,
    eof: bool,
}

impl<R: Read> InputBuffer<R> {
    pub(crate) fn new(reader: R, capacity: usize) -> Self {
        Self {
            reader,
            buf: vec![0u8; capacity].into_boxed_slice(),
            start: 0,
            end: 0,
            eof: false,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.end - self.start
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub(crate) fn is_full(&self) -> bool {
        self.len() == self.buf.len()
    }

    /// True once the source has reported end of data
    pub(crate) fn is_eof(&self) -> bool {
        self.eof
    }

    /// Unread bytes
    pub(crate) fn bytes(&self) -> &[u8] {
        &self.buf[self.start..self.end]
    }

    /// Read once from the source into free space
    ///
    /// Returns the number of bytes added. Zero means the buffer is full or
    /// the source is exhausted; check [`is_eof`](Self::is_eof) to tell apart.
    pub(crate) fn fill(&mut self) -> io::Result<usize> {
        if self.eof || self.is_full() {
            return Ok(0);
        }
        if self.start == self.end {
            self.start = 0;
            self.end = 0;
        } else if self.end == self.buf.len() {
            self.buf.copy_within(self.start..self.end, 0);
            self.end -= self.start;
            self.start = 0;
        }
        loop {
            match self.reader.read(&mut self.buf[self.end..]) {
                Ok(0) => {
                    trace!("yEnc source exhausted with {} bytes buffered", self.len());
                    self.eof = true;
                    return Ok(0);
                }
                Ok(n) => {
                    trace!("yEnc buffer refilled with {} bytes", n);
                    self.end += n;
                    return Ok(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Refill until at least `n` bytes are buffered, the buffer is full, or
    /// the source is exhausted. Returns whether `n` bytes are available.
    pub(crate) fn fill_at_least(&mut self, n: usize) -> io::Result<bool> {
        while self.len() < n {
            if self.fill()? == 0 {
                break;
            }
        }
        Ok(self.len() >= n)
    }

    /// Refill until a byte matching `pred` is buffered
    ///
    /// Returns its offset from the front, or `None` if the buffer filled up
    /// or the source ran dry first.
    pub(crate) fn fill_until<F>(&mut self, pred: F) -> io::Result<Option<usize>>
    where
        F: Fn(u8) -> bool,
    {
        let mut scanned = 0;
        loop {
            if let Some(i) = self.bytes()[scanned..].iter().position(|&c| pred(c)) {
                return Ok(Some(scanned + i));
            }
            scanned = self.len();
            if self.fill()? == 0 {
                return Ok(None);
            }
        }
    }

    /// Offset of the first buffered byte matching `pred`
    pub(crate) fn position<F>(&self, pred: F) -> Option<usize>
    where
        F: Fn(u8) -> bool,
    {
        self.bytes().iter().position(|&c| pred(c))
    }

    pub(crate) fn starts_with(&self, prefix: &[u8]) -> bool {
        self.bytes().starts_with(prefix)
    }

    pub(crate) fn peek(&self, offset: usize) -> Option<u8> {
        self.bytes().get(offset).copied()
    }

    /// Discard `n` bytes from the front
    pub(crate) fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.len());
        self.start += n.min(self.len());
        if self.start == self.end {
            self.start = 0;
            self.end = 0;
        }
    }

    /// Discard everything buffered
    pub(crate) fn clear(&mut self) {
        self.start = 0;
        self.end = 0;
    }

    /// Copy bytes into `out` up to (not including) the first byte matching
    /// `pred`, consuming what was copied
    ///
    /// Returns the number of bytes copied and the matching byte if it was
    /// reached. The matching byte itself stays in the buffer.
    pub(crate) fn copy_until<F>(&mut self, out: &mut [u8], pred: F) -> (usize, Option<u8>)
    where
        F: Fn(u8) -> bool,
    {
        let avail = self.bytes();
        let limit = avail.len().min(out.len());
        let (n, delim) = match avail[..limit].iter().position(|&c| pred(c)) {
            Some(i) => (i, Some(avail[i])),
            None => (limit, None),
        };
        out[..n].copy_from_slice(&avail[..n]);
        self.consume(n);
        (n, delim)
    }

    /// Take `n` bytes from the front as an owned sequence
    pub(crate) fn take(&mut self, n: usize) -> Vec<u8> {
        let token = self.bytes()[..n].to_vec();
        self.consume(n);
        token
    }

    pub(crate) fn into_inner(self) -> R {
        self.reader
    }
}
