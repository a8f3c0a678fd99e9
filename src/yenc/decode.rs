use crate::config::{DecodeOptions, MIN_BUFFER_SIZE};
use crate::{Result, YencError};
use crc32fast::Hasher;
use std::fmt;
use std::io::{self, Read};
use tracing::{debug, warn};

use super::buffer::InputBuffer;
use super::params::{YBEGIN, YEND, YPART, is_control, is_eol, read_ybegin, read_yend, read_ypart};
use super::types::{Decoded, Header, Trailer};

/// Decoder state between calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Before the =ybegin line has been parsed
    Start,
    /// At the beginning of a line, possibly on terminator bytes
    LineStart,
    /// Just consumed '=', the next byte is escaped
    Escaped,
    /// Inside a data line
    InLine,
    /// Trailer consumed and validated, or the source ended
    Done,
    /// An earlier call failed
    Failed,
}

/// Why a read stopped producing bytes
enum Stop {
    Full,
    Trailer,
    Eof,
}

/// Streaming yEnc decoder
///
/// Parses the =ybegin (and =ypart) lines on construction, then hands out
/// decoded bytes through [`read_decoded`](Self::read_decoded) or the
/// [`Read`] implementation. Reaching =yend validates the trailer against
/// the header and the decoded data before end of stream is reported.
///
/// Memory use is bounded by [`DecodeOptions::buffer_size`] no matter how
/// long the stream or its lines are.
///
/// # Example
/// ```
/// use nntp_yenc::Decoder;
/// use std::io::Read;
///
/// let input = b"=ybegin line=128 size=5 name=hello\n\x72\x8f\x96\x96\x99\n=yend size=5\n";
/// let mut decoder = Decoder::new(&input[..])?;
/// let mut data = Vec::new();
/// decoder.read_to_end(&mut data)?;
/// assert_eq!(data, b"Hello");
/// assert_eq!(decoder.header().name, "hello");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Decoder<R> {
    header: Header,
    buf: InputBuffer<R>,
    hasher: Hasher,
    decoded: u64,
    state: State,
    trailer: Option<Trailer>,
    options: DecodeOptions,
}

impl<R: Read> Decoder<R> {
    /// Create a decoder with default options and parse the header
    pub fn new(reader: R) -> Result<Self> {
        Self::with_options(reader, DecodeOptions::default())
    }

    /// Create a decoder and parse the header
    ///
    /// # Errors
    /// - `BufferTooSmall` if `options.buffer_size` is below [`MIN_BUFFER_SIZE`]
    /// - `RejectPrefixData` if the stream does not start with =ybegin and
    ///   prefix data is not allowed
    /// - `InvalidFormat` / `DataCorruption` for a malformed header or part line,
    ///   or a declared-empty file whose trailer does not validate
    pub fn with_options(reader: R, options: DecodeOptions) -> Result<Self> {
        if options.buffer_size < MIN_BUFFER_SIZE {
            return Err(YencError::BufferTooSmall {
                required: MIN_BUFFER_SIZE,
                capacity: options.buffer_size,
            });
        }
        let mut decoder = Self {
            header: Header::default(),
            buf: InputBuffer::new(reader, options.buffer_size),
            hasher: Hasher::new(),
            decoded: 0,
            state: State::Start,
            trailer: None,
            options,
        };
        decoder.read_header()?;
        Ok(decoder)
    }

    fn read_header(&mut self) -> Result<()> {
        self.seek_ybegin()?;
        self.buf.consume(YBEGIN.len());
        read_ybegin(&mut self.buf, &mut self.header)?;
        self.state = State::LineStart;

        let has_part = self.at_keyword(YPART)?;
        if has_part {
            self.buf.consume(YPART.len());
            read_ypart(&mut self.buf, &mut self.header)?;
        }
        debug!(
            "yEnc header: name={} size={} line={} part={} total={} range={}..{}",
            self.header.name,
            self.header.size,
            self.header.line,
            self.header.part,
            self.header.total,
            self.header.begin,
            self.header.end
        );

        if (self.header.part > 1 || self.header.total > 1) && !has_part {
            return Err(YencError::InvalidFormat(
                "missing =ypart line for multipart".to_string(),
            ));
        }

        if self.at_keyword(YEND)? {
            debug!("yEnc stream declares an empty part");
            self.read_trailer()?;
        }
        Ok(())
    }

    /// Position the buffer on the =ybegin keyword
    fn seek_ybegin(&mut self) -> Result<()> {
        let mut skipped = 0usize;
        loop {
            self.buf.fill_at_least(YBEGIN.len())?;
            if self.buf.starts_with(YBEGIN) {
                if skipped > 0 {
                    warn!("Skipped {} bytes before =ybegin", skipped);
                }
                return Ok(());
            }
            if self.buf.is_empty() {
                return Err(YencError::InvalidFormat(
                    "no =ybegin line found".to_string(),
                ));
            }
            if !self.options.allow_prefix_data {
                return Err(YencError::RejectPrefixData);
            }
            // Discard through the end of the current line
            match self.buf.fill_until(is_eol)? {
                Some(i) => {
                    skipped += i + 1;
                    self.buf.consume(i + 1);
                }
                None => loop {
                    // Line longer than the buffer: drop it in chunks
                    skipped += self.buf.len();
                    self.buf.clear();
                    self.buf.fill()?;
                    if let Some(i) = self.buf.position(is_eol) {
                        skipped += i + 1;
                        self.buf.consume(i + 1);
                        break;
                    }
                    if self.buf.is_empty() && self.buf.is_eof() {
                        break;
                    }
                },
            }
        }
    }

    /// Skip line terminators and check whether the next line starts with `keyword`
    fn at_keyword(&mut self, keyword: &[u8]) -> Result<bool> {
        loop {
            self.buf.fill_at_least(keyword.len())?;
            match self.buf.position(|c| !is_eol(c)) {
                Some(0) => return Ok(self.buf.starts_with(keyword)),
                Some(i) => self.buf.consume(i),
                None if self.buf.is_empty() => return Ok(false),
                None => self.buf.clear(),
            }
        }
    }

    /// Decode up to `out.len()` bytes
    ///
    /// Returns the number of decoded bytes, or 0 once the trailer has been
    /// validated. May consume any amount of input and block on the source.
    ///
    /// # Errors
    /// Any error is terminal: the trailer disagreed with the header or data,
    /// the encoding is malformed, or the source failed. With default options
    /// a source that ends before =yend is an `InvalidFormat` error.
    pub fn read_decoded(&mut self, out: &mut [u8]) -> Result<usize> {
        match self.state {
            State::Done => return Ok(0),
            State::Failed => {
                return Err(YencError::InvalidFormat(
                    "decoder already failed".to_string(),
                ));
            }
            _ if out.is_empty() => return Ok(0),
            _ => {}
        }
        let result = self.decode_into(out);
        if result.is_err() {
            self.state = State::Failed;
        }
        result
    }

    fn decode_into(&mut self, out: &mut [u8]) -> Result<usize> {
        let mut n = 0;
        let stop = loop {
            if n == out.len() {
                break Stop::Full;
            }
            match self.state {
                State::Start | State::LineStart => {
                    if !self.buf.fill_at_least(YEND.len())? && self.buf.is_empty() {
                        break Stop::Eof;
                    }
                    match self.buf.position(|c| !is_eol(c)) {
                        Some(0) => {}
                        Some(i) => {
                            self.buf.consume(i);
                            continue;
                        }
                        None => {
                            self.buf.clear();
                            continue;
                        }
                    }
                    if self.buf.starts_with(YEND) {
                        break Stop::Trailer;
                    }
                    self.state = State::InLine;
                }
                State::InLine => {
                    if self.buf.is_empty() && self.buf.fill()? == 0 {
                        break Stop::Eof;
                    }
                    let (copied, delim) = self.buf.copy_until(&mut out[n..], is_control);
                    for b in &mut out[n..n + copied] {
                        *b = b.wrapping_sub(42);
                    }
                    n += copied;
                    match delim {
                        Some(b'=') => {
                            self.buf.consume(1);
                            self.state = State::Escaped;
                        }
                        Some(_) => {
                            self.buf.consume(1);
                            self.state = State::LineStart;
                        }
                        None => {}
                    }
                }
                State::Escaped => {
                    if self.buf.is_empty() && self.buf.fill()? == 0 {
                        return Err(YencError::InvalidFormat(
                            "escape character at end of stream".to_string(),
                        ));
                    }
                    let c = self.buf.peek(0).unwrap_or_default();
                    if is_eol(c) {
                        return Err(YencError::InvalidFormat(
                            "escape character followed by line terminator".to_string(),
                        ));
                    }
                    self.buf.consume(1);
                    out[n] = c.wrapping_sub(64).wrapping_sub(42);
                    n += 1;
                    self.state = State::InLine;
                }
                State::Done | State::Failed => break Stop::Eof,
            }
        };

        if n > 0 {
            self.hasher.update(&out[..n]);
            self.decoded += n as u64;
            // The trailer is validated on the next call, once these bytes
            // are delivered and counted.
            return Ok(n);
        }
        match stop {
            Stop::Trailer => self.read_trailer()?,
            Stop::Eof => self.end_of_source()?,
            Stop::Full => {}
        }
        Ok(0)
    }

    fn end_of_source(&mut self) -> Result<()> {
        if self.options.allow_missing_trailer {
            self.state = State::Done;
            warn!(
                "yEnc stream for {} ended after {} bytes without =yend trailer",
                self.header.name, self.decoded
            );
            return Ok(());
        }
        Err(YencError::InvalidFormat(format!(
            "stream ended before =yend trailer after {} decoded bytes",
            self.decoded
        )))
    }

    fn read_trailer(&mut self) -> Result<()> {
        self.buf.consume(YEND.len());
        let trailer = read_yend(&mut self.buf)?;
        self.validate_trailer(&trailer)?;
        debug!(
            "yEnc trailer validated: size={} pcrc32={:?} crc32={:?}",
            trailer.size, trailer.pcrc32, trailer.crc32
        );
        self.trailer = Some(trailer);
        self.state = State::Done;
        Ok(())
    }

    fn validate_trailer(&self, trailer: &Trailer) -> Result<()> {
        let expected = self.header.part_size();
        if trailer.size != expected {
            return Err(YencError::DataCorruption(format!(
                "header declares {} bytes but trailer size is {}",
                expected, trailer.size
            )));
        }
        if trailer.size != self.decoded {
            return Err(YencError::DataCorruption(format!(
                "trailer size is {} but decoded data has {} bytes",
                trailer.size, self.decoded
            )));
        }
        if let Some(part) = trailer.part
            && part != self.header.part
        {
            return Err(YencError::DataCorruption(format!(
                "header part {} != trailer part {}",
                self.header.part, part
            )));
        }
        if let Some(total) = trailer.total
            && total != self.header.total
        {
            return Err(YencError::DataCorruption(format!(
                "header total {} != trailer total {}",
                self.header.total, total
            )));
        }

        let crc = self.crc32();
        if let Some(pcrc32) = trailer.pcrc32
            && pcrc32 != crc
        {
            return Err(YencError::InvalidFormat(format!(
                "pcrc32 mismatch: trailer {:08x}, decoded data {:08x}",
                pcrc32, crc
            )));
        }
        // crc32 covers the whole file; only checkable when this part is all of it
        if let Some(crc32) = trailer.crc32
            && self.decoded == self.header.size
            && crc32 != crc
        {
            return Err(YencError::InvalidFormat(format!(
                "crc32 mismatch: trailer {:08x}, decoded data {:08x}",
                crc32, crc
            )));
        }
        Ok(())
    }

    /// Parsed header
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// CRC32 of the data decoded so far
    pub fn crc32(&self) -> u32 {
        self.hasher.clone().finalize()
    }

    /// Number of bytes decoded so far
    pub fn decoded_size(&self) -> u64 {
        self.decoded
    }

    /// Validated trailer, once =yend has been reached
    pub fn trailer(&self) -> Option<&Trailer> {
        self.trailer.as_ref()
    }

    /// Check if the trailer has been consumed and validated
    pub fn is_complete(&self) -> bool {
        self.trailer.is_some()
    }

    /// Raw input read from the source but not decoded
    ///
    /// After the trailer this is whatever followed the =yend line.
    pub fn buffered(&self) -> &[u8] {
        self.buf.bytes()
    }

    /// Give back the source, dropping any buffered input
    pub fn into_inner(self) -> R {
        self.buf.into_inner()
    }
}

impl<R: Read> Read for Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_decoded(buf).map_err(YencError::into_io)
    }
}

impl<R> fmt::Debug for Decoder<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decoder")
            .field("header", &self.header)
            .field("state", &self.state)
            .field("decoded", &self.decoded)
            .field("trailer", &self.trailer)
            .finish_non_exhaustive()
    }
}

/// Decode a complete yEnc part held in memory
///
/// # Example
/// ```
/// let encoded = b"=ybegin line=128 size=4 name=test.txt\r\n~\x8f\x9d\x9e\r\n=yend size=4 crc32=784dd132\r\n";
/// let decoded = nntp_yenc::decode(encoded)?;
/// assert_eq!(decoded.data, b"Test");
/// assert_eq!(decoded.header.name, "test.txt");
/// # Ok::<(), nntp_yenc::YencError>(())
/// ```
pub fn decode(input: &[u8]) -> Result<Decoded> {
    let mut decoder = Decoder::new(input)?;
    // Decoded data is never longer than its encoding
    let capacity = decoder.header().part_size().min(input.len() as u64) as usize;
    let mut data = Vec::with_capacity(capacity);
    decoder.read_to_end(&mut data).map_err(YencError::from_io)?;
    Ok(Decoded {
        crc32: decoder.crc32(),
        header: decoder.header,
        trailer: decoder.trailer,
        data,
    })
}
