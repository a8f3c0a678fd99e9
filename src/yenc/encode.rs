use crate::config::EncodeOptions;
use crate::{Result, YencError};
use crc32fast::Hasher;
use std::fmt;
use std::io::{self, Write};
use tracing::debug;

use super::types::{Header, MAX_LINE_LENGTH};

/// Pending output is handed to the writer once it grows past this
const FLUSH_THRESHOLD: usize = 16 * 1024;

/// Streaming yEnc encoder
///
/// Writes the =ybegin (and =ypart) lines on construction. Raw bytes pushed
/// through [`push`](Self::push) or the [`Write`] implementation are encoded,
/// escaped and wrapped at the header's line width, in any chunking.
/// [`finish`](Self::finish) writes the =yend trailer and checks that exactly
/// the declared part size was encoded.
///
/// # Example
/// ```
/// use nntp_yenc::{EncodeOptions, Encoder, Header, LineEnding};
///
/// let mut encoder = Encoder::new(
///     Vec::new(),
///     Header::single("hello", 5),
///     EncodeOptions::default().line_ending(LineEnding::Lf),
/// )?;
/// encoder.push(b"Hel")?;
/// encoder.push(b"lo")?;
/// let output = encoder.finish()?;
/// assert!(output.starts_with(b"=ybegin line=128 size=5 name=hello\n"));
/// assert!(output.ends_with(b"\n=yend size=5 crc32=f7d18982\n"));
/// # Ok::<(), nntp_yenc::YencError>(())
/// ```
pub struct Encoder<W: Write> {
    header: Header,
    writer: W,
    eol: &'static [u8],
    critical: [bool; 256],
    options: EncodeOptions,
    hasher: Hasher,
    line_offset: u64,
    encoded: u64,
    part_size: u64,
    pending: Vec<u8>,
}

impl<W: Write> Encoder<W> {
    /// Create an encoder and write the header
    ///
    /// # Errors
    /// - `InvalidFormat` if the line width is outside 1..=997, the name is
    ///   empty or spans lines, part fields are inconsistent, or a custom
    ///   critical byte has no decodable escape
    /// - `DataCorruption` if the part range extends past the file size
    /// - `Io` if the header cannot be written
    pub fn new(writer: W, mut header: Header, mut options: EncodeOptions) -> Result<Self> {
        if header.part == 0 && header.total == 0 && options.single_part_as_multipart {
            header.part = 1;
            header.total = 1;
            header.begin = 0;
            header.end = header.size;
            options.pcrc32_for_last_part = true;
        }
        validate_header(&header)?;
        if let Some(b) = options.critical_bytes.unescapable() {
            return Err(YencError::InvalidFormat(format!(
                "critical byte 0x{:02x} cannot be escaped",
                b
            )));
        }

        let mut encoder = Self {
            eol: options.line_ending.as_bytes(),
            critical: options.critical_bytes.table(),
            options,
            hasher: Hasher::new(),
            line_offset: 0,
            encoded: 0,
            part_size: header.part_size(),
            pending: Vec::with_capacity(FLUSH_THRESHOLD + 2 * MAX_LINE_LENGTH as usize),
            header,
            writer,
        };
        encoder.write_header()?;
        debug!(
            "yEnc encoding {} part {}/{} ({} bytes, line {})",
            encoder.header.name,
            encoder.header.part,
            encoder.header.total,
            encoder.part_size,
            encoder.header.line
        );
        Ok(encoder)
    }

    fn write_header(&mut self) -> Result<()> {
        let h = &self.header;
        if h.part > 0 {
            write!(
                self.pending,
                "=ybegin part={} total={} line={} size={} name={}",
                h.part, h.total, h.line, h.size, h.name
            )?;
            self.pending.extend_from_slice(self.eol);
            // =ypart begin is 1-based
            write!(self.pending, "=ypart begin={} end={}", h.begin + 1, h.end)?;
        } else {
            write!(
                self.pending,
                "=ybegin line={} size={} name={}",
                h.line, h.size, h.name
            )?;
        }
        self.pending.extend_from_slice(self.eol);
        self.flush_pending()
    }

    /// Encode a chunk of raw data
    ///
    /// State carries across calls, so the payload may be split anywhere.
    ///
    /// # Errors
    /// `WritingTooMuch` if the chunk would exceed the declared part size;
    /// nothing from the chunk is encoded in that case.
    pub fn push(&mut self, data: &[u8]) -> Result<()> {
        let attempted = self.encoded + data.len() as u64;
        if attempted > self.part_size {
            return Err(YencError::WritingTooMuch {
                expected: self.part_size,
                attempted,
            });
        }
        self.hasher.update(data);

        let line = self.header.line;
        for &raw in data {
            let value = raw.wrapping_add(42);
            if self.critical[value as usize] {
                // Never split an escape across lines
                if self.line_offset > 0 && self.line_offset + 2 > line {
                    self.end_line();
                }
                self.pending.push(b'=');
                self.pending.push(value.wrapping_add(64));
                self.line_offset += 2;
            } else {
                self.pending.push(value);
                self.line_offset += 1;
            }
            if self.line_offset >= line {
                self.end_line();
            }
            if self.pending.len() >= FLUSH_THRESHOLD {
                self.flush_pending()?;
            }
        }
        self.encoded = attempted;
        self.flush_pending()
    }

    fn end_line(&mut self) {
        self.pending.extend_from_slice(self.eol);
        self.line_offset = 0;
    }

    fn flush_pending(&mut self) -> Result<()> {
        if !self.pending.is_empty() {
            self.writer.write_all(&self.pending)?;
            self.pending.clear();
        }
        Ok(())
    }

    /// Write the =yend trailer and return the writer
    ///
    /// # Errors
    /// `SizeMismatch` if fewer bytes than the declared part size were pushed
    /// (the trailer is still written), or `Io` if writing fails.
    pub fn finish(mut self) -> Result<W> {
        if self.line_offset > 0 {
            self.end_line();
        }
        let crc = self.crc32();
        let h = &self.header;
        write!(self.pending, "=yend size={}", self.encoded)?;
        if self.options.trailer_part && h.part > 0 {
            write!(self.pending, " part={}", h.part)?;
        }
        if self.options.trailer_total && h.part > 0 {
            write!(self.pending, " total={}", h.total)?;
        }
        let not_last = h.part > 0 && h.part < h.total;
        if not_last || (self.options.pcrc32_for_last_part && h.part > 0 && h.part == h.total) {
            write!(self.pending, " pcrc32={:08x}", crc)?;
        }
        let single = h.part == 0 && h.total == 0;
        if single || (self.options.crc32_for_last_part && h.part == h.total) {
            // A multi-part trailer carries the whole-file value when one was supplied
            let file_crc = if single { crc } else { self.options.file_crc32.unwrap_or(crc) };
            write!(self.pending, " crc32={:08x}", file_crc)?;
        }
        self.pending.extend_from_slice(self.eol);
        self.flush_pending()?;
        self.writer.flush()?;

        if self.encoded != self.part_size {
            return Err(YencError::SizeMismatch {
                expected: self.part_size,
                actual: self.encoded,
            });
        }
        debug!(
            "yEnc finished {} part {}: {} bytes, crc {:08x}",
            self.header.name, self.header.part, self.encoded, crc
        );
        Ok(self.writer)
    }

    /// Header being encoded
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// CRC32 of the raw data encoded so far
    pub fn crc32(&self) -> u32 {
        self.hasher.clone().finalize()
    }

    /// Number of raw bytes encoded so far
    pub fn encoded_size(&self) -> u64 {
        self.encoded
    }

    /// Borrow the underlying writer
    pub fn get_ref(&self) -> &W {
        &self.writer
    }
}

fn validate_header(h: &Header) -> Result<()> {
    if h.line == 0 || h.line > MAX_LINE_LENGTH {
        return Err(YencError::InvalidFormat(format!(
            "Invalid line length: {} (must be 1-{})",
            h.line, MAX_LINE_LENGTH
        )));
    }
    if h.name.trim().is_empty() {
        return Err(YencError::InvalidFormat("empty file name".to_string()));
    }
    if h.name.contains(['\r', '\n']) {
        return Err(YencError::InvalidFormat(format!(
            "file name {:?} contains a line terminator",
            h.name
        )));
    }
    if h.part == 0 {
        if h.total > 0 {
            return Err(YencError::InvalidFormat(format!(
                "total {} given without a part number",
                h.total
            )));
        }
        return Ok(());
    }
    if h.total > 0 && h.part > h.total {
        return Err(YencError::InvalidFormat(format!(
            "part {} exceeds total {}",
            h.part, h.total
        )));
    }
    if h.end < h.begin {
        return Err(YencError::InvalidFormat(format!(
            "part begin {} is after end {}",
            h.begin, h.end
        )));
    }
    if h.end > h.size {
        return Err(YencError::DataCorruption(format!(
            "part end {} exceeds file size {}",
            h.end, h.size
        )));
    }
    Ok(())
}

impl<W: Write> Write for Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.push(buf).map_err(YencError::into_io)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_pending().map_err(YencError::into_io)?;
        self.writer.flush()
    }
}

impl<W: Write> fmt::Debug for Encoder<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Encoder")
            .field("header", &self.header)
            .field("options", &self.options)
            .field("line_offset", &self.line_offset)
            .field("encoded", &self.encoded)
            .field("part_size", &self.part_size)
            .finish_non_exhaustive()
    }
}

/// Encode a complete part held in memory
///
/// `header.size` (single-part) or `header.end - header.begin` (multi-part)
/// must equal `data.len()`.
///
/// # Example
/// ```
/// use nntp_yenc::{EncodeOptions, Header};
///
/// let data = b"Hello";
/// let encoded = nntp_yenc::encode(data, Header::single("test.bin", 5), EncodeOptions::default())?;
/// let decoded = nntp_yenc::decode(&encoded)?;
/// assert_eq!(decoded.data, data);
/// # Ok::<(), nntp_yenc::YencError>(())
/// ```
pub fn encode(data: &[u8], header: Header, options: EncodeOptions) -> Result<Vec<u8>> {
    let capacity = data.len() + data.len() / 32 + 256;
    let mut encoder = Encoder::new(Vec::with_capacity(capacity), header, options)?;
    encoder.push(data)?;
    encoder.finish()
}
