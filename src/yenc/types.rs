/// Default encoded line width
pub const DEFAULT_LINE_LENGTH: u64 = 128;

/// Largest line width the encoder accepts
pub const MAX_LINE_LENGTH: u64 = 997;

/// yEnc header from the =ybegin and =ypart lines
///
/// Filled in field by field while a [`Decoder`](crate::Decoder) parses the
/// stream, or supplied up front to an [`Encoder`](crate::Encoder).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Header {
    /// Original filename, surrounding whitespace trimmed
    pub name: String,
    /// Size of the complete file in bytes (all parts decoded)
    pub size: u64,
    /// Line length (typically 128, max 997)
    pub line: u64,
    /// Part number starting from 1; 0 for a single-part file
    pub part: u64,
    /// Total number of parts; optional even for multi-part files
    pub total: u64,
    /// Part begin offset, 0-based (the =ypart keyword is 1-based)
    pub begin: u64,
    /// Part end offset, 0-based and exclusive
    pub end: u64,
}

impl Header {
    /// Header for a single-part file
    pub fn single(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            line: DEFAULT_LINE_LENGTH,
            ..Self::default()
        }
    }

    /// Header for one part of a multi-part file
    ///
    /// `begin` and `end` are the 0-based, half-open byte range of this part
    /// within the complete file of `size` bytes.
    pub fn multipart(
        name: impl Into<String>,
        size: u64,
        part: u64,
        total: u64,
        begin: u64,
        end: u64,
    ) -> Self {
        Self {
            name: name.into(),
            size,
            line: DEFAULT_LINE_LENGTH,
            part,
            total,
            begin,
            end,
        }
    }

    /// Override the line width
    #[must_use]
    pub fn with_line(mut self, line: u64) -> Self {
        self.line = line;
        self
    }

    /// Check if this header belongs to a multi-part file
    pub fn is_multipart(&self) -> bool {
        self.part > 0
    }

    /// Number of decoded bytes this part carries
    pub fn part_size(&self) -> u64 {
        if self.part > 0 {
            self.end.saturating_sub(self.begin)
        } else {
            self.size
        }
    }

    /// Check if this is the last part of a multi-part file
    pub fn is_last_part(&self) -> bool {
        self.part > 0 && self.part == self.total
    }
}

/// yEnc trailer from the =yend line
///
/// Optional fields are `None` when the keyword was absent. A CRC of 0 is a
/// legitimate checksum and is distinct from "not present".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Trailer {
    /// Size of this part's decoded data in bytes
    pub size: u64,
    /// Part number, if the trailer repeats it
    pub part: Option<u64>,
    /// Total number of parts, if the trailer repeats it
    pub total: Option<u64>,
    /// CRC32 of this part's decoded data
    pub pcrc32: Option<u32>,
    /// CRC32 of the entire decoded file
    pub crc32: Option<u32>,
}

/// Complete yEnc part decoded in memory
#[derive(Debug, Clone)]
pub struct Decoded {
    /// Parsed header information
    pub header: Header,
    /// Validated trailer; `None` only if the stream ended without one
    pub trailer: Option<Trailer>,
    /// Decoded binary data
    pub data: Vec<u8>,
    /// Calculated CRC32 of decoded data
    pub crc32: u32,
}
