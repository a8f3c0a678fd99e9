//! Decoder and encoder configuration

/// Default decoder input buffer capacity in bytes
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Smallest input buffer the decoder accepts
///
/// Must hold the longest keyword (`=ybegin `) plus room for short tokens.
pub const MIN_BUFFER_SIZE: usize = 16;

/// Critical bytes defined by yEnc 1.3: NUL, LF, CR and '='
///
/// Sufficient when the output goes through a layer that handles dot-stuffing
/// and line ending normalization for the transport.
pub const DEFAULT_CRITICAL_BYTES: &[u8] = &[0x00, b'\n', b'\r', b'='];

/// Default critical bytes plus TAB and '.'
///
/// Used when writing straight to the NNTP transport without a dot-stuffing
/// writer in between, as yenc32 does.
pub const EXTENDED_CRITICAL_BYTES: &[u8] = &[0x00, b'\n', b'\r', b'=', b'\t', b'.'];

/// Line terminator written by the encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LineEnding {
    /// `\r\n`, for writing directly to the transport
    #[default]
    CrLf,
    /// `\n`, when an outer writer normalizes line endings
    Lf,
}

impl LineEnding {
    /// Raw terminator bytes
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            LineEnding::CrLf => b"\r\n",
            LineEnding::Lf => b"\n",
        }
    }
}

/// Set of encoded byte values the encoder escapes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CriticalBytes {
    /// [`DEFAULT_CRITICAL_BYTES`]
    #[default]
    Default,
    /// [`EXTENDED_CRITICAL_BYTES`]
    Extended,
    /// Caller supplied bytes, escaped in addition to the default set
    ///
    /// 0xCA, 0xCD and 0xFD are refused by the encoder: their escapes would
    /// be '=' followed by LF, CR or '='.
    Custom(Vec<u8>),
}

impl CriticalBytes {
    /// Lookup table indexed by encoded byte value
    pub(crate) fn table(&self) -> [bool; 256] {
        let extra: &[u8] = match self {
            CriticalBytes::Default => &[],
            CriticalBytes::Extended => EXTENDED_CRITICAL_BYTES,
            CriticalBytes::Custom(bytes) => bytes,
        };
        // The decoder cannot recover '=' or line terminators that were not escaped.
        let mut table = [false; 256];
        for &b in DEFAULT_CRITICAL_BYTES.iter().chain(extra) {
            table[b as usize] = true;
        }
        table
    }

    /// First byte of the set whose escape would read back as a line terminator or '='
    pub(crate) fn unescapable(&self) -> Option<u8> {
        match self {
            CriticalBytes::Custom(bytes) => bytes
                .iter()
                .copied()
                .find(|b| matches!(b.wrapping_add(64), b'\n' | b'\r' | b'=')),
            _ => None,
        }
    }
}

/// Decoder configuration
///
/// # Example
///
/// ```
/// use nntp_yenc::DecodeOptions;
///
/// let options = DecodeOptions::default()
///     .buffer_size(16 * 1024)
///     .allow_prefix_data(true);
/// assert_eq!(options.buffer_size, 16 * 1024);
/// ```
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecodeOptions {
    /// Input buffer capacity in bytes (default: 4096)
    ///
    /// Caps decoder memory regardless of stream size. Every header/trailer
    /// token must fit in this many bytes.
    #[cfg_attr(feature = "serde", serde(default = "default_buffer_size"))]
    pub buffer_size: usize,

    /// Skip whole lines preceding `=ybegin` instead of failing with
    /// `RejectPrefixData` (default: false)
    #[cfg_attr(feature = "serde", serde(default))]
    pub allow_prefix_data: bool,

    /// Report a clean end of stream when the source runs dry before `=yend`
    /// (default: false, which fails with `InvalidFormat`)
    #[cfg_attr(feature = "serde", serde(default))]
    pub allow_missing_trailer: bool,
}

#[cfg(feature = "serde")]
fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            allow_prefix_data: false,
            allow_missing_trailer: false,
        }
    }
}

impl DecodeOptions {
    /// Set the input buffer capacity
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Allow (skip) data before the `=ybegin` line
    pub fn allow_prefix_data(mut self, allow: bool) -> Self {
        self.allow_prefix_data = allow;
        self
    }

    /// Accept streams that end without a `=yend` trailer
    pub fn allow_missing_trailer(mut self, allow: bool) -> Self {
        self.allow_missing_trailer = allow;
        self
    }
}

/// Encoder configuration
///
/// Header fields (name, size, line width, part range) live in
/// [`Header`](crate::Header); these options only control formatting.
///
/// # Example
///
/// ```
/// use nntp_yenc::{CriticalBytes, EncodeOptions, LineEnding};
///
/// let options = EncodeOptions::default()
///     .line_ending(LineEnding::Lf)
///     .critical_bytes(CriticalBytes::Extended)
///     .pcrc32_for_last_part(true);
/// assert_eq!(options.line_ending, LineEnding::Lf);
/// ```
#[must_use]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EncodeOptions {
    /// Line terminator (default: CRLF)
    pub line_ending: LineEnding,

    /// Encoded byte values that get escaped (default: NUL, LF, CR, '=')
    pub critical_bytes: CriticalBytes,

    /// Write `part=` in the trailer of multi-part files (default: false)
    pub trailer_part: bool,

    /// Write `total=` in the trailer of multi-part files (default: false)
    pub trailer_total: bool,

    /// Encode a single-part file as part 1 of 1, with a =ypart line and
    /// pcrc32 (default: false)
    pub single_part_as_multipart: bool,

    /// Also write pcrc32 for the last part of a multi-part file (default: false)
    ///
    /// By default pcrc32 is only written for parts numbered below `total`,
    /// so a part with an unknown total (0) carries none.
    pub pcrc32_for_last_part: bool,

    /// Also write crc32 for the last part of a multi-part file (default: false)
    ///
    /// By default crc32 is only written for single-part files. The value
    /// written is [`file_crc32`](Self::file_crc32) if set, otherwise the
    /// CRC32 of the data pushed to this encoder.
    pub crc32_for_last_part: bool,

    /// CRC32 of the complete file, written as crc32 in the last part's
    /// trailer when `crc32_for_last_part` is set (default: None)
    pub file_crc32: Option<u32>,
}

impl EncodeOptions {
    /// Set the line terminator
    pub fn line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        self
    }

    /// Set the critical byte set
    pub fn critical_bytes(mut self, critical_bytes: CriticalBytes) -> Self {
        self.critical_bytes = critical_bytes;
        self
    }

    /// Write `part=` in multi-part trailers
    pub fn trailer_part(mut self, enabled: bool) -> Self {
        self.trailer_part = enabled;
        self
    }

    /// Write `total=` in multi-part trailers
    pub fn trailer_total(mut self, enabled: bool) -> Self {
        self.trailer_total = enabled;
        self
    }

    /// Encode single-part files as part 1 of 1
    pub fn single_part_as_multipart(mut self, enabled: bool) -> Self {
        self.single_part_as_multipart = enabled;
        self
    }

    /// Write pcrc32 for the last part too
    pub fn pcrc32_for_last_part(mut self, enabled: bool) -> Self {
        self.pcrc32_for_last_part = enabled;
        self
    }

    /// Write crc32 for the last part of a multi-part file
    pub fn crc32_for_last_part(mut self, enabled: bool) -> Self {
        self.crc32_for_last_part = enabled;
        self
    }

    /// Set the whole-file CRC32 written with `crc32_for_last_part`
    pub fn file_crc32(mut self, crc32: u32) -> Self {
        self.file_crc32 = Some(crc32);
        self
    }
}
