use crate::{Result, YencError};
use std::collections::BTreeMap;

use super::types::{Decoded, Header};

/// Decoded data of one part and where it belongs in the file
#[derive(Debug, Clone)]
struct Part {
    begin: u64,
    end: u64,
    data: Vec<u8>,
}

/// Multi-part yEnc file assembler
///
/// Collects decoded parts, possibly out of order, and places them by their
/// =ypart byte range. Rejects parts that disagree with earlier ones on name,
/// size or total, overlap an existing range, or carry the wrong amount of
/// data. Decoding the parts themselves (and running decoders in parallel)
/// is up to the caller.
///
/// # Example
/// ```
/// use nntp_yenc::{EncodeOptions, Header, PartAssembler, decode, encode};
///
/// let file = b"Hello World!";
/// let part1 = encode(&file[..6], Header::multipart("hw.txt", 12, 1, 2, 0, 6), EncodeOptions::default())?;
/// let part2 = encode(&file[6..], Header::multipart("hw.txt", 12, 2, 2, 6, 12), EncodeOptions::default())?;
///
/// let mut assembler = PartAssembler::new();
/// assembler.add_decoded(decode(&part2)?)?;
/// assembler.add_decoded(decode(&part1)?)?;
/// assert!(assembler.is_complete());
/// assert_eq!(assembler.assemble()?, file);
/// # Ok::<(), nntp_yenc::YencError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct PartAssembler {
    /// Expected filename
    name: Option<String>,
    /// Expected total file size
    size: Option<u64>,
    /// Expected number of parts, if any part declared it
    total: Option<u64>,
    /// Whole-file CRC32 from a trailer crc32, if seen
    expected_crc32: Option<u32>,
    /// Collected parts indexed by part number
    parts: BTreeMap<u64, Part>,
}

impl PartAssembler {
    /// Create an empty assembler
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a part decoded by [`decode`](crate::decode)
    ///
    /// A trailer crc32 is remembered and checked by [`assemble`](Self::assemble),
    /// unless it equals the part's own CRC32 while the part is only a slice of
    /// the file. Such a value describes the part, not the file.
    pub fn add_decoded(&mut self, decoded: Decoded) -> Result<()> {
        let covers_file = decoded.data.len() as u64 == decoded.header.size;
        let crc32 = decoded
            .trailer
            .as_ref()
            .and_then(|t| t.crc32)
            .filter(|&crc| covers_file || crc != decoded.crc32);
        self.add_part(&decoded.header, decoded.data)?;
        if let Some(crc32) = crc32 {
            self.expect_crc32(crc32);
        }
        Ok(())
    }

    /// Add the decoded data of one part described by `header`
    ///
    /// # Errors
    /// - `InvalidFormat` for a single-part header
    /// - `DataCorruption` if the part is a duplicate, overlaps another part,
    ///   disagrees with earlier parts, or `data` does not fill its range
    pub fn add_part(&mut self, header: &Header, data: Vec<u8>) -> Result<()> {
        if !header.is_multipart() {
            return Err(YencError::InvalidFormat(
                "Cannot add single-part file to multi-part assembler".to_string(),
            ));
        }
        self.check_consistency(header)?;

        let (begin, end) = (header.begin, header.end);
        if end < begin || end > header.size || data.len() as u64 != end - begin {
            return Err(YencError::DataCorruption(format!(
                "Part {} has {} bytes for range {}..{} of {}",
                header.part,
                data.len(),
                begin,
                end,
                header.size
            )));
        }
        if self.parts.contains_key(&header.part) {
            return Err(YencError::DataCorruption(format!(
                "Part {} already added",
                header.part
            )));
        }
        for (num, existing) in &self.parts {
            if begin < existing.end && existing.begin < end {
                return Err(YencError::DataCorruption(format!(
                    "Part {} range ({}..{}) overlaps with part {} range ({}..{})",
                    header.part, begin, end, num, existing.begin, existing.end
                )));
            }
        }

        if self.name.is_none() {
            self.name = Some(header.name.clone());
            self.size = Some(header.size);
        }
        if header.total > 0 {
            self.total = Some(header.total);
        }
        self.parts.insert(header.part, Part { begin, end, data });
        Ok(())
    }

    fn check_consistency(&self, header: &Header) -> Result<()> {
        if let Some(name) = &self.name
            && name != &header.name
        {
            return Err(YencError::DataCorruption(format!(
                "Inconsistent filename: expected {}, got {}",
                name, header.name
            )));
        }
        if let Some(size) = self.size
            && size != header.size
        {
            return Err(YencError::DataCorruption(format!(
                "Inconsistent total size: expected {}, got {}",
                size, header.size
            )));
        }
        if let Some(total) = self.total
            && header.total > 0
            && total != header.total
        {
            return Err(YencError::DataCorruption(format!(
                "Inconsistent total parts: expected {}, got {}",
                total, header.total
            )));
        }
        if let Some(total) = self.total
            && header.part > total
        {
            return Err(YencError::DataCorruption(format!(
                "Part {} exceeds total {}",
                header.part, total
            )));
        }
        Ok(())
    }

    /// Remember the whole-file CRC32 to check on assembly
    pub fn expect_crc32(&mut self, crc32: u32) {
        self.expected_crc32 = Some(crc32);
    }

    /// Byte ranges of the file not covered by any part yet
    pub fn missing_ranges(&self) -> Vec<(u64, u64)> {
        let Some(size) = self.size else {
            return Vec::new();
        };
        let mut ranges: Vec<_> = self.parts.values().map(|p| (p.begin, p.end)).collect();
        ranges.sort_unstable();

        let mut missing = Vec::new();
        let mut covered = 0;
        for (begin, end) in ranges {
            if begin > covered {
                missing.push((covered, begin));
            }
            covered = covered.max(end);
        }
        if covered < size {
            missing.push((covered, size));
        }
        missing
    }

    /// Part numbers not received yet, when the total is known
    pub fn missing_parts(&self) -> Vec<u64> {
        match self.total {
            Some(total) => (1..=total).filter(|n| !self.parts.contains_key(n)).collect(),
            None => Vec::new(),
        }
    }

    /// Check if the received parts cover the whole file
    pub fn is_complete(&self) -> bool {
        self.size.is_some() && self.missing_ranges().is_empty() && self.missing_parts().is_empty()
    }

    /// Get the number of parts received
    pub fn parts_received(&self) -> usize {
        self.parts.len()
    }

    /// Get expected filename
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Get expected total size
    pub fn expected_size(&self) -> Option<u64> {
        self.size
    }

    /// Assemble all parts into the complete file
    ///
    /// # Errors
    /// - `InvalidFormat` if parts are missing or the file CRC32 does not match
    pub fn assemble(&self) -> Result<Vec<u8>> {
        if !self.is_complete() {
            return Err(YencError::InvalidFormat(format!(
                "Cannot assemble: missing ranges {:?}",
                self.missing_ranges()
            )));
        }
        let size = self.size.unwrap_or_default();
        let mut result = Vec::with_capacity(size as usize);
        let mut parts: Vec<_> = self.parts.values().collect();
        parts.sort_unstable_by_key(|p| p.begin);
        for part in parts {
            result.extend_from_slice(&part.data);
        }

        if let Some(expected) = self.expected_crc32 {
            let calculated = crc32fast::hash(&result);
            if calculated != expected {
                return Err(YencError::InvalidFormat(format!(
                    "file crc32 mismatch: expected {:08x}, assembled {:08x}",
                    expected, calculated
                )));
            }
        }
        Ok(result)
    }
}
