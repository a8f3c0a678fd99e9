use crate::{Result, YencError};
use std::io::Read;

use super::buffer::InputBuffer;
use super::types::{Header, Trailer};

/// Keyword opening the header line
pub(crate) const YBEGIN: &[u8] = b"=ybegin ";
/// Keyword opening the part line of a multi-part file
pub(crate) const YPART: &[u8] = b"=ypart ";
/// Keyword opening the trailer line
pub(crate) const YEND: &[u8] = b"=yend ";

pub(crate) fn is_eol(c: u8) -> bool {
    c == b'\r' || c == b'\n'
}

/// Bytes that interrupt a run of plain encoded data
pub(crate) fn is_control(c: u8) -> bool {
    c == b'=' || is_eol(c)
}

/// Read the next `key=value` pair from the current line
///
/// Keys end at '='. Values end at a space or line terminator, except for
/// keys where `to_eol` returns true, whose value runs to the end of the line.
/// Returns `None` once the line terminator has been consumed, or when the
/// source ends on this line.
pub(crate) fn next_param<R: Read>(
    buf: &mut InputBuffer<R>,
    to_eol: impl Fn(&str) -> bool,
) -> Result<Option<(String, String)>> {
    loop {
        if !buf.fill_at_least(1)? {
            return Ok(None);
        }
        match buf.position(|c| c != b' ') {
            Some(i) => {
                buf.consume(i);
                break;
            }
            None => buf.clear(),
        }
    }
    if buf.peek(0).is_some_and(is_eol) {
        buf.consume(1);
        return Ok(None);
    }

    let Some(i) = buf.fill_until(is_control)? else {
        return Err(token_error(buf, "keyword"));
    };
    if buf.peek(i) != Some(b'=') {
        let key = String::from_utf8_lossy(&buf.bytes()[..i]).into_owned();
        return Err(YencError::InvalidFormat(format!(
            "keyword {:?} has no value",
            key
        )));
    }
    let key = String::from_utf8_lossy(&buf.take(i)).into_owned();
    buf.consume(1);

    let whole_line = to_eol(&key);
    let value = match buf.fill_until(|c| is_eol(c) || (!whole_line && c == b' '))? {
        Some(i) => buf.take(i),
        // Last line of the stream without a terminator
        None if buf.is_eof() => buf.take(buf.len()),
        None => return Err(token_error(buf, &format!("{} value", key))),
    };
    Ok(Some((key, String::from_utf8_lossy(&value).into_owned())))
}

fn token_error<R: Read>(buf: &InputBuffer<R>, what: &str) -> YencError {
    if buf.is_eof() {
        YencError::InvalidFormat(format!("unterminated {} at end of stream", what))
    } else {
        YencError::InvalidFormat(format!(
            "{} exceeds buffer capacity of {} bytes",
            what,
            buf.len()
        ))
    }
}

fn parse_u64(key: &str, value: &str) -> Result<u64> {
    value
        .parse()
        .map_err(|_| YencError::InvalidFormat(format!("invalid {} value {:?}", key, value)))
}

fn parse_crc(key: &str, value: &str) -> Result<u32> {
    u32::from_str_radix(value, 16)
        .map_err(|_| YencError::InvalidFormat(format!("invalid {} value {:?}", key, value)))
}

/// Parse the rest of a =ybegin line into `header`
///
/// Format: =ybegin [part=1 total=5] line=128 size=123456 name=file.bin
///
/// The keyword itself must already be consumed.
pub(crate) fn read_ybegin<R: Read>(buf: &mut InputBuffer<R>, header: &mut Header) -> Result<()> {
    let mut has_size = false;
    while let Some((key, value)) = next_param(buf, |key| key == "name")? {
        match key.as_str() {
            "line" => header.line = parse_u64(&key, &value)?,
            "size" => {
                header.size = parse_u64(&key, &value)?;
                has_size = true;
            }
            "part" => header.part = parse_u64(&key, &value)?,
            "total" => header.total = parse_u64(&key, &value)?,
            "name" => {
                // yEnc 1.2: leading and trailing spaces are cut by decoders
                header.name = value.trim().to_string();
                if header.name.is_empty() {
                    return Err(YencError::InvalidFormat("empty 'name' parameter".to_string()));
                }
            }
            _ => {}
        }
    }
    if header.line == 0 {
        return Err(YencError::InvalidFormat("Missing 'line' parameter".to_string()));
    }
    if !has_size {
        return Err(YencError::InvalidFormat("Missing 'size' parameter".to_string()));
    }
    Ok(())
}

/// Parse the rest of a =ypart line into `header`
///
/// Format: =ypart begin=1 end=384000
///
/// `begin` is 1-based on the wire and stored 0-based.
pub(crate) fn read_ypart<R: Read>(buf: &mut InputBuffer<R>, header: &mut Header) -> Result<()> {
    let mut begin = None;
    let mut end = None;
    while let Some((key, value)) = next_param(buf, |_| false)? {
        match key.as_str() {
            "begin" => begin = Some(parse_u64(&key, &value)?),
            "end" => end = Some(parse_u64(&key, &value)?),
            _ => {}
        }
    }
    let begin =
        begin.ok_or_else(|| YencError::InvalidFormat("Missing 'begin' parameter".to_string()))?;
    let end = end.ok_or_else(|| YencError::InvalidFormat("Missing 'end' parameter".to_string()))?;
    if begin == 0 {
        return Err(YencError::InvalidFormat(
            "part begin is 1-based but got 0".to_string(),
        ));
    }
    header.begin = begin - 1;
    header.end = end;
    if header.end < header.begin {
        return Err(YencError::InvalidFormat(format!(
            "part begin {} is after end {}",
            begin, end
        )));
    }
    if header.end > header.size {
        return Err(YencError::DataCorruption(format!(
            "part end {} exceeds file size {}",
            header.end, header.size
        )));
    }
    Ok(())
}

/// Parse the rest of a =yend line
///
/// Format: =yend size=384000 [part=1] [total=5] [pcrc32=12345678] [crc32=12345678]
///
/// Only syntax is checked here; the decoder validates values against the
/// header and the decoded data.
pub(crate) fn read_yend<R: Read>(buf: &mut InputBuffer<R>) -> Result<Trailer> {
    let mut trailer = Trailer::default();
    let mut size = None;
    while let Some((key, value)) = next_param(buf, |_| false)? {
        match key.as_str() {
            "size" => size = Some(parse_u64(&key, &value)?),
            "part" => trailer.part = Some(parse_u64(&key, &value)?),
            "total" => trailer.total = Some(parse_u64(&key, &value)?),
            "pcrc32" => trailer.pcrc32 = Some(parse_crc(&key, &value)?),
            "crc32" => trailer.crc32 = Some(parse_crc(&key, &value)?),
            _ => {}
        }
    }
    trailer.size = size
        .ok_or_else(|| YencError::InvalidFormat("Missing trailer 'size' parameter".to_string()))?;
    Ok(trailer)
}
