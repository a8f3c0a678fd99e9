//! Encode/decode round trips under different framings

use nntp_yenc::{
    CriticalBytes, DecodeOptions, Decoder, EncodeOptions, Encoder, Header, LineEnding,
    MAX_LINE_LENGTH, MIN_BUFFER_SIZE, YencError, decode, encode,
};
use std::io::Read;

/// Reader that hands out at most `chunk` bytes per call
struct Chunked<'a> {
    data: &'a [u8],
    chunk: usize,
}

impl Read for Chunked<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.chunk.min(buf.len()).min(self.data.len());
        buf[..n].copy_from_slice(&self.data[..n]);
        self.data = &self.data[n..];
        Ok(n)
    }
}

fn all_bytes(repeat: usize) -> Vec<u8> {
    (0..repeat).flat_map(|_| 0..=255u8).collect()
}

/// Lines between the header and the trailer
fn body_lines(encoded: &[u8]) -> Vec<&[u8]> {
    encoded
        .split(|&b| b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .filter(|line| !line.is_empty())
        .filter(|line| !line.starts_with(b"=ybegin ") && !line.starts_with(b"=yend "))
        .filter(|line| !line.starts_with(b"=ypart "))
        .collect()
}

#[test]
fn test_every_byte_value_roundtrips() {
    let data = all_bytes(4);
    for line_ending in [LineEnding::CrLf, LineEnding::Lf] {
        let options = EncodeOptions::default().line_ending(line_ending);
        let header = Header::single("bytes", data.len() as u64);
        let encoded = encode(&data, header, options).unwrap();
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded.data, data);
        assert_eq!(decoded.crc32, crc32fast::hash(&data));
    }
}

#[test]
fn test_line_widths_respected() {
    let data = all_bytes(3);
    for line in [1, 2, 3, 64, 127, 128, MAX_LINE_LENGTH] {
        let header = Header::single("lines", data.len() as u64).with_line(line);
        let encoded = encode(&data, header, EncodeOptions::default()).unwrap();
        for body in body_lines(&encoded) {
            assert!(
                body.len() as u64 <= line.max(2),
                "line width {} produced a {} byte line",
                line,
                body.len()
            );
        }
        assert_eq!(decode(&encoded).unwrap().data, data, "line width {}", line);
    }
}

#[test]
fn test_no_escape_split_across_lines() {
    let data = all_bytes(2);
    let header = Header::single("split", data.len() as u64).with_line(5);
    let encoded = encode(&data, header, EncodeOptions::default()).unwrap();
    for body in body_lines(&encoded) {
        assert!(!body.ends_with(b"="), "dangling escape in {:?}", body);
    }
}

#[test]
fn test_default_critical_bytes_never_appear_raw() {
    let data = all_bytes(2);
    let header = Header::single("raw", data.len() as u64).with_line(32);
    let encoded = encode(&data, header, EncodeOptions::default()).unwrap();
    for body in body_lines(&encoded) {
        assert!(!body.contains(&0));
        assert!(!body.contains(&b'\r'));
        let mut iter = body.iter();
        while let Some(&b) = iter.next() {
            if b == b'=' {
                let escaped = iter.next().copied().unwrap();
                assert!([b'@', b'J', b'M', b'}'].contains(&escaped));
            }
        }
    }
}

#[test]
fn test_extended_critical_bytes_escaped() {
    let data = all_bytes(2);
    let options = EncodeOptions::default().critical_bytes(CriticalBytes::Extended);
    let header = Header::single("extended", data.len() as u64).with_line(32);
    let encoded = encode(&data, header, options).unwrap();
    for body in body_lines(&encoded) {
        assert!(!body.contains(&b'\t'));
        assert!(!body.contains(&b'.'));
    }
    assert_eq!(decode(&encoded).unwrap().data, data);
}

#[test]
fn test_custom_critical_bytes_escaped() {
    let data = all_bytes(1);
    let options = EncodeOptions::default().critical_bytes(CriticalBytes::Custom(vec![b' ']));
    let header = Header::single("custom", data.len() as u64);
    let encoded = encode(&data, header, options).unwrap();
    for body in body_lines(&encoded) {
        assert!(!body.contains(&b' '));
    }
    assert_eq!(decode(&encoded).unwrap().data, data);
}

#[test]
fn test_buffer_size_independence() {
    let data: Vec<u8> = (0..20_000u32).map(|i| (i.wrapping_mul(2_654_435_761) >> 13) as u8).collect();
    let header = Header::single("big", data.len() as u64);
    let encoded = encode(&data, header, EncodeOptions::default()).unwrap();

    for buffer_size in [MIN_BUFFER_SIZE, 17, 64, 4096] {
        for chunk in [1, 7, 1000] {
            for out_size in [1, 3, 8192] {
                let source = Chunked {
                    data: &encoded,
                    chunk,
                };
                let options = DecodeOptions::default().buffer_size(buffer_size);
                let mut decoder = Decoder::with_options(source, options).unwrap();
                let mut decoded = Vec::new();
                let mut out = vec![0u8; out_size];
                loop {
                    let n = decoder.read_decoded(&mut out).unwrap();
                    if n == 0 {
                        break;
                    }
                    decoded.extend_from_slice(&out[..n]);
                }
                assert!(decoder.is_complete());
                assert_eq!(decoded, data, "buffer {} chunk {} out {}", buffer_size, chunk, out_size);
                assert_eq!(decoder.crc32(), crc32fast::hash(&data));
            }
        }
    }
}

#[test]
fn test_name_longer_than_buffer() {
    let name = "a very long file name that does not fit in a tiny buffer.part01.rar";
    let encoded = encode(b"xyz", Header::single(name, 3), EncodeOptions::default()).unwrap();

    let options = DecodeOptions::default().buffer_size(MIN_BUFFER_SIZE);
    let err = Decoder::with_options(encoded.as_slice(), options).unwrap_err();
    assert!(matches!(err, YencError::InvalidFormat(_)));

    let mut decoder = Decoder::new(encoded.as_slice()).unwrap();
    assert_eq!(decoder.header().name, name);
    let mut data = Vec::new();
    decoder.read_to_end(&mut data).unwrap();
    assert_eq!(data, b"xyz");
}

#[test]
fn test_encoder_chunking_independence() {
    let data = all_bytes(5);
    let header = Header::single("chunks", data.len() as u64).with_line(61);
    let whole = encode(&data, header.clone(), EncodeOptions::default()).unwrap();
    for chunk in [1, 2, 13, 255, 256] {
        let mut encoder = Encoder::new(Vec::new(), header.clone(), EncodeOptions::default()).unwrap();
        for piece in data.chunks(chunk) {
            encoder.push(piece).unwrap();
        }
        assert_eq!(encoder.finish().unwrap(), whole, "chunk {}", chunk);
    }
}

#[test]
fn test_data_after_trailer_left_buffered() {
    let mut article = encode(b"abc", Header::single("a", 3), EncodeOptions::default()).unwrap();
    article.extend_from_slice(b"-- \r\nsignature\r\n");
    let mut decoder = Decoder::new(article.as_slice()).unwrap();
    let mut data = Vec::new();
    decoder.read_to_end(&mut data).unwrap();
    assert_eq!(data, b"abc");
    assert!(decoder.buffered().trim_ascii_start().starts_with(b"-- "));
}

#[test]
fn test_prefix_data_skipped_when_allowed() {
    let mut article = b"Subject: test\r\nFrom: poster\r\n\r\n".to_vec();
    article.extend(encode(b"payload", Header::single("p", 7), EncodeOptions::default()).unwrap());
    let options = DecodeOptions::default()
        .allow_prefix_data(true)
        .buffer_size(MIN_BUFFER_SIZE);
    let mut decoder = Decoder::with_options(article.as_slice(), options).unwrap();
    let mut data = Vec::new();
    decoder.read_to_end(&mut data).unwrap();
    assert_eq!(data, b"payload");
}

#[test]
fn test_empty_file() {
    let encoded = encode(b"", Header::single("empty", 0), EncodeOptions::default()).unwrap();
    let mut decoder = Decoder::new(encoded.as_slice()).unwrap();
    let mut data = Vec::new();
    decoder.read_to_end(&mut data).unwrap();
    assert!(data.is_empty());
    assert!(decoder.is_complete());
    assert_eq!(decoder.trailer().unwrap().crc32, Some(0));
}
