//! Multi-part files: per-part encoding, independent decoding, reassembly

use nntp_yenc::{
    Decoded, Decoder, EncodeOptions, Encoder, Header, PartAssembler, YencError, decode, encode,
};
use std::io::Read;

fn sample_file(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + i / 256) as u8).collect()
}

/// Encode `file` as parts of at most `part_size` bytes
fn split(file: &[u8], part_size: usize, options: &EncodeOptions) -> Vec<Vec<u8>> {
    let total = file.len().div_ceil(part_size) as u64;
    file.chunks(part_size)
        .enumerate()
        .map(|(i, chunk)| {
            let begin = (i * part_size) as u64;
            let header = Header::multipart(
                "archive.bin",
                file.len() as u64,
                i as u64 + 1,
                total,
                begin,
                begin + chunk.len() as u64,
            );
            encode(chunk, header, options.clone()).unwrap()
        })
        .collect()
}

#[test]
fn test_part_lines_on_the_wire() {
    let file = b"0123456789";
    let header = Header::multipart("digits", 10, 2, 2, 5, 10).with_line(64);
    let options = EncodeOptions::default().trailer_part(true).trailer_total(true);
    let article = encode(&file[5..], header, options).unwrap();
    let text = String::from_utf8_lossy(&article);
    assert!(text.starts_with("=ybegin part=2 total=2 line=64 size=10 name=digits\r\n=ypart begin=6 end=10\r\n"));
    assert!(text.ends_with("=yend size=5 part=2 total=2\r\n"));
}

#[test]
fn test_parts_decode_independently() {
    let file = sample_file(10_000);
    let parts = split(&file, 3_000, &EncodeOptions::default());
    assert_eq!(parts.len(), 4);

    let mut offset = 0;
    for (i, article) in parts.iter().enumerate() {
        let decoded = decode(article).unwrap();
        let header = &decoded.header;
        assert_eq!(header.part, i as u64 + 1);
        assert_eq!(header.total, 4);
        assert_eq!(header.begin, offset);
        assert_eq!(header.size, 10_000);
        assert_eq!(decoded.data, file[offset as usize..header.end as usize]);

        let trailer = decoded.trailer.unwrap();
        if header.is_last_part() {
            assert_eq!(trailer.pcrc32, None);
        } else {
            assert_eq!(trailer.pcrc32, Some(crc32fast::hash(&decoded.data)));
        }
        assert_eq!(trailer.crc32, None);
        offset = header.end;
    }
    assert_eq!(offset, 10_000);
}

#[test]
fn test_parallel_decode_and_assemble() {
    let file = sample_file(50_000);
    let parts = split(&file, 7_000, &EncodeOptions::default());

    let decoded: Vec<Decoded> = std::thread::scope(|s| {
        let handles: Vec<_> = parts
            .iter()
            .rev()
            .map(|article| s.spawn(move || decode(article)))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect()
    });

    let mut assembler = PartAssembler::new();
    for part in decoded {
        assembler.add_decoded(part).unwrap();
    }
    assert!(assembler.is_complete());
    assert_eq!(assembler.parts_received(), parts.len());
    assert_eq!(assembler.name(), Some("archive.bin"));
    assembler.expect_crc32(crc32fast::hash(&file));
    assert_eq!(assembler.assemble().unwrap(), file);
}

#[test]
fn test_missing_part_reported() {
    let file = sample_file(9_000);
    let parts = split(&file, 3_000, &EncodeOptions::default());
    let mut assembler = PartAssembler::new();
    assembler.add_decoded(decode(&parts[0]).unwrap()).unwrap();
    assembler.add_decoded(decode(&parts[2]).unwrap()).unwrap();
    assert_eq!(assembler.missing_parts(), vec![2]);
    assert_eq!(assembler.missing_ranges(), vec![(3_000, 6_000)]);
    assert!(assembler.assemble().is_err());
}

#[test]
fn test_corrupt_part_pcrc32() {
    let file = sample_file(1_000);
    let mut parts = split(&file, 400, &EncodeOptions::default());
    let article = &mut parts[0];
    let header_end = article
        .windows(2)
        .enumerate()
        .filter(|(_, w)| *w == b"\r\n")
        .nth(1)
        .map(|(i, _)| i + 2)
        .unwrap();
    // Alter a plain byte while keeping it plain
    let pos = (header_end..article.len())
        .find(|&i| article[i].is_ascii_alphabetic())
        .unwrap();
    article[pos] ^= 0x20;

    let err = decode(&parts[0]).unwrap_err();
    assert!(matches!(err, YencError::InvalidFormat(ref msg) if msg.contains("pcrc32")));
}

#[test]
fn test_trailer_part_mismatch() {
    let article = b"=ybegin part=1 total=2 line=128 size=4 name=x\r\n=ypart begin=1 end=2\r\nkl\r\n=yend size=2 part=2\r\n";
    assert!(matches!(decode(article), Err(YencError::DataCorruption(_))));

    let article = b"=ybegin part=1 total=2 line=128 size=4 name=x\r\n=ypart begin=1 end=2\r\nkl\r\n=yend size=2 total=3\r\n";
    assert!(matches!(decode(article), Err(YencError::DataCorruption(_))));
}

#[test]
fn test_part_size_mismatch() {
    // Trailer agrees with the data but not with the =ypart range
    let article = b"=ybegin part=1 total=2 line=128 size=4 name=x\r\n=ypart begin=1 end=3\r\nkl\r\n=yend size=2\r\n";
    assert!(matches!(decode(article), Err(YencError::DataCorruption(_))));
}

#[test]
fn test_last_part_checksum_options() {
    let file = b"abcdef";
    let header = Header::multipart("f", 6, 2, 2, 3, 6);
    let options = EncodeOptions::default()
        .pcrc32_for_last_part(true)
        .crc32_for_last_part(true);
    let article = encode(&file[3..], header, options).unwrap();
    let crc = crc32fast::hash(b"def");
    let text = String::from_utf8_lossy(&article);
    assert!(text.ends_with(&format!("=yend size=3 pcrc32={:08x} crc32={:08x}\r\n", crc, crc)));

    // crc32 is only checked when the decoded bytes make up the whole file
    let decoded = decode(&article).unwrap();
    assert_eq!(decoded.data, b"def");
    assert_eq!(decoded.trailer.unwrap().crc32, Some(crc));
}

#[test]
fn test_unknown_total_has_no_pcrc32() {
    let header = Header::multipart("f", 6, 1, 0, 0, 3);
    let article = encode(b"abc", header, EncodeOptions::default()).unwrap();
    assert!(article.ends_with(b"\r\n=yend size=3\r\n"));
    let decoded = decode(&article).unwrap();
    assert_eq!(decoded.header.total, 0);
    assert_eq!(decoded.data, b"abc");
    assert_eq!(decoded.trailer.unwrap().pcrc32, None);
}

#[test]
fn test_reassemble_with_last_part_crc32() {
    let file = sample_file(3000);
    let mut articles: Vec<Vec<u8>> = (0..2u64)
        .map(|i| {
            let (begin, end) = (i * 1000, (i + 1) * 1000);
            let header = Header::multipart("archive.bin", 3000, i + 1, 3, begin, end);
            let chunk = &file[begin as usize..end as usize];
            encode(chunk, header, EncodeOptions::default()).unwrap()
        })
        .collect();
    let last = Header::multipart("archive.bin", 3000, 3, 3, 2000, 3000);

    // The last part's own crc32 does not stand in for the file checksum
    let options = EncodeOptions::default().crc32_for_last_part(true);
    articles.push(encode(&file[2000..], last.clone(), options).unwrap());
    let mut assembler = PartAssembler::new();
    for article in &articles {
        assembler.add_decoded(decode(article).unwrap()).unwrap();
    }
    assert!(assembler.is_complete());
    assert_eq!(assembler.assemble().unwrap(), file);

    let options = EncodeOptions::default()
        .crc32_for_last_part(true)
        .file_crc32(crc32fast::hash(&file));
    articles[2] = encode(&file[2000..], last.clone(), options).unwrap();
    let text = String::from_utf8_lossy(&articles[2]).into_owned();
    assert!(text.ends_with(&format!("crc32={:08x}\r\n", crc32fast::hash(&file))));
    let mut assembler = PartAssembler::new();
    for article in &articles {
        assembler.add_decoded(decode(article).unwrap()).unwrap();
    }
    assert_eq!(assembler.assemble().unwrap(), file);

    let options = EncodeOptions::default()
        .crc32_for_last_part(true)
        .file_crc32(crc32fast::hash(b"another file"));
    articles[2] = encode(&file[2000..], last, options).unwrap();
    let mut assembler = PartAssembler::new();
    for article in &articles {
        assembler.add_decoded(decode(article).unwrap()).unwrap();
    }
    assert!(matches!(
        assembler.assemble(),
        Err(YencError::InvalidFormat(_))
    ));
}

#[test]
fn test_single_part_as_multipart() {
    let options = EncodeOptions::default().single_part_as_multipart(true);
    let mut encoder = Encoder::new(Vec::new(), Header::single("whole", 4), options).unwrap();
    assert_eq!(encoder.header().part, 1);
    assert_eq!(encoder.header().total, 1);
    encoder.push(b"data").unwrap();
    let article = encoder.finish().unwrap();

    let mut decoder = Decoder::new(article.as_slice()).unwrap();
    assert_eq!(decoder.header().begin, 0);
    assert_eq!(decoder.header().end, 4);
    let mut data = Vec::new();
    decoder.read_to_end(&mut data).unwrap();
    assert_eq!(data, b"data");
    assert_eq!(decoder.trailer().unwrap().pcrc32, Some(crc32fast::hash(b"data")));
}

#[test]
fn test_part_one_without_part_line() {
    // Without =ypart the part has no byte range to hold its data
    let article = b"=ybegin part=1 line=128 size=2 name=x\r\nkl\r\n=yend size=2\r\n";
    assert!(matches!(decode(article), Err(YencError::DataCorruption(_))));
}
