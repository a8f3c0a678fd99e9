//! Split a file into yEnc parts and put it back together
//!
//! Run with: cargo run --example roundtrip -- <file> [part size]

use nntp_yenc::{EncodeOptions, Encoder, Header, PartAssembler, decode};
use std::io::Write;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let path = args.next().ok_or("usage: roundtrip <file> [part size]")?;
    let part_size = args
        .next()
        .map(|s| s.parse::<usize>())
        .transpose()?
        .unwrap_or(384_000)
        .max(1);

    let file = std::fs::read(&path)?;
    let name = std::path::Path::new(&path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("file.bin");
    let total = file.len().div_ceil(part_size) as u64;

    println!("Encoding {} ({} bytes) into {} parts...", name, file.len(), total);

    let mut articles = Vec::new();
    for (i, chunk) in file.chunks(part_size).enumerate() {
        let begin = (i * part_size) as u64;
        let header = Header::multipart(
            name,
            file.len() as u64,
            i as u64 + 1,
            total,
            begin,
            begin + chunk.len() as u64,
        );
        let mut encoder = Encoder::new(Vec::new(), header, EncodeOptions::default())?;
        encoder.write_all(chunk)?;
        articles.push(encoder.finish()?);
    }

    let encoded: usize = articles.iter().map(Vec::len).sum();
    println!(
        "Encoded size: {} bytes ({:.2}% overhead)",
        encoded,
        (encoded as f64 / file.len().max(1) as f64 - 1.0) * 100.0
    );

    let mut assembler = PartAssembler::new();
    for article in articles.iter().rev() {
        assembler.add_decoded(decode(article)?)?;
    }
    assembler.expect_crc32(crc32fast::hash(&file));
    let restored = assembler.assemble()?;
    assert_eq!(restored, file);

    println!("Reassembled {} parts, CRC32 {:08x}", total, crc32fast::hash(&restored));
    Ok(())
}
