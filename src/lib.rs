#![doc = include_str!("../README.md")]

mod config;
mod error;
/// Streaming yEnc encoder and decoder
pub mod yenc;

pub use config::{
    CriticalBytes, DEFAULT_BUFFER_SIZE, DEFAULT_CRITICAL_BYTES, DecodeOptions, EXTENDED_CRITICAL_BYTES,
    EncodeOptions, LineEnding, MIN_BUFFER_SIZE,
};
pub use error::{Result, YencError};
pub use yenc::{
    DEFAULT_LINE_LENGTH, Decoded, Decoder, Encoder, Header, MAX_LINE_LENGTH, PartAssembler, Trailer,
    decode, encode,
};
