//! Body compression capability and the two algorithms the protocol names.

use std::fmt::Debug;

use super::frame_errors::FrameError;

/// A body compression algorithm negotiated in STARTUP.
///
/// Implementations only transform the payload; the 4-byte uncompressed
/// length that precedes a compressed body is written and checked by the
/// frame codec.
pub trait Compressor: Send + Sync + Debug {
    /// Name of the algorithm, as listed in the `COMPRESSION` option of SUPPORTED.
    fn algorithm(&self) -> &'static str;

    /// Compresses a whole frame body.
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, FrameError>;

    /// Decompresses `data` into a body that is expected to be `uncompressed_len` bytes long.
    fn decompress(&self, data: &[u8], uncompressed_len: usize) -> Result<Vec<u8>, FrameError>;
}

/// LZ4 block format, as produced by `lz4_flex::compress`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Lz4Compressor;

impl Compressor for Lz4Compressor {
    fn algorithm(&self) -> &'static str {
        "lz4"
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, FrameError> {
        Ok(lz4_flex::compress(data))
    }

    fn decompress(&self, data: &[u8], uncompressed_len: usize) -> Result<Vec<u8>, FrameError> {
        lz4_flex::decompress(data, uncompressed_len)
            .map_err(|err| FrameError::FrameDecompression(err.to_string()))
    }
}

/// Snappy raw format.
#[derive(Debug, Default, Clone, Copy)]
pub struct SnappyCompressor;

impl Compressor for SnappyCompressor {
    fn algorithm(&self) -> &'static str {
        "snappy"
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, FrameError> {
        snap::raw::Encoder::new()
            .compress_vec(data)
            .map_err(|err| FrameError::FrameCompression(err.to_string()))
    }

    fn decompress(&self, data: &[u8], _uncompressed_len: usize) -> Result<Vec<u8>, FrameError> {
        snap::raw::Decoder::new()
            .decompress_vec(data)
            .map_err(|err| FrameError::FrameDecompression(err.to_string()))
    }
}
