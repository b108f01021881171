//! Brotli compression of pre-rendered payloads
//!
//! Every payload (post pages and the feed) is compressed with the same
//! settings so the output is reproducible.

use brotli::enc::BrotliEncoderParams;
use thiserror::Error;

/// Brotli quality, 0 (fastest) to 11 (smallest)
pub const QUALITY: i32 = 6;

/// Brotli sliding window, as log2 of its size
pub const WINDOW: i32 = 22;

#[derive(Error, Debug)]
#[error("brotli compression failed: {0}")]
pub struct CompressError(#[from] std::io::Error);

fn params() -> BrotliEncoderParams {
    BrotliEncoderParams {
        quality: QUALITY,
        lgwin: WINDOW,
        ..Default::default()
    }
}

/// Compress a payload
pub fn compress(payload: &[u8]) -> Result<Vec<u8>, CompressError> {
    let mut input = payload;
    let mut output = Vec::with_capacity(payload.len() / 2);
    brotli::BrotliCompress(&mut input, &mut output, &params())?;
    Ok(output)
}

/// Decompress a payload produced by [`compress`]
pub fn decompress(compressed: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut input = compressed;
    let mut output = Vec::new();
    brotli::BrotliDecompress(&mut input, &mut output)?;
    Ok(output)
}
