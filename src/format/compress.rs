//! LZ4 compression policy for the package format.
//!
//! This crate needs exact byte-count bookkeeping (`CompressedSize`/`UncompressedSize`
//! live in the [`crate::format::record::FileRecord`], not in the data region itself),
//! so it uses the `lz4` crate's `block` module rather than its frame
//! encoder/decoder — LZ4 block compression with a caller-supplied, bounded
//! destination size on decode.

use crate::constants::COMPRESS_MIN_BYTES;
use crate::error::{Result, VfsError};

/// The outcome of applying the compression policy to a staged payload.
pub struct CompressionOutcome {
    /// The bytes that should actually be written to the data region.
    pub bytes: Vec<u8>,
    pub uncompressed_size: u32,
    pub compressed_size: u32,
}

/// Applies the compression policy: compression is attempted
/// only when requested AND the payload is at least [`COMPRESS_MIN_BYTES`]. If LZ4
/// fails to beat the uncompressed size (pathological input), storage falls back to
/// verbatim rather than inflating the data region.
pub fn maybe_compress(data: &[u8], compress: bool) -> Result<CompressionOutcome> {
    let uncompressed_size = u32::try_from(data.len())
        .map_err(|_| VfsError::InvalidArgument("payload exceeds u32::MAX bytes".into()))?;

    if compress && data.len() as u64 >= COMPRESS_MIN_BYTES {
        let compressed = lz4::block::compress(data, None, false)
            .map_err(|e| VfsError::Format(format!("lz4 compression failed: {e}")))?;
        if compressed.len() < data.len() {
            let compressed_size = compressed.len() as u32;
            return Ok(CompressionOutcome { bytes: compressed, uncompressed_size, compressed_size });
        }
    }

    Ok(CompressionOutcome { bytes: data.to_vec(), uncompressed_size, compressed_size: uncompressed_size })
}

/// Reverses [`maybe_compress`]. `compressed_size == uncompressed_size` means the data
/// region is verbatim; otherwise it is LZ4 block data decoded with the declared
/// `uncompressed_size` as the bound on the safe decoder's destination buffer. Any
/// mismatch between the decoded length and `uncompressed_size` is a [`VfsError::Format`].
pub fn decompress(data: &[u8], uncompressed_size: u32, compressed_size: u32) -> Result<Vec<u8>> {
    if compressed_size == uncompressed_size {
        return Ok(data.to_vec());
    }
    let out = lz4::block::decompress(data, Some(uncompressed_size as i32))
        .map_err(|e| VfsError::Format(format!("lz4 decompression failed: {e}")))?;
    if out.len() as u32 != uncompressed_size {
        return Err(VfsError::Format(format!(
            "decompressed {} bytes, expected {uncompressed_size}",
            out.len()
        )));
    }
    Ok(out)
}
