//! Entropy compressor: a single pluggable byte-in/byte-out backend,
//! used for index-block payloads, header metadata blobs, and as the final
//! stage of every codec pipeline.
//!
//! Generalizes a `codec::Codec` trait (which carried five
//! interchangeable algorithms behind a UUID registry) down to the one
//! backend actually needed, keeping `zstd` — the default/recommended codec
//! among those five — as the sole implementation. The dictionary variant
//! mirrors `zstd::bulk::Compressor::with_dictionary`, used by
//! `original_source/src/codecs/zstd_compressor.h` for small, structurally
//! similar payloads like order-book snapshots.

use crate::error::CodecError;

/// Compression effort, 1 (fastest) through 22 (smallest), matching zstd's own
/// range and a `CompressionLevel` newtype.
pub const DEFAULT_LEVEL: i32 = 3;

pub trait EntropyCompressor {
    fn compress(&self, level: i32, input: &[u8]) -> Result<Vec<u8>, CodecError>;
    fn decompress(&self, input: &[u8], expected_size: usize) -> Result<Vec<u8>, CodecError>;
}

/// Zstd entropy backend, `ZstdCodec` generalized to the single
/// backend this crate exposes.
#[derive(Default, Clone, Copy)]
pub struct ZstdCompressor;

impl EntropyCompressor for ZstdCompressor {
    fn compress(&self, level: i32, input: &[u8]) -> Result<Vec<u8>, CodecError> {
        zstd::stream::encode_all(input, level)
            .map_err(|e| CodecError::CompressionFailure(e.to_string()))
    }

    fn decompress(&self, input: &[u8], expected_size: usize) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::with_capacity(expected_size);
        zstd::stream::copy_decode(input, &mut out)
            .map_err(|e| CodecError::DecompressionFailure(e.to_string()))?;
        if out.len() != expected_size {
            return Err(CodecError::InvalidSize { expected: expected_size, got: out.len() });
        }
        Ok(out)
    }
}

impl ZstdCompressor {
    /// Decompresses a zstd frame without a caller-known output size, relying
    /// on the frame's own embedded content size. Used for the header's
    /// metadata blobs, whose on-disk length prefix covers only the
    /// compressed bytes.
    pub fn decompress_to_end(&self, input: &[u8]) -> Result<Vec<u8>, CodecError> {
        zstd::stream::decode_all(input).map_err(|e| CodecError::DecompressionFailure(e.to_string()))
    }

    /// Dictionary-assisted compression, used for small fixed-shape payloads
    /// (order-book snapshots) that benefit from a shared prefix dictionary
    /// rather than per-chunk standalone compression. Mirrors
    /// `zstd_compressor.h`'s dictionary entry point.
    pub fn compress_with_dictionary(
        &self,
        level: i32,
        input: &[u8],
        dictionary: &[u8],
    ) -> Result<Vec<u8>, CodecError> {
        let mut encoder = zstd::bulk::Compressor::with_dictionary(level, dictionary)
            .map_err(|e| CodecError::CompressionFailure(e.to_string()))?;
        encoder
            .compress(input)
            .map_err(|e| CodecError::CompressionFailure(e.to_string()))
    }

    pub fn decompress_with_dictionary(
        &self,
        input: &[u8],
        expected_size: usize,
        dictionary: &[u8],
    ) -> Result<Vec<u8>, CodecError> {
        let mut decoder = zstd::bulk::Decompressor::with_dictionary(dictionary)
            .map_err(|e| CodecError::DecompressionFailure(e.to_string()))?;
        decoder
            .decompress(input, expected_size)
            .map_err(|e| CodecError::DecompressionFailure(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_arbitrary_bytes() {
        let c = ZstdCompressor;
        let data = b"the quick brown fox jumps over the lazy dog".repeat(16);
        let packed = c.compress(DEFAULT_LEVEL, &data).unwrap();
        let unpacked = c.decompress(&packed, data.len()).unwrap();
        assert_eq!(unpacked, data);
    }

    #[test]
    fn rejects_size_mismatch_on_decompress() {
        let c = ZstdCompressor;
        let data = b"hello world".to_vec();
        let packed = c.compress(DEFAULT_LEVEL, &data).unwrap();
        let err = c.decompress(&packed, data.len() + 1).unwrap_err();
        assert!(matches!(err, CodecError::InvalidSize { .. }));
    }

    #[test]
    fn dictionary_round_trip() {
        let c = ZstdCompressor;
        let dict = b"okx-ob-snapshot-dictionary-seed-bytes".repeat(4);
        let data = b"a representative order book snapshot payload".repeat(3);
        let packed = c.compress_with_dictionary(DEFAULT_LEVEL, &data, &dict).unwrap();
        let unpacked = c.decompress_with_dictionary(&packed, data.len(), &dict).unwrap();
        assert_eq!(unpacked, data);
    }
}
