//! Crate-wide error types.
//!
//! Composes per-module `thiserror` enums (`SuperblockError`,
//! `CodecError`, `CryptoError`) composed at call boundaries, generalized to
//! a taxonomy of structural, integrity, I/O, codec, and policy errors.

use thiserror::Error;

/// Errors from the storage backend.
#[derive(Error, Debug)]
pub enum IoError {
    #[error("backend is read-only")]
    ReadOnly,
    #[error("seek past end on a read-only backend (offset {offset}, size {size})")]
    SeekPastEndReadOnly { offset: u64, size: u64 },
    #[error("I/O error: {0}")]
    Std(#[from] std::io::Error),
}

/// Errors from on-disk record structure: header, index block, chunk.
#[derive(Error, Debug)]
pub enum FormatError {
    #[error("invalid magic number — not a tensorcask container")]
    InvalidMagic,
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u16),
    #[error("record size mismatch: header declared {declared}, actual {actual}")]
    SizeMismatch { declared: u32, actual: u64 },
    #[error("index block integrity hash mismatch at offset {offset}")]
    IndexHashMismatch { offset: u64 },
    #[error("chunk integrity hash mismatch at offset {offset}")]
    ChunkHashMismatch { offset: u64 },
    #[error("shape has {0} dimensions, exceeding the 32-dimension limit")]
    TooManyDimensions(usize),
    #[error("shape dimension is negative: {0}")]
    NegativeDimension(i64),
    #[error("unknown dtype tag {0}")]
    UnknownDtype(u16),
    #[error("unknown codec tag {0}")]
    UnknownCodec(u16),
    #[error("header growth on rewrite would require relocating the index chain, which this writer refuses")]
    HeaderGrowthRefused,
    #[error(transparent)]
    Io(#[from] IoError),
}

/// Errors from codec pipelines.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("invalid shape for this codec: {0}")]
    InvalidShape(String),
    #[error("invalid dtype for this codec: {0}")]
    InvalidDtype(String),
    #[error("payload size {got} does not match expected {expected}")]
    InvalidSize { expected: usize, got: usize },
    #[error("prev-state length mismatch: expected {expected}, got {got}")]
    InvalidState { expected: usize, got: usize },
    #[error("compression failed: {0}")]
    CompressionFailure(String),
    #[error("decompression failed: {0}")]
    DecompressionFailure(String),
    #[error("internal codec error: {0}")]
    Internal(String),
}

/// Top-level crate error, composing the above at API boundaries.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] IoError),
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("operation not permitted: {0}")]
    InvalidArgument(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(IoError::Std(e))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
