//! # tensorcask — append-only tensor container for market-data capture
//!
//! Format guarantees:
//! - All numeric fields are little-endian; never negotiated
//! - Every chunk record carries its 256-bit BLAKE3 hash of the raw
//!   (pre-encoding) payload; a reader that decodes a chunk always reverifies
//!   it
//! - The index is a singly-linked chain of fixed-capacity blocks, each
//!   self-describing (raw or entropy-compressed, own hash); the chain is
//!   walkable from the header without touching chunk payloads
//! - Codec identity is a small `u16` tag enumerated in [`pipeline::CodecId`];
//!   an unknown tag fails the read immediately, no partial decode
//! - A single writer appends; any number of readers may open the same file
//!   concurrently for read-only access

pub mod backend;
pub mod compressor;
pub mod error;
pub mod extractor;
pub mod format;
pub mod hash;
pub mod ops;
pub mod pipeline;
pub mod reader;
pub mod serialize;
pub mod simd;
pub mod workspace;
pub mod writer;

pub use error::{CodecError, Error, FormatError, IoError, Result};
pub use extractor::{decode_chunk_stateless, Extractor};
pub use format::{ChunkRecord, FileHeader, IndexBlock};
pub use pipeline::{CodecId, Dtype, PrevState};
pub use reader::Reader;
pub use writer::{Writer, WriterOptions};
