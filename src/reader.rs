//! Single-reader container reader.
//!
//! Grounded in `original_source/src/data_io/data_reader.h`/`.cpp`: the
//! constructor walks the chained index once up front, flattening every
//! block's non-zero offsets into `chunk_offsets` (hash verification happens
//! per-block inside [`IndexBlock::read`]), so later lookups are a plain
//! vector index plus a seek.

use crate::backend::{FileBackend, MappedBackend, MemoryBackend, StorageBackend};
use crate::error::{Error, Result};
use crate::format::{ChunkRecord, FileHeader, IndexBlock};

/// Reads [`ChunkRecord`]s out of a container built by [`crate::writer::Writer`].
pub struct Reader<B: StorageBackend> {
    backend: B,
    header: FileHeader,
    chunk_offsets: Vec<u64>,
}

impl<B: StorageBackend> Reader<B> {
    /// Reads the header and walks the full chained index, collecting every
    /// filled slot's absolute offset in order.
    pub fn open(mut backend: B) -> Result<Self> {
        let header = FileHeader::read(&mut backend)?;
        let capacity = header.internal.index_block_capacity as usize;

        let mut chunk_offsets = Vec::new();
        let mut current = backend.tell();
        loop {
            backend.seek(current)?;
            let block = IndexBlock::read(&mut backend, capacity)?;
            for &offset in block.offsets() {
                if offset == 0 {
                    break;
                }
                chunk_offsets.push(offset);
            }
            let next = block.next_pointer();
            if next == 0 {
                break;
            }
            current = next;
        }

        Ok(Self { backend, header, chunk_offsets })
    }

    pub fn num_chunks(&self) -> usize {
        self.chunk_offsets.len()
    }

    /// The absolute on-disk offset of chunk `index`, for callers (e.g. the
    /// extractor) that need it to report a [`crate::error::FormatError::ChunkHashMismatch`]
    /// at the right offset.
    pub fn chunk_offset(&self, index: usize) -> Result<u64> {
        self.chunk_offsets
            .get(index)
            .copied()
            .ok_or_else(|| Error::InvalidArgument(format!("chunk index {index} out of range")))
    }

    pub fn get_chunk(&mut self, index: usize) -> Result<ChunkRecord> {
        let offset = self.chunk_offset(index)?;
        self.backend.seek(offset)?;
        let record = ChunkRecord::read(&mut self.backend)?;
        Ok(record)
    }

    /// Reads chunks `[start, end)`, clamping `end` to [`Self::num_chunks`].
    pub fn get_chunk_slice(&mut self, start: usize, end: usize) -> Result<Vec<ChunkRecord>> {
        let end = end.min(self.chunk_offsets.len());
        if start > end {
            return Err(Error::InvalidArgument(format!(
                "chunk range start {start} is past end {end}"
            )));
        }
        let mut out = Vec::with_capacity(end - start);
        for i in start..end {
            out.push(self.get_chunk(i)?);
        }
        Ok(out)
    }

    pub fn file_header(&self) -> &FileHeader {
        &self.header
    }

    pub fn into_backend(self) -> B {
        self.backend
    }
}

impl Reader<FileBackend> {
    pub fn open_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        Self::open(FileBackend::open_read_only(path)?)
    }
}

impl Reader<MemoryBackend> {
    pub fn open_memory(backend: MemoryBackend) -> Result<Self> {
        Self::open(backend)
    }

    /// Opens an in-memory container read-only: any attempted write through
    /// the returned reader's backend (e.g. via [`crate::writer::Writer::open_for_append`]
    /// on the same bytes) fails instead of silently mutating the buffer.
    pub fn open_memory_read_only(bytes: Vec<u8>) -> Result<Self> {
        Self::open(MemoryBackend::open_read_only(bytes))
    }
}

impl Reader<MappedBackend> {
    pub fn open_mapped(path: impl AsRef<std::path::Path>) -> Result<Self> {
        Self::open(MappedBackend::open_for_append(path)?)
    }
}
