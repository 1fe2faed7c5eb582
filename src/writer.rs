//! Single-writer container writer.
//!
//! Grounded in `original_source/src/data_io/data_writer.h`/`.cpp`: the
//! header is written once up front, followed by the first (empty) index
//! block; every `append_chunk` call writes the chunk record, then patches
//! the current index block's offset slot and recalculated hash in place
//! with two small `write_pod_at` writes, restoring the cursor to the end of
//! the newly-written chunk afterward so the backend always ends positioned
//! for the next append. When a block fills up and its successor is linked
//! in, the now-sealed block gets one more rewrite through
//! [`crate::format::IndexBlock::write`], which opportunistically
//! entropy-compresses its offset array.

use crate::backend::{FileBackend, MemoryBackend, StorageBackend};
use crate::error::{Error, FormatError, Result};
use crate::format::{ChunkRecord, FileHeader, IndexBlock, DEFAULT_INDEX_BLOCK_CAPACITY, MAX_SHAPE_DIMENSIONS};
use crate::hash::StreamHasher;
use crate::pipeline::{CodecId, Dtype};

/// Construction-time options for a new container, mirroring the
/// `chunk_offsets_block_capacity`/`user_metadata` parameters
/// `DataWriter::create_new` takes.
#[derive(Debug, Clone)]
pub struct WriterOptions {
    pub index_block_capacity: u32,
    pub compression_level: i32,
    pub user_metadata: Vec<u8>,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            index_block_capacity: DEFAULT_INDEX_BLOCK_CAPACITY as u32,
            compression_level: 3,
            user_metadata: Vec::new(),
        }
    }
}

/// Appends [`ChunkRecord`]s to a chained index, one backend, one writer.
/// Not `Clone`/`Sync` — the container format has no concurrent-writer story
/// (spec Non-goal).
pub struct Writer<B: StorageBackend> {
    backend: Option<B>,
    header: FileHeader,
    index_blocks: Vec<IndexBlock>,
    block_starts: Vec<u64>,
    next_slot: usize,
    capacity: usize,
    compression_level: i32,
    chunks_written: usize,
}

impl<B: StorageBackend> Writer<B> {
    /// Writes a fresh header and the first index block to `backend`, which
    /// must be empty (positioned at offset 0 with nothing written yet).
    pub fn create_new(mut backend: B, options: WriterOptions) -> Result<Self> {
        let mut header = FileHeader::new(options.index_block_capacity);
        header.user_metadata = options.user_metadata;
        header.write(&mut backend)?;

        let mut writer = Self {
            backend: Some(backend),
            header,
            index_blocks: Vec::new(),
            block_starts: Vec::new(),
            next_slot: 0,
            capacity: options.index_block_capacity as usize,
            compression_level: options.compression_level,
            chunks_written: 0,
        };
        writer.write_new_index_block(None)?;
        Ok(writer)
    }

    /// Opens an existing container for appending: reads the header, walks
    /// the chained index to rebuild the in-memory block list, and finds the
    /// first free slot in the last block (or marks it full).
    pub fn open_for_append(mut backend: B) -> Result<Self> {
        let header = FileHeader::read(&mut backend)?;
        let capacity = header.internal.index_block_capacity as usize;

        let mut index_blocks = Vec::new();
        let mut block_starts = Vec::new();
        let mut current = backend.tell();
        loop {
            backend.seek(current)?;
            let block = IndexBlock::read(&mut backend, capacity)?;
            let next = block.next_pointer();
            block_starts.push(current);
            index_blocks.push(block);
            if next == 0 {
                break;
            }
            current = next;
        }
        if index_blocks.is_empty() {
            return Err(Error::Format(FormatError::SizeMismatch { declared: 0, actual: 0 }));
        }

        let mut next_slot = capacity;
        for (i, &offset) in index_blocks.last().unwrap().offsets().iter().enumerate() {
            if offset == 0 {
                next_slot = i;
                break;
            }
        }

        let end = backend.size();
        backend.seek(end)?;

        let chunks_written = (index_blocks.len() - 1) * capacity + next_slot;

        Ok(Self {
            backend: Some(backend),
            header,
            index_blocks,
            block_starts,
            next_slot,
            capacity,
            compression_level: 3,
            chunks_written,
        })
    }

    fn backend_mut(&mut self) -> &mut B {
        self.backend.as_mut().expect("writer backend already released")
    }

    fn write_new_index_block(&mut self, previous_block_start: Option<u64>) -> Result<()> {
        let block = IndexBlock::new(self.capacity);
        let new_block_start = self.backend_mut().tell();
        block.write_raw(self.backend_mut())?;
        self.index_blocks.push(block);
        self.block_starts.push(new_block_start);
        self.next_slot = 0;

        if let Some(prev_start) = previous_block_start {
            self.patch_previous_block_pointer(prev_start, new_block_start)?;
            self.seal_previous_block(prev_start)?;
        }
        Ok(())
    }

    /// Rewrites a now-complete block's full on-disk record via
    /// [`IndexBlock::write`], which opportunistically entropy-compresses the
    /// offset array and pads back to the same fixed footprint (the index
    /// compression policy). Only safe once the block will never be patched
    /// again, i.e. right after its successor has been linked in.
    fn seal_previous_block(&mut self, prev_block_start: u64) -> Result<()> {
        let prev_index = self.index_blocks.len() - 2;
        let backend = self.backend.as_mut().expect("writer backend already released");
        let saved_pos = backend.tell();
        backend.seek(prev_block_start)?;
        self.index_blocks[prev_index].write(backend)?;
        backend.seek(saved_pos)?;
        Ok(())
    }

    /// Updates the previous block's next-pointer slot and recalculated hash
    /// both in memory and on disk, restoring the cursor afterward.
    fn patch_previous_block_pointer(&mut self, prev_block_start: u64, new_block_start: u64) -> Result<()> {
        let saved_pos = self.backend_mut().tell();

        let prev_index = self.index_blocks.len() - 2;
        let capacity = self.capacity;
        {
            let prev_block = &mut self.index_blocks[prev_index];
            prev_block.set_next_pointer(new_block_start);
        }
        let hash = Self::hash_slots(&self.index_blocks[prev_index]);

        let pointer_offset = prev_block_start + IndexBlock::slot_field_offset(capacity);
        crate::serialize::write_pod_at(self.backend_mut(), pointer_offset, &new_block_start)?;
        let hash_offset = prev_block_start + IndexBlock::hash_field_offset();
        crate::serialize::write_pod_at(self.backend_mut(), hash_offset, &hash)?;

        self.backend_mut().seek(saved_pos)?;
        Ok(())
    }

    fn hash_slots(block: &IndexBlock) -> [u8; 32] {
        let mut hasher = StreamHasher::new();
        hasher.update_u64_native(&block.slots);
        hasher.finalize_256()
    }

    /// Appends one already-encoded chunk. `payload` is the codec's output
    /// bytes; `raw_data_hash` is the 256-bit BLAKE3 hash of the
    /// *pre-encoding* element bytes, computed by the caller (the pipeline
    /// boundary lives in [`crate::ops`], not here — mirrors
    /// `DataWriter::append_chunk` receiving an already-processed `Chunk`).
    /// Returns the index of the newly appended chunk.
    pub fn append_chunk(
        &mut self,
        codec: CodecId,
        dtype: Dtype,
        flags: u64,
        shape: &[u32],
        raw_data_hash: [u8; 32],
        payload: Vec<u8>,
    ) -> Result<usize> {
        if shape.len() > MAX_SHAPE_DIMENSIONS {
            return Err(Error::Format(FormatError::TooManyDimensions(shape.len())));
        }

        if self.next_slot >= self.capacity {
            let previous_block_start = *self.block_starts.last().unwrap();
            self.write_new_index_block(Some(previous_block_start))?;
        }

        let mut stored_shape: Vec<i64> = shape.iter().map(|&d| d as i64).collect();
        if stored_shape.is_empty() || *stored_shape.last().unwrap() != 0 {
            stored_shape.push(0);
        }

        let record = ChunkRecord {
            codec: codec as u16,
            dtype: dtype as u16,
            hash: raw_data_hash,
            flags,
            shape: stored_shape,
            payload,
        };

        let chunk_start_offset = self.backend_mut().tell();
        record.write(self.backend_mut())?;
        let end_of_chunk_pos = self.backend_mut().tell();

        let current_block_start = *self.block_starts.last().unwrap();
        let slot_index = self.next_slot;
        let capacity = self.capacity;
        {
            let current_block = self.index_blocks.last_mut().unwrap();
            current_block.slots[slot_index] = chunk_start_offset;
        }
        let hash = Self::hash_slots(self.index_blocks.last().unwrap());

        let slot_offset = current_block_start + IndexBlock::slot_field_offset(slot_index);
        crate::serialize::write_pod_at(self.backend_mut(), slot_offset, &chunk_start_offset)?;
        let hash_offset = current_block_start + IndexBlock::hash_field_offset();
        crate::serialize::write_pod_at(self.backend_mut(), hash_offset, &hash)?;

        self.backend_mut().seek(end_of_chunk_pos)?;

        self.next_slot += 1;
        self.chunks_written += 1;
        Ok(self.chunks_written - 1)
    }

    pub fn set_compression_level(&mut self, level: i32) {
        self.compression_level = level;
    }

    pub fn compression_level(&self) -> i32 {
        self.compression_level
    }

    /// Rewrites the user metadata blob in place. Only valid before any
    /// chunk has been appended (the header's on-disk length is fixed the
    /// moment the first index block follows it) and only if the new blob
    /// compresses to exactly the size already reserved — otherwise this
    /// would overwrite the first index block.
    pub fn set_user_metadata(&mut self, user_metadata: Vec<u8>) -> Result<()> {
        if self.chunks_written != 0 {
            return Err(Error::InvalidArgument(
                "cannot set user metadata after the first chunk has been appended".into(),
            ));
        }
        let original_len = self.header.byte_len();
        let mut candidate = self.header.clone();
        candidate.user_metadata = user_metadata;
        if candidate.byte_len() != original_len {
            return Err(Error::Format(FormatError::HeaderGrowthRefused));
        }

        let saved_pos = self.backend_mut().tell();
        self.backend_mut().seek(0)?;
        candidate.write(self.backend_mut())?;
        self.backend_mut().seek(saved_pos)?;
        self.header = candidate;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.backend_mut().flush()?;
        Ok(())
    }

    pub fn num_chunks(&self) -> usize {
        self.chunks_written
    }

    pub fn file_header(&self) -> &FileHeader {
        &self.header
    }

    /// Flushes and hands the backend back to the caller, consuming the
    /// writer.
    pub fn release_backend(mut self) -> Result<B> {
        self.flush()?;
        Ok(self.backend.take().expect("writer backend already released"))
    }
}

impl Writer<FileBackend> {
    pub fn create_file(path: impl AsRef<std::path::Path>, options: WriterOptions) -> Result<Self> {
        Self::create_new(FileBackend::create(path)?, options)
    }

    pub fn open_file_for_append(path: impl AsRef<std::path::Path>) -> Result<Self> {
        Self::open_for_append(FileBackend::open_for_append(path)?)
    }
}

impl Writer<MemoryBackend> {
    pub fn create_in_memory(options: WriterOptions) -> Result<Self> {
        Self::create_new(MemoryBackend::new(), options)
    }
}

impl<B: StorageBackend> Drop for Writer<B> {
    /// Best-effort flush on drop; callers that need to observe I/O errors
    /// should call [`Writer::flush`] or [`Writer::release_backend`] instead.
    fn drop(&mut self) {
        if let Some(backend) = self.backend.as_mut() {
            let _ = backend.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::Reader;

    fn sample_payload(n: usize) -> Vec<u8> {
        (0..n).map(|i| i as u8).collect()
    }

    #[test]
    fn creates_header_and_writes_chunks() {
        let mut writer = Writer::create_in_memory(WriterOptions { index_block_capacity: 4, ..Default::default() })
            .unwrap();
        assert_eq!(writer.num_chunks(), 0);

        let payload = sample_payload(16);
        let hash = crate::hash::hash_bytes_256(&payload);
        let idx = writer
            .append_chunk(CodecId::Raw, Dtype::U8, 0, &[16], hash, payload.clone())
            .unwrap();
        assert_eq!(idx, 0);
        assert_eq!(writer.num_chunks(), 1);

        let backend = writer.release_backend().unwrap();
        let mut reader = Reader::open(backend).unwrap();
        assert_eq!(reader.num_chunks(), 1);
        let record = reader.get_chunk(0).unwrap();
        assert_eq!(record.payload, payload);
        assert_eq!(record.hash, hash);
        assert_eq!(record.logical_shape(), &[16]);
    }

    #[test]
    fn rolls_over_to_a_new_index_block_when_full() {
        let mut writer =
            Writer::create_in_memory(WriterOptions { index_block_capacity: 2, ..Default::default() }).unwrap();
        for i in 0..5u8 {
            let payload = vec![i; 4];
            let hash = crate::hash::hash_bytes_256(&payload);
            writer.append_chunk(CodecId::Raw, Dtype::U8, 0, &[4], hash, payload).unwrap();
        }
        assert_eq!(writer.num_chunks(), 5);

        let backend = writer.release_backend().unwrap();
        let mut reader = Reader::open(backend).unwrap();
        assert_eq!(reader.num_chunks(), 5);
        for i in 0..5u8 {
            let record = reader.get_chunk(i as usize).unwrap();
            assert_eq!(record.payload, vec![i; 4]);
        }
    }

    #[test]
    fn reopening_for_append_continues_from_the_right_slot() {
        let mut writer =
            Writer::create_in_memory(WriterOptions { index_block_capacity: 3, ..Default::default() }).unwrap();
        for i in 0..2u8 {
            let payload = vec![i; 2];
            let hash = crate::hash::hash_bytes_256(&payload);
            writer.append_chunk(CodecId::Raw, Dtype::U8, 0, &[2], hash, payload).unwrap();
        }
        let backend = writer.release_backend().unwrap();

        let mut reopened = Writer::open_for_append(backend).unwrap();
        assert_eq!(reopened.num_chunks(), 2);
        let payload = vec![9u8; 2];
        let hash = crate::hash::hash_bytes_256(&payload);
        reopened.append_chunk(CodecId::Raw, Dtype::U8, 0, &[2], hash, payload.clone()).unwrap();
        assert_eq!(reopened.num_chunks(), 3);

        let backend = reopened.release_backend().unwrap();
        let mut reader = Reader::open(backend).unwrap();
        assert_eq!(reader.num_chunks(), 3);
        assert_eq!(reader.get_chunk(2).unwrap().payload, payload);
    }

    #[test]
    fn set_user_metadata_rejected_after_first_chunk() {
        let mut writer = Writer::create_in_memory(WriterOptions::default()).unwrap();
        let payload = sample_payload(4);
        let hash = crate::hash::hash_bytes_256(&payload);
        writer.append_chunk(CodecId::Raw, Dtype::U8, 0, &[4], hash, payload).unwrap();
        let err = writer.set_user_metadata(b"late".to_vec()).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
