//! Native (non-FFI) operations: `StoreChunk`/`StoreArray`, `LoadChunks`,
//! `Inspect`, user-metadata get/set, `Flush`, `Ping`.
//!
//! Grounded in `original_source/src/c_api/operations/*_handler.cpp`: these
//! keep each handler's argument/result shape and control flow but drop the
//! JSON/FFI transport (base64 metadata, `nlohmann::json` responses) —
//! callers here pass and receive plain Rust values instead.

use crate::backend::StorageBackend;
use crate::error::{Error, Result};
use crate::hash::hash_bytes_256;
use crate::pipeline::{self, CodecId, Dtype, PrevState};
use crate::reader::Reader;
use crate::workspace::Workspace;
use crate::writer::Writer;

/// How [`store_array`] splits a multi-row array into chunks. Mirrors
/// `ChunkingStrategy` in `original_source/src/c_api/operations/store_array_handler.cpp`,
/// which supports only `ByCount` today — other strategies are an Open
/// Question left to future work, not implemented here.
#[derive(Debug, Clone, Copy)]
pub enum ChunkingStrategy {
    ByCount { rows_per_chunk: usize },
}

/// Per-chunk outcome of a [`store_array`] call.
#[derive(Debug, Clone)]
pub struct ChunkDetail {
    pub index: usize,
    pub original_size: usize,
    pub compressed_size: usize,
}

/// Aggregate result of [`store_array`].
#[derive(Debug, Clone)]
pub struct StoreArrayReport {
    pub chunks_written: usize,
    pub chunk_details: Vec<ChunkDetail>,
    pub original_size: usize,
    pub compressed_size: usize,
}

/// Encodes and appends `data` (laid out row-major per `shape`) as a single
/// chunk — the one-chunk special case of [`store_array`], matching
/// `StoreChunkHandler`'s narrower scope in the original C API.
pub fn store_chunk<B: StorageBackend>(
    writer: &mut Writer<B>,
    codec: CodecId,
    dtype: Dtype,
    shape: &[u32],
    data: &[u8],
    state: &mut PrevState,
    workspace: &mut Workspace,
    level: i32,
) -> Result<ChunkDetail> {
    let raw_hash = hash_bytes_256(data);
    let encoded = pipeline::encode(codec, dtype, shape, data, state, workspace, level)?;
    let compressed_size = encoded.len();
    let index = writer.append_chunk(codec, dtype, 0, shape, raw_hash, encoded)?;
    Ok(ChunkDetail { index, original_size: data.len(), compressed_size })
}

/// Splits `data` (row-major, `shape[0]` rows) into row-count-bounded chunks
/// per `chunking` and appends each, matching
/// `StoreArrayHandler::execute`'s `ByCount` loop: row size in bytes is the
/// product of the trailing dimensions times the dtype size, and the final
/// chunk may be shorter than `rows_per_chunk`.
pub fn store_array<B: StorageBackend>(
    writer: &mut Writer<B>,
    codec: CodecId,
    dtype: Dtype,
    shape: &[u32],
    data: &[u8],
    chunking: ChunkingStrategy,
    state: &mut PrevState,
    workspace: &mut Workspace,
    level: i32,
) -> Result<StoreArrayReport> {
    let ChunkingStrategy::ByCount { rows_per_chunk } = chunking;
    if rows_per_chunk == 0 {
        return Err(Error::InvalidArgument("rows_per_chunk must be positive".into()));
    }
    if shape.is_empty() {
        return Err(Error::InvalidArgument("cannot chunk a 0-dimensional array".into()));
    }

    let total_rows = shape[0] as usize;
    let row_size_bytes: usize = shape[1..].iter().map(|&d| d as usize).product::<usize>() * dtype.byte_size();

    let mut chunk_details = Vec::new();
    let mut original_size = 0usize;
    let mut compressed_size = 0usize;

    let mut start_row = 0usize;
    while start_row < total_rows {
        let current_rows = rows_per_chunk.min(total_rows - start_row);
        let mut chunk_shape = shape.to_vec();
        chunk_shape[0] = current_rows as u32;

        let offset_bytes = start_row * row_size_bytes;
        let length_bytes = current_rows * row_size_bytes;
        let chunk_data = &data[offset_bytes..offset_bytes + length_bytes];

        let detail = store_chunk(writer, codec, dtype, &chunk_shape, chunk_data, state, workspace, level)?;
        original_size += detail.original_size;
        compressed_size += detail.compressed_size;
        chunk_details.push(detail);

        start_row += current_rows;
    }

    Ok(StoreArrayReport { chunks_written: chunk_details.len(), chunk_details, original_size, compressed_size })
}

/// Which chunks [`load_chunks`] decodes, mirroring `LoadChunksHandler`'s
/// `selection` union (`All`/`Indices`/`Range`).
#[derive(Debug, Clone)]
pub enum Selection {
    All,
    Indices(Vec<usize>),
    Range { start_index: usize, count: usize },
}

impl Selection {
    fn resolve(&self, num_chunks: usize) -> Vec<usize> {
        match self {
            Selection::All => (0..num_chunks).collect(),
            Selection::Indices(indices) => indices.clone(),
            Selection::Range { start_index, count } => {
                (0..*count).map(|i| start_index + i).take_while(|&i| i < num_chunks).collect()
            }
        }
    }
}

/// Result of [`load_chunks`]: the decoded bytes of every selected chunk,
/// concatenated in selection order, plus the total byte count and, when
/// every selected chunk shares a dtype and trailing shape, the row-summed
/// shape of the concatenation.
#[derive(Debug, Clone)]
pub struct LoadChunksReport {
    pub bytes: Vec<u8>,
    pub bytes_written: usize,
    pub final_shape: Option<Vec<u32>>,
}

/// Decodes every chunk in `selection`, in order, concatenating the decoded
/// bytes — the pre-flight size check `LoadChunksHandler` does against a
/// caller-provided output buffer has no analogue here since callers get an
/// owned `Vec<u8>` instead of writing into a fixed span. When
/// `check_checksums` is set, a mismatch between a chunk's stored hash and
/// its decoded bytes aborts with [`crate::error::FormatError::ChunkHashMismatch`]
/// instead of returning the corrupted bytes.
pub fn load_chunks<B: StorageBackend>(
    reader: &mut Reader<B>,
    selection: &Selection,
    check_checksums: bool,
    workspace: &mut Workspace,
) -> Result<LoadChunksReport> {
    let indices = selection.resolve(reader.num_chunks());
    let mut bytes = Vec::new();
    let mut state_by_key: std::collections::HashMap<(u16, Vec<i64>), PrevState> = std::collections::HashMap::new();

    let mut uniform_trailing: Option<Vec<u32>> = None;
    let mut row_total: u32 = 0;
    let mut shape_is_uniform = true;

    for index in indices {
        let offset = reader.chunk_offset(index)?;
        let record = reader.get_chunk(index)?;
        let codec = CodecId::from_u16(record.codec)?;
        let dtype = Dtype::from_u16(record.dtype)?;
        let shape = record.logical_shape();
        let shape_u32: Vec<u32> = shape.iter().map(|&d| d as u32).collect();
        let key = (record.codec, shape.to_vec());
        let state = state_by_key.entry(key).or_insert(PrevState::None);
        let decoded = pipeline::decode(codec, dtype, &shape_u32, &record.payload, state, workspace)?;

        if check_checksums && hash_bytes_256(&decoded) != record.hash {
            return Err(Error::Format(crate::error::FormatError::ChunkHashMismatch { offset }));
        }

        if shape_is_uniform {
            match (shape_u32.split_first(), &uniform_trailing) {
                (Some((&leading, trailing)), None) => {
                    uniform_trailing = Some(trailing.to_vec());
                    row_total += leading;
                }
                (Some((&leading, trailing)), Some(expected)) if trailing == expected.as_slice() => {
                    row_total += leading;
                }
                _ => shape_is_uniform = false,
            }
        }

        bytes.extend_from_slice(&decoded);
    }

    let final_shape = if shape_is_uniform {
        uniform_trailing.map(|trailing| {
            let mut shape = vec![row_total];
            shape.extend(trailing);
            shape
        })
    } else {
        None
    };

    let bytes_written = bytes.len();
    Ok(LoadChunksReport { bytes, bytes_written, final_shape })
}

/// One chunk's metadata, as surfaced by [`inspect`]. Mirrors the per-chunk
/// fields `InspectHandler` builds (`index`/`shape`/`dtype`/`codec`/
/// `encoded_size_bytes`/`decoded_size_bytes`).
#[derive(Debug, Clone)]
pub struct ChunkSummary {
    pub index: usize,
    pub shape: Vec<u32>,
    pub dtype: Dtype,
    pub codec: CodecId,
    pub encoded_size_bytes: usize,
    pub decoded_size_bytes: usize,
    pub hash: [u8; 32],
}

#[derive(Debug, Clone)]
pub struct InspectReport {
    pub total_chunks: usize,
    pub chunk_summaries: Vec<ChunkSummary>,
}

/// Walks every chunk in `reader` and reports its shape/codec/dtype/size
/// without decoding the payload, matching `InspectHandler::execute`.
pub fn inspect<B: StorageBackend>(reader: &mut Reader<B>) -> Result<InspectReport> {
    let total_chunks = reader.num_chunks();
    let mut chunk_summaries = Vec::with_capacity(total_chunks);
    for index in 0..total_chunks {
        let record = reader.get_chunk(index)?;
        let dtype = Dtype::from_u16(record.dtype)?;
        let codec = CodecId::from_u16(record.codec)?;
        let shape: Vec<u32> = record.logical_shape().iter().map(|&d| d as u32).collect();
        let decoded_size_bytes = pipeline::element_count(dtype, &shape)? * dtype.byte_size();
        chunk_summaries.push(ChunkSummary {
            index,
            shape,
            dtype,
            codec,
            encoded_size_bytes: record.payload.len(),
            decoded_size_bytes,
            hash: record.hash,
        });
    }
    Ok(InspectReport { total_chunks, chunk_summaries })
}

/// Returns the container's raw user-metadata bytes, matching
/// `GetUserMetadataHandler` minus the base64 transport encoding.
pub fn get_user_metadata<B: StorageBackend>(reader: &Reader<B>) -> &[u8] {
    &reader.file_header().user_metadata
}

/// Rewrites the container's user-metadata bytes, matching
/// `SetUserMetadataHandler` minus the base64 transport decoding. Subject to
/// [`Writer::set_user_metadata`]'s append/growth restrictions.
pub fn set_user_metadata<B: StorageBackend>(writer: &mut Writer<B>, metadata: Vec<u8>) -> Result<()> {
    writer.set_user_metadata(metadata)
}

/// Forwards to the writer's backend, matching `FlushHandler`'s trivial
/// pass-through.
pub fn flush<B: StorageBackend>(writer: &mut Writer<B>) -> Result<()> {
    writer.flush()
}

/// Liveness check with no handler-specific state, matching the no-op
/// `PingHandler` in the original C API (used by callers to confirm the
/// container context is responsive before issuing real work).
pub fn ping() -> &'static str {
    "pong"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::chunk_flags;
    use crate::writer::WriterOptions;

    fn f32_bytes(v: &[f32]) -> Vec<u8> {
        v.iter().flat_map(|x| x.to_le_bytes()).collect()
    }

    #[test]
    fn store_array_splits_by_row_count_and_load_chunks_reassembles() {
        let mut writer = Writer::create_in_memory(WriterOptions::default()).unwrap();
        let mut state = PrevState::None;
        let mut ws = Workspace::new();

        // 10 rows of 4 f32 columns, 3 rows per chunk -> 4 chunks (3,3,3,1)
        let rows = 10usize;
        let cols = 4u32;
        let data: Vec<f32> = (0..rows * cols as usize).map(|i| i as f32).collect();
        let raw = f32_bytes(&data);

        let report = store_array(
            &mut writer,
            CodecId::T2dF32,
            Dtype::F32,
            &[rows as u32, cols],
            &raw,
            ChunkingStrategy::ByCount { rows_per_chunk: 3 },
            &mut state,
            &mut ws,
            3,
        )
        .unwrap();

        assert_eq!(report.chunks_written, 4);
        assert_eq!(report.original_size, raw.len());
        assert_eq!(writer.num_chunks(), 4);

        let backend = writer.release_backend().unwrap();
        let mut reader = Reader::open(backend).unwrap();
        let mut load_ws = Workspace::new();
        let loaded = load_chunks(&mut reader, &Selection::All, true, &mut load_ws).unwrap();
        assert_eq!(loaded.bytes_written, raw.len());
        assert_eq!(loaded.bytes, raw);
        assert_eq!(loaded.final_shape, Some(vec![rows as u32, cols]));
    }

    #[test]
    fn inspect_reports_shape_and_sizes_without_decoding() {
        let mut writer = Writer::create_in_memory(WriterOptions::default()).unwrap();
        let payload = vec![1u8, 2, 3, 4, 5, 6, 7, 8];
        let hash = hash_bytes_256(&payload);
        writer
            .append_chunk(CodecId::Raw, Dtype::U8, chunk_flags::LITTLE_ENDIAN, &[8], hash, payload.clone())
            .unwrap();
        let backend = writer.release_backend().unwrap();
        let mut reader = Reader::open(backend).unwrap();

        let report = inspect(&mut reader).unwrap();
        assert_eq!(report.total_chunks, 1);
        let summary = &report.chunk_summaries[0];
        assert_eq!(summary.shape, vec![8]);
        assert_eq!(summary.encoded_size_bytes, payload.len());
        assert_eq!(summary.decoded_size_bytes, 8);
    }

    #[test]
    fn selection_range_clamps_to_available_chunks() {
        let sel = Selection::Range { start_index: 2, count: 10 };
        assert_eq!(sel.resolve(5), vec![2, 3, 4]);
    }

    #[test]
    fn user_metadata_round_trips_through_writer_and_reader() {
        // Same-length replacement so the compressed blob's reserved footprint
        // doesn't change (`set_user_metadata` refuses header growth).
        let options = WriterOptions { user_metadata: b"AAAAA".to_vec(), ..Default::default() };
        let mut writer = Writer::create_in_memory(options).unwrap();
        set_user_metadata(&mut writer, b"hello".to_vec()).unwrap();
        let backend = writer.release_backend().unwrap();
        let reader = Reader::open(backend).unwrap();
        assert_eq!(get_user_metadata(&reader), b"hello");
    }
}
