//! Codec pipeline table: dtype/codec tags, shape validation, the
//! symmetric encode/decode pair for every named pipeline, and the
//! process-wide caches keyed by shape and compression level.
//!
//! Grounded in `original_source/src/data_io/data_compressor.cpp` (the
//! dispatch-by-`ChunkDataType` switch and its per-family workspace/cache
//! maps) and `original_source/src/codecs/codec_constants.h` (the OKX/Binance
//! shape constants). Each `CodecId` variant is a composed
//! transform-then-entropy-code pipeline rather than one whole-payload
//! algorithm, so this module's *shape* comes from `original_source` and its
//! *style* (small enum, exhaustive match, `thiserror` on every fallible
//! step) from `original_source/src/codecs/*`.

mod cache;
mod state;

pub use cache::{ob_codec_cache, t1d_codec_cache, t2d_codec_cache, zero_state_cache, CacheKey};
pub use state::PrevState;

use crate::compressor::{EntropyCompressor, ZstdCompressor};
use crate::error::CodecError;
use crate::simd;
use crate::workspace::Workspace;

/// OKX order-book snapshot shape: 50 price levels, 3 features per level
/// (price, quantity, order count), matching `OKX_DEPTH`/`OKX_FEATURES`.
pub const OKX_DEPTH: u32 = 50;
pub const OKX_FEATURES: u32 = 3;

/// Binance order-book snapshot shape: 256 price levels, 8 features.
pub const BINANCE_DEPTH: u32 = 256;
pub const BINANCE_FEATURES: u32 = 8;

/// Element data type tag, stored in every [`crate::format::ChunkRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Dtype {
    U8 = 0,
    I8 = 1,
    U16 = 2,
    I16 = 3,
    U32 = 4,
    I32 = 5,
    U64 = 6,
    I64 = 7,
    F32 = 8,
    F16 = 9,
    Bf16 = 10,
    F64 = 11,
}

impl Dtype {
    pub fn byte_size(self) -> usize {
        match self {
            Dtype::U8 | Dtype::I8 => 1,
            Dtype::U16 | Dtype::I16 | Dtype::F16 | Dtype::Bf16 => 2,
            Dtype::U32 | Dtype::I32 | Dtype::F32 => 4,
            Dtype::U64 | Dtype::I64 | Dtype::F64 => 8,
        }
    }

    pub fn from_u16(tag: u16) -> Result<Self, CodecError> {
        Ok(match tag {
            0 => Dtype::U8,
            1 => Dtype::I8,
            2 => Dtype::U16,
            3 => Dtype::I16,
            4 => Dtype::U32,
            5 => Dtype::I32,
            6 => Dtype::U64,
            7 => Dtype::I64,
            8 => Dtype::F32,
            9 => Dtype::F16,
            10 => Dtype::Bf16,
            11 => Dtype::F64,
            other => return Err(CodecError::InvalidDtype(format!("unknown dtype tag {other}"))),
        })
    }
}

/// Codec pipeline identifier, stored in every [`crate::format::ChunkRecord`].
/// Each variant names a symmetric encode/decode transform composed with the
/// entropy stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum CodecId {
    /// Stored verbatim, no transform, no entropy coding.
    Raw = 0,
    /// Entropy coding only, no temporal/spatial transform.
    EntropyOnly = 1,
    /// 1D f32 time series: xor-delta + byte-plane shuffle(4) + entropy.
    T1dF32XorShuffle = 2,
    /// 1D time series demoted f32->f16 then xor-delta + shuffle(2) + entropy.
    T1dF16XorShuffleFromF32 = 3,
    /// 1D i64 time series: xor-delta + entropy, no shuffle.
    T1dI64Xor = 4,
    /// 1D i64 time series: arithmetic-delta + entropy.
    T1dI64Delta = 5,
    /// 2D (rows x columns) f32: per-column xor-delta + shuffle(4) + entropy.
    T2dF32 = 6,
    /// 2D f32 demoted to f16 per column, xor-delta + shuffle(2) + entropy.
    T2dF16FromF32 = 7,
    /// 2D i64: per-column xor-delta + entropy.
    T2dI64 = 8,
    /// OKX order-book snapshot (50x3 f32): full-frame xor-delta + entropy.
    ObOkxF32 = 9,
    ObOkxF16 = 10,
    /// Binance order-book snapshot (256x8 f32).
    ObBinanceF32 = 11,
    ObBinanceF16 = 12,
    /// Arbitrary depth x features order-book snapshot, shape carried in the
    /// chunk record rather than hardcoded.
    ObGenericF32 = 13,
    ObGenericF16 = 14,
}

impl CodecId {
    pub fn from_u16(tag: u16) -> Result<Self, CodecError> {
        Ok(match tag {
            0 => CodecId::Raw,
            1 => CodecId::EntropyOnly,
            2 => CodecId::T1dF32XorShuffle,
            3 => CodecId::T1dF16XorShuffleFromF32,
            4 => CodecId::T1dI64Xor,
            5 => CodecId::T1dI64Delta,
            6 => CodecId::T2dF32,
            7 => CodecId::T2dF16FromF32,
            8 => CodecId::T2dI64,
            9 => CodecId::ObOkxF32,
            10 => CodecId::ObOkxF16,
            11 => CodecId::ObBinanceF32,
            12 => CodecId::ObBinanceF16,
            13 => CodecId::ObGenericF32,
            14 => CodecId::ObGenericF16,
            other => return Err(CodecError::InvalidDtype(format!("unknown codec tag {other}"))),
        })
    }

    /// True for the three order-book families, which carry a fixed
    /// `depth x features` shape validated against the fixed OKX/Binance dimensions.
    pub fn is_order_book(self) -> bool {
        matches!(
            self,
            CodecId::ObOkxF32
                | CodecId::ObOkxF16
                | CodecId::ObBinanceF32
                | CodecId::ObBinanceF16
                | CodecId::ObGenericF32
                | CodecId::ObGenericF16
        )
    }
}

fn validate_shape_1d(shape: &[u32]) -> Result<u32, CodecError> {
    match shape {
        [n] => Ok(*n),
        other => Err(CodecError::InvalidShape(format!("expected 1D shape, got {other:?}"))),
    }
}

fn validate_shape_2d(shape: &[u32]) -> Result<(u32, u32), CodecError> {
    match shape {
        [rows, cols] => Ok((*rows, *cols)),
        other => Err(CodecError::InvalidShape(format!("expected 2D shape, got {other:?}"))),
    }
}

/// Validates an order-book shape `[num_snapshots, depth, features]` (a
/// "OB codecs: shape is `[num_snapshots, depth, features]`"), returning the
/// three dimensions. Named exchanges pin `(depth, features)` to their known
/// constants; the generic variants accept any.
fn validate_ob_shape(codec: CodecId, shape: &[u32]) -> Result<(u32, u32, u32), CodecError> {
    let (num_snapshots, depth, features) = match shape {
        [s, d, f] => (*s, *d, *f),
        other => return Err(CodecError::InvalidShape(format!("expected 3D order-book shape [num_snapshots, depth, features], got {other:?}"))),
    };
    match codec {
        CodecId::ObOkxF32 | CodecId::ObOkxF16 if depth != OKX_DEPTH || features != OKX_FEATURES => {
            Err(CodecError::InvalidShape(format!(
                "OKX order-book codec requires depth x features {OKX_DEPTH}x{OKX_FEATURES}, got {depth}x{features}"
            )))
        }
        CodecId::ObBinanceF32 | CodecId::ObBinanceF16
            if depth != BINANCE_DEPTH || features != BINANCE_FEATURES =>
        {
            Err(CodecError::InvalidShape(format!(
                "Binance order-book codec requires depth x features {BINANCE_DEPTH}x{BINANCE_FEATURES}, got {depth}x{features}"
            )))
        }
        _ => Ok((num_snapshots, depth, features)),
    }
}

fn f32_slice_from_bytes(bytes: &[u8]) -> Result<&[f32], CodecError> {
    if bytes.len() % 4 != 0 {
        return Err(CodecError::InvalidSize { expected: bytes.len() / 4 * 4, got: bytes.len() });
    }
    Ok(bytemuck_cast_f32(bytes))
}

fn bytemuck_cast_f32(bytes: &[u8]) -> &[f32] {
    unsafe { std::slice::from_raw_parts(bytes.as_ptr() as *const f32, bytes.len() / 4) }
}

fn i64_slice_from_bytes(bytes: &[u8]) -> Result<&[i64], CodecError> {
    if bytes.len() % 8 != 0 {
        return Err(CodecError::InvalidSize { expected: bytes.len() / 8 * 8, got: bytes.len() });
    }
    Ok(unsafe { std::slice::from_raw_parts(bytes.as_ptr() as *const i64, bytes.len() / 8) })
}

fn bytes_from_f32(data: &[f32]) -> Vec<u8> {
    data.iter().flat_map(|x| x.to_le_bytes()).collect()
}

fn bytes_from_i64(data: &[i64]) -> Vec<u8> {
    data.iter().flat_map(|x| x.to_le_bytes()).collect()
}


fn u16_vec_from_bytes(bytes: &[u8]) -> Vec<u16> {
    bytes.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]])).collect()
}

fn u64_vec_from_bytes(bytes: &[u8]) -> Vec<u64> {
    bytes
        .chunks_exact(8)
        .map(|c| u64::from_le_bytes(c.try_into().unwrap()))
        .collect()
}

fn i64_vec_from_bytes(bytes: &[u8]) -> Vec<i64> {
    bytes
        .chunks_exact(8)
        .map(|c| i64::from_le_bytes(c.try_into().unwrap()))
        .collect()
}

/// Per-column view into a row-major 2D buffer, used by the 2D pipelines:
/// each column is treated as its own independent temporal sequence, the
/// struct-of-arrays slicing `data_compressor.cpp` performs before handing
/// each column to the 1D codec.
fn column_major<T: Copy>(data: &[T], rows: usize, cols: usize) -> Vec<Vec<T>> {
    let mut columns = vec![Vec::with_capacity(rows); cols];
    for r in 0..rows {
        for c in 0..cols {
            columns[c].push(data[r * cols + c]);
        }
    }
    columns
}

fn row_major_from_columns<T: Copy + Default>(columns: &[Vec<T>], rows: usize, cols: usize) -> Vec<T> {
    let mut out = vec![T::default(); rows * cols];
    for (c, col) in columns.iter().enumerate() {
        for (r, &v) in col.iter().enumerate() {
            out[r * cols + c] = v;
        }
    }
    out
}

/// Same transform as [`simd::shuffle_bytes`], writing into a caller-provided
/// `out` slice instead of returning a fresh `Vec` — the shape staged
/// intermediates take once they live in a [`Workspace`] buffer.
fn shuffle_into(data: &[u8], width: usize, out: &mut [u8]) {
    let n = data.len() / width;
    for elem in 0..n {
        for byte in 0..width {
            out[byte * n + elem] = data[elem * width + byte];
        }
    }
}

/// Inverse of [`shuffle_into`].
fn unshuffle_into(data: &[u8], width: usize, out: &mut [u8]) {
    let n = data.len() / width;
    for elem in 0..n {
        for byte in 0..width {
            out[elem * width + byte] = data[byte * n + elem];
        }
    }
}

/// Encodes one chunk's raw element bytes through the named pipeline,
/// returning the payload to store on disk (already entropy-coded where the
/// pipeline calls for it). `state` carries the cross-chunk prev-state and is
/// mutated in place, matching the prev-state contract.
pub fn encode(
    codec: CodecId,
    dtype: Dtype,
    shape: &[u32],
    raw: &[u8],
    state: &mut PrevState,
    workspace: &mut Workspace,
    level: i32,
) -> Result<Vec<u8>, CodecError> {
    let compressor = ZstdCompressor;
    match codec {
        CodecId::Raw => Ok(raw.to_vec()),

        CodecId::EntropyOnly => compressor.compress(level, raw),

        CodecId::T1dF32XorShuffle => {
            let n = validate_shape_1d(shape)? as usize;
            let data = f32_slice_from_bytes(raw)?;
            if data.len() != n {
                return Err(CodecError::InvalidSize { expected: n, got: data.len() });
            }
            let bits: Vec<u32> = data.iter().map(|x| x.to_bits()).collect();
            let carry = state.as_u32_mut()?;
            let xored = simd::scalar::xor_delta_encode_u32(&bits, carry);
            let (bytes, shuffled) = workspace.stage_ab(xored.len() * 4, xored.len() * 4);
            for (i, x) in xored.iter().enumerate() {
                bytes[i * 4..i * 4 + 4].copy_from_slice(&x.to_le_bytes());
            }
            shuffle_into(bytes, 4, shuffled);
            compressor.compress(level, shuffled)
        }

        CodecId::T1dF16XorShuffleFromF32 => {
            let n = validate_shape_1d(shape)? as usize;
            let data = f32_slice_from_bytes(raw)?;
            if data.len() != n {
                return Err(CodecError::InvalidSize { expected: n, got: data.len() });
            }
            let carry = state.as_u16_mut()?;
            let xored = simd::demote_and_xor_1d(data, carry);
            let (bytes, shuffled) = workspace.stage_ab(xored.len() * 2, xored.len() * 2);
            for (i, x) in xored.iter().enumerate() {
                bytes[i * 2..i * 2 + 2].copy_from_slice(&x.to_le_bytes());
            }
            shuffle_into(bytes, 2, shuffled);
            compressor.compress(level, shuffled)
        }

        CodecId::T1dI64Xor => {
            let n = validate_shape_1d(shape)? as usize;
            let data = i64_slice_from_bytes(raw)?;
            if data.len() != n {
                return Err(CodecError::InvalidSize { expected: n, got: data.len() });
            }
            let as_u64: Vec<u64> = data.iter().map(|&x| x as u64).collect();
            let carry = state.as_u64_mut()?;
            let xored = simd::xor_delta_encode_u64(&as_u64, carry);
            let bytes = workspace.stage_a(xored.len() * 8);
            for (i, x) in xored.iter().enumerate() {
                bytes[i * 8..i * 8 + 8].copy_from_slice(&x.to_le_bytes());
            }
            compressor.compress(level, bytes)
        }

        CodecId::T1dI64Delta => {
            let n = validate_shape_1d(shape)? as usize;
            let data = i64_slice_from_bytes(raw)?;
            if data.len() != n {
                return Err(CodecError::InvalidSize { expected: n, got: data.len() });
            }
            let carry = state.as_i64_mut()?;
            let delta = simd::arith_delta_encode_i64(data, carry);
            let bytes = workspace.stage_a(delta.len() * 8);
            for (i, x) in delta.iter().enumerate() {
                bytes[i * 8..i * 8 + 8].copy_from_slice(&x.to_le_bytes());
            }
            compressor.compress(level, bytes)
        }

        CodecId::T2dF32 => {
            let (rows, cols) = validate_shape_2d(shape)?;
            let (rows, cols) = (rows as usize, cols as usize);
            let data = f32_slice_from_bytes(raw)?;
            if data.len() != rows * cols {
                return Err(CodecError::InvalidSize { expected: rows * cols, got: data.len() });
            }
            let columns = column_major(data, rows, cols);
            let carries = state.as_u32_column_mut(cols)?;
            let (all_bytes, shuffled) = workspace.stage_ab(data.len() * 4, data.len() * 4);
            let mut offset = 0;
            for (col, carry) in columns.iter().zip(carries.iter_mut()) {
                let bits: Vec<u32> = col.iter().map(|x| x.to_bits()).collect();
                let xored = simd::scalar::xor_delta_encode_u32(&bits, carry);
                for x in &xored {
                    all_bytes[offset..offset + 4].copy_from_slice(&x.to_le_bytes());
                    offset += 4;
                }
            }
            shuffle_into(all_bytes, 4, shuffled);
            compressor.compress(level, shuffled)
        }

        CodecId::T2dF16FromF32 => {
            let (rows, cols) = validate_shape_2d(shape)?;
            let (rows, cols) = (rows as usize, cols as usize);
            let data = f32_slice_from_bytes(raw)?;
            if data.len() != rows * cols {
                return Err(CodecError::InvalidSize { expected: rows * cols, got: data.len() });
            }
            let columns = column_major(data, rows, cols);
            let carries = state.as_u16_column_mut(cols)?;
            let (all_bytes, shuffled) = workspace.stage_ab(data.len() * 2, data.len() * 2);
            let mut offset = 0;
            for (col, carry) in columns.iter().zip(carries.iter_mut()) {
                let xored = simd::demote_and_xor_1d(col, carry);
                for x in &xored {
                    all_bytes[offset..offset + 2].copy_from_slice(&x.to_le_bytes());
                    offset += 2;
                }
            }
            shuffle_into(all_bytes, 2, shuffled);
            compressor.compress(level, shuffled)
        }

        CodecId::T2dI64 => {
            let (rows, cols) = validate_shape_2d(shape)?;
            let (rows, cols) = (rows as usize, cols as usize);
            let data = i64_slice_from_bytes(raw)?;
            if data.len() != rows * cols {
                return Err(CodecError::InvalidSize { expected: rows * cols, got: data.len() });
            }
            let columns = column_major(data, rows, cols);
            let carries = state.as_u64_column_mut(cols)?;
            let all_bytes = workspace.stage_a(data.len() * 8);
            let mut offset = 0;
            for (col, carry) in columns.iter().zip(carries.iter_mut()) {
                let as_u64: Vec<u64> = col.iter().map(|&x| x as u64).collect();
                let xored = simd::xor_delta_encode_u64(&as_u64, carry);
                for x in &xored {
                    all_bytes[offset..offset + 8].copy_from_slice(&x.to_le_bytes());
                    offset += 8;
                }
            }
            compressor.compress(level, all_bytes)
        }

        CodecId::ObOkxF32
        | CodecId::ObOkxF16
        | CodecId::ObBinanceF32
        | CodecId::ObBinanceF16
        | CodecId::ObGenericF32
        | CodecId::ObGenericF16 => {
            let (num_snapshots, depth, features) = validate_ob_shape(codec, shape)?;
            let snapshot_elems = (depth * features) as usize;
            let total = num_snapshots as usize * snapshot_elems;
            let data = f32_slice_from_bytes(raw)?;
            if data.len() != total {
                return Err(CodecError::InvalidSize { expected: total, got: data.len() });
            }
            encode_order_book(codec, data, num_snapshots as usize, snapshot_elems, state, workspace, &compressor, level)
        }
    }
}

/// Encodes `num_snapshots` whole order-book snapshots: XOR is performed
/// between consecutive whole snapshots (AoS along the snapshot axis),
/// chaining the running XOR across snapshots within this call and, via
/// `state`, across chunk boundaries.
fn encode_order_book(
    codec: CodecId,
    data: &[f32],
    num_snapshots: usize,
    snapshot_elems: usize,
    state: &mut PrevState,
    workspace: &mut Workspace,
    compressor: &ZstdCompressor,
    level: i32,
) -> Result<Vec<u8>, CodecError> {
    let is_f16 = matches!(codec, CodecId::ObOkxF16 | CodecId::ObBinanceF16 | CodecId::ObGenericF16);
    if is_f16 {
        let demoted = simd::demote_f32_to_f16(data);
        let bits: Vec<u16> = demoted.iter().map(|x| x.to_bits()).collect();
        let prev = state.as_u16_snapshot_mut(snapshot_elems)?;
        let out = workspace.stage_a(bits.len() * 2);
        let mut offset = 0;
        for snap in 0..num_snapshots {
            let snapshot = &bits[snap * snapshot_elems..(snap + 1) * snapshot_elems];
            for (b, p) in snapshot.iter().zip(prev.iter_mut()) {
                let x = *b ^ *p;
                out[offset..offset + 2].copy_from_slice(&x.to_le_bytes());
                offset += 2;
                *p = *b;
            }
        }
        compressor.compress(level, out)
    } else {
        let bits: Vec<u32> = data.iter().map(|x| x.to_bits()).collect();
        let prev = state.as_u32_snapshot_mut(snapshot_elems)?;
        let out = workspace.stage_a(bits.len() * 4);
        let mut offset = 0;
        for snap in 0..num_snapshots {
            let snapshot = &bits[snap * snapshot_elems..(snap + 1) * snapshot_elems];
            for (b, p) in snapshot.iter().zip(prev.iter_mut()) {
                let x = *b ^ *p;
                out[offset..offset + 4].copy_from_slice(&x.to_le_bytes());
                offset += 4;
                *p = *b;
            }
        }
        compressor.compress(level, out)
    }
}

/// Decodes a stored payload back into raw element bytes, the exact inverse
/// of [`encode`].
pub fn decode(
    codec: CodecId,
    dtype: Dtype,
    shape: &[u32],
    payload: &[u8],
    state: &mut PrevState,
    workspace: &mut Workspace,
) -> Result<Vec<u8>, CodecError> {
    let compressor = ZstdCompressor;
    match codec {
        CodecId::Raw => Ok(payload.to_vec()),

        CodecId::EntropyOnly => {
            let n = element_count(dtype, shape)? * dtype.byte_size();
            compressor.decompress(payload, n)
        }

        CodecId::T1dF32XorShuffle => {
            let n = validate_shape_1d(shape)? as usize;
            let shuffled = compressor.decompress(payload, n * 4)?;
            let bytes = workspace.stage_a(shuffled.len());
            unshuffle_into(&shuffled, 4, bytes);
            let xored = u32_vec_from_bytes(bytes);
            let carry = state.as_u32_mut()?;
            let bits = simd::xor_delta_decode_u32(&xored, carry);
            Ok(bits.iter().map(|&b| f32::from_bits(b)).flat_map(|f| f.to_le_bytes()).collect())
        }

        CodecId::T1dF16XorShuffleFromF32 => {
            let n = validate_shape_1d(shape)? as usize;
            let shuffled = compressor.decompress(payload, n * 2)?;
            let carry = state.as_u16_mut()?;
            let promoted = simd::unshuffle_and_reconstruct_f16(&shuffled, carry);
            Ok(promoted
                .iter()
                .map(|h| h.to_f32())
                .flat_map(|f| f.to_le_bytes())
                .collect())
        }

        CodecId::T1dI64Xor => {
            let n = validate_shape_1d(shape)? as usize;
            let decompressed = compressor.decompress(payload, n * 8)?;
            let xored = u64_vec_from_bytes(&decompressed);
            let carry = state.as_u64_mut()?;
            let values = simd::xor_delta_decode_u64(&xored, carry);
            Ok(values.iter().map(|&v| v as i64).flat_map(|v| v.to_le_bytes()).collect())
        }

        CodecId::T1dI64Delta => {
            let n = validate_shape_1d(shape)? as usize;
            let decompressed = compressor.decompress(payload, n * 8)?;
            let delta = i64_vec_from_bytes(&decompressed);
            let carry = state.as_i64_mut()?;
            let values = simd::arith_delta_decode_i64(&delta, carry);
            Ok(bytes_from_i64(&values))
        }

        CodecId::T2dF32 => {
            let (rows, cols) = validate_shape_2d(shape)?;
            let (rows, cols) = (rows as usize, cols as usize);
            let shuffled = compressor.decompress(payload, rows * cols * 4)?;
            let bytes = workspace.stage_a(shuffled.len());
            unshuffle_into(&shuffled, 4, bytes);
            let carries = state.as_u32_column_mut(cols)?;
            let mut columns = Vec::with_capacity(cols);
            for (c, carry) in carries.iter_mut().enumerate() {
                let col_bytes = &bytes[c * rows * 4..(c + 1) * rows * 4];
                let xored = u32_vec_from_bytes(col_bytes);
                let bits = simd::xor_delta_decode_u32(&xored, carry);
                columns.push(bits.into_iter().map(f32::from_bits).collect::<Vec<_>>());
            }
            let reassembled = row_major_from_columns(&columns, rows, cols);
            Ok(bytes_from_f32(&reassembled))
        }

        CodecId::T2dF16FromF32 => {
            let (rows, cols) = validate_shape_2d(shape)?;
            let (rows, cols) = (rows as usize, cols as usize);
            let shuffled = compressor.decompress(payload, rows * cols * 2)?;
            let bytes = workspace.stage_a(shuffled.len());
            unshuffle_into(&shuffled, 2, bytes);
            let carries = state.as_u16_column_mut(cols)?;
            let mut columns = Vec::with_capacity(cols);
            for (c, carry) in carries.iter_mut().enumerate() {
                let col_bytes = &bytes[c * rows * 2..(c + 1) * rows * 2];
                let reconstructed = reconstruct_f16_column(col_bytes, rows, carry);
                columns.push(reconstructed.iter().map(|h| h.to_f32()).collect::<Vec<_>>());
            }
            let reassembled = row_major_from_columns(&columns, rows, cols);
            Ok(bytes_from_f32(&reassembled))
        }

        CodecId::T2dI64 => {
            let (rows, cols) = validate_shape_2d(shape)?;
            let (rows, cols) = (rows as usize, cols as usize);
            let decompressed = compressor.decompress(payload, rows * cols * 8)?;
            let carries = state.as_u64_column_mut(cols)?;
            let mut columns = Vec::with_capacity(cols);
            for (c, carry) in carries.iter_mut().enumerate() {
                let col_bytes = &decompressed[c * rows * 8..(c + 1) * rows * 8];
                let xored = u64_vec_from_bytes(col_bytes);
                let values = simd::xor_delta_decode_u64(&xored, carry);
                columns.push(values.into_iter().map(|v| v as i64).collect::<Vec<_>>());
            }
            let reassembled = row_major_from_columns(&columns, rows, cols);
            Ok(bytes_from_i64(&reassembled))
        }

        CodecId::ObOkxF32
        | CodecId::ObOkxF16
        | CodecId::ObBinanceF32
        | CodecId::ObBinanceF16
        | CodecId::ObGenericF32
        | CodecId::ObGenericF16 => {
            let (num_snapshots, depth, features) = validate_ob_shape(codec, shape)?;
            let snapshot_elems = (depth * features) as usize;
            decode_order_book(codec, payload, num_snapshots as usize, snapshot_elems, state, workspace)
        }
    }
}

/// Reconstructs one column's f16 values from its already-unshuffled bytes
/// (the 2D shuffle runs once over the whole concatenated buffer at encode
/// time, so decode unshuffles globally first and hands each column its
/// plain little-endian u16 slice here).
fn reconstruct_f16_column(col_bytes: &[u8], rows: usize, carry: &mut u16) -> Vec<half::f16> {
    let mut out = Vec::with_capacity(rows);
    let mut acc = *carry;
    for i in 0..rows {
        let bits = u16::from_le_bytes([col_bytes[i * 2], col_bytes[i * 2 + 1]]);
        let x = bits ^ acc;
        out.push(half::f16::from_bits(x));
        acc = x;
    }
    *carry = acc;
    out
}

fn decode_order_book(
    codec: CodecId,
    payload: &[u8],
    num_snapshots: usize,
    snapshot_elems: usize,
    state: &mut PrevState,
    workspace: &mut Workspace,
) -> Result<Vec<u8>, CodecError> {
    let compressor = ZstdCompressor;
    let total = num_snapshots * snapshot_elems;
    let is_f16 = matches!(codec, CodecId::ObOkxF16 | CodecId::ObBinanceF16 | CodecId::ObGenericF16);
    if is_f16 {
        let decompressed = compressor.decompress(payload, total * 2)?;
        let xored = u16_vec_from_bytes(&decompressed);
        let prev = state.as_u16_snapshot_mut(snapshot_elems)?;
        let bits = workspace.stage_a(total * 2);
        let mut offset = 0;
        for snap in 0..num_snapshots {
            let snapshot = &xored[snap * snapshot_elems..(snap + 1) * snapshot_elems];
            for (x, p) in snapshot.iter().zip(prev.iter_mut()) {
                let b = *x ^ *p;
                bits[offset..offset + 2].copy_from_slice(&b.to_le_bytes());
                offset += 2;
                *p = b;
            }
        }
        Ok(bits
            .chunks_exact(2)
            .map(|c| half::f16::from_bits(u16::from_le_bytes([c[0], c[1]])).to_f32())
            .flat_map(|f| f.to_le_bytes())
            .collect())
    } else {
        let decompressed = compressor.decompress(payload, total * 4)?;
        let xored = u32_vec_from_bytes(&decompressed);
        let prev = state.as_u32_snapshot_mut(snapshot_elems)?;
        let bits = workspace.stage_a(total * 4);
        let mut offset = 0;
        for snap in 0..num_snapshots {
            let snapshot = &xored[snap * snapshot_elems..(snap + 1) * snapshot_elems];
            for (x, p) in snapshot.iter().zip(prev.iter_mut()) {
                let b = *x ^ *p;
                bits[offset..offset + 4].copy_from_slice(&b.to_le_bytes());
                offset += 4;
                *p = b;
            }
        }
        Ok(bits
            .chunks_exact(4)
            .map(|c| f32::from_bits(u32::from_le_bytes(c.try_into().unwrap())))
            .flat_map(|f| f.to_le_bytes())
            .collect())
    }
}

fn u32_vec_from_bytes(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
        .collect()
}

pub fn element_count(_dtype: Dtype, shape: &[u32]) -> Result<usize, CodecError> {
    if shape.is_empty() {
        return Err(CodecError::InvalidShape("empty shape".into()));
    }
    Ok(shape.iter().map(|&d| d as usize).product())
}
