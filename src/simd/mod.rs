//! SIMD kernel suite.
//!
//! [`scalar`] is the ground truth every dispatch path must reproduce
//! byte-for-byte; [`x86`] accelerates the embarrassingly-parallel encode
//! kernels on `x86_64` when AVX2 is available at runtime, the way the
//! these codecs never existed before — this module's dispatch shape is
//! instead grounded directly in
//! `original_source/src/codecs/temporal_1d_simd_codec.h`'s `*_dispatcher`
//! functions, which probe CPU features once per call and fall back to a
//! portable path.

pub mod scalar;

#[cfg(target_arch = "x86_64")]
mod x86;

pub use half::{bf16, f16};

/// XOR-delta encode over `u16` elements (used by the f16 temporal pipeline),
/// dispatched to AVX2 on `x86_64` when available, scalar otherwise.
pub fn xor_delta_encode_u16(data: &[u16], prev: &mut u16) -> Vec<u16> {
    #[cfg(target_arch = "x86_64")]
    {
        x86::xor_delta_encode_u16(data, prev)
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        scalar::xor_delta_encode_u16(data, prev)
    }
}

pub fn xor_delta_decode_u16(encoded: &[u16], prev: &mut u16) -> Vec<u16> {
    scalar::xor_delta_decode_u16(encoded, prev)
}

pub fn xor_delta_encode_u32(data: &[u32], prev: &mut u32) -> Vec<u32> {
    scalar::xor_delta_encode_u32(data, prev)
}

pub fn xor_delta_decode_u32(encoded: &[u32], prev: &mut u32) -> Vec<u32> {
    scalar::xor_delta_decode_u32(encoded, prev)
}

/// XOR-delta encode over `u64` elements (used by the int64 temporal
/// pipeline and the index-block compression policy), dispatched to AVX2 on
/// `x86_64` when available.
pub fn xor_delta_encode_u64(data: &[u64], prev: &mut u64) -> Vec<u64> {
    #[cfg(target_arch = "x86_64")]
    {
        x86::xor_delta_encode_u64(data, prev)
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        scalar::xor_delta_encode_u64(data, prev)
    }
}

pub fn xor_delta_decode_u64(encoded: &[u64], prev: &mut u64) -> Vec<u64> {
    scalar::xor_delta_decode_u64(encoded, prev)
}

pub fn arith_delta_encode_i64(data: &[i64], prev: &mut i64) -> Vec<i64> {
    scalar::arith_delta_encode_i64(data, prev)
}

pub fn arith_delta_decode_i64(encoded: &[i64], prev: &mut i64) -> Vec<i64> {
    scalar::arith_delta_decode_i64(encoded, prev)
}

pub fn shuffle_bytes(data: &[u8], width: usize) -> Vec<u8> {
    scalar::shuffle_bytes(data, width)
}

pub fn unshuffle_bytes(data: &[u8], width: usize) -> Vec<u8> {
    scalar::unshuffle_bytes(data, width)
}

pub fn demote_f32_to_f16(data: &[f32]) -> Vec<f16> {
    scalar::demote_f32_to_f16(data)
}

pub fn promote_f16_to_f32(data: &[f16]) -> Vec<f32> {
    scalar::promote_f16_to_f32(data)
}

pub fn demote_f32_to_bf16(data: &[f32]) -> Vec<bf16> {
    scalar::demote_f32_to_bf16(data)
}

pub fn promote_bf16_to_f32(data: &[bf16]) -> Vec<f32> {
    scalar::promote_bf16_to_f32(data)
}

pub fn demote_and_xor_1d(data: &[f32], prev: &mut u16) -> Vec<u16> {
    scalar::demote_and_xor_1d(data, prev)
}

pub fn unshuffle_and_reconstruct_f16(shuffled: &[u8], prev: &mut u16) -> Vec<f16> {
    scalar::unshuffle_and_reconstruct_f16(shuffled, prev)
}

/// True when this process would take the vectorized path for `u16`/`u64`
/// XOR-delta encoding. Exposed so tests can assert both paths were actually
/// exercised rather than silently both hitting scalar.
pub fn vectorized_path_available() -> bool {
    #[cfg(target_arch = "x86_64")]
    {
        is_x86_feature_detected!("avx2")
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        false
    }
}
