//! Scalar reference kernels. These are the ground truth every
//! vectorized path must match byte-for-byte; grounded in the algorithms
//! declared (not literally translated) from
//! `original_source/src/codecs/temporal_1d_simd_codec.h` and
//! `float_conversion_simd_codec.h`.

use half::{bf16, f16};

/// XOR-delta encode: `out[i] = data[i] ^ prev`, then `prev` becomes
/// `data[i]` — i.e. each element is XORed against the raw value that
/// preceded it (carried across chunk boundaries via `prev`), not against the
/// previous *output*. Symmetric with [`xor_delta_decode`].
pub fn xor_delta_encode_u16(data: &[u16], prev: &mut u16) -> Vec<u16> {
    let mut out = Vec::with_capacity(data.len());
    let mut carry = *prev;
    for &x in data {
        out.push(x ^ carry);
        carry = x;
    }
    *prev = carry;
    out
}

/// Inclusive prefix-XOR scan: `recon[i] = recon[i-1] ^ out[i]`, seeded by the
/// carried `prev` from the previous chunk. This is the decode side of
/// [`xor_delta_encode_u16`] and the scalar ground truth for the fused
/// `UnshuffleAndReconstruct` kernel.
pub fn xor_delta_decode_u16(encoded: &[u16], prev: &mut u16) -> Vec<u16> {
    let mut out = Vec::with_capacity(encoded.len());
    let mut carry = *prev;
    for &e in encoded {
        let x = e ^ carry;
        out.push(x);
        carry = x;
    }
    *prev = carry;
    out
}

pub fn xor_delta_encode_u32(data: &[u32], prev: &mut u32) -> Vec<u32> {
    let mut out = Vec::with_capacity(data.len());
    let mut carry = *prev;
    for &x in data {
        out.push(x ^ carry);
        carry = x;
    }
    *prev = carry;
    out
}

pub fn xor_delta_decode_u32(encoded: &[u32], prev: &mut u32) -> Vec<u32> {
    let mut out = Vec::with_capacity(encoded.len());
    let mut carry = *prev;
    for &e in encoded {
        let x = e ^ carry;
        out.push(x);
        carry = x;
    }
    *prev = carry;
    out
}

pub fn xor_delta_encode_u64(data: &[u64], prev: &mut u64) -> Vec<u64> {
    let mut out = Vec::with_capacity(data.len());
    let mut carry = *prev;
    for &x in data {
        out.push(x ^ carry);
        carry = x;
    }
    *prev = carry;
    out
}

pub fn xor_delta_decode_u64(encoded: &[u64], prev: &mut u64) -> Vec<u64> {
    let mut out = Vec::with_capacity(encoded.len());
    let mut carry = *prev;
    for &e in encoded {
        let x = e ^ carry;
        out.push(x);
        carry = x;
    }
    *prev = carry;
    out
}

/// Arithmetic-delta encode (int only): `out[i] = data[i].wrapping_sub(prev)`.
pub fn arith_delta_encode_i64(data: &[i64], prev: &mut i64) -> Vec<i64> {
    let mut out = Vec::with_capacity(data.len());
    let mut carry = *prev;
    for &x in data {
        out.push(x.wrapping_sub(carry));
        carry = x;
    }
    *prev = carry;
    out
}

/// Inclusive prefix-sum scan, the decode side of [`arith_delta_encode_i64`].
pub fn arith_delta_decode_i64(encoded: &[i64], prev: &mut i64) -> Vec<i64> {
    let mut out = Vec::with_capacity(encoded.len());
    let mut carry = *prev;
    for &e in encoded {
        let x = e.wrapping_add(carry);
        out.push(x);
        carry = x;
    }
    *prev = carry;
    out
}

/// Byte-plane shuffle: transposes an array-of-structures byte layout
/// (element 0 byte 0, element 0 byte 1, ..., element 1 byte 0, ...) into a
/// structure-of-arrays byte-plane layout (all byte 0s, then all byte 1s,
/// ...). `width` is the element size in bytes. Groups similarly-distributed
/// bytes together ahead of entropy coding, the same transform BLOSC and the
/// downstream `zstd` call benefit from.
pub fn shuffle_bytes(data: &[u8], width: usize) -> Vec<u8> {
    assert_eq!(data.len() % width, 0);
    let n = data.len() / width;
    let mut out = vec![0u8; data.len()];
    for elem in 0..n {
        for byte in 0..width {
            out[byte * n + elem] = data[elem * width + byte];
        }
    }
    out
}

/// Inverse of [`shuffle_bytes`].
pub fn unshuffle_bytes(data: &[u8], width: usize) -> Vec<u8> {
    assert_eq!(data.len() % width, 0);
    let n = data.len() / width;
    let mut out = vec![0u8; data.len()];
    for elem in 0..n {
        for byte in 0..width {
            out[elem * width + byte] = data[byte * n + elem];
        }
    }
    out
}

/// Demotes an `f32` slice to `f16`, the lossy half of the temporal-f16
/// pipelines (the lossy round-trip property).
pub fn demote_f32_to_f16(data: &[f32]) -> Vec<f16> {
    data.iter().map(|&x| f16::from_f32(x)).collect()
}

pub fn promote_f16_to_f32(data: &[f16]) -> Vec<f32> {
    data.iter().map(|x| x.to_f32()).collect()
}

pub fn demote_f32_to_bf16(data: &[f32]) -> Vec<bf16> {
    data.iter().map(|&x| bf16::from_f32(x)).collect()
}

pub fn promote_bf16_to_f32(data: &[bf16]) -> Vec<f32> {
    data.iter().map(|x| x.to_f32()).collect()
}

/// Fused demote-then-xor-delta over `f32` data, producing raw `f16` bit
/// patterns already XOR-delta'd. Scalar ground truth for the fused
/// `DemoteAndXor1D_dispatcher`: a single pass avoids materializing the
/// intermediate `f16` array twice (once for the demote, once for the scan).
pub fn demote_and_xor_1d(data: &[f32], prev: &mut u16) -> Vec<u16> {
    let mut out = Vec::with_capacity(data.len());
    let mut carry = *prev;
    for &x in data {
        let bits = f16::from_f32(x).to_bits();
        out.push(bits ^ carry);
        carry = bits;
    }
    *prev = carry;
    out
}

/// Fused unshuffle-then-prefix-xor-reconstruct, the scalar ground truth for
/// `UnshuffleAndReconstruct16_1D_dispatcher`: unshuffles byte planes back
/// into packed `u16` values, then runs the inclusive prefix-XOR scan in the
/// same pass.
pub fn unshuffle_and_reconstruct_f16(shuffled: &[u8], prev: &mut u16) -> Vec<f16> {
    let packed = unshuffle_bytes(shuffled, 2);
    let n = packed.len() / 2;
    let mut out = Vec::with_capacity(n);
    let mut carry = *prev;
    for i in 0..n {
        let bits = u16::from_le_bytes([packed[i * 2], packed[i * 2 + 1]]);
        let x = bits ^ carry;
        out.push(f16::from_bits(x));
        carry = x;
    }
    *prev = carry;
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xor_delta_round_trips_across_chunk_boundary() {
        let chunk1 = vec![1u16, 5, 9, 2];
        let chunk2 = vec![100u16, 50, 7];
        let mut enc_prev = 0u16;
        let e1 = xor_delta_encode_u16(&chunk1, &mut enc_prev);
        let e2 = xor_delta_encode_u16(&chunk2, &mut enc_prev);

        let mut dec_prev = 0u16;
        let d1 = xor_delta_decode_u16(&e1, &mut dec_prev);
        let d2 = xor_delta_decode_u16(&e2, &mut dec_prev);
        assert_eq!(d1, chunk1);
        assert_eq!(d2, chunk2);
    }

    #[test]
    fn arith_delta_round_trips() {
        let data = vec![10i64, 12, 9, 9, 100, -5];
        let mut enc_prev = 0i64;
        let encoded = arith_delta_encode_i64(&data, &mut enc_prev);
        let mut dec_prev = 0i64;
        let decoded = arith_delta_decode_i64(&encoded, &mut dec_prev);
        assert_eq!(decoded, data);
    }

    #[test]
    fn shuffle_round_trips() {
        let data: Vec<u8> = (0u8..40).collect();
        let shuffled = shuffle_bytes(&data, 4);
        let back = unshuffle_bytes(&shuffled, 4);
        assert_eq!(back, data);
    }

    #[test]
    fn demote_promote_f16_is_lossy_but_bounded() {
        let data = vec![1.0f32, 3.14159, -2.71828, 65504.0, 0.0001];
        let demoted = demote_f32_to_f16(&data);
        let promoted = promote_f16_to_f32(&demoted);
        for (orig, round_tripped) in data.iter().zip(promoted.iter()) {
            let rel_err = (orig - round_tripped).abs() / orig.abs().max(1.0);
            assert!(rel_err < 0.01, "rel_err {rel_err} too large for {orig}");
        }
    }

    #[test]
    fn fused_demote_and_xor_matches_unfused_composition() {
        let data = vec![1.5f32, -2.25, 100.0, 0.0];
        let mut fused_prev = 0u16;
        let fused = demote_and_xor_1d(&data, &mut fused_prev);

        let demoted = demote_f32_to_f16(&data);
        let bits: Vec<u16> = demoted.iter().map(|x| x.to_bits()).collect();
        let mut unfused_prev = 0u16;
        let unfused = xor_delta_encode_u16(&bits, &mut unfused_prev);

        assert_eq!(fused, unfused);
        assert_eq!(fused_prev, unfused_prev);
    }

    #[test]
    fn fused_unshuffle_and_reconstruct_matches_unfused_composition() {
        let data = vec![1.5f32, -2.25, 100.0, 0.0, 42.5];
        let mut enc_prev = 0u16;
        let encoded = demote_and_xor_1d(&data, &mut enc_prev);
        let bytes: Vec<u8> = encoded.iter().flat_map(|x| x.to_le_bytes()).collect();
        let shuffled = shuffle_bytes(&bytes, 2);

        let mut dec_prev = 0u16;
        let fused = unshuffle_and_reconstruct_f16(&shuffled, &mut dec_prev);

        let unshuffled = unshuffle_bytes(&shuffled, 2);
        let packed: Vec<u16> = unshuffled
            .chunks_exact(2)
            .map(|b| u16::from_le_bytes([b[0], b[1]]))
            .collect();
        let mut unfused_prev = 0u16;
        let reconstructed_bits = xor_delta_decode_u16(&packed, &mut unfused_prev);
        let unfused: Vec<f16> = reconstructed_bits.iter().map(|&b| f16::from_bits(b)).collect();

        assert_eq!(fused, unfused);
        assert_eq!(dec_prev, unfused_prev);
    }
}
