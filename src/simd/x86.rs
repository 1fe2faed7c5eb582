//! AVX2-accelerated kernels for the subset of [`super::scalar`] operations
//! that are embarrassingly parallel once observed as a shifted-XOR: encoding
//! `out[i] = data[i] ^ data[i-1]` is exactly an unaligned load of the array
//! one element back, XORed against an aligned load — no lane shuffle needed.
//! The inclusive prefix-XOR *reconstruction* (decode) carries a true
//! sequential dependency across the whole chunk and is left to
//! [`super::scalar`] everywhere, matching how a feature-probe dispatcher
//! functions fall back to scalar for anything that isn't a flat elementwise
//! transform.
//!
//! Every function here must be byte-identical to its scalar counterpart;
//! the round-trip and SIMD-equivalence tests in `tests/pipelines.rs` assert
//! this directly.

#[target_feature(enable = "avx2")]
unsafe fn xor_delta_encode_u64_avx2_inner(data: &[u64], prev: u64) -> Vec<u64> {
    use std::arch::x86_64::*;

    let n = data.len();
    let mut out = vec![0u64; n];
    if n == 0 {
        return out;
    }

    out[0] = data[0] ^ prev;

    let mut i = 1;
    while i + 4 <= n {
        let cur = _mm256_loadu_si256(data.as_ptr().add(i) as *const __m256i);
        let shifted = _mm256_loadu_si256(data.as_ptr().add(i - 1) as *const __m256i);
        let xored = _mm256_xor_si256(cur, shifted);
        _mm256_storeu_si256(out.as_mut_ptr().add(i) as *mut __m256i, xored);
        i += 4;
    }
    while i < n {
        out[i] = data[i] ^ data[i - 1];
        i += 1;
    }
    out
}

/// Dispatches to the AVX2 path when available at runtime, matching the
/// pattern of probing `is_x86_feature_detected!` once per call
/// rather than at process startup.
pub fn xor_delta_encode_u64(data: &[u64], prev: &mut u64) -> Vec<u64> {
    let carried_in = *prev;
    let out = if is_x86_feature_detected!("avx2") {
        unsafe { xor_delta_encode_u64_avx2_inner(data, carried_in) }
    } else {
        return super::scalar::xor_delta_encode_u64(data, prev);
    };
    if let Some(&last) = data.last() {
        *prev = last;
    }
    out
}

#[target_feature(enable = "avx2")]
unsafe fn xor_delta_encode_u16_avx2_inner(data: &[u16], prev: u16) -> Vec<u16> {
    use std::arch::x86_64::*;

    let n = data.len();
    let mut out = vec![0u16; n];
    if n == 0 {
        return out;
    }
    out[0] = data[0] ^ prev;

    let mut i = 1;
    while i + 16 <= n {
        let cur = _mm256_loadu_si256(data.as_ptr().add(i) as *const __m256i);
        let shifted = _mm256_loadu_si256(data.as_ptr().add(i - 1) as *const __m256i);
        let xored = _mm256_xor_si256(cur, shifted);
        _mm256_storeu_si256(out.as_mut_ptr().add(i) as *mut __m256i, xored);
        i += 16;
    }
    while i < n {
        out[i] = data[i] ^ data[i - 1];
        i += 1;
    }
    out
}

pub fn xor_delta_encode_u16(data: &[u16], prev: &mut u16) -> Vec<u16> {
    let carried_in = *prev;
    let out = if is_x86_feature_detected!("avx2") {
        unsafe { xor_delta_encode_u16_avx2_inner(data, carried_in) }
    } else {
        return super::scalar::xor_delta_encode_u16(data, prev);
    };
    if let Some(&last) = data.last() {
        *prev = last;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn avx2_u64_matches_scalar() {
        if !is_x86_feature_detected!("avx2") {
            return;
        }
        let data: Vec<u64> = (0..257u64).map(|i| i.wrapping_mul(0x9E37_79B9)).collect();
        let mut p_vec = 11u64;
        let mut p_scalar = 11u64;
        let vec_out = xor_delta_encode_u64(&data, &mut p_vec);
        let scalar_out = super::super::scalar::xor_delta_encode_u64(&data, &mut p_scalar);
        assert_eq!(vec_out, scalar_out);
        assert_eq!(p_vec, p_scalar);
    }

    #[test]
    fn avx2_u16_matches_scalar() {
        if !is_x86_feature_detected!("avx2") {
            return;
        }
        let data: Vec<u16> = (0..513).map(|i| (i * 7919) as u16).collect();
        let mut p_vec = 3u16;
        let mut p_scalar = 3u16;
        let vec_out = xor_delta_encode_u16(&data, &mut p_vec);
        let scalar_out = super::super::scalar::xor_delta_encode_u16(&data, &mut p_scalar);
        assert_eq!(vec_out, scalar_out);
        assert_eq!(p_vec, p_scalar);
    }
}
