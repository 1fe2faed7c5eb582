//! Streaming cryptographic hasher.
//!
//! Domain-free BLAKE3, calling `blake3::hash`/`blake3::Hasher` the way
//! `block.rs` and `index/mod.rs` do. `StreamHasher` wraps the
//! incremental API so callers can feed arbitrary byte spans and POD-vector
//! element bytes without allocating an intermediate buffer.

pub struct StreamHasher {
    inner: blake3::Hasher,
}

impl Default for StreamHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamHasher {
    pub fn new() -> Self {
        Self { inner: blake3::Hasher::new() }
    }

    /// Feed raw bytes.
    pub fn update(&mut self, bytes: &[u8]) -> &mut Self {
        self.inner.update(bytes);
        self
    }

    /// Feed the little-endian byte representation of a POD element slice.
    /// Used for the stored-data hashing pathway: independent of host
    /// endianness, unlike the index-block hash which hashes native layout.
    pub fn update_pod_le<T: PodLe>(&mut self, elems: &[T]) -> &mut Self {
        for e in elems {
            self.inner.update(&e.to_le_bytes_vec());
        }
        self
    }

    /// Feed the host-native byte representation of a `u64` slice, used only
    /// for index-block hashing (acceptable because index integrity is
    /// meaningful only on the writing host).
    pub fn update_u64_native(&mut self, elems: &[u64]) -> &mut Self {
        let bytes = unsafe {
            std::slice::from_raw_parts(elems.as_ptr() as *const u8, std::mem::size_of_val(elems))
        };
        self.inner.update(bytes);
        self
    }

    pub fn finalize_256(&self) -> [u8; 32] {
        self.inner.finalize().into()
    }

    pub fn finalize_128(&self) -> [u8; 16] {
        let full = self.finalize_256();
        let mut out = [0u8; 16];
        out.copy_from_slice(&full[..16]);
        out
    }
}

/// One-shot 256-bit hash over a contiguous byte span.
pub fn hash_bytes_256(bytes: &[u8]) -> [u8; 32] {
    blake3::hash(bytes).into()
}

/// Implemented for the primitive element types the codec pipelines move
/// between disk and memory, so `StreamHasher::update_pod_le` can hash the
/// stored-data pathway identically regardless of host endianness.
pub trait PodLe {
    fn to_le_bytes_vec(&self) -> Vec<u8>;
}

macro_rules! impl_pod_le {
    ($($t:ty),*) => {
        $(impl PodLe for $t {
            fn to_le_bytes_vec(&self) -> Vec<u8> {
                self.to_le_bytes().to_vec()
            }
        })*
    };
}

impl_pod_le!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

impl PodLe for half::f16 {
    fn to_le_bytes_vec(&self) -> Vec<u8> {
        self.to_le_bytes().to_vec()
    }
}

impl PodLe for half::bf16 {
    fn to_le_bytes_vec(&self) -> Vec<u8> {
        self.to_le_bytes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_update_matches_one_shot() {
        let data = b"hello tensorcask";
        let mut h = StreamHasher::new();
        h.update(data);
        assert_eq!(h.finalize_256(), hash_bytes_256(data));
    }

    #[test]
    fn finalize_128_is_truncation_of_256() {
        let mut h = StreamHasher::new();
        h.update(b"truncate me");
        let full = h.finalize_256();
        let half_digest = h.finalize_128();
        assert_eq!(&full[..16], &half_digest[..]);
    }

    #[test]
    fn pod_le_hash_is_endianness_independent_representation() {
        let elems: [u32; 3] = [1, 2, 3];
        let mut h1 = StreamHasher::new();
        h1.update_pod_le(&elems);

        let mut raw = Vec::new();
        for e in &elems {
            raw.extend_from_slice(&e.to_le_bytes());
        }
        assert_eq!(h1.finalize_256(), hash_bytes_256(&raw));
    }
}
