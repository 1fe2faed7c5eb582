//! Length-prefixed serialization primitives, grounded in
//! `original_source/src/file_format/cdd_file_format.h`'s `write_pod`/`read_pod`/
//! `write_vector_pod`/`read_vector_pod`/`write_blob`/`read_blob` templates and
//! `write_pod_at` in-place patch helper. Operates over any `StorageBackend`.

use crate::backend::StorageBackend;
use crate::error::IoError;

/// Writes a fixed-size POD value as its native-endian byte representation.
/// Matches `write_pod<T>` — no endianness negotiation, caller picks the
/// representation (little-endian integers/floats throughout this crate).
pub fn write_pod<T: Copy>(backend: &mut impl StorageBackend, value: &T) -> Result<(), IoError> {
    let bytes = unsafe {
        std::slice::from_raw_parts(value as *const T as *const u8, std::mem::size_of::<T>())
    };
    backend.write_all(bytes)
}

/// Reads a fixed-size POD value from the current position.
pub fn read_pod<T: Copy>(backend: &mut impl StorageBackend) -> Result<T, IoError> {
    let mut buf = vec![0u8; std::mem::size_of::<T>()];
    backend.read_exact(&mut buf)?;
    let mut value = std::mem::MaybeUninit::<T>::uninit();
    unsafe {
        std::ptr::copy_nonoverlapping(buf.as_ptr(), value.as_mut_ptr() as *mut u8, buf.len());
        Ok(value.assume_init())
    }
}

/// Writes a fixed-size POD value at an absolute offset, restoring the
/// previous cursor position afterward. Used to patch chained pointers and
/// hashes in place without disturbing the append cursor.
pub fn write_pod_at<T: Copy>(
    backend: &mut impl StorageBackend,
    offset: u64,
    value: &T,
) -> Result<(), IoError> {
    let saved = backend.tell();
    backend.seek(offset)?;
    write_pod(backend, value)?;
    backend.seek(saved)?;
    Ok(())
}

/// Writes a `u32` length prefix followed by `elems.len() * size_of::<T>()`
/// bytes of native-endian element data. Mirrors `write_vector_pod`.
pub fn write_vec<T: Copy>(backend: &mut impl StorageBackend, elems: &[T]) -> Result<(), IoError> {
    write_pod(backend, &(elems.len() as u32))?;
    if elems.is_empty() {
        return Ok(());
    }
    let bytes = unsafe {
        std::slice::from_raw_parts(
            elems.as_ptr() as *const u8,
            std::mem::size_of::<T>() * elems.len(),
        )
    };
    backend.write_all(bytes)
}

/// Reads back a `write_vec`-encoded sequence.
pub fn read_vec<T: Copy>(backend: &mut impl StorageBackend) -> Result<Vec<T>, IoError> {
    let len: u32 = read_pod(backend)?;
    let len = len as usize;
    let mut out = Vec::with_capacity(len);
    if len == 0 {
        return Ok(out);
    }
    let mut bytes = vec![0u8; len * std::mem::size_of::<T>()];
    backend.read_exact(&mut bytes)?;
    unsafe {
        let src = bytes.as_ptr() as *const T;
        for i in 0..len {
            out.push(std::ptr::read_unaligned(src.add(i)));
        }
    }
    Ok(out)
}

/// Writes a `u32` length prefix followed by raw opaque bytes. Mirrors
/// `write_blob` — used for compressed metadata and index-block payloads
/// whose element type is not a fixed POD.
pub fn write_blob(backend: &mut impl StorageBackend, bytes: &[u8]) -> Result<(), IoError> {
    write_pod(backend, &(bytes.len() as u32))?;
    backend.write_all(bytes)
}

/// Reads back a `write_blob`-encoded byte span.
pub fn read_blob(backend: &mut impl StorageBackend) -> Result<Vec<u8>, IoError> {
    let len: u32 = read_pod(backend)?;
    let mut buf = vec![0u8; len as usize];
    backend.read_exact(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    #[test]
    fn pod_round_trips() {
        let mut b = MemoryBackend::new();
        write_pod(&mut b, &0xdead_beef_u32).unwrap();
        b.rewind().unwrap();
        let v: u32 = read_pod(&mut b).unwrap();
        assert_eq!(v, 0xdead_beef);
    }

    #[test]
    fn vec_round_trips_including_empty() {
        let mut b = MemoryBackend::new();
        write_vec(&mut b, &[1u64, 2, 3]).unwrap();
        write_vec::<u64>(&mut b, &[]).unwrap();
        b.rewind().unwrap();
        assert_eq!(read_vec::<u64>(&mut b).unwrap(), vec![1, 2, 3]);
        assert_eq!(read_vec::<u64>(&mut b).unwrap(), Vec::<u64>::new());
    }

    #[test]
    fn blob_round_trips() {
        let mut b = MemoryBackend::new();
        write_blob(&mut b, b"hello").unwrap();
        b.rewind().unwrap();
        assert_eq!(read_blob(&mut b).unwrap(), b"hello");
    }

    #[test]
    fn write_pod_at_patches_without_disturbing_cursor() {
        let mut b = MemoryBackend::new();
        write_pod(&mut b, &1u32).unwrap();
        write_pod(&mut b, &2u32).unwrap();
        let cursor_before = b.tell();
        write_pod_at(&mut b, 0, &99u32).unwrap();
        assert_eq!(b.tell(), cursor_before);
        b.rewind().unwrap();
        let patched: u32 = read_pod(&mut b).unwrap();
        let untouched: u32 = read_pod(&mut b).unwrap();
        assert_eq!(patched, 99);
        assert_eq!(untouched, 2);
    }
}
