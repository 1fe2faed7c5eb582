//! Storage backend: byte-addressed read/write/seek/flush/size over a
//! file, a memory buffer, or a memory-mapped file.
//!
//! Grounded in the `FileBackend`/`MemoryBackend` split
//! (`original_source/src/storage/storage_backend.h`) and the growth strategy
//! of `original_source/src/storage/mio_backend.cpp`, ported from `mio` to the
//! `memmap2` crate already used by `terraputix-omfiles-rs` for the same
//! memory-mapped-array-file role.

mod file;
mod mapped;
mod memory;

pub use file::FileBackend;
pub use mapped::MappedBackend;
pub use memory::MemoryBackend;

use crate::error::IoError;

/// Uniform capability set implemented by every storage backend.
///
/// Contracts:
/// - `seek` past end in writable modes eagerly extends the logical end;
///   intervening bytes read back as zero.
/// - `size()` returns the logical length, never any over-allocation.
/// - A `read` at or past end returns 0 bytes.
/// - Read-only backends fail every `write`.
pub trait StorageBackend {
    fn read(&mut self, dst: &mut [u8]) -> Result<usize, IoError>;
    fn write(&mut self, src: &[u8]) -> Result<usize, IoError>;
    fn seek(&mut self, abs_off: u64) -> Result<(), IoError>;
    fn tell(&self) -> u64;
    fn flush(&mut self) -> Result<(), IoError>;
    fn rewind(&mut self) -> Result<(), IoError> {
        self.seek(0)
    }
    fn size(&self) -> u64;

    fn write_all(&mut self, src: &[u8]) -> Result<(), IoError> {
        let n = self.write(src)?;
        if n != src.len() {
            return Err(IoError::Std(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "short write",
            )));
        }
        Ok(())
    }

    fn read_exact(&mut self, dst: &mut [u8]) -> Result<(), IoError> {
        let n = self.read(dst)?;
        if n != dst.len() {
            return Err(IoError::Std(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "short read",
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod parity_tests {
    //! Backend parity: the same sequence of
    //! writes against Memory and File backends produce identical bytes and
    //! identical readback of offsets/sizes/positions.
    use super::*;
    use std::io::{Read, Seek, SeekFrom};

    fn exercise(b: &mut impl StorageBackend) -> (Vec<u8>, u64, u64) {
        b.write_all(b"hello ").unwrap();
        b.write_all(b"world").unwrap();
        let mid = b.tell();
        b.seek(2).unwrap();
        let mut buf = [0u8; 3];
        b.read_exact(&mut buf).unwrap();
        b.seek(b.size()).unwrap();
        b.write_all(b"!").unwrap();
        let end = b.size();
        (buf.to_vec(), mid, end)
    }

    #[test]
    fn memory_and_file_backends_agree() {
        let mut mem = MemoryBackend::new();
        let mem_result = exercise(&mut mem);

        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut file = FileBackend::create(tmp.path()).unwrap();
        let file_result = exercise(&mut file);

        assert_eq!(mem_result, file_result);

        file.flush().unwrap();
        let mut on_disk = Vec::new();
        std::fs::File::open(tmp.path())
            .unwrap()
            .read_to_end(&mut on_disk)
            .unwrap();

        let mut mem2 = MemoryBackend::new();
        exercise(&mut mem2);
        assert_eq!(mem2.as_slice(), &on_disk[..]);
    }

    #[test]
    fn seek_past_end_zero_fills() {
        let mut mem = MemoryBackend::new();
        mem.seek(8).unwrap();
        mem.write_all(b"x").unwrap();
        assert_eq!(mem.size(), 9);
        assert_eq!(mem.as_slice()[..8], [0u8; 8]);

        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut file = FileBackend::create(tmp.path()).unwrap();
        file.seek(8).unwrap();
        file.write_all(b"x").unwrap();
        assert_eq!(file.size(), 9);
        file.flush().unwrap();
        let mut f = std::fs::File::open(tmp.path()).unwrap();
        f.seek(SeekFrom::Start(0)).unwrap();
        let mut data = Vec::new();
        f.read_to_end(&mut data).unwrap();
        assert_eq!(&data[..8], &[0u8; 8]);
    }

    #[test]
    fn memory_backend_open_read_only_rejects_writes_and_seeks_past_end() {
        let mut mem = MemoryBackend::new();
        mem.write_all(b"hello").unwrap();
        let bytes = mem.into_vec();

        let mut ro = MemoryBackend::open_read_only(bytes.clone());
        let mut buf = [0u8; 5];
        ro.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
        assert!(matches!(ro.write(b"!"), Err(IoError::ReadOnly)));
        assert!(matches!(
            ro.seek(bytes.len() as u64 + 1),
            Err(IoError::SeekPastEndReadOnly { .. })
        ));
        ro.seek(0).unwrap();
    }
}
