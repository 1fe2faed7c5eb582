//! In-memory growable-buffer backend, grounded in
//! `original_source/src/storage/storage_backend.h`'s `MemoryBackend`: a
//! `Vec<u8>` that grows on seek-past-end or write-past-end, zero-filling the
//! gap.

use crate::error::IoError;

use super::StorageBackend;

pub struct MemoryBackend {
    buf: Vec<u8>,
    pos: u64,
    read_only: bool,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self { buf: Vec::new(), pos: 0, read_only: false }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self { buf: Vec::with_capacity(cap), pos: 0, read_only: false }
    }

    /// Wraps an existing byte buffer read-only: every [`StorageBackend::write`]
    /// and any seek past the end fails, mirroring [`super::FileBackend::open_read_only`].
    pub fn open_read_only(bytes: Vec<u8>) -> Self {
        Self { buf: bytes, pos: 0, read_only: true }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }

    fn ensure_len(&mut self, len: u64) {
        if len > self.buf.len() as u64 {
            self.buf.resize(len as usize, 0);
        }
    }
}

impl StorageBackend for MemoryBackend {
    fn read(&mut self, dst: &mut [u8]) -> Result<usize, IoError> {
        let start = self.pos as usize;
        if start >= self.buf.len() {
            return Ok(0);
        }
        let n = dst.len().min(self.buf.len() - start);
        dst[..n].copy_from_slice(&self.buf[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }

    fn write(&mut self, src: &[u8]) -> Result<usize, IoError> {
        if self.read_only {
            return Err(IoError::ReadOnly);
        }
        let end = self.pos + src.len() as u64;
        self.ensure_len(end);
        let start = self.pos as usize;
        self.buf[start..start + src.len()].copy_from_slice(src);
        self.pos = end;
        Ok(src.len())
    }

    fn seek(&mut self, abs_off: u64) -> Result<(), IoError> {
        if abs_off > self.buf.len() as u64 {
            if self.read_only {
                return Err(IoError::SeekPastEndReadOnly { offset: abs_off, size: self.buf.len() as u64 });
            }
            self.ensure_len(abs_off);
        }
        self.pos = abs_off;
        Ok(())
    }

    fn tell(&self) -> u64 {
        self.pos
    }

    fn flush(&mut self) -> Result<(), IoError> {
        Ok(())
    }

    fn size(&self) -> u64 {
        self.buf.len() as u64
    }
}
