//! Memory-mapped backend, grounded in
//! `original_source/src/storage/mio_backend.cpp`'s `MioBackend`: the mapped
//! file's physical size is grown ahead of the logical size it reports, using
//! a doubling strategy capped at a fixed growth increment, to avoid remapping
//! on every single write. `logical_size_` there becomes `logical_size` here;
//! `remap()` becomes `grow_to`. Uses `memmap2` in place of `mio`, the same
//! substitution `terraputix-omfiles-rs` makes for mapped scientific arrays.

use std::fs::{File, OpenOptions};
use std::path::Path;

use memmap2::MmapMut;

use crate::error::IoError;

use super::StorageBackend;

/// Growth increments double each remap, capped at this many bytes, matching
/// `mio_backend.cpp`'s `MAX_GROWTH_STEP` constant.
const MAX_GROWTH_STEP: u64 = 64 * 1024 * 1024;

const INITIAL_CAPACITY: u64 = 4096;

pub struct MappedBackend {
    file: File,
    mmap: MmapMut,
    /// Bytes currently backed by a live mapping (>= logical_size).
    physical_size: u64,
    /// The size callers observe via `size()`; bytes in `[logical_size,
    /// physical_size)` are mapped but not yet "real" — zero-filled headroom.
    logical_size: u64,
    pos: u64,
    read_only: bool,
}

impl MappedBackend {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(INITIAL_CAPACITY)?;
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self {
            file,
            mmap,
            physical_size: INITIAL_CAPACITY,
            logical_size: 0,
            pos: 0,
            read_only: false,
        })
    }

    pub fn open_for_append(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let logical_size = file.metadata()?.len();
        let physical_size = logical_size.max(INITIAL_CAPACITY);
        file.set_len(physical_size)?;
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self { file, mmap, physical_size, logical_size, pos: logical_size, read_only: false })
    }

    fn next_growth_step(current: u64) -> u64 {
        let doubled = current.max(INITIAL_CAPACITY);
        doubled.min(MAX_GROWTH_STEP).max(1)
    }

    /// Ensures the physical mapping covers at least `needed` bytes, growing
    /// by doubling (capped) rather than exactly to `needed`, then remapping.
    fn ensure_physical(&mut self, needed: u64) -> Result<(), IoError> {
        if needed <= self.physical_size {
            return Ok(());
        }
        let mut new_physical = self.physical_size;
        while new_physical < needed {
            let step = Self::next_growth_step(new_physical).min(MAX_GROWTH_STEP);
            new_physical += step.max(needed - new_physical);
        }
        self.file.set_len(new_physical)?;
        self.mmap.flush()?;
        self.mmap = unsafe { MmapMut::map_mut(&self.file)? };
        self.physical_size = new_physical;
        Ok(())
    }

    fn extend_logical(&mut self, new_logical: u64) -> Result<(), IoError> {
        if new_logical <= self.logical_size {
            return Ok(());
        }
        self.ensure_physical(new_logical)?;
        self.mmap[self.logical_size as usize..new_logical as usize].fill(0);
        self.logical_size = new_logical;
        Ok(())
    }
}

impl StorageBackend for MappedBackend {
    fn read(&mut self, dst: &mut [u8]) -> Result<usize, IoError> {
        let start = self.pos;
        if start >= self.logical_size {
            return Ok(0);
        }
        let n = (dst.len() as u64).min(self.logical_size - start) as usize;
        dst[..n].copy_from_slice(&self.mmap[start as usize..start as usize + n]);
        self.pos += n as u64;
        Ok(n)
    }

    fn write(&mut self, src: &[u8]) -> Result<usize, IoError> {
        if self.read_only {
            return Err(IoError::ReadOnly);
        }
        let end = self.pos + src.len() as u64;
        self.extend_logical(end)?;
        let start = self.pos as usize;
        self.mmap[start..start + src.len()].copy_from_slice(src);
        self.pos = end;
        Ok(src.len())
    }

    fn seek(&mut self, abs_off: u64) -> Result<(), IoError> {
        if abs_off > self.logical_size {
            if self.read_only {
                return Err(IoError::SeekPastEndReadOnly {
                    offset: abs_off,
                    size: self.logical_size,
                });
            }
            self.extend_logical(abs_off)?;
        }
        self.pos = abs_off;
        Ok(())
    }

    fn tell(&self) -> u64 {
        self.pos
    }

    fn flush(&mut self) -> Result<(), IoError> {
        self.mmap.flush()?;
        if self.physical_size != self.logical_size {
            self.file.set_len(self.logical_size)?;
            self.physical_size = self.logical_size;
            self.mmap = unsafe { MmapMut::map_mut(&self.file)? };
        }
        Ok(())
    }

    fn size(&self) -> u64 {
        self.logical_size
    }
}
