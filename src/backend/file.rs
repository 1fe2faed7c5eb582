//! File-backed storage, grounded in `original_source/src/storage/storage_backend.h`'s
//! `FileBackend` (an `fstream` wrapper). We use plain `std::fs::File` with
//! explicit seek/read/write rather than buffering layers, matching the
//! direct-syscall style of `io_stream/mod.rs`.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::IoError;

use super::StorageBackend;

pub struct FileBackend {
    file: File,
    pos: u64,
    size: u64,
    read_only: bool,
}

impl FileBackend {
    /// Creates a new file, truncating any existing content.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self { file, pos: 0, size: 0, read_only: false })
    }

    /// Opens an existing file for read-write, positioned at the end.
    pub fn open_for_append(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let size = file.metadata()?.len();
        Ok(Self { file, pos: size, size, read_only: false })
    }

    /// Opens an existing file read-only.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let file = OpenOptions::new().read(true).open(path)?;
        let size = file.metadata()?.len();
        Ok(Self { file, pos: 0, size, read_only: true })
    }
}

impl StorageBackend for FileBackend {
    fn read(&mut self, dst: &mut [u8]) -> Result<usize, IoError> {
        self.file.seek(SeekFrom::Start(self.pos))?;
        let n = self.file.read(dst)?;
        self.pos += n as u64;
        Ok(n)
    }

    fn write(&mut self, src: &[u8]) -> Result<usize, IoError> {
        if self.read_only {
            return Err(IoError::ReadOnly);
        }
        self.file.seek(SeekFrom::Start(self.pos))?;
        let n = self.file.write(src)?;
        self.pos += n as u64;
        if self.pos > self.size {
            self.size = self.pos;
        }
        Ok(n)
    }

    fn seek(&mut self, abs_off: u64) -> Result<(), IoError> {
        if abs_off > self.size {
            if self.read_only {
                return Err(IoError::SeekPastEndReadOnly { offset: abs_off, size: self.size });
            }
            self.file.set_len(abs_off)?;
            self.size = abs_off;
        }
        self.pos = abs_off;
        Ok(())
    }

    fn tell(&self) -> u64 {
        self.pos
    }

    fn flush(&mut self) -> Result<(), IoError> {
        self.file.flush()?;
        self.file.sync_data()?;
        Ok(())
    }

    fn size(&self) -> u64 {
        self.size
    }
}
