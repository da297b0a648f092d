//! Byte-addressable backing storage for the page file.
//!
//! A minimal `Storage` trait plus a `std::fs::File`-backed implementation.
//! A `MemStorage` double is added for fast in-process tests, the in-memory
//! counterpart `compact.rs`/`block.rs` use via their own `MemFile` test
//! helper.

use parking_lot::Mutex;
use std::io::{Read, Seek, SeekFrom, Write};
use std::{fs, fs::OpenOptions};

/// Interface for byte-addressable backing storage.
pub trait Storage: Send + Sync {
    /// Current size of the underlying storage, in bytes.
    fn size(&self) -> u64;

    /// Read `bytes.len()` bytes starting at `off`. Short reads are zero-filled.
    fn read(&self, off: u64, bytes: &mut [u8]);

    /// Write `bytes` starting at `off`.
    fn write(&self, off: u64, bytes: &[u8]);

    /// Truncate or extend the storage to exactly `size` bytes.
    fn commit(&self, size: u64);

    /// Force previously written bytes to durable storage. A no-op for
    /// storage that is already durable on every `write` (e.g. memory).
    fn flush(&self) {}
}

/// `Storage` backed by a real file on disk.
pub struct SimpleFileStorage {
    file: Mutex<fs::File>,
}

impl SimpleFileStorage {
    /// Open (creating if needed) `filename` for read/write access.
    pub fn new(filename: &str) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(filename)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl Storage for SimpleFileStorage {
    fn size(&self) -> u64 {
        let mut f = self.file.lock();
        f.seek(SeekFrom::End(0)).unwrap()
    }

    fn read(&self, off: u64, bytes: &mut [u8]) {
        let mut f = self.file.lock();
        f.seek(SeekFrom::Start(off)).unwrap();
        let n = f.read(bytes).unwrap_or(0);
        if n < bytes.len() {
            bytes[n..].fill(0);
        }
    }

    fn write(&self, off: u64, bytes: &[u8]) {
        let mut f = self.file.lock();
        f.seek(SeekFrom::Start(off)).unwrap();
        f.write_all(bytes).unwrap();
    }

    fn commit(&self, size: u64) {
        let f = self.file.lock();
        f.set_len(size).unwrap();
    }

    fn flush(&self) {
        let f = self.file.lock();
        f.sync_all().unwrap();
    }
}

/// `Storage` backed entirely by a growable in-memory buffer. Used by unit and
/// integration tests that need a real `Storage` implementation without disk I/O.
#[derive(Default)]
pub struct MemStorage {
    data: Mutex<Vec<u8>>,
}

impl MemStorage {
    /// Construct an empty in-memory storage.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemStorage {
    fn size(&self) -> u64 {
        self.data.lock().len() as u64
    }

    fn read(&self, off: u64, bytes: &mut [u8]) {
        let data = self.data.lock();
        let off = off as usize;
        if off >= data.len() {
            bytes.fill(0);
            return;
        }
        let n = bytes.len().min(data.len() - off);
        bytes[..n].copy_from_slice(&data[off..off + n]);
        if n < bytes.len() {
            bytes[n..].fill(0);
        }
    }

    fn write(&self, off: u64, bytes: &[u8]) {
        let mut data = self.data.lock();
        let off = off as usize;
        let end = off + bytes.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[off..end].copy_from_slice(bytes);
    }

    fn commit(&self, size: u64) {
        let mut data = self.data.lock();
        data.resize(size as usize, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mem_storage_grows_and_zero_fills() {
        let s = MemStorage::new();
        s.write(10, b"hi");
        assert_eq!(s.size(), 12);
        let mut buf = [0xffu8; 4];
        s.read(0, &mut buf);
        assert_eq!(buf, [0, 0, 0, 0]);
        let mut buf = [0u8; 2];
        s.read(10, &mut buf);
        assert_eq!(&buf, b"hi");
    }
}
