//! Backing storage for file-backed and segment pages.
//!
//! Files are shared: every page of a mapped segment holds a clone of the same
//! [`FileHandle`]. The paging subsystem only reads through the handle (and
//! writes back dirty mapped pages); opening and closing files is the loader's
//! business.

use crate::error::FileError;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};
use spin::Mutex;

/// Random-access byte storage a page can be loaded from.
pub trait BackingFile: Send + Sync {
    /// Current length in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read up to `buf.len()` bytes at `offset`. Returns the number of bytes
    /// read, which is short only at end of file.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize, FileError>;

    /// Write up to `buf.len()` bytes at `offset` without growing the file.
    fn write_at(&self, buf: &[u8], offset: u64) -> Result<usize, FileError>;
}

/// Shared handle to a backing file.
pub type FileHandle = Arc<dyn BackingFile>;

/// A file held entirely in memory.
pub struct MemoryFile {
    data: Mutex<Vec<u8>>,
    writable: bool,
    reads: AtomicUsize,
}

impl MemoryFile {
    #[must_use]
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data: Mutex::new(data),
            writable: true,
            reads: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn read_only(data: Vec<u8>) -> Self {
        Self {
            writable: false,
            ..Self::new(data)
        }
    }

    /// Convenience for building a [`FileHandle`].
    #[must_use]
    pub fn into_handle(self) -> FileHandle {
        Arc::new(self)
    }

    /// Number of `read_at` calls served so far.
    #[must_use]
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    /// Copy of the current contents.
    #[must_use]
    pub fn snapshot(&self) -> Vec<u8> {
        self.data.lock().clone()
    }
}

impl BackingFile for MemoryFile {
    fn len(&self) -> u64 {
        self.data.lock().len() as u64
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize, FileError> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let data = self.data.lock();
        let start = usize::try_from(offset).map_err(|_| FileError::OutOfRange(offset))?;
        if start >= data.len() {
            return Ok(0);
        }
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        Ok(n)
    }

    fn write_at(&self, buf: &[u8], offset: u64) -> Result<usize, FileError> {
        if !self.writable {
            return Err(FileError::ReadOnly);
        }
        let mut data = self.data.lock();
        let start = usize::try_from(offset).map_err(|_| FileError::OutOfRange(offset))?;
        if start >= data.len() {
            return Ok(0);
        }
        let n = buf.len().min(data.len() - start);
        data[start..start + n].copy_from_slice(&buf[..n]);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn reads_stop_at_end_of_file() {
        let file = MemoryFile::new(vec![1, 2, 3, 4]);
        let mut buf = [0u8; 8];
        assert_eq!(file.read_at(&mut buf, 2), Ok(2));
        assert_eq!(&buf[..2], &[3, 4]);
        assert_eq!(file.read_at(&mut buf, 10), Ok(0));
        assert_eq!(file.reads(), 2);
    }

    #[test]
    fn writes_do_not_grow_the_file() {
        let file = MemoryFile::new(vec![0; 4]);
        assert_eq!(file.write_at(&[9, 9, 9], 2), Ok(2));
        assert_eq!(file.snapshot(), vec![0, 0, 9, 9]);
    }

    #[test]
    fn read_only_files_reject_writes() {
        let file = MemoryFile::read_only(vec![0; 4]);
        assert_eq!(file.write_at(&[1], 0), Err(FileError::ReadOnly));
    }
}
