//! Lazy-load descriptors and the auxiliary payload carried by placeholders.

use crate::backing::FileHandle;
use crate::error::{LoadError, VmError};
use crate::frame::Frame;
use alloc::boxed::Box;
use core::fmt;
use kernel_info::memory::PAGE_SIZE;

/// Where one page's content lives in its backing file.
///
/// `byte_count` bytes are read from `file` at `file_offset`; the rest of the
/// page is zero.
#[derive(Clone)]
pub struct FileInfo {
    file: FileHandle,
    file_offset: u64,
    byte_count: usize,
}

impl FileInfo {
    /// # Errors
    /// [`VmError::InvalidMapping`] if `byte_count` exceeds one page.
    pub fn new(file: FileHandle, file_offset: u64, byte_count: usize) -> Result<Self, VmError> {
        if byte_count > PAGE_SIZE {
            return Err(VmError::InvalidMapping("read length exceeds one page"));
        }
        Ok(Self {
            file,
            file_offset,
            byte_count,
        })
    }

    #[must_use]
    pub const fn file(&self) -> &FileHandle {
        &self.file
    }

    #[must_use]
    pub const fn file_offset(&self) -> u64 {
        self.file_offset
    }

    #[must_use]
    pub const fn byte_count(&self) -> usize {
        self.byte_count
    }

    /// Fill `frame` from the file and zero the tail.
    pub(crate) fn read_into(&self, frame: &mut Frame) -> Result<(), LoadError> {
        let (head, tail) = frame.as_mut_slice().split_at_mut(self.byte_count);
        let got = self.file.read_at(head, self.file_offset)?;
        if got != self.byte_count {
            return Err(LoadError::ShortRead {
                wanted: self.byte_count,
                got,
            });
        }
        tail.fill(0);
        Ok(())
    }

    /// Write the file-backed prefix of `frame` back to the file.
    pub(crate) fn write_from(&self, frame: &Frame) -> Result<(), LoadError> {
        self.file
            .write_at(&frame.as_slice()[..self.byte_count], self.file_offset)?;
        Ok(())
    }
}

impl fmt::Debug for FileInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileInfo")
            .field("file_offset", &self.file_offset)
            .field("byte_count", &self.byte_count)
            .finish_non_exhaustive()
    }
}

/// Opaque data a placeholder hands to its content loader.
///
/// The variant is the payload's shape. Placeholder teardown releases what the
/// shape owns and nothing else, independent of the page's target type.
pub enum AuxPayload {
    /// A lazy-load descriptor owned by this page alone.
    Segment(Box<FileInfo>),
    /// A reference to a file owned by the mapping; dropping it never closes the file.
    Shared(FileHandle),
    /// An inline value with nothing to release.
    Word(u64),
}

impl AuxPayload {
    /// Shorthand for a boxed [`FileInfo`] payload.
    #[must_use]
    pub fn segment(info: FileInfo) -> Self {
        Self::Segment(Box::new(info))
    }

    #[must_use]
    pub const fn shape(&self) -> &'static str {
        match self {
            Self::Segment(_) => "segment",
            Self::Shared(_) => "shared",
            Self::Word(_) => "word",
        }
    }
}

impl fmt::Debug for AuxPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Segment(info) => f.debug_tuple("Segment").field(info).finish(),
            Self::Shared(_) => f.write_str("Shared(..)"),
            Self::Word(w) => f.debug_tuple("Word").field(w).finish(),
        }
    }
}
