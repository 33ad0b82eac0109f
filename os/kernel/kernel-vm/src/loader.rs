//! Deferred content loading for pages populated from a file region.

use crate::addresses::VirtualAddress;
use crate::backing::FileHandle;
use crate::error::{LoadError, VmError};
use crate::file_info::AuxPayload;
use crate::page::{Page, PageState};
use core::fmt;

/// [`VmInitializer`](crate::VmInitializer) that fills a page from its
/// [`FileInfo`](crate::FileInfo).
///
/// Reads `byte_count` bytes at `file_offset` into the bound frame and zeroes
/// the remainder. A file-backed page keeps the descriptor for later swap-ins;
/// any other page drops it here.
///
/// # Errors
/// [`VmError::ContentLoadFailure`] if the payload is not a segment descriptor,
/// no frame is bound, or the file cannot supply the bytes.
pub fn lazy_load_segment(page: &mut Page, aux: Option<AuxPayload>) -> Result<(), VmError> {
    let info = match aux {
        Some(AuxPayload::Segment(info)) => info,
        Some(other) => return Err(LoadError::UnexpectedPayload(other.shape()).into()),
        None => return Err(LoadError::UnexpectedPayload("none").into()),
    };

    let frame = page.frame_mut().ok_or(LoadError::NoFrame)?;
    info.read_into(frame)?;

    if let PageState::File(file) = page.state_mut() {
        file.attach(*info);
    }
    Ok(())
}

/// A loadable program segment to be mapped lazily.
///
/// Covers `read_bytes + zero_bytes` bytes starting at `upage`; the first
/// `read_bytes` come from `file` at `offset`, the rest are zero.
#[derive(Clone)]
pub struct Segment {
    pub file: FileHandle,
    pub offset: u64,
    pub upage: VirtualAddress,
    pub read_bytes: u64,
    pub zero_bytes: u64,
    pub writable: bool,
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment")
            .field("offset", &self.offset)
            .field("upage", &self.upage)
            .field("read_bytes", &self.read_bytes)
            .field("zero_bytes", &self.zero_bytes)
            .field("writable", &self.writable)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addresses::PhysicalAddress;
    use crate::anon::anon_initializer;
    use crate::backing::MemoryFile;
    use crate::file::file_initializer;
    use crate::file_info::FileInfo;
    use crate::frame::Frame;
    use crate::page::PageType;
    use crate::uninit::{create_placeholder, initialize_on_fault};
    use alloc::sync::Arc;
    use alloc::vec;

    fn frame() -> Frame {
        Frame::zeroed(PhysicalAddress::new(0x30_0000))
    }

    #[test]
    fn anon_segment_pages_drop_the_descriptor() {
        let file = MemoryFile::new(vec![9; 100]).into_handle();
        let info = FileInfo::new(Arc::clone(&file), 50, 50).unwrap();
        let mut page = create_placeholder(
            VirtualAddress::new(0x1000).page(),
            false,
            PageType::Anon,
            Some(AuxPayload::segment(info)),
            Some(lazy_load_segment),
            anon_initializer,
        );

        initialize_on_fault(&mut page, frame()).unwrap();
        assert_eq!(Arc::strong_count(&file), 1);
        let bytes = page.frame().unwrap().as_slice();
        assert!(bytes[..50].iter().all(|&b| b == 9));
        assert!(bytes[50..].iter().all(|&b| b == 0));
    }

    #[test]
    fn file_pages_keep_the_descriptor() {
        let file = MemoryFile::new(vec![9; 100]).into_handle();
        let info = FileInfo::new(Arc::clone(&file), 0, 100).unwrap();
        let mut page = create_placeholder(
            VirtualAddress::new(0x1000).page(),
            false,
            PageType::File,
            Some(AuxPayload::segment(info)),
            Some(lazy_load_segment),
            file_initializer,
        );

        initialize_on_fault(&mut page, frame()).unwrap();
        let PageState::File(file_page) = page.state() else {
            panic!("expected a file-backed page");
        };
        assert_eq!(file_page.info().map(FileInfo::byte_count), Some(100));
        assert_eq!(Arc::strong_count(&file), 2);
    }

    #[test]
    fn wrong_payload_shape_fails_the_load() {
        let mut page = create_placeholder(
            VirtualAddress::new(0x1000).page(),
            false,
            PageType::Anon,
            Some(AuxPayload::Word(7)),
            Some(lazy_load_segment),
            anon_initializer,
        );
        assert!(matches!(
            initialize_on_fault(&mut page, frame()),
            Err(VmError::ContentLoadFailure(LoadError::UnexpectedPayload("word")))
        ));
    }

    #[test]
    fn short_file_fails_the_load() {
        let file = MemoryFile::new(vec![1; 10]).into_handle();
        let info = FileInfo::new(file, 0, 200).unwrap();
        let mut page = create_placeholder(
            VirtualAddress::new(0x1000).page(),
            false,
            PageType::Anon,
            Some(AuxPayload::segment(info)),
            Some(lazy_load_segment),
            anon_initializer,
        );
        assert!(matches!(
            initialize_on_fault(&mut page, frame()),
            Err(VmError::ContentLoadFailure(LoadError::ShortRead { wanted: 200, got: 10 }))
        ));
    }
}
