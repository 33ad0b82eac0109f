//! File-backed pages.
//!
//! A file-backed page mirrors `byte_count` bytes of a [`FileInfo`] region.
//! Contents are re-read from the file on swap-in; writable pages write their
//! file-backed prefix back on eviction and teardown. There is no dirty
//! tracking, so a writable page is always written back.

use crate::addresses::PhysicalAddress;
use crate::error::VmError;
use crate::file_info::FileInfo;
use crate::frame::Frame;
use crate::page::{Page, PageState, PageType};
use log::warn;

/// State of a realized file-backed page.
#[derive(Debug, Default)]
pub struct FilePage {
    info: Option<FileInfo>,
}

impl FilePage {
    #[must_use]
    pub const fn new() -> Self {
        Self { info: None }
    }

    /// The descriptor handed over by the content loader.
    #[must_use]
    pub const fn info(&self) -> Option<&FileInfo> {
        self.info.as_ref()
    }

    /// Take ownership of the page's lazy-load descriptor.
    pub fn attach(&mut self, info: FileInfo) {
        self.info = Some(info);
    }

    pub(crate) fn swap_in(&mut self, frame: &mut Frame) -> Result<(), VmError> {
        match &self.info {
            Some(info) => info.read_into(frame)?,
            None => frame.clear(),
        }
        Ok(())
    }

    pub(crate) fn swap_out(&mut self, frame: &Frame, writable: bool) -> Result<(), VmError> {
        if let (true, Some(info)) = (writable, &self.info) {
            info.write_from(frame)?;
        }
        Ok(())
    }

    pub(crate) fn destroy(&mut self, frame: Option<&Frame>, writable: bool) {
        if let (true, Some(frame), Some(info)) = (writable, frame, &self.info) {
            if let Err(e) = info.write_from(frame) {
                warn!("dropping unwritten file page contents: {e}");
            }
        }
        self.info = None;
    }
}

/// [`PageInitializer`](crate::PageInitializer) for file-backed pages.
///
/// # Errors
/// [`VmError::PreparationFailure`] if `ty` is not [`PageType::File`].
pub fn file_initializer(page: &mut Page, ty: PageType, _pa: PhysicalAddress) -> Result<(), VmError> {
    if ty != PageType::File {
        return Err(VmError::PreparationFailure(ty));
    }
    page.install(PageState::File(FilePage::new()));
    Ok(())
}
