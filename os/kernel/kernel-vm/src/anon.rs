//! Anonymous pages: memory with no backing file.
//!
//! Evicted contents are kept in memory rather than written to a swap device.

use crate::addresses::PhysicalAddress;
use crate::error::VmError;
use crate::frame::Frame;
use crate::page::{Page, PageState, PageType};
use alloc::boxed::Box;

/// State of a realized anonymous page.
#[derive(Debug, Default)]
pub struct AnonPage {
    stash: Option<Box<[u8]>>,
}

impl AnonPage {
    #[must_use]
    pub const fn new() -> Self {
        Self { stash: None }
    }

    /// `true` while the contents live outside a frame.
    #[must_use]
    pub const fn is_swapped_out(&self) -> bool {
        self.stash.is_some()
    }

    pub(crate) fn swap_in(&mut self, frame: &mut Frame) -> Result<(), VmError> {
        match self.stash.take() {
            Some(bytes) => frame.as_mut_slice().copy_from_slice(&bytes),
            None => frame.clear(),
        }
        Ok(())
    }

    pub(crate) fn swap_out(&mut self, frame: &Frame) {
        self.stash = Some(Box::from(frame.as_slice()));
    }

    pub(crate) fn destroy(&mut self) {
        self.stash = None;
    }
}

/// [`PageInitializer`](crate::PageInitializer) for anonymous pages.
///
/// # Errors
/// [`VmError::PreparationFailure`] if `ty` is not [`PageType::Anon`].
pub fn anon_initializer(page: &mut Page, ty: PageType, _pa: PhysicalAddress) -> Result<(), VmError> {
    if ty != PageType::Anon {
        return Err(VmError::PreparationFailure(ty));
    }
    page.install(PageState::Anon(AnonPage::new()));
    Ok(())
}
