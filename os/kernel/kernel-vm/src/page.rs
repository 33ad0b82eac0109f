//! # Pages and Their Variants
//!
//! A [`Page`] is one 4 KiB virtual page of a user address space. Its behavior
//! is selected by [`PageState`], a closed set of variants:
//!
//! | Variant | Meaning |
//! |---------|---------|
//! | [`PageState::Uninit`] | Reserved, not yet touched. Becomes one of the others on first fault. |
//! | [`PageState::Anon`]   | Anonymous memory (zero-filled, or filled by a segment loader). |
//! | [`PageState::File`]   | Memory mirroring a region of a backing file. |
//!
//! Every variant answers the same capability set (`swap_in`, `swap_out`,
//! `destroy`, [`page_type`](Page::page_type)); the dispatch below is an
//! exhaustive `match`, so adding a variant fails to compile until every
//! operation handles it. The placeholder only provides `swap_in` (which
//! performs the transmutation) and `destroy`.
//!
//! ## Lifecycle
//!
//! ```text
//!   create_placeholder ──► Uninit ──swap_in (first fault)──► Anon / File
//!                            │                                 │  ▲
//!                            │                          swap_out│  │swap_in
//!                            ▼                                 ▼  │
//!                         destroy                           (evicted)
//! ```
//!
//! The state changes exactly once away from `Uninit`; nothing ever installs
//! `Uninit` again.

use crate::addresses::{PhysicalAddress, VirtualPage};
use crate::anon::AnonPage;
use crate::error::VmError;
use crate::file::FilePage;
use crate::file_info::AuxPayload;
use crate::frame::Frame;
use crate::uninit::{self, UninitPage};
use core::fmt;

/// Deferred content loader run once the final variant is installed.
pub type VmInitializer = fn(&mut Page, Option<AuxPayload>) -> Result<(), VmError>;

/// Per-type preparation step: installs the final variant for `PageType`.
///
/// The frame is already bound to the page when this runs; its physical
/// address is passed for convenience.
pub type PageInitializer = fn(&mut Page, PageType, PhysicalAddress) -> Result<(), VmError>;

/// Type tag of a page's current variant.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PageType {
    Uninit,
    Anon,
    File,
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Uninit => "uninit",
            Self::Anon => "anon",
            Self::File => "file-backed",
        })
    }
}

/// Variant-specific state of a [`Page`]. Exactly one is valid at a time.
pub enum PageState {
    Uninit(UninitPage),
    Anon(AnonPage),
    File(FilePage),
}

impl PageState {
    #[must_use]
    pub const fn page_type(&self) -> PageType {
        match self {
            Self::Uninit(_) => PageType::Uninit,
            Self::Anon(_) => PageType::Anon,
            Self::File(_) => PageType::File,
        }
    }
}

/// One virtual page tracked by an address space.
pub struct Page {
    va: VirtualPage,
    writable: bool,
    frame: Option<Frame>,
    state: PageState,
}

impl Page {
    pub(crate) const fn new(va: VirtualPage, writable: bool, state: PageState) -> Self {
        Self {
            va,
            writable,
            frame: None,
            state,
        }
    }

    #[inline]
    #[must_use]
    pub const fn va(&self) -> VirtualPage {
        self.va
    }

    #[inline]
    #[must_use]
    pub const fn writable(&self) -> bool {
        self.writable
    }

    #[inline]
    #[must_use]
    pub const fn page_type(&self) -> PageType {
        self.state.page_type()
    }

    #[inline]
    #[must_use]
    pub const fn state(&self) -> &PageState {
        &self.state
    }

    #[inline]
    pub const fn state_mut(&mut self) -> &mut PageState {
        &mut self.state
    }

    /// Replace the variant state. Used by per-type initializers.
    pub fn install(&mut self, state: PageState) {
        self.state = state;
    }

    #[inline]
    #[must_use]
    pub const fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    #[inline]
    pub const fn frame_mut(&mut self) -> Option<&mut Frame> {
        self.frame.as_mut()
    }

    #[inline]
    #[must_use]
    pub const fn is_resident(&self) -> bool {
        self.frame.is_some()
    }

    pub(crate) fn bind_frame(&mut self, frame: Frame) {
        debug_assert!(self.frame.is_none(), "page {} already has a frame", self.va);
        self.frame = Some(frame);
    }

    /// Unbind and return the frame, if any.
    pub fn take_frame(&mut self) -> Option<Frame> {
        self.frame.take()
    }

    /// Bring the page into `frame`.
    ///
    /// For a placeholder this is the one-time transmutation. The frame stays
    /// bound even if loading fails so the caller can reclaim it with
    /// [`take_frame`](Self::take_frame).
    ///
    /// # Errors
    /// [`VmError::AlreadyResident`] if a frame is already bound, otherwise any
    /// error of the variant's loader.
    pub fn swap_in(&mut self, frame: Frame) -> Result<(), VmError> {
        if self.frame.is_some() {
            return Err(VmError::AlreadyResident(self.va));
        }
        match self.state {
            PageState::Uninit(_) => uninit::initialize_on_fault(self, frame),
            PageState::Anon(ref mut anon) => anon.swap_in(self.frame.insert(frame)),
            PageState::File(ref mut file) => file.swap_in(self.frame.insert(frame)),
        }
    }

    /// Move the page out of memory and hand its frame back.
    ///
    /// # Errors
    /// [`VmError::NotResident`] without a frame, [`VmError::Unsupported`] for
    /// placeholders, or a write-back failure. On error the frame stays bound.
    pub fn swap_out(&mut self) -> Result<Frame, VmError> {
        let Some(frame) = self.frame.take() else {
            return Err(VmError::NotResident(self.va));
        };
        let result = match self.state {
            PageState::Uninit(_) => Err(VmError::Unsupported {
                op: "swap_out",
                ty: PageType::Uninit,
            }),
            PageState::Anon(ref mut anon) => {
                anon.swap_out(&frame);
                Ok(())
            }
            PageState::File(ref mut file) => file.swap_out(&frame, self.writable),
        };
        match result {
            Ok(()) => Ok(frame),
            Err(e) => {
                self.frame = Some(frame);
                Err(e)
            }
        }
    }

    /// Release everything the page owns and return its frame, if one is bound.
    ///
    /// Placeholders release their auxiliary payload; realized pages run their
    /// own destructor. Never fails.
    pub fn destroy(mut self) -> Option<Frame> {
        match self.state {
            PageState::Uninit(ref mut uninit) => uninit.destroy(),
            PageState::Anon(ref mut anon) => anon.destroy(),
            PageState::File(ref mut file) => file.destroy(self.frame.as_ref(), self.writable),
        }
        self.frame.take()
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("va", &self.va)
            .field("type", &self.page_type())
            .field("writable", &self.writable)
            .field("frame", &self.frame)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addresses::VirtualAddress;
    use crate::anon::anon_initializer;
    use crate::uninit::create_placeholder;

    fn frame(pa: u64) -> Frame {
        Frame::zeroed(PhysicalAddress::new(pa))
    }

    fn anon_placeholder() -> Page {
        create_placeholder(
            VirtualAddress::new(0x40_0000).page(),
            true,
            PageType::Anon,
            None,
            None,
            anon_initializer,
        )
    }

    #[test]
    fn placeholder_cannot_be_swapped_out() {
        let mut page = anon_placeholder();
        assert!(matches!(page.swap_out(), Err(VmError::NotResident(_))));

        page.bind_frame(frame(0x1000));
        assert!(matches!(
            page.swap_out(),
            Err(VmError::Unsupported {
                op: "swap_out",
                ty: PageType::Uninit
            })
        ));
        assert!(page.is_resident());
    }

    #[test]
    fn swap_in_rejects_a_second_frame() {
        let mut page = anon_placeholder();
        page.swap_in(frame(0x1000)).unwrap();
        assert!(matches!(
            page.swap_in(frame(0x2000)),
            Err(VmError::AlreadyResident(_))
        ));
        assert_eq!(
            page.frame().map(Frame::physical_address),
            Some(PhysicalAddress::new(0x1000))
        );
    }

    #[test]
    fn anon_contents_survive_swap_out() {
        let mut page = anon_placeholder();
        page.swap_in(frame(0x1000)).unwrap();
        page.frame_mut().unwrap().as_mut_slice()[..4].copy_from_slice(b"page");

        let evicted = page.swap_out().unwrap();
        assert!(!page.is_resident());
        drop(evicted);

        page.swap_in(frame(0x5000)).unwrap();
        assert_eq!(&page.frame().unwrap().as_slice()[..4], b"page");
        assert_eq!(page.page_type(), PageType::Anon);
    }

    #[test]
    fn destroy_hands_back_the_frame() {
        let mut page = anon_placeholder();
        page.swap_in(frame(0x3000)).unwrap();
        let frame = page.destroy().unwrap();
        assert_eq!(frame.physical_address(), PhysicalAddress::new(0x3000));
    }
}
