//! # Supplemental Page Table
//!
//! Per-process bookkeeping of every virtual page, resident or not. The
//! hardware page table only knows resident pages; this table knows what every
//! registered page *will* be, which is what the fault path needs.
//!
//! ## Responsibilities
//!
//! - Registering lazily populated pages ([`alloc_page_with_initializer`],
//!   [`load_segment`], [`mmap`]).
//! - Resolving faults: validate the access, allocate a frame and let the
//!   page's `swap_in` bring it in ([`handle_fault`], [`claim_page`]).
//! - Eviction and teardown, returning frames to the [`FrameAlloc`].
//!
//! The table performs no locking. Callers serialize access per address space,
//! which also serializes faults on any given page.
//!
//! [`alloc_page_with_initializer`]: SupplementalPageTable::alloc_page_with_initializer
//! [`load_segment`]: SupplementalPageTable::load_segment
//! [`mmap`]: SupplementalPageTable::mmap
//! [`handle_fault`]: SupplementalPageTable::handle_fault
//! [`claim_page`]: SupplementalPageTable::claim_page

use crate::addresses::{VirtualAddress, VirtualPage};
use crate::anon::anon_initializer;
use crate::backing::FileHandle;
use crate::error::VmError;
use crate::fault::PageFault;
use crate::file::file_initializer;
use crate::file_info::{AuxPayload, FileInfo};
use crate::frame::FrameAlloc;
use crate::loader::{Segment, lazy_load_segment};
use crate::page::{Page, PageInitializer, PageType, VmInitializer};
use crate::uninit::create_placeholder;
use alloc::collections::BTreeMap;
use kernel_info::memory::{PAGE_SHIFT, PAGE_SIZE, is_user_range};
use log::{debug, trace, warn};

const PAGE_BYTES: u64 = PAGE_SIZE as u64;

/// All pages of one address space, keyed by page base.
#[derive(Default)]
pub struct SupplementalPageTable {
    pages: BTreeMap<VirtualPage, Page>,
    /// Start page → page count of each live `mmap` region.
    mappings: BTreeMap<VirtualPage, u64>,
}

impl SupplementalPageTable {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pages: BTreeMap::new(),
            mappings: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Number of pages currently bound to a frame.
    #[must_use]
    pub fn resident(&self) -> usize {
        self.pages.values().filter(|p| p.is_resident()).count()
    }

    #[must_use]
    pub fn find_page(&self, va: VirtualAddress) -> Option<&Page> {
        self.pages.get(&va.page())
    }

    pub fn find_page_mut(&mut self, va: VirtualAddress) -> Option<&mut Page> {
        self.pages.get_mut(&va.page())
    }

    /// Register a placeholder page at `va` that becomes `ty` on first fault.
    ///
    /// `init` runs with `aux` after the page has been prepared.
    ///
    /// # Errors
    /// - [`VmError::InvalidMapping`] for [`PageType::Uninit`] or a non-user address.
    /// - [`VmError::AlreadyMapped`] if a page is already registered at `va`.
    pub fn alloc_page_with_initializer(
        &mut self,
        ty: PageType,
        va: VirtualAddress,
        writable: bool,
        init: Option<VmInitializer>,
        aux: Option<AuxPayload>,
    ) -> Result<(), VmError> {
        let initializer: PageInitializer = match ty {
            PageType::Anon => anon_initializer,
            PageType::File => file_initializer,
            PageType::Uninit => {
                return Err(VmError::InvalidMapping("placeholder needs a final page type"));
            }
        };
        if !is_user_range(va.as_u64(), 1) {
            return Err(VmError::InvalidMapping("address outside user space"));
        }

        let page = va.page();
        if self.pages.contains_key(&page) {
            return Err(VmError::AlreadyMapped(page));
        }

        trace!("registering lazy {ty} page at {page} (writable={writable})");
        self.pages.insert(
            page,
            create_placeholder(page, writable, ty, aux, init, initializer),
        );
        Ok(())
    }

    /// Register a placeholder without a content loader.
    ///
    /// # Errors
    /// See [`alloc_page_with_initializer`](Self::alloc_page_with_initializer).
    pub fn alloc_page(&mut self, ty: PageType, va: VirtualAddress, writable: bool) -> Result<(), VmError> {
        self.alloc_page_with_initializer(ty, va, writable, None, None)
    }

    /// Make the page at `va` resident now.
    ///
    /// A placeholder whose transmutation fails is unregistered and destroyed;
    /// the address must be registered again before it can be used.
    ///
    /// # Errors
    /// [`VmError::NotMapped`], [`VmError::OutOfFrames`], or whatever the
    /// page's `swap_in` reports.
    pub fn claim_page<A: FrameAlloc>(&mut self, va: VirtualAddress, frames: &mut A) -> Result<(), VmError> {
        if !self.pages.contains_key(&va.page()) {
            return Err(VmError::NotMapped(va));
        }
        self.claim_registered(va.page(), frames)
    }

    fn claim_registered<A: FrameAlloc>(&mut self, key: VirtualPage, frames: &mut A) -> Result<(), VmError> {
        let page = self.pages.get_mut(&key).ok_or(VmError::NotMapped(key.base()))?;
        if page.is_resident() {
            return Ok(());
        }
        let frame = frames.alloc_frame().ok_or(VmError::OutOfFrames)?;
        let pa = frame.physical_address();
        let ty = page.page_type();

        match page.swap_in(frame) {
            Ok(()) => {
                debug!("{ty} page {key} now {} in frame {pa}", page.page_type());
                Ok(())
            }
            Err(e) => {
                if let Some(frame) = page.take_frame() {
                    frames.free_frame(frame);
                }
                warn!("failed to bring in page {key}: {e}");
                if ty == PageType::Uninit {
                    if let Some(page) = self.pages.remove(&key) {
                        Self::release(page, frames);
                    }
                }
                Err(e)
            }
        }
    }

    /// Resolve a page fault.
    ///
    /// # Errors
    /// - [`VmError::ProtectionViolation`] for faults on present pages and
    ///   writes to read-only pages.
    /// - [`VmError::NotMapped`] if no page covers the address.
    /// - Any error from bringing the page in.
    pub fn handle_fault<A: FrameAlloc>(&mut self, fault: PageFault, frames: &mut A) -> Result<(), VmError> {
        let addr = fault.address;
        if fault.error.present() {
            warn!("rejecting fault at {addr}: {}", fault.error.explain());
            return Err(VmError::ProtectionViolation(addr));
        }

        let Some(page) = self.pages.get(&addr.page()) else {
            warn!("rejecting fault at {addr}: no page registered");
            return Err(VmError::NotMapped(addr));
        };
        if fault.error.write() && !page.writable() {
            warn!("rejecting fault at {addr}: write to read-only page");
            return Err(VmError::ProtectionViolation(addr));
        }

        trace!("fault at {addr}: {}", fault.error.explain());
        self.claim_registered(addr.page(), frames)
    }

    /// Swap the page at `va` out and free its frame.
    ///
    /// # Errors
    /// [`VmError::NotMapped`] or the page's `swap_out` error.
    pub fn evict<A: FrameAlloc>(&mut self, va: VirtualAddress, frames: &mut A) -> Result<(), VmError> {
        let page = self.pages.get_mut(&va.page()).ok_or(VmError::NotMapped(va))?;
        let frame = page.swap_out()?;
        trace!("evicted {} page {} from frame {}", page.page_type(), page.va(), frame.physical_address());
        frames.free_frame(frame);
        Ok(())
    }

    /// Unregister and destroy the page at `va`.
    ///
    /// # Errors
    /// [`VmError::NotMapped`] if nothing is registered there.
    pub fn remove_page<A: FrameAlloc>(&mut self, va: VirtualAddress, frames: &mut A) -> Result<(), VmError> {
        let page = self.pages.remove(&va.page()).ok_or(VmError::NotMapped(va))?;
        Self::release(page, frames);
        Ok(())
    }

    /// Destroy every page, returning all frames. The table is empty afterwards.
    pub fn destroy<A: FrameAlloc>(&mut self, frames: &mut A) {
        let pages = core::mem::take(&mut self.pages);
        self.mappings.clear();
        debug!("tearing down {} pages", pages.len());
        for page in pages.into_values() {
            Self::release(page, frames);
        }
    }

    fn release<A: FrameAlloc>(page: Page, frames: &mut A) {
        trace!("destroying {} page {}", page.page_type(), page.va());
        if let Some(frame) = page.destroy() {
            frames.free_frame(frame);
        }
    }

    /// Register one lazily loaded anonymous page per 4 KiB of `segment`.
    ///
    /// Each page gets its own [`FileInfo`]. Pages registered before an error
    /// stay registered; tear the table down to discard them.
    ///
    /// # Errors
    /// [`VmError::InvalidMapping`] for misaligned or out-of-range segments,
    /// [`VmError::AlreadyMapped`] on overlap.
    pub fn load_segment(&mut self, segment: &Segment) -> Result<(), VmError> {
        let total = segment
            .read_bytes
            .checked_add(segment.zero_bytes)
            .ok_or(VmError::InvalidMapping("segment size overflows"))?;
        if !total.is_multiple_of(PAGE_BYTES) {
            return Err(VmError::InvalidMapping("segment is not a whole number of pages"));
        }
        let (Some(first), true) = (
            VirtualPage::from_aligned(segment.upage),
            segment.offset.is_multiple_of(PAGE_BYTES),
        ) else {
            return Err(VmError::InvalidMapping("segment is not page aligned"));
        };
        if !is_user_range(segment.upage.as_u64(), total) {
            return Err(VmError::InvalidMapping("segment outside user space"));
        }

        let mut offset = segment.offset;
        let mut read_bytes = segment.read_bytes;
        for i in 0..total >> PAGE_SHIFT {
            let upage = first
                .checked_add(i)
                .ok_or(VmError::InvalidMapping("segment size overflows"))?;
            let page_read = read_bytes.min(PAGE_BYTES);
            #[allow(clippy::cast_possible_truncation)]
            let info = FileInfo::new(segment.file.clone(), offset, page_read as usize)?;
            self.alloc_page_with_initializer(
                PageType::Anon,
                upage.base(),
                segment.writable,
                Some(lazy_load_segment),
                Some(AuxPayload::segment(info)),
            )?;

            read_bytes -= page_read;
            offset += page_read;
        }
        debug!("registered {:?} as {} lazy pages", segment, total >> PAGE_SHIFT);
        Ok(())
    }

    /// Map `length` bytes of `file` starting at `offset` to `addr`, lazily.
    ///
    /// Bytes past the end of the file read as zero.
    ///
    /// # Errors
    /// [`VmError::InvalidMapping`] for a null, misaligned, empty or
    /// out-of-range request or an empty file; [`VmError::AlreadyMapped`] if
    /// any page of the range is taken. Nothing is registered on error.
    pub fn mmap(
        &mut self,
        addr: VirtualAddress,
        length: u64,
        writable: bool,
        file: &FileHandle,
        offset: u64,
    ) -> Result<VirtualAddress, VmError> {
        let Some(start) = VirtualPage::from_aligned(addr).filter(|p| p.base().as_u64() != 0) else {
            return Err(VmError::InvalidMapping("mapping address must be page aligned and non-null"));
        };
        if length == 0 || !offset.is_multiple_of(PAGE_BYTES) {
            return Err(VmError::InvalidMapping("empty mapping or unaligned offset"));
        }
        let file_len = file.len();
        if file_len == 0 || offset >= file_len {
            return Err(VmError::InvalidMapping("nothing to map past end of file"));
        }
        let pages = length.div_ceil(PAGE_BYTES);
        let in_user_space = pages
            .checked_mul(PAGE_BYTES)
            .is_some_and(|bytes| is_user_range(addr.as_u64(), bytes));
        if !in_user_space {
            return Err(VmError::InvalidMapping("mapping outside user space"));
        }

        for i in 0..pages {
            if let Some(page) = start.checked_add(i).filter(|p| self.pages.contains_key(p)) {
                return Err(VmError::AlreadyMapped(page));
            }
        }

        let mut read_bytes = length.min(file_len - offset);
        let mut file_offset = offset;
        for i in 0..pages {
            let Some(va) = start.checked_add(i).map(VirtualPage::base) else {
                break;
            };
            let page_read = read_bytes.min(PAGE_BYTES);
            #[allow(clippy::cast_possible_truncation)]
            let info = FileInfo::new(file.clone(), file_offset, page_read as usize)?;
            self.alloc_page_with_initializer(
                PageType::File,
                va,
                writable,
                Some(lazy_load_segment),
                Some(AuxPayload::segment(info)),
            )?;
            read_bytes -= page_read;
            file_offset += page_read;
        }

        self.mappings.insert(start, pages);
        debug!("mapped {pages} file pages at {addr}");
        Ok(addr)
    }

    /// Remove the mapping created by [`mmap`](Self::mmap) at `addr`.
    ///
    /// Resident writable pages are written back to the file.
    ///
    /// # Errors
    /// [`VmError::NotMapped`] if `addr` does not start a mapping.
    pub fn munmap<A: FrameAlloc>(&mut self, addr: VirtualAddress, frames: &mut A) -> Result<(), VmError> {
        let start = addr.page();
        let pages = self.mappings.remove(&start).ok_or(VmError::NotMapped(addr))?;
        for i in 0..pages {
            if let Some(page) = start.checked_add(i).and_then(|p| self.pages.remove(&p)) {
                Self::release(page, frames);
            }
        }
        debug!("unmapped {pages} file pages at {addr}");
        Ok(())
    }
}
