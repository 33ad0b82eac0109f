//! # Virtual and Physical Page Addresses
//!
//! Newtypes over `u64` that keep virtual addresses, page-aligned virtual page
//! bases and physical frame addresses from being mixed up.

use core::fmt;
use kernel_info::memory::{PAGE_SHIFT, PAGE_SIZE};

const PAGE_MASK: u64 = (1 << PAGE_SHIFT) - 1;

/// A **virtual** memory address in a user address space.
///
/// No alignment guarantees by itself; see [`VirtualPage`].
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualAddress(u64);

impl VirtualAddress {
    #[inline]
    #[must_use]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Byte offset of this address inside its 4 KiB page.
    #[inline]
    #[must_use]
    pub const fn page_offset(self) -> u64 {
        self.0 & PAGE_MASK
    }

    #[inline]
    #[must_use]
    pub const fn is_page_aligned(self) -> bool {
        self.page_offset() == 0
    }

    /// The page containing this address.
    #[inline]
    #[must_use]
    pub const fn page(self) -> VirtualPage {
        VirtualPage::containing_address(self)
    }
}

/// The base address of a 4 KiB virtual page.
///
/// This is the identity key of a [`Page`](crate::Page) within its address space.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualPage(u64);

impl VirtualPage {
    /// Round `va` down to its page base.
    #[inline]
    #[must_use]
    pub const fn containing_address(va: VirtualAddress) -> Self {
        Self(va.0 & !PAGE_MASK)
    }

    /// Build from an address that must already be page aligned.
    #[inline]
    #[must_use]
    pub const fn from_aligned(va: VirtualAddress) -> Option<Self> {
        if va.is_page_aligned() {
            Some(Self(va.0))
        } else {
            None
        }
    }

    #[inline]
    #[must_use]
    pub const fn base(self) -> VirtualAddress {
        VirtualAddress(self.0)
    }

    /// The page `pages` pages above this one, or `None` on overflow.
    #[inline]
    #[must_use]
    pub const fn checked_add(self, pages: u64) -> Option<Self> {
        match pages.checked_mul(PAGE_SIZE as u64) {
            Some(bytes) => match self.0.checked_add(bytes) {
                Some(addr) => Some(Self(addr)),
                None => None,
            },
            None => None,
        }
    }
}

/// A **physical** frame address (machine bus address).
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalAddress(u64);

impl PhysicalAddress {
    #[inline]
    #[must_use]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

impl fmt::Debug for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtualAddress({self})")
    }
}

impl fmt::Display for VirtualPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

impl fmt::Debug for VirtualPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtualPage({self})")
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

impl fmt::Debug for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysicalAddress({self})")
    }
}

impl From<VirtualPage> for VirtualAddress {
    #[inline]
    fn from(page: VirtualPage) -> Self {
        page.base()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_rounds_down() {
        let va = VirtualAddress::new(0x4000_1234);
        assert_eq!(va.page_offset(), 0x234);
        assert_eq!(va.page().base().as_u64(), 0x4000_1000);
    }

    #[test]
    fn from_aligned_rejects_offsets() {
        assert!(VirtualPage::from_aligned(VirtualAddress::new(0x1001)).is_none());
        assert_eq!(
            VirtualPage::from_aligned(VirtualAddress::new(0x2000)),
            Some(VirtualAddress::new(0x2fff).page())
        );
    }

    #[test]
    fn checked_add_steps_by_pages() {
        let page = VirtualAddress::new(0x1000).page();
        assert_eq!(page.checked_add(2).map(VirtualPage::base), Some(VirtualAddress::new(0x3000)));
        assert!(VirtualAddress::new(u64::MAX).page().checked_add(1).is_none());
    }

    #[test]
    fn display_is_hex() {
        assert_eq!(
            alloc::format!("{}", VirtualAddress::new(0x1000)),
            "0x0000000000001000"
        );
    }
}
