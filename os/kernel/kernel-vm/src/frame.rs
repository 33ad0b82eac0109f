//! Physical frames backing resident pages.
//!
//! A [`Frame`] owns the bytes of one 4 KiB physical page as seen through the
//! kernel's mapping of it. Frames are handed out by a [`FrameAlloc`] and bound
//! to exactly one [`Page`](crate::Page) at a time; the binding is an ownership
//! transfer, so a frame can never be shared by two pages.

use crate::addresses::PhysicalAddress;
use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;
use kernel_info::memory::PAGE_SIZE;

/// One physical page frame and its contents.
pub struct Frame {
    pa: PhysicalAddress,
    bytes: Box<[u8]>,
}

impl Frame {
    /// Wrap a zeroed page-sized buffer at `pa`.
    #[must_use]
    pub fn zeroed(pa: PhysicalAddress) -> Self {
        Self {
            pa,
            bytes: vec![0; PAGE_SIZE].into_boxed_slice(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn physical_address(&self) -> PhysicalAddress {
        self.pa
    }

    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Zero the whole frame.
    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame").field("pa", &self.pa).finish_non_exhaustive()
    }
}

/// Source of physical frames for the fault path.
pub trait FrameAlloc {
    /// Allocate one zeroed 4 KiB frame, or `None` when memory is exhausted.
    fn alloc_frame(&mut self) -> Option<Frame>;

    /// Return a frame previously obtained from [`alloc_frame`](Self::alloc_frame).
    fn free_frame(&mut self, frame: Frame);
}

/// A bounded pool of frames, handed out from a contiguous physical window.
///
/// Freed frame addresses are recycled before fresh ones are carved.
pub struct PoolFrameAlloc {
    next: u64,
    end: u64,
    recycled: Vec<PhysicalAddress>,
    in_use: usize,
}

impl PoolFrameAlloc {
    /// Physical base of the pool window; 1 MiB, clear of legacy low memory.
    pub const BASE: u64 = 0x0010_0000;

    /// Create a pool that can hold at most `frames` frames at once.
    ///
    /// Requests larger than the physical address space are clamped to it.
    #[must_use]
    pub const fn new(frames: usize) -> Self {
        let window = (frames as u64).saturating_mul(PAGE_SIZE as u64);
        Self {
            next: Self::BASE,
            end: Self::BASE.saturating_add(window),
            recycled: Vec::new(),
            in_use: 0,
        }
    }

    /// Number of frames currently allocated and not yet freed.
    #[must_use]
    pub const fn in_use(&self) -> usize {
        self.in_use
    }
}

impl FrameAlloc for PoolFrameAlloc {
    fn alloc_frame(&mut self) -> Option<Frame> {
        let pa = if let Some(pa) = self.recycled.pop() {
            pa
        } else {
            if self.end - self.next < PAGE_SIZE as u64 {
                return None;
            }
            let pa = PhysicalAddress::new(self.next);
            self.next += PAGE_SIZE as u64;
            pa
        };
        self.in_use += 1;
        Some(Frame::zeroed(pa))
    }

    fn free_frame(&mut self, frame: Frame) {
        debug_assert!(self.in_use > 0, "freeing more frames than allocated");
        self.in_use = self.in_use.saturating_sub(1);
        self.recycled.push(frame.physical_address());
    }
}
