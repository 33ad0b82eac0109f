//! # Lazily Initialized Virtual Memory Pages
//!
//! Every user page starts out as a cheap placeholder and is turned into its
//! real type (anonymous or file-backed) the first time it is touched. Neither
//! the process that registered the page nor the fault handler that resolves
//! it needs to know the final type; the placeholder carries everything
//! required to build it.
//!
//! ## Moving Parts
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │              SupplementalPageTable (spt)                  │
//! │   • alloc_page_with_initializer / load_segment / mmap     │
//! │   • handle_fault → claim → Page::swap_in                  │
//! │   • evict / munmap / destroy                              │
//! └───────────────┬───────────────────────────────────────────┘
//!                 │
//! ┌───────────────▼───────────────────────────────────────────┐
//! │                 Page (page)                               │
//! │   PageState::{Uninit, Anon, File}                         │
//! │   swap_in · swap_out · destroy · page_type                │
//! └───────┬───────────────────────┬───────────────────────────┘
//!         │ first fault           │
//! ┌───────▼──────────────┐ ┌──────▼────────────────────────────┐
//! │ UninitPage (uninit)  │ │ AnonPage (anon) · FilePage (file) │
//! │ initialize_on_fault  │ │ final variants                    │
//! └───────┬──────────────┘ └───────────────────────────────────┘
//!         │ aux payload
//! ┌───────▼───────────────────────────────────────────────────┐
//! │  AuxPayload::{Segment(FileInfo), Shared, Word} + loader   │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Transmutation
//!
//! [`initialize_on_fault`] binds the frame, takes the content loader and its
//! payload out of the placeholder, runs the per-type initializer (which
//! replaces the placeholder state with the final one), and finally hands the
//! payload to the loader. The payload is moved, never copied, so it has
//! exactly one owner at every point: the placeholder, the loader, or the
//! final page.
//!
//! ## Example
//!
//! ```rust
//! use kernel_vm::{
//!     MemoryFile, PageFault, PageType, PoolFrameAlloc, Segment, SupplementalPageTable,
//!     VirtualAddress,
//! };
//!
//! let file = MemoryFile::new(vec![0x90; 4096]).into_handle();
//! let mut frames = PoolFrameAlloc::new(16);
//! let mut spt = SupplementalPageTable::new();
//!
//! spt.load_segment(&Segment {
//!     file,
//!     offset: 0,
//!     upage: VirtualAddress::new(0x40_0000),
//!     read_bytes: 4096,
//!     zero_bytes: 0,
//!     writable: false,
//! })
//! .unwrap();
//!
//! let fault = PageFault::not_present(VirtualAddress::new(0x40_0010), false);
//! spt.handle_fault(fault, &mut frames).unwrap();
//! let page = spt.find_page(VirtualAddress::new(0x40_0000)).unwrap();
//! assert_eq!(page.page_type(), PageType::Anon);
//!
//! spt.destroy(&mut frames);
//! assert_eq!(frames.in_use(), 0);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

pub mod addresses;
pub mod anon;
mod backing;
mod error;
pub mod fault;
pub mod file;
mod file_info;
pub mod frame;
pub mod loader;
pub mod page;
pub mod spt;
pub mod uninit;

pub use crate::addresses::{PhysicalAddress, VirtualAddress, VirtualPage};
pub use crate::anon::{AnonPage, anon_initializer};
pub use crate::backing::{BackingFile, FileHandle, MemoryFile};
pub use crate::error::{FileError, LoadError, VmError};
pub use crate::fault::{PageFault, PageFaultError};
pub use crate::file::{FilePage, file_initializer};
pub use crate::file_info::{AuxPayload, FileInfo};
pub use crate::frame::{Frame, FrameAlloc, PoolFrameAlloc};
pub use crate::loader::{Segment, lazy_load_segment};
pub use crate::page::{Page, PageInitializer, PageState, PageType, VmInitializer};
pub use crate::spt::SupplementalPageTable;
pub use crate::uninit::{UninitPage, create_placeholder, destroy_placeholder, initialize_on_fault};

/// Re-export of the layout constants.
pub use kernel_info::memory as info;
