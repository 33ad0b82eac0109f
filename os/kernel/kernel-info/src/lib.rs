//! # Virtual Memory Layout Configuration
//!
//! This crate is the single source of truth for the constants that govern how
//! user address spaces are laid out and how they are carved into pages. The
//! paging subsystem (`kernel-vm`) validates every mapping request against these
//! values, so changing the layout means changing it here and nowhere else.
//!
//! ## User Address Space
//!
//! ```text
//! 0x0000_0000_0000_0000 ┌─────────────────────────────────┐
//!                       │  Null guard (never mapped)      │
//! USER_SPACE_START      ├─────────────────────────────────┤ 0x0000_0000_0000_1000
//!                       │                                 │
//!                       │   Segments, heap, mmap regions  │
//!                       │   (lazily populated pages)      │
//!                       │                                 │
//! USER_SPACE_END        └─────────────────────────────────┘ 0x0000_8000_0000_0000
//! ```
//!
//! ## Compile-Time Checks
//!
//! The layout is verified with `const` assertions in [`memory`]; an invalid
//! combination fails the build rather than surfacing as a fault at runtime.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod memory;
