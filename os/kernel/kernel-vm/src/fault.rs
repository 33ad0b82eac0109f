//! Page-fault descriptions handed to the fault dispatcher.

use crate::addresses::VirtualAddress;
use bitfield_struct::bitfield;

/// Page-fault error code layout (x86-64).
///
/// Reference: Intel SDM Vol. 3A, §6.15.1 “Page-Fault Exception (#PF)”.
#[bitfield(u64)]
pub struct PageFaultError {
    /// 0 = non-present page.
    /// 1 = protection violation (page present but access disallowed).
    pub present: bool, // bit 0

    /// 0 = read or execute.
    /// 1 = write access.
    pub write: bool, // bit 1

    /// 0 = supervisor (CPL 0–2).
    /// 1 = user mode (CPL 3).
    pub user: bool, // bit 2

    /// 1 = caused by reserved bit set in a paging structure.
    pub reserved_bit: bool, // bit 3

    /// 1 = instruction fetch (execute access).
    pub instruction_fetch: bool, // bit 4

    #[bits(59)]
    __: u64,
}

impl PageFaultError {
    #[must_use]
    pub const fn explain(&self) -> &'static str {
        if !self.present() {
            "non-present page"
        } else if self.instruction_fetch() {
            "instruction fetch on protected page"
        } else if self.write() {
            "write access to protected page"
        } else {
            "read access to protected page"
        }
    }
}

/// A fault as seen by the dispatcher: faulting address (CR2) and error code.
#[derive(Copy, Clone, Debug)]
pub struct PageFault {
    pub address: VirtualAddress,
    pub error: PageFaultError,
}

impl PageFault {
    #[must_use]
    pub const fn new(address: VirtualAddress, error: PageFaultError) -> Self {
        Self { address, error }
    }

    /// A user-mode fault on a non-present page.
    #[must_use]
    pub const fn not_present(address: VirtualAddress, write: bool) -> Self {
        Self::new(
            address,
            PageFaultError::new().with_user(true).with_write(write),
        )
    }
}
