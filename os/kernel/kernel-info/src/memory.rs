//! # Memory Layout

/// Size of the base page, in bytes.
pub const PAGE_SIZE: usize = 4096;

/// `log2(PAGE_SIZE)`.
pub const PAGE_SHIFT: u32 = 12;

/// First address that may be handed out to user mappings.
///
/// The page at zero is kept unmapped so that null dereferences fault.
pub const USER_SPACE_START: u64 = 0x0000_0000_0000_1000;

/// End of the canonical lower half; user mappings must end at or below this.
pub const USER_SPACE_END: u64 = 0x0000_8000_0000_0000;

const _: () = {
    assert!(1 << PAGE_SHIFT == PAGE_SIZE);
    assert!(USER_SPACE_START.is_multiple_of(PAGE_SIZE as u64));
    assert!(USER_SPACE_END.is_multiple_of(PAGE_SIZE as u64));
    assert!(USER_SPACE_START < USER_SPACE_END);
};

/// Returns `true` if `[start, start + len)` lies entirely in user space.
#[must_use]
pub const fn is_user_range(start: u64, len: u64) -> bool {
    if start < USER_SPACE_START {
        return false;
    }
    match start.checked_add(len) {
        Some(end) => end <= USER_SPACE_END,
        None => false,
    }
}
