use crate::addresses::{VirtualAddress, VirtualPage};
use crate::page::PageType;

/// Errors raised by the paging subsystem.
#[derive(Debug, thiserror::Error)]
pub enum VmError {
    /// The per-type initializer could not install the final page state.
    #[error("failed to prepare {0} page")]
    PreparationFailure(PageType),
    /// The deferred content loader could not populate the page.
    #[error("failed to load page content: {0}")]
    ContentLoadFailure(#[from] LoadError),
    /// The page has already left the placeholder state.
    #[error("page {0} is already initialized")]
    AlreadyInitialized(VirtualPage),
    /// An earlier transmutation of this page failed; it can only be destroyed.
    #[error("page {0} failed to initialize earlier")]
    Poisoned(VirtualPage),
    #[error("page {0} already has a frame")]
    AlreadyResident(VirtualPage),
    #[error("page {0} has no frame")]
    NotResident(VirtualPage),
    #[error("page {0} is already mapped")]
    AlreadyMapped(VirtualPage),
    #[error("no page registered at {0}")]
    NotMapped(VirtualAddress),
    #[error("out of physical frames")]
    OutOfFrames,
    #[error("protection violation at {0}")]
    ProtectionViolation(VirtualAddress),
    /// The page's current variant does not provide this operation.
    #[error("{op} is not supported on {ty} pages")]
    Unsupported { op: &'static str, ty: PageType },
    #[error("invalid mapping request: {0}")]
    InvalidMapping(&'static str),
}

/// Why deferred content loading failed.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("backing file error: {0}")]
    File(#[from] FileError),
    #[error("short read: wanted {wanted} bytes, got {got}")]
    ShortRead { wanted: usize, got: usize },
    /// The auxiliary payload is not the shape this loader understands.
    #[error("unexpected auxiliary payload: {0}")]
    UnexpectedPayload(&'static str),
    #[error("page has no bound frame")]
    NoFrame,
}

/// Errors reported by a [`BackingFile`](crate::BackingFile).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FileError {
    #[error("offset {0:#x} is out of range")]
    OutOfRange(u64),
    #[error("file is read-only")]
    ReadOnly,
    #[error("device error")]
    Device,
}
