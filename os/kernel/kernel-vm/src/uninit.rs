//! # Uninitialized Pages
//!
//! Every page is born as a placeholder. The placeholder remembers what the
//! page is going to become ([`PageType`]), how to prepare that variant
//! ([`PageInitializer`]), and how to fill it with content ([`VmInitializer`]
//! plus its [`AuxPayload`]). Nothing is allocated or read until the first
//! fault calls [`initialize_on_fault`], which transmutes the page in place.
//!
//! Pages that are never touched are torn down through
//! [`UninitPage::destroy`], which releases the payload according to its shape.

use crate::addresses::{PhysicalAddress, VirtualPage};
use crate::error::VmError;
use crate::file_info::AuxPayload;
use crate::frame::Frame;
use crate::page::{Page, PageInitializer, PageState, PageType, VmInitializer};

/// Placeholder state of a page that has not been faulted in yet.
pub struct UninitPage {
    init: Option<VmInitializer>,
    target: PageType,
    aux: Option<AuxPayload>,
    page_initializer: PageInitializer,
    /// Set once a transmutation has been attempted; never cleared.
    spent: bool,
}

impl UninitPage {
    /// A placeholder whose one transmutation attempt has failed.
    const fn spent(target: PageType, page_initializer: PageInitializer) -> Self {
        Self {
            init: None,
            target,
            aux: None,
            page_initializer,
            spent: true,
        }
    }

    /// The type this page turns into on first fault.
    #[must_use]
    pub const fn target(&self) -> PageType {
        self.target
    }

    #[must_use]
    pub const fn aux(&self) -> Option<&AuxPayload> {
        self.aux.as_ref()
    }

    #[must_use]
    pub const fn has_content_loader(&self) -> bool {
        self.init.is_some()
    }

    /// `true` if a transmutation was attempted and failed. Such a page can
    /// only be destroyed.
    #[must_use]
    pub const fn is_spent(&self) -> bool {
        self.spent
    }

    /// Release the auxiliary payload of a never-touched page.
    ///
    /// Calling this again, or on a page without payload, does nothing.
    pub fn destroy(&mut self) {
        match self.aux.take() {
            // Sole owner of the descriptor; dropping the box frees it and
            // releases its reference to the file.
            Some(AuxPayload::Segment(info)) => drop(info),
            // The file belongs to the mapping; only our reference goes.
            Some(AuxPayload::Shared(file)) => drop(file),
            Some(AuxPayload::Word(_)) | None => {}
        }
        self.init = None;
    }
}

/// Create a page in placeholder state at `va`.
///
/// Takes ownership of `aux`. No frame is bound.
#[must_use]
pub fn create_placeholder(
    va: VirtualPage,
    writable: bool,
    target: PageType,
    aux: Option<AuxPayload>,
    init: Option<VmInitializer>,
    page_initializer: PageInitializer,
) -> Page {
    Page::new(
        va,
        writable,
        PageState::Uninit(UninitPage {
            init,
            target,
            aux,
            page_initializer,
            spent: false,
        }),
    )
}

/// Transmute a placeholder into its final variant on first fault.
///
/// Binds `frame`, runs the per-type initializer, then the content loader (if
/// any) with the payload. The payload is consumed either way.
///
/// A failed attempt is terminal: the page is put back into a spent
/// placeholder state with no payload, and every later call fails with
/// [`VmError::Poisoned`]. The frame stays bound for the caller to reclaim.
///
/// # Errors
/// - [`VmError::AlreadyInitialized`] if `page` is no longer a placeholder.
/// - [`VmError::AlreadyResident`] if a frame is already bound.
/// - [`VmError::Poisoned`] if an earlier attempt failed.
/// - [`VmError::PreparationFailure`] if the initializer fails or does not
///   install a variant of the target type.
/// - Whatever the content loader reports, typically
///   [`VmError::ContentLoadFailure`].
pub fn initialize_on_fault(page: &mut Page, frame: Frame) -> Result<(), VmError> {
    let va = page.va();
    if page.is_resident() {
        return Err(VmError::AlreadyResident(va));
    }
    let PageState::Uninit(ref mut uninit) = *page.state_mut() else {
        return Err(VmError::AlreadyInitialized(va));
    };
    if uninit.spent {
        return Err(VmError::Poisoned(va));
    }
    uninit.spent = true;

    // Fetch first; the initializer replaces the state holding these.
    let init = uninit.init.take();
    let aux = uninit.aux.take();
    let target = uninit.target;
    let page_initializer = uninit.page_initializer;

    let pa = frame.physical_address();
    page.bind_frame(frame);

    let result = transmute(page, target, pa, page_initializer, init, aux);
    if result.is_err() {
        page.install(PageState::Uninit(UninitPage::spent(target, page_initializer)));
    }
    result
}

fn transmute(
    page: &mut Page,
    target: PageType,
    pa: PhysicalAddress,
    page_initializer: PageInitializer,
    init: Option<VmInitializer>,
    aux: Option<AuxPayload>,
) -> Result<(), VmError> {
    page_initializer(page, target, pa)?;
    if page.page_type() != target {
        return Err(VmError::PreparationFailure(target));
    }

    match init {
        Some(init) => init(page, aux),
        None => Ok(()),
    }
}

/// Placeholder teardown entry point; a no-op for realized pages.
pub fn destroy_placeholder(page: &mut Page) {
    if let PageState::Uninit(uninit) = page.state_mut() {
        uninit.destroy();
    }
}
