use kernel_vm::{
    AuxPayload, BackingFile, FileHandle, FileInfo, Frame, FrameAlloc, LoadError, MemoryFile, Page, PageState,
    PageType, PhysicalAddress, PoolFrameAlloc, VirtualAddress, VmError, anon_initializer,
    create_placeholder, destroy_placeholder, file_initializer, initialize_on_fault,
    lazy_load_segment,
};
use std::sync::Arc;

/// 8 KiB file whose bytes encode their own page index and offset.
fn patterned_file() -> Arc<MemoryFile> {
    let data = (0..8192u32).map(|i| (i / 4096 * 0x40 + i % 61) as u8).collect();
    Arc::new(MemoryFile::new(data))
}

fn placeholder(
    target: PageType,
    aux: Option<AuxPayload>,
    init: Option<kernel_vm::VmInitializer>,
    initializer: kernel_vm::PageInitializer,
) -> Page {
    create_placeholder(
        VirtualAddress::new(0x0804_8000).page(),
        true,
        target,
        aux,
        init,
        initializer,
    )
}

#[test]
fn file_backed_segment_is_loaded_on_first_fault() {
    let file = patterned_file();
    let handle: FileHandle = file.clone();
    let info = FileInfo::new(handle, 4096, 200).unwrap();
    let mut page = placeholder(
        PageType::File,
        Some(AuxPayload::segment(info)),
        Some(lazy_load_segment),
        file_initializer,
    );

    let p = PhysicalAddress::new(0x0020_0000);
    initialize_on_fault(&mut page, Frame::zeroed(p)).unwrap();

    assert_eq!(page.page_type(), PageType::File);
    let frame = page.frame().unwrap();
    assert_eq!(frame.physical_address(), p);
    assert_eq!(&frame.as_slice()[..200], &file.snapshot()[4096..4296]);
    assert!(frame.as_slice()[200..].iter().all(|&b| b == 0));
    assert_eq!(file.reads(), 1);
}

#[test]
fn untouched_placeholder_releases_its_descriptor_once() {
    let file = patterned_file();
    let handle: FileHandle = file.clone();
    let info = FileInfo::new(handle, 4096, 200).unwrap();
    let mut frames = PoolFrameAlloc::new(4);
    let page = placeholder(
        PageType::File,
        Some(AuxPayload::segment(info)),
        Some(lazy_load_segment),
        file_initializer,
    );
    assert_eq!(Arc::strong_count(&file), 2);

    if let Some(frame) = page.destroy() {
        frames.free_frame(frame);
    }

    assert_eq!(Arc::strong_count(&file), 1);
    assert_eq!(file.reads(), 0);
    assert_eq!(frames.in_use(), 0);
}

#[test]
fn payloads_without_ownership_are_not_released() {
    let file = patterned_file();
    let handle: FileHandle = file.clone();

    // A shared handle: teardown drops this page's reference, not the file.
    let mut page = placeholder(
        PageType::File,
        Some(AuxPayload::Shared(Arc::clone(&handle))),
        None,
        file_initializer,
    );
    assert_eq!(Arc::strong_count(&file), 3);
    destroy_placeholder(&mut page);
    assert_eq!(Arc::strong_count(&file), 2);
    destroy_placeholder(&mut page);
    assert_eq!(Arc::strong_count(&file), 2);

    // Release is keyed on the payload shape, not the target type.
    let mut page = placeholder(PageType::Anon, Some(AuxPayload::Word(42)), None, anon_initializer);
    destroy_placeholder(&mut page);
    let PageState::Uninit(uninit) = page.state() else {
        panic!("page must still be a placeholder");
    };
    assert!(uninit.aux().is_none());
    assert_eq!(Arc::strong_count(&file), 2);
}

/// Content loader that records what it was handed into the first bytes of the frame.
fn record_payload(page: &mut Page, aux: Option<AuxPayload>) -> Result<(), VmError> {
    let Some(AuxPayload::Segment(info)) = aux else {
        return Err(LoadError::UnexpectedPayload("expected segment").into());
    };
    let mut first = [0u8; 1];
    info.file()
        .read_at(&mut first, info.file_offset())
        .map_err(LoadError::from)?;

    let frame = page.frame_mut().ok_or(LoadError::NoFrame)?;
    let out = frame.as_mut_slice();
    out[..8].copy_from_slice(&info.file_offset().to_le_bytes());
    out[8..16].copy_from_slice(&(info.byte_count() as u64).to_le_bytes());
    out[16] = first[0];
    Ok(())
}

/// Preparation step that scribbles over everything it can reach.
fn clobbering_initializer(page: &mut Page, ty: PageType, _pa: PhysicalAddress) -> Result<(), VmError> {
    page.frame_mut().unwrap().as_mut_slice().fill(0xEE);
    page.install(PageState::File(kernel_vm::FilePage::new()));
    file_initializer(page, ty, PhysicalAddress::new(0))
}

#[test]
fn loader_inputs_survive_the_preparation_step() {
    let file = patterned_file();
    let handle: FileHandle = file.clone();
    let info = FileInfo::new(handle, 4096, 200).unwrap();
    let mut page = placeholder(
        PageType::File,
        Some(AuxPayload::segment(info)),
        Some(record_payload),
        clobbering_initializer,
    );

    initialize_on_fault(&mut page, Frame::zeroed(PhysicalAddress::new(0x1000))).unwrap();

    let bytes = page.frame().unwrap().as_slice();
    assert_eq!(u64::from_le_bytes(bytes[..8].try_into().unwrap()), 4096);
    assert_eq!(u64::from_le_bytes(bytes[8..16].try_into().unwrap()), 200);
    assert_eq!(bytes[16], file.snapshot()[4096]);
    // The loader consumed the descriptor.
    assert_eq!(Arc::strong_count(&file), 1);
}

#[test]
fn transmutation_happens_at_most_once() {
    let file = patterned_file();
    let handle: FileHandle = file.clone();
    let info = FileInfo::new(handle, 0, 100).unwrap();
    let mut page = placeholder(
        PageType::File,
        Some(AuxPayload::segment(info)),
        Some(lazy_load_segment),
        file_initializer,
    );

    initialize_on_fault(&mut page, Frame::zeroed(PhysicalAddress::new(0x1000))).unwrap();
    assert_eq!(page.page_type(), PageType::File);
    let reads = file.reads();

    let frame = page.take_frame().unwrap();
    let err = initialize_on_fault(&mut page, frame).unwrap_err();
    assert!(matches!(err, VmError::AlreadyInitialized(_)));
    assert_eq!(file.reads(), reads);
    assert_eq!(page.page_type(), PageType::File);
}

#[test]
fn consumed_payload_is_owned_by_the_final_page() {
    let file = patterned_file();
    let handle: FileHandle = file.clone();
    let info = FileInfo::new(handle, 0, 100).unwrap();
    let mut page = placeholder(
        PageType::File,
        Some(AuxPayload::segment(info)),
        Some(lazy_load_segment),
        file_initializer,
    );
    initialize_on_fault(&mut page, Frame::zeroed(PhysicalAddress::new(0x1000))).unwrap();
    assert_eq!(Arc::strong_count(&file), 2);

    // Placeholder teardown has nothing to do anymore.
    destroy_placeholder(&mut page);
    assert_eq!(Arc::strong_count(&file), 2);

    // The final variant's destructor releases it.
    assert!(page.destroy().is_some());
    assert_eq!(Arc::strong_count(&file), 1);
}

#[test]
fn failed_load_is_reported_and_payload_released() {
    let file = Arc::new(MemoryFile::new(vec![1; 50]));
    let handle: FileHandle = file.clone();
    let info = FileInfo::new(handle, 0, 100).unwrap();
    let mut page = placeholder(
        PageType::Anon,
        Some(AuxPayload::segment(info)),
        Some(lazy_load_segment),
        anon_initializer,
    );

    let err = initialize_on_fault(&mut page, Frame::zeroed(PhysicalAddress::new(0x1000))).unwrap_err();
    assert!(matches!(err, VmError::ContentLoadFailure(LoadError::ShortRead { .. })));
    assert_eq!(Arc::strong_count(&file), 1);
    assert_eq!(page.page_type(), PageType::Uninit);
    assert!(matches!(page.state(), PageState::Uninit(u) if u.is_spent()));

    // A second fault must not zero-fill the page and report success.
    let frame = page.take_frame().unwrap();
    let err = initialize_on_fault(&mut page, frame).unwrap_err();
    assert!(matches!(err, VmError::Poisoned(_)));
    assert_eq!(page.page_type(), PageType::Uninit);
    assert_eq!(file.reads(), 1);
}
