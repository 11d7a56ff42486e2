//! Fallback engine backed by the UnRAR shared library.

use super::ffi::{
    self, Handle, HeaderDataEx, LParam, OpenArchiveDataEx, UnrarCallback, UnrarLibrary, RAR_SKIP,
    RAR_TEST, UCM_PROCESSDATA,
};
use super::Fallback;
use crate::error::{ArchiveError, Result};
use crate::names;
use crate::types::FileData;
use std::cell::RefCell;
use std::ffi::{c_int, c_uint};
use std::path::{Path, PathBuf};
use tracing::trace;

/// Lists and extracts entries by re-opening the archive through UnRAR.
///
/// Each operation opens its own archive handle and closes it before
/// returning. If the library is missing, incomplete, or of another interface
/// version, every operation fails with [`ArchiveError::FallbackUnavailable`].
#[derive(Debug, Clone)]
pub struct UnrarDll {
    archive: PathBuf,
}

impl UnrarDll {
    pub fn new(archive: &Path) -> Self {
        // Load early so the outcome is logged at session construction.
        let _ = ffi::library();
        Self {
            archive: archive.to_path_buf(),
        }
    }

    /// Whether the UnRAR library could be loaded in this process.
    pub fn is_available() -> bool {
        ffi::library().is_some()
    }

    fn open(&self, callback: Option<UnrarCallback>, user_data: LParam) -> Result<OpenArchive> {
        let library = ffi::library().ok_or(ArchiveError::FallbackUnavailable)?;
        let mut name = ffi::to_wide(&self.archive.to_string_lossy());
        let mut data = OpenArchiveDataEx::new(name.as_mut_ptr(), callback, user_data);

        // SAFETY: `data` and the name buffer it points to outlive the call;
        // UnRAR copies the name before returning.
        let handle = unsafe { (library.open_archive_ex)(&mut data) };
        if handle.is_null() {
            return Err(ArchiveError::FallbackOpen(data.open_result));
        }
        let archive = OpenArchive { library, handle };
        if data.open_result != 0 {
            return Err(ArchiveError::FallbackOpen(data.open_result));
        }
        Ok(archive)
    }
}

impl Fallback for UnrarDll {
    fn list_names(&mut self, visit: &mut dyn FnMut(String)) -> Result<()> {
        let mut archive = self.open(None, 0)?;
        let mut header = HeaderDataEx::zeroed();
        while archive.read_header(&mut header) == 0 {
            visit(names::normalize_separators(&header.entry_name()));
            archive.process(RAR_SKIP);
        }
        Ok(())
    }

    fn extract(&mut self, name: &str) -> Result<FileData> {
        let sink = RefCell::new(Vec::<u8>::new());
        let user_data = &sink as *const RefCell<Vec<u8>> as LParam;
        let mut archive = self.open(Some(collect_data), user_data)?;

        let mut header = HeaderDataEx::zeroed();
        loop {
            if archive.read_header(&mut header) != 0 {
                return Err(ArchiveError::EntryNotFound(name.to_string()));
            }
            let found = names::normalize_separators(&header.entry_name());
            if names::eq_ignore_case(&found, name) {
                break;
            }
            trace!("UnRAR skipping {}", found);
            archive.process(RAR_SKIP);
        }

        if header.unp_size_high != 0 {
            return Err(ArchiveError::SizeOutOfRange);
        }
        sink.borrow_mut().clear();
        let result = archive.process(RAR_TEST);
        drop(archive);

        let data = sink.into_inner();
        if result != 0 {
            return Err(ArchiveError::FallbackProcess(result));
        }
        if data.len() as u64 != u64::from(header.unp_size) {
            return Err(ArchiveError::SizeMismatch {
                expected: u64::from(header.unp_size),
                actual: data.len() as u64,
            });
        }
        FileData::from_vec(data)
    }
}

/// An open UnRAR archive handle, closed on drop.
struct OpenArchive {
    library: &'static UnrarLibrary,
    handle: Handle,
}

impl OpenArchive {
    fn read_header(&mut self, header: &mut HeaderDataEx) -> c_int {
        // SAFETY: `handle` is open and `header` is a valid, writable header block.
        unsafe { (self.library.read_header_ex)(self.handle, header) }
    }

    fn process(&mut self, operation: c_int) -> c_int {
        // SAFETY: `handle` is open; null destinations are allowed for skip and test.
        unsafe {
            (self.library.process_file)(
                self.handle,
                operation,
                std::ptr::null_mut(),
                std::ptr::null_mut(),
            )
        }
    }
}

impl Drop for OpenArchive {
    fn drop(&mut self) {
        // SAFETY: `handle` was returned by RAROpenArchiveEx and is closed only here.
        unsafe {
            (self.library.close_archive)(self.handle);
        }
    }
}

/// UnRAR callback appending decompressed blocks to the sink in `user_data`.
extern "system" fn collect_data(
    message: c_uint,
    user_data: LParam,
    buffer: LParam,
    size: LParam,
) -> c_int {
    if message != UCM_PROCESSDATA || user_data == 0 {
        return -1;
    }
    let Ok(len) = usize::try_from(size) else {
        return -1;
    };
    if len == 0 {
        return 1;
    }

    // SAFETY: `user_data` is the `RefCell` created in `extract`, which
    // outlives the archive handle this callback is registered on.
    let sink = unsafe { &*(user_data as *const RefCell<Vec<u8>>) };
    let Ok(mut data) = sink.try_borrow_mut() else {
        return -1;
    };
    if data.try_reserve(len).is_err() {
        return -1;
    }
    // SAFETY: UnRAR passes `size` readable bytes valid for this call.
    let chunk = unsafe { std::slice::from_raw_parts(buffer as *const u8, len) };
    data.extend_from_slice(chunk);
    1
}
