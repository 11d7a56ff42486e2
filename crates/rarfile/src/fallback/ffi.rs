//! UnRAR shared library bindings.
//!
//! Structure layouts follow the UnRAR DLL interface (`dll.hpp`). Only the
//! five exported functions used by the fallback are resolved. The library is
//! loaded once per process and the outcome is cached for its lifetime.

use libloading::Library;
use std::env;
use std::ffi::{c_char, c_int, c_uint, c_void};
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Interface version this binding was written against.
pub const RAR_DLL_VERSION: c_int = 9;

pub const RAR_OM_EXTRACT: c_uint = 1;
pub const RAR_SKIP: c_int = 0;
pub const RAR_TEST: c_int = 1;
pub const UCM_PROCESSDATA: c_uint = 1;

/// Environment variable overriding the library location.
pub const LIBRARY_PATH_ENV: &str = "UNRAR_LIB_PATH";

#[cfg(windows)]
pub type WChar = u16;
#[cfg(not(windows))]
pub type WChar = u32;

pub type LParam = isize;
pub type Handle = *mut c_void;

pub type UnrarCallback = extern "system" fn(c_uint, LParam, LParam, LParam) -> c_int;

#[allow(dead_code)]
#[repr(C)]
pub struct HeaderDataEx {
    pub arc_name: [c_char; 1024],
    pub arc_name_w: [WChar; 1024],
    pub file_name: [c_char; 1024],
    pub file_name_w: [WChar; 1024],
    pub flags: c_uint,
    pub pack_size: c_uint,
    pub pack_size_high: c_uint,
    pub unp_size: c_uint,
    pub unp_size_high: c_uint,
    pub host_os: c_uint,
    pub file_crc: c_uint,
    pub file_time: c_uint,
    pub unp_ver: c_uint,
    pub method: c_uint,
    pub file_attr: c_uint,
    pub cmt_buf: *mut c_char,
    pub cmt_buf_size: c_uint,
    pub cmt_size: c_uint,
    pub cmt_state: c_uint,
    pub dict_size: c_uint,
    pub hash_type: c_uint,
    pub hash: [c_char; 32],
    pub reserved: [c_uint; 1014],
}

impl HeaderDataEx {
    pub fn zeroed() -> Box<Self> {
        // SAFETY: every field is an integer, an integer array or a raw
        // pointer, all of which are valid when zero.
        Box::new(unsafe { std::mem::zeroed() })
    }

    /// Entry name from the wide-character field, up to the first NUL.
    pub fn entry_name(&self) -> String {
        let end = self
            .file_name_w
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(self.file_name_w.len());
        wide_to_string(&self.file_name_w[..end])
    }
}

#[allow(dead_code)]
#[repr(C)]
pub struct OpenArchiveDataEx {
    pub arc_name: *mut c_char,
    pub arc_name_w: *mut WChar,
    pub open_mode: c_uint,
    pub open_result: c_uint,
    pub cmt_buf: *mut c_char,
    pub cmt_buf_size: c_uint,
    pub cmt_size: c_uint,
    pub cmt_state: c_uint,
    pub flags: c_uint,
    pub callback: Option<UnrarCallback>,
    pub user_data: LParam,
    pub reserved: [c_uint; 28],
}

impl OpenArchiveDataEx {
    pub fn new(arc_name_w: *mut WChar, callback: Option<UnrarCallback>, user_data: LParam) -> Self {
        Self {
            arc_name: std::ptr::null_mut(),
            arc_name_w,
            open_mode: RAR_OM_EXTRACT,
            open_result: 0,
            cmt_buf: std::ptr::null_mut(),
            cmt_buf_size: 0,
            cmt_size: 0,
            cmt_state: 0,
            flags: 0,
            callback,
            user_data,
            reserved: [0; 28],
        }
    }
}

type OpenArchiveExFn = unsafe extern "system" fn(*mut OpenArchiveDataEx) -> Handle;
type ReadHeaderExFn = unsafe extern "system" fn(Handle, *mut HeaderDataEx) -> c_int;
type ProcessFileFn = unsafe extern "system" fn(Handle, c_int, *mut c_char, *mut c_char) -> c_int;
type CloseArchiveFn = unsafe extern "system" fn(Handle) -> c_int;
type GetDllVersionFn = unsafe extern "system" fn() -> c_int;

/// The resolved UnRAR function table.
pub struct UnrarLibrary {
    pub open_archive_ex: OpenArchiveExFn,
    pub read_header_ex: ReadHeaderExFn,
    pub process_file: ProcessFileFn,
    pub close_archive: CloseArchiveFn,
    get_dll_version: GetDllVersionFn,
    // Keeps the function pointers above valid.
    _library: Library,
}

static UNRAR: OnceLock<Option<UnrarLibrary>> = OnceLock::new();

/// The process-wide UnRAR binding, or `None` if it cannot be used.
pub fn library() -> Option<&'static UnrarLibrary> {
    UNRAR.get_or_init(load).as_ref()
}

fn library_path() -> Option<PathBuf> {
    if let Some(path) = env::var_os(LIBRARY_PATH_ENV) {
        return Some(PathBuf::from(path));
    }
    let exe = env::current_exe().ok()?;
    Some(exe.parent()?.join(libloading::library_filename("unrar")))
}

fn load() -> Option<UnrarLibrary> {
    let path = library_path()?;
    if !path.is_file() {
        debug!("UnRAR library not found at {}", path.display());
        return None;
    }

    // SAFETY: loading runs the library's initialisers; UnRAR has none with
    // preconditions on the host process.
    let library = match unsafe { Library::new(&path) } {
        Ok(library) => library,
        Err(e) => {
            warn!("Failed to load UnRAR library {}: {}", path.display(), e);
            return None;
        }
    };

    let bound = match bind(library) {
        Ok(bound) => bound,
        Err(e) => {
            warn!("UnRAR library {} is incomplete: {}", path.display(), e);
            return None;
        }
    };

    // SAFETY: RARGetDllVersion takes no arguments and has no preconditions.
    let version = unsafe { (bound.get_dll_version)() };
    if version != RAR_DLL_VERSION {
        warn!(
            "UnRAR library {} reports version {}, expected {}",
            path.display(),
            version,
            RAR_DLL_VERSION
        );
        return None;
    }

    debug!("Loaded UnRAR library from {}", path.display());
    Some(bound)
}

fn bind(library: Library) -> Result<UnrarLibrary, libloading::Error> {
    // SAFETY: the symbol types match the UnRAR DLL interface declarations.
    // The version query is resolved last, after every other entry point.
    let (open_archive_ex, read_header_ex, process_file, close_archive, get_dll_version) = unsafe {
        (
            *library.get::<OpenArchiveExFn>(b"RAROpenArchiveEx\0")?,
            *library.get::<ReadHeaderExFn>(b"RARReadHeaderEx\0")?,
            *library.get::<ProcessFileFn>(b"RARProcessFile\0")?,
            *library.get::<CloseArchiveFn>(b"RARCloseArchive\0")?,
            *library.get::<GetDllVersionFn>(b"RARGetDllVersion\0")?,
        )
    };
    Ok(UnrarLibrary {
        open_archive_ex,
        read_header_ex,
        process_file,
        close_archive,
        get_dll_version,
        _library: library,
    })
}

/// NUL-terminated wide-character form of `text`.
pub fn to_wide(text: &str) -> Vec<WChar> {
    #[cfg(windows)]
    let mut wide: Vec<WChar> = text.encode_utf16().collect();
    #[cfg(not(windows))]
    let mut wide: Vec<WChar> = text.chars().map(u32::from).collect();
    wide.push(0);
    wide
}

pub fn wide_to_string(wide: &[WChar]) -> String {
    #[cfg(windows)]
    {
        String::from_utf16_lossy(wide)
    }
    #[cfg(not(windows))]
    {
        wide.iter()
            .map(|&c| char::from_u32(c).unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect()
    }
}
