//! # rarfile
//!
//! Random access to the entries of a RAR archive.
//!
//! A [`RarFile`] session indexes the archive once when it is opened and then
//! extracts individual entries by position or by name. Two decoders back a
//! session:
//!
//! - the primary decoder, a pure-Rust reader for RAR 1.5-4.x archives that can
//!   resume at any file header it has seen before
//! - an optional fallback decoder, by default the UnRAR shared library loaded
//!   at runtime, which handles everything the primary decoder cannot (RAR5,
//!   encrypted, solid or multi-volume entries, damaged headers)
//!
//! An entry whose primary read fails is demoted to the fallback for the rest
//! of the session. Extraction failures surface uniformly as `None`; the
//! reason is reported through `tracing`.
//!
//! ## Example
//!
//! ```rust,no_run
//! use rarfile::RarFile;
//!
//! let mut archive = RarFile::open("comic.cbr");
//! for i in 0..archive.entry_count() {
//!     println!("{}", archive.name_at(i).unwrap_or_default());
//! }
//!
//! if let Some(data) = archive.extract_by_name("ComicInfo.xml") {
//!     println!("{} bytes", data.len());
//! }
//! archive.close();
//! ```

pub mod error;
pub mod fallback;
pub mod types;

mod archive;
mod extract;
mod index;
mod names;
mod primary;

// Re-export main types
pub use archive::RarFile;
pub use error::{ArchiveError, Result};
pub use fallback::{Fallback, FallbackFactory, UnrarDll, LIBRARY_PATH_ENV};
pub use primary::ReadSeek;
pub use types::{Entry, FallbackMode, FileData, Locator, OpenOptions};
