//! Fallback decoding through an alternative, more tolerant engine.
//!
//! The session only ever needs two things from a fallback engine: the list
//! of entry names in archive order, and the contents of one named entry.
//! [`UnrarDll`] provides both through the UnRAR shared library; tests and
//! embedders can plug in their own engine with [`FallbackMode::Custom`].
//!
//! [`FallbackMode::Custom`]: crate::FallbackMode::Custom

mod ffi;
mod unrar;

pub use ffi::LIBRARY_PATH_ENV;
pub use unrar::UnrarDll;

use crate::error::Result;
use crate::types::{Entry, FileData, Locator};
use std::path::Path;

/// An engine able to list and extract entries of one archive.
pub trait Fallback: Send {
    /// Report every entry name in archive order, with `/` separators.
    ///
    /// # Errors
    ///
    /// Fails only if the engine cannot run at all. A header that cannot be
    /// read simply ends the listing early.
    fn list_names(&mut self, visit: &mut dyn FnMut(String)) -> Result<()>;

    /// Extract the first entry whose name matches `name` case-insensitively.
    fn extract(&mut self, name: &str) -> Result<FileData>;
}

/// Creates a [`Fallback`] for an archive on disk.
pub trait FallbackFactory: Send + Sync {
    fn create(&self, archive: &Path) -> Box<dyn Fallback>;
}

impl<F> FallbackFactory for F
where
    F: Fn(&Path) -> Box<dyn Fallback> + Send + Sync,
{
    fn create(&self, archive: &Path) -> Box<dyn Fallback> {
        self(archive)
    }
}

/// Run a fallback listing against entries already known from the primary pass.
///
/// Positions the primary pass already filled must carry the same name;
/// positions beyond it are appended. Locators are left untouched.
pub(crate) fn enumerate_into(fallback: &mut dyn Fallback, entries: &mut Vec<Entry>) -> Result<()> {
    let mut index = 0;
    fallback.list_names(&mut |name| {
        match entries.get(index) {
            Some(known) => debug_assert_eq!(
                known.name(),
                name,
                "entry {} differs between decoders",
                index
            ),
            None => entries.push(Entry::new(name, Locator::FallbackOnly)),
        }
        index += 1;
    })
}
