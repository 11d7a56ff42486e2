//! The archive session: one opened archive and its entry index.

use crate::fallback::{Fallback, FallbackFactory, UnrarDll};
use crate::names;
use crate::primary::{PrimaryDecoder, ReadSeek};
use crate::types::{Entry, FallbackMode, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// An opened RAR archive with random access to its entries.
///
/// Construction enumerates every entry once and never fails: an archive that
/// neither decoder can read yields a session with zero entries. Entries are
/// addressed by their position in archive order or by name.
///
/// A session is not meant to be shared between threads; extraction moves
/// the decoder's stream position and may create the fallback decoder.
pub struct RarFile {
    pub(crate) path: Option<PathBuf>,
    pub(crate) primary: Option<PrimaryDecoder>,
    pub(crate) entries: Vec<Entry>,
    pub(crate) fallback: Option<Box<dyn Fallback>>,
    factory: Option<Arc<dyn FallbackFactory>>,
}

impl RarFile {
    /// Open an archive file with default options.
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self::open_with(path, &OpenOptions::default())
    }

    /// Open an archive file.
    ///
    /// Only sessions opened by path can use the fallback decoder.
    pub fn open_with(path: impl AsRef<Path>, options: &OpenOptions) -> Self {
        let path = path.as_ref();
        let primary =
            match PrimaryDecoder::open(path, options.file_buffer_size, options.block_size) {
                Ok(decoder) => Some(decoder),
                Err(e) => {
                    debug!("Primary decoder cannot open {}: {}", path.display(), e);
                    None
                }
            };
        let mut archive = Self {
            path: Some(path.to_path_buf()),
            primary,
            entries: Vec::new(),
            fallback: None,
            factory: fallback_factory(&options.fallback),
        };
        archive.build_index();
        archive
    }

    /// Open an archive from a seekable stream with default options.
    pub fn from_reader<R: ReadSeek + 'static>(reader: R) -> Self {
        Self::from_reader_with(reader, &OpenOptions::default())
    }

    /// Open an archive from a seekable stream.
    ///
    /// Stream sessions have no path to hand to the fallback decoder, so the
    /// fallback setting in `options` is ignored.
    pub fn from_reader_with<R: ReadSeek + 'static>(reader: R, options: &OpenOptions) -> Self {
        let primary = match PrimaryDecoder::from_reader(
            Box::new(reader),
            options.stream_buffer_size,
            options.block_size,
        ) {
            Ok(decoder) => Some(decoder),
            Err(e) => {
                debug!("Primary decoder cannot open stream: {}", e);
                None
            }
        };
        let mut archive = Self {
            path: None,
            primary,
            entries: Vec::new(),
            fallback: None,
            factory: None,
        };
        archive.build_index();
        archive
    }

    /// Number of entries in the archive.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in archive order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Name of the entry at `index`, or `None` if out of range.
    pub fn name_at(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(Entry::name)
    }

    /// Index of the first entry whose name matches `name` case-insensitively.
    ///
    /// Entries whose names differ only by case share one name; all but the
    /// first are reachable by index only.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| names::eq_ignore_case(entry.name(), name))
    }

    /// Release both decoders.
    pub fn close(self) {
        debug!(
            "Closing archive session ({} entries, fallback {})",
            self.entries.len(),
            if self.fallback.is_some() { "used" } else { "unused" }
        );
    }

    /// Create the fallback decoder on first use.
    ///
    /// Returns whether a fallback decoder exists afterwards, which is never
    /// the case for stream sessions or when fallback is disabled.
    pub(crate) fn ensure_fallback(&mut self) -> bool {
        if self.fallback.is_none() {
            let (Some(path), Some(factory)) = (self.path.as_deref(), self.factory.as_ref()) else {
                return false;
            };
            debug!("Creating fallback decoder for {}", path.display());
            self.fallback = Some(factory.create(path));
        }
        true
    }
}

fn fallback_factory(mode: &FallbackMode) -> Option<Arc<dyn FallbackFactory>> {
    match mode {
        FallbackMode::Disabled => None,
        FallbackMode::Unrar => Some(Arc::new(|path: &Path| -> Box<dyn Fallback> {
            Box::new(UnrarDll::new(path))
        })),
        FallbackMode::Custom(factory) => Some(Arc::clone(factory)),
    }
}
