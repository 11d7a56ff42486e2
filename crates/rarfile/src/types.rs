//! Type definitions for archive sessions.

use crate::error::Result;
use crate::fallback::FallbackFactory;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Zero bytes appended after every extracted payload.
const PAD: [u8; 2] = [0, 0];

/// Where the primary decoder can find an entry again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locator {
    /// Stream offset of the entry's header, resumable by the primary decoder
    Primary(u64),

    /// No usable primary offset; the entry is served by the fallback decoder
    FallbackOnly,
}

/// Individual entry within an archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    name: String,
    locator: Locator,
}

impl Entry {
    pub(crate) fn new(name: String, locator: Locator) -> Self {
        Self { name, locator }
    }

    /// Path of the entry within the archive, with `/` separators.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn locator(&self) -> Locator {
        self.locator
    }

    /// Recorded header offset, or `None` for fallback-only entries.
    pub fn offset(&self) -> Option<u64> {
        match self.locator {
            Locator::Primary(offset) => Some(offset),
            Locator::FallbackOnly => None,
        }
    }

    pub fn is_fallback_only(&self) -> bool {
        self.locator == Locator::FallbackOnly
    }

    pub(crate) fn demote(&mut self) {
        self.locator = Locator::FallbackOnly;
    }
}

/// Decompressed contents of one entry.
///
/// The underlying buffer always ends with two zero bytes so that text
/// payloads can be handed to consumers expecting a terminator. The pad is
/// not part of [`len`](Self::len) or of the slice exposed through `Deref`.
#[derive(Clone, PartialEq, Eq)]
pub struct FileData {
    buf: Vec<u8>,
}

impl FileData {
    /// Wrap decompressed bytes, appending the trailing pad.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::OutOfMemory`](crate::ArchiveError::OutOfMemory)
    /// if the buffer cannot grow to hold the pad.
    pub fn from_vec(mut data: Vec<u8>) -> Result<Self> {
        data.try_reserve_exact(PAD.len())?;
        data.extend_from_slice(&PAD);
        Ok(Self { buf: data })
    }

    /// Logical length, excluding the trailing pad.
    pub fn len(&self) -> usize {
        self.buf.len() - PAD.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len()]
    }

    /// The full buffer including the two trailing zero bytes.
    pub fn as_padded(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_vec(mut self) -> Vec<u8> {
        let len = self.len();
        self.buf.truncate(len);
        self.buf
    }
}

impl Deref for FileData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl AsRef<[u8]> for FileData {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Debug for FileData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileData").field("len", &self.len()).finish()
    }
}

/// Which engine serves entries the primary decoder cannot handle.
#[derive(Clone, Default)]
pub enum FallbackMode {
    /// Never fall back; primary failures are final
    Disabled,

    /// Use the UnRAR shared library, if it can be loaded
    #[default]
    Unrar,

    /// Use a caller-provided engine
    Custom(Arc<dyn FallbackFactory>),
}

impl FallbackMode {
    /// Wrap a factory (or a closure `Fn(&Path) -> Box<dyn Fallback>`).
    pub fn custom<F: FallbackFactory + 'static>(factory: F) -> Self {
        Self::Custom(Arc::new(factory))
    }
}

impl fmt::Debug for FallbackMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("Disabled"),
            Self::Unrar => f.write_str("Unrar"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Options for opening an archive session.
#[derive(Debug, Clone)]
pub struct OpenOptions {
    /// Read buffer size when opening by path
    pub file_buffer_size: usize,

    /// Read buffer size when opening from a caller-provided stream
    pub stream_buffer_size: usize,

    /// Maximum size of a single data block handed out by the primary decoder
    pub block_size: usize,

    /// Fallback engine for entries the primary decoder cannot handle
    pub fallback: FallbackMode,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            file_buffer_size: 10240,
            stream_buffer_size: 65536,
            block_size: 65536,
            fallback: FallbackMode::Unrar,
        }
    }
}
