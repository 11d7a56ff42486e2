//! Error types for archive decoding operations.
//!
//! These errors never cross the [`RarFile`](crate::RarFile) extraction API,
//! which reports every failure as an absent result. They exist so that the
//! decoders can propagate failures with `?` and the session can log why an
//! entry was demoted or an extraction gave up.

use std::collections::TryReserveError;
use thiserror::Error;

/// Main error type for decoding operations.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// An I/O error occurred while reading the archive.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The archive structure was rejected by the header parsers.
    #[error("Malformed archive: {0}")]
    Format(#[from] rar_stream::RarError),

    /// The compressed stream of an entry could not be decoded.
    #[error("Decompression failed: {0}")]
    Decompress(#[from] rar_stream::DecompressError),

    /// The archive or entry uses a feature the decoder does not handle.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// A block header failed its CRC16 check.
    #[error("Header checksum mismatch at offset {offset}")]
    HeaderChecksum {
        /// Stream offset of the damaged header
        offset: u64,
    },

    /// Decompressed data failed its CRC32 check.
    #[error("Data checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    DataChecksum {
        /// CRC32 stored in the file header
        expected: u32,
        /// CRC32 of the bytes actually produced
        actual: u32,
    },

    /// A header or data area extends past the end of the stream.
    #[error("Archive truncated at offset {offset}")]
    Truncated {
        /// Offset of the block that could not be read completely
        offset: u64,
    },

    /// The number of bytes produced differs from the declared size.
    #[error("Size mismatch: expected {expected} bytes, got {actual} bytes")]
    SizeMismatch {
        /// Declared unpacked size
        expected: u64,
        /// Bytes actually produced
        actual: u64,
    },

    /// The declared unpacked size does not fit the fallback engine's fields.
    #[error("Entry size out of range")]
    SizeOutOfRange,

    /// A recorded offset lies outside the archive stream.
    #[error("Invalid offset: {offset} (archive length: {length})")]
    InvalidOffset {
        /// Requested offset
        offset: u64,
        /// Length of the archive stream
        length: u64,
    },

    /// The header found at a recorded offset names a different entry.
    #[error("Header mismatch: expected {expected:?}, found {found:?}")]
    HeaderMismatch {
        /// Name recorded in the entry index
        expected: String,
        /// Name read back from the archive
        found: String,
    },

    /// Data was requested while no entry header is current.
    #[error("No current entry")]
    NoCurrentEntry,

    /// The archive ended before the requested entry header.
    #[error("Unexpected end of archive")]
    UnexpectedEnd,

    /// The primary decoder could not be created or opened.
    #[error("Primary decoder unavailable")]
    PrimaryUnavailable,

    /// The fallback library is missing, incomplete, or of the wrong version.
    #[error("Fallback decoder unavailable")]
    FallbackUnavailable,

    /// The fallback engine refused to open the archive.
    #[error("Fallback could not open archive (code {0})")]
    FallbackOpen(u32),

    /// The fallback engine reported an error while processing an entry.
    #[error("Fallback processing failed (code {0})")]
    FallbackProcess(i32),

    /// No entry with the requested name exists.
    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    /// Growing an output buffer failed.
    #[error("Out of memory: {0}")]
    OutOfMemory(#[from] TryReserveError),
}

impl ArchiveError {
    /// Whether this failure must not be retried through the fallback decoder.
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(self, Self::OutOfMemory(_))
    }
}

/// Result type for decoding operations.
pub type Result<T> = std::result::Result<T, ArchiveError>;
