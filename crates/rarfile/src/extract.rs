//! Entry extraction with per-entry fallback.
//!
//! Entries with a primary locator are read back by seeking the primary
//! decoder to the recorded header. When that read fails for any reason other
//! than running out of memory, the entry is demoted to fallback-only and the
//! request is served by the fallback decoder instead. Later requests for the
//! same entry go straight to the fallback.

use crate::archive::RarFile;
use crate::error::{ArchiveError, Result};
use crate::types::{FileData, Locator};
use tracing::{debug, warn};

impl RarFile {
    /// Extract the entry at `index`.
    ///
    /// Returns `None` if the index is out of range or if neither decoder can
    /// produce the entry's contents. The reason is logged, not returned.
    pub fn extract(&mut self, index: usize) -> Option<FileData> {
        let Some(entry) = self.entries.get(index) else {
            debug!(
                "Entry index {} out of range ({} entries)",
                index,
                self.entries.len()
            );
            return None;
        };
        let name = entry.name().to_string();
        let offset = match entry.locator() {
            Locator::Primary(offset) => offset,
            Locator::FallbackOnly => return self.extract_fallback(&name),
        };

        match self.extract_primary(offset, &name) {
            Ok(data) => Some(data),
            Err(e) if e.is_resource_exhaustion() => {
                warn!("Extracting {} ran out of memory: {}", name, e);
                None
            }
            Err(e) => {
                if !self.ensure_fallback() {
                    debug!("Extracting {} failed with no fallback: {}", name, e);
                    return None;
                }
                warn!("Demoting entry {} ({}) to fallback: {}", index, name, e);
                self.entries[index].demote();
                self.extract_fallback(&name)
            }
        }
    }

    /// Extract the entry called `name`, resolved with [`index_of`](Self::index_of).
    pub fn extract_by_name(&mut self, name: &str) -> Option<FileData> {
        let Some(index) = self.index_of(name) else {
            debug!("No entry named {}", name);
            return None;
        };
        self.extract(index)
    }

    fn extract_primary(&mut self, offset: u64, name: &str) -> Result<FileData> {
        let primary = self
            .primary
            .as_mut()
            .ok_or(ArchiveError::PrimaryUnavailable)?;
        primary.seek(offset)?;
        primary.reset_header_state()?;

        let found = primary.next_header()?.ok_or(ArchiveError::UnexpectedEnd)?;
        if found != name {
            return Err(ArchiveError::HeaderMismatch {
                expected: name.to_string(),
                found,
            });
        }

        let mut data = Vec::new();
        while let Some(block) = primary.read_data_block()? {
            data.try_reserve(block.len())?;
            data.extend_from_slice(block);
        }
        FileData::from_vec(data)
    }

    fn extract_fallback(&mut self, name: &str) -> Option<FileData> {
        if !self.ensure_fallback() {
            debug!("No fallback decoder for {}", name);
            return None;
        }
        let fallback = self.fallback.as_mut()?;
        match fallback.extract(name) {
            Ok(data) => Some(data),
            Err(e) => {
                warn!("Fallback extraction of {} failed: {}", name, e);
                None
            }
        }
    }
}
