//! Entry index construction.

use crate::archive::RarFile;
use crate::error::Result;
use crate::fallback;
use crate::primary::PrimaryDecoder;
use crate::types::{Entry, Locator};
use tracing::{debug, warn};

impl RarFile {
    /// Populate the entry index. Runs exactly once, during construction.
    ///
    /// The primary decoder is asked first. If it is absent or stops on an
    /// error, a path-based session rebuilds the index from the fallback
    /// listing and every entry becomes fallback-only.
    pub(crate) fn build_index(&mut self) {
        let complete = match self.primary.as_mut() {
            Some(primary) => match enumerate_primary(primary, &mut self.entries) {
                Ok(()) => true,
                Err(e) => {
                    debug!(
                        "Primary enumeration stopped after {} entries: {}",
                        self.entries.len(),
                        e
                    );
                    false
                }
            },
            None => false,
        };
        if complete {
            debug!("Indexed {} entries", self.entries.len());
            return;
        }

        let known = self.entries.len();
        if !self.ensure_fallback() {
            return;
        }
        let Some(fallback) = self.fallback.as_deref_mut() else {
            return;
        };
        if let Err(e) = fallback::enumerate_into(fallback, &mut self.entries) {
            warn!("Fallback enumeration failed: {}", e);
        }
        // The primary decoder may refuse any further header once it has
        // failed, so no recorded offset is trusted after a rebuild.
        for entry in &mut self.entries {
            entry.demote();
        }
        debug!(
            "Rebuilt index through fallback: {} entries ({} from primary)",
            self.entries.len(),
            known
        );
    }
}

fn enumerate_primary(primary: &mut PrimaryDecoder, entries: &mut Vec<Entry>) -> Result<()> {
    while let Some(name) = primary.next_header()? {
        entries.push(Entry::new(name, Locator::Primary(primary.header_position())));
    }
    Ok(())
}
