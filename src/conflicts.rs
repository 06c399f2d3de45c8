//! Conflict queue for quote sync.
//!
//! Holds the divergences found by the merge engine until they are resolved.
//! Resolution always keeps the remote copy and discards the local one.

use crate::error::QuoteResult;
use crate::models::ConflictEntry;
use crate::persistence::Persistence;
use crate::store::LocalStore;

/// Unresolved conflicts, in detection order
#[derive(Debug, Clone, Default)]
pub struct ConflictQueue {
    entries: Vec<ConflictEntry>,
}

impl ConflictQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore the queue saved alongside the store
    pub fn load(persistence: &dyn Persistence) -> QuoteResult<Self> {
        let entries = persistence.load_conflicts()?.unwrap_or_default();
        Ok(Self { entries })
    }

    pub fn save(&self, persistence: &dyn Persistence) -> QuoteResult<()> {
        persistence.save_conflicts(&self.entries)
    }

    pub fn enqueue(&mut self, entry: ConflictEntry) {
        tracing::debug!("Queued conflict for quote {}", entry.id);
        self.entries.push(entry);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[ConflictEntry] {
        &self.entries
    }

    /// Resolve every queued conflict in favor of the remote copy.
    ///
    /// Each entry's id is looked up in the store; a live record is overwritten
    /// with the remote copy and its conflict flag cleared. Entries whose quote
    /// no longer exists are dropped. Returns the number of entries processed;
    /// the queue is empty afterwards. The store is not persisted here.
    ///
    /// The queued remote copy is written even when a newer version replaced
    /// the record after the conflict was queued, so the version can go down.
    pub fn resolve_all(&mut self, store: &mut LocalStore) -> usize {
        let entries = std::mem::take(&mut self.entries);
        let count = entries.len();

        for entry in entries {
            match store.get_mut(&entry.id) {
                Some(quote) => {
                    *quote = entry.remote;
                    quote.conflict = false;
                }
                None => {
                    tracing::debug!("Dropping conflict for missing quote {}", entry.id);
                }
            }
        }

        count
    }
}
