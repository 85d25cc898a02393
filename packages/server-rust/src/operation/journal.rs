//! Undo log for atomic custom operations.
//!
//! The journal records the first-observed state of each `(resource, id)`
//! pair touched by an operation. Later mutations of the same item are not
//! recorded again, so unwinding restores the state from before the
//! operation started.

use std::collections::HashSet;

use mockgrid_core::{EngineError, ResourceItem};

use crate::storage::StateStore;

/// Prior state of a journaled item.
#[derive(Debug, Clone, PartialEq)]
pub enum Prior {
    /// The item did not exist; undo deletes it.
    Absent,
    /// Deep copy of the item before the first mutation; undo overwrites.
    Snapshot(ResourceItem),
}

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    resource: String,
    id: String,
    prior: Prior,
}

/// Insertion-ordered list of prior item states.
#[derive(Debug, Default)]
pub struct RollbackJournal {
    entries: Vec<Entry>,
    touched: HashSet<(String, String)>,
}

impl RollbackJournal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `item` as it was before a mutation. Ignored if the item was
    /// already journaled.
    pub fn record_snapshot(&mut self, resource: &str, item: &ResourceItem) {
        self.record(resource, &item.id, || Prior::Snapshot(item.clone()));
    }

    /// Records that `id` did not exist before a create. Ignored if already
    /// journaled.
    pub fn record_absent(&mut self, resource: &str, id: &str) {
        self.record(resource, id, || Prior::Absent);
    }

    fn record(&mut self, resource: &str, id: &str, prior: impl FnOnce() -> Prior) {
        if self.touched.insert((resource.to_string(), id.to_string())) {
            self.entries.push(Entry {
                resource: resource.to_string(),
                id: id.to_string(),
                prior: prior(),
            });
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Prior state recorded for `(resource, id)`, if any.
    #[must_use]
    pub fn prior(&self, resource: &str, id: &str) -> Option<&Prior> {
        self.entries
            .iter()
            .find(|e| e.resource == resource && e.id == id)
            .map(|e| &e.prior)
    }

    /// Undoes every entry in reverse insertion order, consuming the journal.
    ///
    /// All entries are attempted even if some fail. Returns the number of
    /// entries undone.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Internal`] listing every entry that could not
    /// be undone, which only happens when a resource was unregistered while
    /// the operation ran.
    pub fn rollback(self, store: &StateStore) -> Result<usize, EngineError> {
        let mut undone = 0;
        let mut failures = Vec::new();

        for entry in self.entries.into_iter().rev() {
            let Some(resource) = store.get(&entry.resource) else {
                failures.push(format!(
                    "resource '{}' disappeared before item '{}' could be restored",
                    entry.resource, entry.id
                ));
                continue;
            };
            match entry.prior {
                Prior::Absent => {
                    resource.discard(&entry.id);
                }
                Prior::Snapshot(item) => resource.restore(item),
            }
            undone += 1;
        }

        if failures.is_empty() {
            tracing::debug!(undone, "rollback journal unwound");
            Ok(undone)
        } else {
            Err(EngineError::internal(failures.join("; ")))
        }
    }
}
