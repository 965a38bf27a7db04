use dashmap::DashSet;

use crate::message::SymbolId;

/// Process-wide set of breakpoint symbols
///
/// Readers on worker threads may run concurrently with writers; a reader
/// sees each symbol either before or after a concurrent update.
#[derive(Debug, Default)]
pub struct BreakpointSet {
    ids: DashSet<SymbolId>,
}

impl BreakpointSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, ids: impl IntoIterator<Item = SymbolId>) {
        for id in ids {
            self.ids.insert(id);
        }
    }

    pub fn remove(&self, ids: impl IntoIterator<Item = SymbolId>) {
        for id in ids {
            self.ids.remove(&id);
        }
    }

    /// Replace the set with exactly `ids`
    pub fn set(&self, ids: impl IntoIterator<Item = SymbolId>) {
        let ids: Vec<SymbolId> = ids.into_iter().collect();
        self.ids.retain(|id| ids.contains(id));
        self.add(ids);
    }

    pub fn contains(&self, id: &SymbolId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Sorted copy of the current set
    pub fn snapshot(&self) -> Vec<SymbolId> {
        let mut ids: Vec<_> = self.ids.iter().map(|id| id.key().clone()).collect();
        ids.sort();
        ids
    }
}
