//! Selection registry.
//!
//! Keyed by [`IdentityKey`], never by row position, so re-rendering or
//! re-sorting the batch cannot shift what is selected. Entries keep the
//! order in which they were first selected.

use musicdl_proto::model::{IdentityKey, MediaItem};

#[derive(Debug, Clone, PartialEq)]
pub struct SelectionEntry {
    pub key: IdentityKey,
    pub source: String,
    pub item: MediaItem,
}

impl SelectionEntry {
    fn new(item: &MediaItem) -> Self {
        Self {
            key: item.key(),
            source: item.source.clone(),
            item: item.clone(),
        }
    }
}

#[derive(Debug, Default)]
pub struct SelectionRegistry {
    entries: Vec<SelectionEntry>,
}

impl SelectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert (`included`) or remove the entry for `item`'s key.
    pub fn toggle(&mut self, item: &MediaItem, included: bool) {
        let key = item.key();
        let existing = self.entries.iter().position(|e| e.key == key);
        match (included, existing) {
            (true, Some(pos)) => self.entries[pos] = SelectionEntry::new(item),
            (true, None) => self.entries.push(SelectionEntry::new(item)),
            (false, Some(pos)) => {
                self.entries.remove(pos);
            }
            (false, None) => {}
        }
    }

    /// Replace the registry with one entry per item of `batch`.
    pub fn select_all(&mut self, batch: &[MediaItem]) {
        self.entries.clear();
        for item in batch {
            self.toggle(item, true);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn contains(&self, key: &IdentityKey) -> bool {
        self.entries.iter().any(|e| &e.key == key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[SelectionEntry] {
        &self.entries
    }

    /// Items to hand to the orchestrator, in selection order.
    pub fn snapshot(&self) -> Vec<MediaItem> {
        self.entries.iter().map(|e| e.item.clone()).collect()
    }
}
