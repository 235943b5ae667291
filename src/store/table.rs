//! Association table
//!
//! In-memory view of the live associations, rebuilt from the record file on
//! open and kept in step with every append.

use std::collections::{btree_map, BTreeMap, HashMap};

/// One stored fact: a search string linked to a filename at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Association {
    pub search_string: String,
    pub filename: String,
    /// Unix milliseconds of the last expand for this pair
    pub timestamp: u64,
}

/// Live associations in first-insertion order
///
/// - `slots`: slot → association, ordered by insertion (scan order)
/// - `files`: filename → (search string → slot), for pair lookups and
///   per-file removal
#[derive(Debug, Default)]
pub struct AssociationTable {
    slots: BTreeMap<u64, Association>,
    files: BTreeMap<String, HashMap<String, u64>>,
    next_slot: u64,
}

impl AssociationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pair or overwrite its timestamp.
    ///
    /// Returns true if the pair was new.
    pub fn upsert(&mut self, search_string: &str, filename: &str, timestamp: u64) -> bool {
        if let Some(&slot) = self
            .files
            .get(filename)
            .and_then(|keywords| keywords.get(search_string))
        {
            if let Some(existing) = self.slots.get_mut(&slot) {
                existing.timestamp = timestamp;
            }
            return false;
        }

        let slot = self.next_slot;
        self.next_slot += 1;

        self.slots.insert(
            slot,
            Association {
                search_string: search_string.to_string(),
                filename: filename.to_string(),
                timestamp,
            },
        );
        self.files
            .entry(filename.to_string())
            .or_default()
            .insert(search_string.to_string(), slot);

        true
    }

    /// Current timestamp of a pair, if present
    pub fn get(&self, search_string: &str, filename: &str) -> Option<u64> {
        let slot = self.files.get(filename)?.get(search_string)?;
        self.slots.get(slot).map(|a| a.timestamp)
    }

    /// Remove every association for `filename`, returning how many went away
    pub fn remove_file(&mut self, filename: &str) -> usize {
        match self.files.remove(filename) {
            Some(keywords) => {
                for slot in keywords.values() {
                    self.slots.remove(slot);
                }
                keywords.len()
            }
            None => 0,
        }
    }

    /// True if at least one association references `filename`
    pub fn contains_file(&self, filename: &str) -> bool {
        self.files.contains_key(filename)
    }

    /// All associations in insertion order
    pub fn iter(&self) -> btree_map::Values<'_, u64, Association> {
        self.slots.values()
    }

    /// Associations for one filename, in insertion order
    pub fn iter_file<'a>(&'a self, filename: &str) -> impl Iterator<Item = &'a Association> + 'a {
        let mut slots: Vec<u64> = self
            .files
            .get(filename)
            .map(|keywords| keywords.values().copied().collect())
            .unwrap_or_default();
        slots.sort_unstable();

        slots.into_iter().filter_map(move |slot| self.slots.get(&slot))
    }

    /// Filenames in sorted order, each with its keyword count
    pub fn files(&self) -> impl Iterator<Item = (&str, usize)> {
        self.files
            .iter()
            .map(|(filename, keywords)| (filename.as_str(), keywords.len()))
    }

    /// Number of associations
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of distinct filenames
    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}
