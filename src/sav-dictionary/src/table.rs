use ahash::AHashMap;

use crate::entry::Entry;
use crate::error::DictionaryError;

/// One namespace's forward (name → code) and inverse (code → entry) tables.
/// The inverse table supports tombstoned gaps: a header `IDX=` can place an
/// entry at an explicit code, leaving earlier unused codes as `None` rather
/// than shifting later entries.
#[derive(Debug, Clone, Default)]
pub struct Table {
    forward: AHashMap<String, u32>,
    inverse: Vec<Option<Entry>>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inverse.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inverse.is_empty()
    }

    /// Register `entry` at the next free code, appending to the inverse table.
    pub fn insert(&mut self, entry: Entry) -> Result<u32, DictionaryError> {
        if let Some(&existing) = self.forward.get(&entry.name) {
            return Err(DictionaryError::DuplicateName(entry.name, existing));
        }
        let code = self.inverse.len() as u32;
        self.forward.insert(entry.name.clone(), code);
        self.inverse.push(Some(entry));
        Ok(code)
    }

    /// Register `entry` at an explicit code (a header `IDX=` value), padding
    /// any unused lower codes with tombstones.
    pub fn insert_at(&mut self, code: u32, entry: Entry) -> Result<(), DictionaryError> {
        if let Some(&existing) = self.forward.get(&entry.name) {
            return Err(DictionaryError::DuplicateName(entry.name, existing));
        }
        let idx = code as usize;
        if idx < self.inverse.len() {
            if self.inverse[idx].is_some() {
                return Err(DictionaryError::IndexCollision(code));
            }
        } else {
            self.inverse.resize(idx + 1, None);
        }
        self.forward.insert(entry.name.clone(), code);
        self.inverse[idx] = Some(entry);
        Ok(())
    }

    /// Reserve `code` as a pre-populated tombstone-free slot (used to seed
    /// `PASS` at code 0 before any header line registers it).
    pub fn insert_reserved(&mut self, code: u32, entry: Entry) {
        let idx = code as usize;
        if idx >= self.inverse.len() {
            self.inverse.resize(idx + 1, None);
        }
        self.forward.insert(entry.name.clone(), code);
        self.inverse[idx] = Some(entry);
    }

    pub fn code_of(&self, name: &str) -> Option<u32> {
        self.forward.get(name).copied()
    }

    pub fn resolve(&self, code: u32) -> Result<&Entry, DictionaryError> {
        self.inverse
            .get(code as usize)
            .and_then(Option::as_ref)
            .ok_or(DictionaryError::UnresolvedCode(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Entry;
    use pretty_assertions::assert_eq;

    #[test]
    fn insert_assigns_sequential_codes() {
        let mut t = Table::new();
        assert_eq!(t.insert(Entry::new("chr1")).unwrap(), 0);
        assert_eq!(t.insert(Entry::new("chr2")).unwrap(), 1);
        assert_eq!(t.code_of("chr1"), Some(0));
    }

    #[test]
    fn duplicate_name_is_an_error() {
        let mut t = Table::new();
        t.insert(Entry::new("chr1")).unwrap();
        assert!(matches!(t.insert(Entry::new("chr1")), Err(DictionaryError::DuplicateName(_, 0))));
    }

    #[test]
    fn explicit_idx_leaves_tombstoned_gaps() {
        let mut t = Table::new();
        t.insert_at(3, Entry::new("DP")).unwrap();
        assert!(matches!(t.resolve(0), Err(DictionaryError::UnresolvedCode(0))));
        assert!(matches!(t.resolve(1), Err(DictionaryError::UnresolvedCode(1))));
        assert_eq!(t.resolve(3).unwrap().name, "DP");
        assert_eq!(t.len(), 4);
    }

    #[test]
    fn unresolved_code_is_a_hard_error() {
        let t = Table::new();
        assert!(matches!(t.resolve(0), Err(DictionaryError::UnresolvedCode(0))));
    }
}
