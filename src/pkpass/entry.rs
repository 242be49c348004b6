// src/pkpass/entry.rs

//! Package entries and the ordered entry list
//!
//! Order is part of the package contract: the manifest lists entries in the
//! order they were added, and the archive writes local and central records
//! in that same order. [`EntryList`] keeps insertion order explicitly and
//! refuses duplicate names instead of silently replacing a payload.

use std::collections::HashSet;

use super::archive::ArchiveError;

/// A named payload inside a pass package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageEntry {
    name: String,
    payload: Vec<u8>,
}

impl PackageEntry {
    /// Create an entry from a name and its payload
    pub fn new(name: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            payload: payload.into(),
        }
    }

    /// Entry name (path inside the archive)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entry payload
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Insertion-ordered list of uniquely named entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryList {
    entries: Vec<PackageEntry>,
    names: HashSet<String>,
}

impl EntryList {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry; fails if the name is already present
    pub fn push(&mut self, entry: PackageEntry) -> Result<(), ArchiveError> {
        if !self.names.insert(entry.name().to_string()) {
            return Err(ArchiveError::DuplicateEntry(entry.name().to_string()));
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Append a named payload; fails if the name is already present
    pub fn add(
        &mut self,
        name: impl Into<String>,
        payload: impl Into<Vec<u8>>,
    ) -> Result<(), ArchiveError> {
        self.push(PackageEntry::new(name, payload))
    }

    /// Whether an entry with this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Look up an entry by name
    pub fn get(&self, name: &str) -> Option<&PackageEntry> {
        self.entries.iter().find(|e| e.name() == name)
    }

    /// Entries in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, PackageEntry> {
        self.entries.iter()
    }

    /// Entry names in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(PackageEntry::name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn as_slice(&self) -> &[PackageEntry] {
        &self.entries
    }
}

impl<'a> IntoIterator for &'a EntryList {
    type Item = &'a PackageEntry;
    type IntoIter = std::slice::Iter<'a, PackageEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preserves_insertion_order() {
        let mut list = EntryList::new();
        list.add("pass.json", b"{}".to_vec()).unwrap();
        list.add("logo.png", vec![1, 2, 3]).unwrap();
        list.add("icon.png", vec![4]).unwrap();

        let names: Vec<_> = list.names().collect();
        assert_eq!(names, vec!["pass.json", "logo.png", "icon.png"]);
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let mut list = EntryList::new();
        list.add("logo.png", vec![1]).unwrap();

        let err = list.add("logo.png", vec![2]).unwrap_err();
        assert!(matches!(err, ArchiveError::DuplicateEntry(name) if name == "logo.png"));
        assert_eq!(list.len(), 1);
        assert_eq!(list.get("logo.png").unwrap().payload(), &[1]);
    }
}
