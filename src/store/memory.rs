// src/store/memory.rs

//! In-process state store

use std::collections::HashMap;

use parking_lot::Mutex;

use super::{PassRecord, StateStore, StoreError};

/// Pass records held in a mutex-guarded map
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    records: Mutex<HashMap<String, PassRecord>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl StateStore for MemoryStateStore {
    fn get(&self, serial: &str) -> Result<Option<PassRecord>, StoreError> {
        Ok(self.records.lock().get(serial).cloned())
    }

    fn put(&self, serial: &str, record: &PassRecord) -> Result<(), StoreError> {
        self.records
            .lock()
            .insert(serial.to_string(), record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_put() {
        let store = MemoryStateStore::new();
        assert!(store.get("s1").unwrap().is_none());

        let record = PassRecord::new("Ada", "tok", 10);
        store.put("s1", &record).unwrap();
        assert_eq!(store.get("s1").unwrap(), Some(record.clone()));

        let mut updated = record;
        updated.balance = 5.0;
        store.put("s1", &updated).unwrap();
        assert_eq!(store.get("s1").unwrap().unwrap().balance, 5.0);
        assert_eq!(store.len(), 1);
    }
}
