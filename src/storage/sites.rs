// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Persisted Authorization Set: `state/connected_sites.json`.

use serde::{Deserialize, Serialize};

use super::{FileStorage, StorageError, StorageResult};

/// On-disk record `{"connectedSites": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedSitesRecord {
    #[serde(default)]
    pub connected_sites: Vec<String>,
}

pub struct ConnectedSitesRepository<'a> {
    storage: &'a FileStorage,
}

impl<'a> ConnectedSitesRepository<'a> {
    pub fn new(storage: &'a FileStorage) -> Self {
        Self { storage }
    }

    /// Load the record; a missing file is an empty set.
    pub fn load(&self) -> StorageResult<ConnectedSitesRecord> {
        match self.storage.read_json(self.storage.paths().connected_sites()) {
            Ok(record) => Ok(record),
            Err(StorageError::NotFound(_)) => Ok(ConnectedSitesRecord::default()),
            Err(e) => Err(e),
        }
    }

    pub fn save(&self, record: &ConnectedSitesRecord) -> StorageResult<()> {
        self.storage
            .write_json(self.storage.paths().connected_sites(), record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::fs::test_storage;

    #[test]
    fn missing_file_loads_empty() {
        let (_dir, storage) = test_storage();
        let repo = ConnectedSitesRepository::new(&storage);
        assert_eq!(repo.load().unwrap(), ConnectedSitesRecord::default());
    }

    #[test]
    fn save_writes_camel_case_document() {
        let (_dir, storage) = test_storage();
        let repo = ConnectedSitesRepository::new(&storage);
        let record = ConnectedSitesRecord {
            connected_sites: vec!["https://dapp.test".to_string()],
        };
        repo.save(&record).unwrap();

        let raw = storage.read_raw(storage.paths().connected_sites()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"connectedSites": ["https://dapp.test"]})
        );
        assert_eq!(repo.load().unwrap(), record);
    }
}
