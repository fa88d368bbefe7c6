// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository for locally held wallet accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{FileStorage, StorageError, StorageResult};
use crate::protocol::Asset;
use crate::wallet::signing::generate_keypair;

/// Persisted metadata for one account. The key lives next to it in `key.pem`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AccountMetadata {
    pub account_id: String,
    pub address: String,
    pub label: Option<String>,
    /// Static holdings reported through `GET_ASSETS`.
    #[serde(default)]
    pub assets: Vec<Asset>,
    pub created_at: DateTime<Utc>,
}

pub struct AccountRepository<'a> {
    storage: &'a FileStorage,
}

impl<'a> AccountRepository<'a> {
    pub fn new(storage: &'a FileStorage) -> Self {
        Self { storage }
    }

    pub fn exists(&self, account_id: &str) -> bool {
        self.storage
            .exists(self.storage.paths().account_meta(account_id))
    }

    pub fn get(&self, account_id: &str) -> StorageResult<AccountMetadata> {
        let path = self.storage.paths().account_meta(account_id);
        if !self.storage.exists(&path) {
            return Err(StorageError::NotFound(format!("Account {account_id}")));
        }
        self.storage.read_json(path)
    }

    /// All accounts, oldest first.
    pub fn list(&self) -> StorageResult<Vec<AccountMetadata>> {
        let mut accounts = Vec::new();
        for account_id in self.storage.list_dirs(self.storage.paths().accounts_dir())? {
            match self.get(&account_id) {
                Ok(meta) => accounts.push(meta),
                Err(e) => {
                    tracing::warn!(account_id = %account_id, error = %e, "Skipping unreadable account");
                }
            }
        }
        accounts.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(accounts)
    }

    /// Generate a key and persist a new account.
    pub fn create(
        &self,
        label: Option<String>,
        assets: Vec<Asset>,
    ) -> StorageResult<AccountMetadata> {
        let (private_key_pem, address) = generate_keypair()
            .map_err(|e| StorageError::Encoding(format!("key generation failed: {e}")))?;

        let metadata = AccountMetadata {
            account_id: uuid::Uuid::new_v4().to_string(),
            address,
            label,
            assets,
            created_at: Utc::now(),
        };

        let paths = self.storage.paths();
        if self.exists(&metadata.account_id) {
            return Err(StorageError::AlreadyExists(format!(
                "Account {}",
                metadata.account_id
            )));
        }
        self.storage.create_dir(paths.account_dir(&metadata.account_id))?;
        self.storage
            .write_raw(paths.account_key(&metadata.account_id), private_key_pem.as_bytes())?;
        self.storage
            .write_json(paths.account_meta(&metadata.account_id), &metadata)?;

        Ok(metadata)
    }

    /// Private key bytes (PEM).
    pub fn read_private_key(&self, account_id: &str) -> StorageResult<Vec<u8>> {
        let path = self.storage.paths().account_key(account_id);
        if !self.storage.exists(&path) {
            return Err(StorageError::NotFound(format!(
                "Private key for account {account_id}"
            )));
        }
        self.storage.read_raw(path)
    }
}
