// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Origin Authorization Set.
//!
//! Owned by the Broker and mutated only through [`AuthorizationSet::authorize`]
//! and [`AuthorizationSet::revoke`]. Every mutation rewrites
//! `state/connected_sites.json`; a failed write is logged and never fails the
//! request that caused it.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::BridgeError;
use crate::protocol::Origin;
use crate::storage::{ConnectedSitesRecord, ConnectedSitesRepository, FileStorage};

#[derive(Debug, Default)]
pub struct AuthorizationSet {
    sites: RwLock<BTreeSet<Origin>>,
    storage: Option<Arc<FileStorage>>,
}

impl AuthorizationSet {
    /// Unpersisted set, for embedders and tests.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the persisted set. Entries that no longer parse as origins are
    /// dropped with a warning.
    pub fn load(storage: Arc<FileStorage>) -> Result<Self, BridgeError> {
        let record = ConnectedSitesRepository::new(&storage).load()?;

        let mut sites = BTreeSet::new();
        for raw in record.connected_sites {
            match Origin::parse(&raw) {
                Ok(origin) => {
                    sites.insert(origin);
                }
                Err(e) => tracing::warn!(site = %raw, error = %e, "Ignoring invalid persisted site"),
            }
        }
        tracing::info!(count = sites.len(), "Loaded connected sites");

        Ok(Self {
            sites: RwLock::new(sites),
            storage: Some(storage),
        })
    }

    pub async fn contains(&self, origin: &Origin) -> bool {
        self.sites.read().await.contains(origin)
    }

    /// Add `origin`. Returns `true` when it was not present before.
    pub async fn authorize(&self, origin: &Origin) -> bool {
        let mut sites = self.sites.write().await;
        let added = sites.insert(origin.clone());
        if added {
            self.persist(&sites);
        }
        added
    }

    /// Remove `origin`. Returns `true` when it was present.
    pub async fn revoke(&self, origin: &Origin) -> bool {
        let mut sites = self.sites.write().await;
        let removed = sites.remove(origin);
        if removed {
            self.persist(&sites);
        }
        removed
    }

    pub async fn sites(&self) -> Vec<Origin> {
        self.sites.read().await.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.sites.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sites.read().await.is_empty()
    }

    // Runs under the write lock so writes land in mutation order.
    fn persist(&self, sites: &BTreeSet<Origin>) {
        let Some(storage) = &self.storage else {
            return;
        };
        let record = ConnectedSitesRecord {
            connected_sites: sites.iter().map(|o| o.to_string()).collect(),
        };
        if let Err(e) = ConnectedSitesRepository::new(storage).save(&record) {
            tracing::warn!(error = %e, "Failed to persist connected sites");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::fs::test_storage;

    fn origin(s: &str) -> Origin {
        Origin::parse(s).unwrap()
    }

    #[tokio::test]
    async fn authorize_and_revoke_persist() {
        let (_dir, storage) = test_storage();
        let storage = Arc::new(storage);
        let set = AuthorizationSet::load(storage.clone()).unwrap();

        assert!(set.authorize(&origin("https://dapp.test")).await);
        assert!(!set.authorize(&origin("https://dapp.test")).await);
        assert!(set.contains(&origin("https://dapp.test")).await);

        let reloaded = AuthorizationSet::load(storage.clone()).unwrap();
        assert_eq!(reloaded.sites().await, vec![origin("https://dapp.test")]);

        assert!(set.revoke(&origin("https://dapp.test")).await);
        let reloaded = AuthorizationSet::load(storage).unwrap();
        assert!(reloaded.is_empty().await);
    }

    #[tokio::test]
    async fn revoke_of_absent_origin_is_harmless() {
        let set = AuthorizationSet::in_memory();
        set.authorize(&origin("https://a.test")).await;

        assert!(!set.revoke(&origin("https://b.test")).await);
        assert_eq!(set.sites().await, vec![origin("https://a.test")]);
    }

    #[tokio::test]
    async fn revoke_of_absent_origin_leaves_file_untouched() {
        let (_dir, storage) = test_storage();
        let storage = Arc::new(storage);
        let set = AuthorizationSet::load(storage.clone()).unwrap();

        assert!(!set.revoke(&origin("https://never.test")).await);
        assert!(!storage.exists(storage.paths().connected_sites()));
    }

    #[tokio::test]
    async fn invalid_persisted_entries_are_skipped() {
        let (_dir, storage) = test_storage();
        ConnectedSitesRepository::new(&storage)
            .save(&ConnectedSitesRecord {
                connected_sites: vec!["https://ok.test".into(), "garbage".into()],
            })
            .unwrap();

        let set = AuthorizationSet::load(Arc::new(storage)).unwrap();
        assert_eq!(set.sites().await, vec![origin("https://ok.test")]);
    }
}
