// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path utilities for the data directory layout.

use std::path::{Path, PathBuf};

/// Name of the persisted authorization document.
pub const CONNECTED_SITES_FILE: &str = "connected_sites.json";

#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl StoragePaths {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // ========== Broker State ==========

    pub fn state_dir(&self) -> PathBuf {
        self.root.join("state")
    }

    /// `state/connected_sites.json`.
    pub fn connected_sites(&self) -> PathBuf {
        self.state_dir().join(CONNECTED_SITES_FILE)
    }

    // ========== Account Paths ==========

    pub fn accounts_dir(&self) -> PathBuf {
        self.root.join("accounts")
    }

    pub fn account_dir(&self, account_id: &str) -> PathBuf {
        self.accounts_dir().join(account_id)
    }

    pub fn account_meta(&self, account_id: &str) -> PathBuf {
        self.account_dir(account_id).join("meta.json")
    }

    /// Private key file. Never exposed via API.
    pub fn account_key(&self, account_id: &str) -> PathBuf {
        self.account_dir(account_id).join("key.pem")
    }

    // ========== Audit Log Paths ==========

    pub fn audit_dir(&self) -> PathBuf {
        self.root.join("audit")
    }

    pub fn audit_date_dir(&self, date: &str) -> PathBuf {
        self.audit_dir().join(date)
    }

    /// Daily audit events file (JSONL).
    pub fn audit_events_file(&self, date: &str) -> PathBuf {
        self.audit_date_dir(date).join("events.jsonl")
    }
}
