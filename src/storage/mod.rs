// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Persistent state of the privileged process, rooted at `DATA_DIR`.
//!
//! ## Storage Layout
//!
//! ```text
//! {DATA_DIR}/
//!   state/
//!     connected_sites.json   # {"connectedSites": [...]}
//!   accounts/{account_id}/
//!     meta.json              # Account metadata (address, label, assets)
//!     key.pem                # Private key (NEVER exposed via API)
//!   audit/
//!     {date}/events.jsonl    # Daily audit logs
//! ```

pub mod accounts;
pub mod audit;
pub mod fs;
pub mod paths;
pub mod sites;

pub use accounts::{AccountMetadata, AccountRepository};
pub use audit::{AuditEvent, AuditEventType, AuditRepository};
pub use fs::{FileStorage, StorageError, StorageResult};
pub use paths::StoragePaths;
pub use sites::{ConnectedSitesRecord, ConnectedSitesRepository};
