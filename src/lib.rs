// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Quasar Bridge - cross-context wallet request relay
//!
//! Lets an untrusted page ask the wallet for accounts, signatures and
//! transfers without ever touching keys. Requests travel
//! Client → Relay → Broker; connect and send requests wait for a human
//! decision on an Approval Surface.
//!
//! ## Modules
//!
//! - `protocol` - Message shapes, the Operation Registry, typed requests
//! - `page` - Same-page message bus shared by the Client and the Relay
//! - `correlation` - Request/response matching with timeout
//! - `client` - Page-facing wallet API
//! - `relay` - Registry-driven forwarding and the Broker transports
//! - `broker` - Authorization Set, Pending Request Table, dispatch
//! - `approval_queue` - HTTP-backed Approval Surface
//! - `wallet` - Wallet-data/signing collaborator
//! - `storage` - JSON file persistence and audit log
//! - `api` - Daemon HTTP handlers (Axum)

pub mod api;
pub mod approval_queue;
pub mod broker;
pub mod client;
pub mod config;
pub mod correlation;
pub mod error;
pub mod logging;
pub mod page;
pub mod protocol;
pub mod relay;
pub mod state;
pub mod storage;
pub mod wallet;
