// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::approval_queue::ApprovalQueue;
use crate::broker::Broker;
use crate::storage::FileStorage;
use crate::wallet::LocalWallet;

/// Shared handles for the daemon's axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub broker: Arc<Broker>,
    pub approvals: Arc<ApprovalQueue>,
    pub wallet: Arc<LocalWallet>,
    pub storage: Arc<FileStorage>,
}

impl AppState {
    pub fn new(
        broker: Arc<Broker>,
        approvals: Arc<ApprovalQueue>,
        wallet: Arc<LocalWallet>,
        storage: Arc<FileStorage>,
    ) -> Self {
        Self {
            broker,
            approvals,
            wallet,
            storage,
        }
    }
}
