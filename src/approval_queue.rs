// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Approval Surface backed by the daemon API.
//!
//! Each opened surface is a queue entry that a wallet UI polls through
//! `/v1/approvals` and answers with resolve, reject or close. Close is the
//! user dismissing the surface without a decision and is reported to the
//! Broker as [`SurfaceEvent::Closed`].

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use utoipa::ToSchema;

use crate::broker::{
    ApprovalDescriptor, ApprovalHandle, ApprovalResult, ApprovalSurface, SurfaceEvent, SurfaceId,
};
use crate::error::BridgeError;

struct OpenApproval {
    descriptor: ApprovalDescriptor,
    handle: ApprovalHandle,
    opened_at: DateTime<Utc>,
}

/// Queue entry as shown to the wallet UI.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalView {
    #[schema(value_type = String)]
    pub surface_id: SurfaceId,
    pub opened_at: DateTime<Utc>,
    pub request: ApprovalDescriptor,
}

pub struct ApprovalQueue {
    open: RwLock<HashMap<SurfaceId, OpenApproval>>,
    closed_tx: mpsc::UnboundedSender<SurfaceEvent>,
}

impl std::fmt::Debug for ApprovalQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalQueue").finish_non_exhaustive()
    }
}

impl ApprovalQueue {
    /// Create the queue and the receiver the Broker drains for close events.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SurfaceEvent>) {
        let (closed_tx, closed_rx) = mpsc::unbounded_channel();
        (
            Self {
                open: RwLock::new(HashMap::new()),
                closed_tx,
            },
            closed_rx,
        )
    }

    fn view(surface_id: &SurfaceId, entry: &OpenApproval) -> ApprovalView {
        ApprovalView {
            surface_id: surface_id.clone(),
            opened_at: entry.opened_at,
            request: entry.descriptor.clone(),
        }
    }

    /// Open surfaces, oldest first.
    pub async fn list(&self) -> Vec<ApprovalView> {
        let open = self.open.read().await;
        let mut views: Vec<_> = open
            .iter()
            .map(|(surface_id, entry)| Self::view(surface_id, entry))
            .collect();
        views.sort_by(|a, b| a.opened_at.cmp(&b.opened_at));
        views
    }

    pub async fn get(&self, surface_id: &SurfaceId) -> Option<ApprovalView> {
        let open = self.open.read().await;
        open.get(surface_id)
            .map(|entry| Self::view(surface_id, entry))
    }

    pub async fn len(&self) -> usize {
        self.open.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.open.read().await.is_empty()
    }

    /// Answer the surface with approval. Returns `false` when the surface is
    /// unknown or its request already settled.
    pub async fn resolve(&self, surface_id: &SurfaceId, result: ApprovalResult) -> bool {
        match self.take(surface_id).await {
            Some(entry) => entry.handle.resolve(result),
            None => false,
        }
    }

    pub async fn reject(&self, surface_id: &SurfaceId, reason: impl Into<String>) -> bool {
        match self.take(surface_id).await {
            Some(entry) => entry.handle.reject(reason),
            None => false,
        }
    }

    /// User dismissed the surface without deciding.
    pub async fn close(&self, surface_id: &SurfaceId) -> bool {
        if self.take(surface_id).await.is_none() {
            return false;
        }
        if self
            .closed_tx
            .send(SurfaceEvent::Closed(surface_id.clone()))
            .is_err()
        {
            tracing::warn!(surface_id = %surface_id, "Surface close event has no listener");
        }
        true
    }

    async fn take(&self, surface_id: &SurfaceId) -> Option<OpenApproval> {
        self.open.write().await.remove(surface_id)
    }
}

#[async_trait]
impl ApprovalSurface for ApprovalQueue {
    async fn open(
        &self,
        descriptor: ApprovalDescriptor,
        handle: ApprovalHandle,
    ) -> Result<SurfaceId, BridgeError> {
        let surface_id = SurfaceId::generate();
        tracing::info!(
            surface_id = %surface_id,
            request_id = %descriptor.request_id,
            origin = %descriptor.origin,
            "Approval queued"
        );
        self.open.write().await.insert(
            surface_id.clone(),
            OpenApproval {
                descriptor,
                handle,
                opened_at: Utc::now(),
            },
        );
        Ok(surface_id)
    }

    async fn dismiss(&self, surface_id: &SurfaceId) {
        if self.take(surface_id).await.is_some() {
            tracing::debug!(surface_id = %surface_id, "Approval dismissed");
        }
    }
}
