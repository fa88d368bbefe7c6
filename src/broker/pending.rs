// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Pending Request Table.
//!
//! One entry per escalation. [`PendingRequests::settle`] removes the entry
//! under the lock before acting, so whichever of resolve, reject,
//! surface-closed or timeout gets there first is the only one that does
//! anything. Removal also cancels the timer and drops the surface-closed
//! mapping in the same step.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use super::approval::{ApprovalDescriptor, RequestId, Settlement, SurfaceId};

struct PendingEntry {
    descriptor: ApprovalDescriptor,
    created_at: DateTime<Utc>,
    settle_tx: oneshot::Sender<Settlement>,
    timer: CancellationToken,
    surface: Option<SurfaceId>,
}

#[derive(Default)]
struct PendingInner {
    entries: HashMap<RequestId, PendingEntry>,
    /// Surface-closed listeners, keyed by the surface they watch.
    surfaces: HashMap<SurfaceId, RequestId>,
}

#[derive(Default)]
pub struct PendingRequests {
    inner: Mutex<PendingInner>,
}

impl std::fmt::Debug for PendingRequests {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRequests")
            .field("len", &self.len())
            .finish()
    }
}

impl PendingRequests {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, PendingInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create an entry and arm its timeout. The receiver yields the single
    /// terminal transition.
    pub fn insert(
        self: &Arc<Self>,
        descriptor: ApprovalDescriptor,
        timeout: Duration,
    ) -> oneshot::Receiver<Settlement> {
        let (settle_tx, settle_rx) = oneshot::channel();
        let timer = CancellationToken::new();
        let request_id = descriptor.request_id.clone();

        self.lock().entries.insert(
            request_id.clone(),
            PendingEntry {
                created_at: descriptor.created_at,
                descriptor,
                settle_tx,
                timer: timer.clone(),
                surface: None,
            },
        );

        let table = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = timer.cancelled() => {}
                _ = tokio::time::sleep(timeout) => {
                    if let Some(table) = table.upgrade() {
                        if table.settle(&request_id, Settlement::TimedOut) {
                            tracing::info!(request_id = %request_id, "Pending request timed out");
                        }
                    }
                }
            }
        });

        settle_rx
    }

    /// Register the surface-closed listener for an entry. Returns `false`
    /// when the entry already settled.
    pub fn attach_surface(&self, request_id: &RequestId, surface_id: SurfaceId) -> bool {
        let mut inner = self.lock();
        let Some(entry) = inner.entries.get_mut(request_id) else {
            return false;
        };
        entry.surface = Some(surface_id.clone());
        inner.surfaces.insert(surface_id, request_id.clone());
        true
    }

    /// Apply a terminal transition. Returns `false` when the entry is gone.
    pub fn settle(&self, request_id: &RequestId, settlement: Settlement) -> bool {
        let entry = {
            let mut inner = self.lock();
            let Some(entry) = inner.entries.remove(request_id) else {
                return false;
            };
            if let Some(surface_id) = &entry.surface {
                inner.surfaces.remove(surface_id);
            }
            entry
        };

        entry.timer.cancel();
        tracing::debug!(
            request_id = %request_id,
            outcome = settlement.label(),
            age_ms = (Utc::now() - entry.created_at).num_milliseconds(),
            "Pending request settled"
        );
        // The escalating task may have gone away; the entry is removed either way.
        let _ = entry.settle_tx.send(settlement);
        true
    }

    /// Settle the entry watching `surface_id` as closed by the user.
    pub fn surface_closed(&self, surface_id: &SurfaceId) -> bool {
        let request_id = self.lock().surfaces.get(surface_id).cloned();
        match request_id {
            Some(request_id) => self.settle(&request_id, Settlement::SurfaceClosed),
            None => false,
        }
    }

    pub fn contains(&self, request_id: &RequestId) -> bool {
        self.lock().entries.contains_key(request_id)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of registered surface-closed listeners.
    pub fn surface_listeners(&self) -> usize {
        self.lock().surfaces.len()
    }

    /// Descriptors of every pending entry, oldest first.
    pub fn descriptors(&self) -> Vec<ApprovalDescriptor> {
        let mut descriptors: Vec<_> = self
            .lock()
            .entries
            .values()
            .map(|entry| entry.descriptor.clone())
            .collect();
        descriptors.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        descriptors
    }
}
