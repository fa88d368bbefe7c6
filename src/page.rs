// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Same-page message bus.
//!
//! Every window attached to a bus can post; every listener sees every
//! envelope. The `source` stamp is what lets the Client and the Relay tell
//! their own window's traffic apart from frames or other scripts sharing the
//! bus.

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::protocol::{Message, Origin};

const DEFAULT_BUS_CAPACITY: usize = 256;

/// Identity of the window an envelope was posted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(Uuid);

impl WindowId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for WindowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageEnvelope {
    pub source: WindowId,
    pub message: Message,
}

/// Shared broadcast medium, the `postMessage` analogue.
#[derive(Debug, Clone)]
pub struct PageBus {
    tx: broadcast::Sender<PageEnvelope>,
}

impl Default for PageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl PageBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUS_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Attach a new window served from `origin`.
    pub fn open_window(&self, origin: Origin) -> PageWindow {
        PageWindow {
            id: WindowId::new(),
            origin,
            tx: self.tx.clone(),
        }
    }
}

/// A window attached to a [`PageBus`].
#[derive(Debug, Clone)]
pub struct PageWindow {
    id: WindowId,
    origin: Origin,
    tx: broadcast::Sender<PageEnvelope>,
}

impl PageWindow {
    pub fn id(&self) -> WindowId {
        self.id
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Post a message stamped with this window as its source.
    ///
    /// Posting with no listener attached is not an error.
    pub fn post(&self, message: Message) {
        let envelope = PageEnvelope {
            source: self.id,
            message,
        };
        if self.tx.send(envelope).is_err() {
            tracing::trace!(window = %self.id, "page message posted with no listeners");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PageEnvelope> {
        self.tx.subscribe()
    }

    /// Whether an envelope originated from this very window.
    pub fn is_own(&self, envelope: &PageEnvelope) -> bool {
        envelope.source == self.id
    }
}
