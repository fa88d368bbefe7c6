// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Typed event channels for the page-side client.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;

use crate::protocol::EventKind;

pub type EventHandler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Handlers registered per event kind.
#[derive(Default)]
pub struct EventSubscriptions {
    handlers: RwLock<HashMap<EventKind, Vec<EventHandler>>>,
}

impl EventSubscriptions {
    pub fn subscribe(&self, kind: EventKind, handler: EventHandler) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .push(handler);
    }

    /// Remove every handler of `kind`.
    pub fn unsubscribe(&self, kind: EventKind) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&kind);
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map_or(0, Vec::len)
    }

    pub fn emit(&self, kind: EventKind, payload: &Value) {
        // Clone out so handlers can (un)subscribe without deadlocking.
        let handlers = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned()
            .unwrap_or_default();
        for handler in handlers {
            handler(payload);
        }
    }
}
