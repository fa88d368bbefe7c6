// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Unsolicited Broker → page notifications.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::message::EVENT_PREFIX;
use super::origin::Origin;

/// The four event kinds a page can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    AccountsChanged,
    ChainChanged,
    Connect,
    Disconnect,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::AccountsChanged,
        EventKind::ChainChanged,
        EventKind::Connect,
        EventKind::Disconnect,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EventKind::AccountsChanged => "ACCOUNTS_CHANGED",
            EventKind::ChainChanged => "CHAIN_CHANGED",
            EventKind::Connect => "CONNECT",
            EventKind::Disconnect => "DISCONNECT",
        }
    }

    /// `QUASAR_EVENT_<NAME>`.
    pub fn message_type(self) -> String {
        format!("{EVENT_PREFIX}{}", self.name())
    }

    pub fn from_message_type(message_type: &str) -> Option<Self> {
        let name = message_type.strip_prefix(EVENT_PREFIX)?;
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Event published by the Broker. `origin: None` reaches every page.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerEvent {
    pub kind: EventKind,
    pub origin: Option<Origin>,
    pub payload: Value,
}

impl BrokerEvent {
    pub fn for_origin(kind: EventKind, origin: Origin, payload: Value) -> Self {
        Self {
            kind,
            origin: Some(origin),
            payload,
        }
    }

    pub fn broadcast(kind: EventKind, payload: Value) -> Self {
        Self {
            kind,
            origin: None,
            payload,
        }
    }

    /// Whether a page served from `origin` should see this event.
    pub fn is_visible_to(&self, origin: &Origin) -> bool {
        self.origin.as_ref().map_or(true, |target| target == origin)
    }
}
