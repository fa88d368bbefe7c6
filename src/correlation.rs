// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Client-side request/response matching.
//!
//! Each outbound call registers a waiter keyed by a fresh request id. The
//! inbound listener hands every response to [`CorrelationTable::complete`];
//! only a message whose `requestId` and `type` both match reaches the waiter.
//! Waiters deregister themselves on timeout or drop, so late responses find
//! nothing and are discarded.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::BridgeError;
use crate::protocol::{response_type, Message};

struct Waiter {
    response_type: String,
    tx: oneshot::Sender<Message>,
}

#[derive(Default)]
pub struct CorrelationTable {
    waiters: Mutex<HashMap<String, Waiter>>,
}

impl CorrelationTable {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Waiter>> {
        self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a waiter for the response to a `request_type` call.
    pub fn register(self: &Arc<Self>, request_type: &str) -> PendingResponse {
        let id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.lock().insert(
            id.clone(),
            Waiter {
                response_type: response_type(request_type),
                tx,
            },
        );
        PendingResponse {
            id,
            rx,
            table: Arc::clone(self),
        }
    }

    /// Deliver a response. Returns `false` when nothing was waiting for it.
    pub fn complete(&self, message: Message) -> bool {
        let Some(request_id) = message.request_id.clone() else {
            return false;
        };

        let waiter = {
            let mut waiters = self.lock();
            let matches = waiters
                .get(&request_id)
                .is_some_and(|waiter| waiter.response_type == message.message_type);
            if matches {
                waiters.remove(&request_id)
            } else {
                None
            }
        };

        match waiter {
            Some(waiter) => waiter.tx.send(message).is_ok(),
            None => {
                tracing::debug!(
                    request_id = %request_id,
                    message_type = %message.message_type,
                    "Discarding uncorrelated response"
                );
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove(&self, id: &str) {
        self.lock().remove(id);
    }
}

/// A registered waiter. Dropping it deregisters the request id.
pub struct PendingResponse {
    id: String,
    rx: oneshot::Receiver<Message>,
    table: Arc<CorrelationTable>,
}

impl PendingResponse {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait for the matching response for at most `timeout`.
    pub async fn wait(mut self, timeout: Duration) -> Result<Message, BridgeError> {
        match tokio::time::timeout(timeout, &mut self.rx).await {
            Ok(Ok(message)) => Ok(message),
            Ok(Err(_)) => Err(BridgeError::Transport(
                "correlation waiter dropped".to_string(),
            )),
            Err(_) => Err(BridgeError::ClientTimeout(timeout.as_secs())),
        }
    }
}

impl Drop for PendingResponse {
    fn drop(&mut self) {
        self.table.remove(&self.id);
    }
}
