// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Relay
//!
//! The only code that reads raw page messages and the only code that talks
//! to the Broker. For each request posted by its own window:
//!
//! 1. Look the type up in the Operation Registry. Unregistered types are
//!    answered with an error response and never forwarded.
//! 2. Build the forwarding envelope from the registry row and send it over
//!    the [`BrokerTransport`].
//! 3. Post `<type>_RESPONSE` with the reply, or with `error` on failure,
//!    under the original `requestId`.
//!
//! Responses and events seen on the bus are never forwarded, which keeps the
//! Relay out of loops. Broker events are posted to the page verbatim.

pub mod transport;

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use transport::{BrokerTransport, HttpTransport, InProcessTransport};

use crate::page::{PageEnvelope, PageWindow};
use crate::protocol::{
    decode_reply, BrokerEvent, Message, MessageClass, Operation, RelayEnvelope,
};

pub struct Relay {
    window: PageWindow,
    transport: Arc<dyn BrokerTransport>,
}

impl Relay {
    pub fn new(window: PageWindow, transport: Arc<dyn BrokerTransport>) -> Self {
        Self { window, transport }
    }

    /// Attach to the window and start relaying until `shutdown` fires.
    ///
    /// The page subscription is taken before this returns, so nothing posted
    /// afterwards is missed.
    pub fn spawn(
        self,
        events: Option<broadcast::Receiver<BrokerEvent>>,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let page = self.window.subscribe();
        tokio::spawn(self.run(page, events, shutdown))
    }

    async fn run(
        self,
        mut page: broadcast::Receiver<PageEnvelope>,
        mut events: Option<broadcast::Receiver<BrokerEvent>>,
        shutdown: CancellationToken,
    ) {
        tracing::debug!(window = %self.window.id(), origin = %self.window.origin(), "Relay attached");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                envelope = page.recv() => match envelope {
                    Ok(envelope) => self.on_page_message(envelope),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Relay lagged behind page bus");
                    }
                    Err(RecvError::Closed) => break,
                },
                event = next_event(&mut events) => match event {
                    Ok(event) => self.on_broker_event(event),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Relay lagged behind broker events");
                    }
                    Err(RecvError::Closed) => events = None,
                },
            }
        }
        tracing::debug!(window = %self.window.id(), "Relay detached");
    }

    fn on_page_message(&self, envelope: PageEnvelope) {
        if !self.window.is_own(&envelope) {
            tracing::trace!(source = %envelope.source, "Ignoring message from foreign window");
            return;
        }
        let message = envelope.message;
        if message.classify() != MessageClass::Request {
            return;
        }

        let Some(request_id) = message.request_id.clone() else {
            tracing::warn!(message_type = %message.message_type, "Dropping request without requestId");
            return;
        };

        let Some(operation) = Operation::from_client_type(&message.message_type) else {
            tracing::warn!(message_type = %message.message_type, "Refusing unregistered request type");
            self.window.post(Message::error_response(
                &message.message_type,
                format!("Unsupported message type: {}", message.message_type),
                request_id,
            ));
            return;
        };

        let forward = RelayEnvelope::forward(operation.spec(), self.window.origin(), message.payload);
        let transport = Arc::clone(&self.transport);
        let window = self.window.clone();
        let request_type = message.message_type;

        tokio::spawn(async move {
            let (reply, code) = match transport.send(forward).await {
                Ok(reply) => {
                    let code = reply.get("code").and_then(Value::as_str).map(str::to_string);
                    (decode_reply(reply), code)
                }
                Err(e) => (Err(e), None),
            };
            let response = match reply {
                Ok(payload) => Message::response(&request_type, payload, request_id),
                Err(e) => {
                    let code = code.as_deref().unwrap_or(e.code());
                    tracing::debug!(request_type = %request_type, code, error = %e, "Relaying error response");
                    Message::error_response(&request_type, e.to_string(), request_id).with_code(code)
                }
            };
            window.post(response);
        });
    }

    fn on_broker_event(&self, event: BrokerEvent) {
        if event.is_visible_to(self.window.origin()) {
            self.window.post(Message::event(event.kind, event.payload));
        }
    }
}

async fn next_event(
    events: &mut Option<broadcast::Receiver<BrokerEvent>>,
) -> Result<BrokerEvent, RecvError> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::*;
    use crate::error::BridgeError;
    use crate::page::PageBus;
    use crate::protocol::{EventKind, Origin};

    /// Records forwarded envelopes and answers with a fixed reply.
    struct ScriptedTransport {
        calls: Mutex<Vec<RelayEnvelope>>,
        reply: Result<Value, BridgeError>,
    }

    impl ScriptedTransport {
        fn replying(reply: Result<Value, BridgeError>) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                reply,
            })
        }

        fn calls(&self) -> Vec<RelayEnvelope> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BrokerTransport for ScriptedTransport {
        async fn send(&self, envelope: RelayEnvelope) -> Result<Value, BridgeError> {
            self.calls.lock().unwrap().push(envelope);
            self.reply.clone()
        }
    }

    fn dapp() -> Origin {
        Origin::parse("https://dapp.test").unwrap()
    }

    async fn next_reply(rx: &mut broadcast::Receiver<PageEnvelope>) -> Message {
        let wait = async {
            loop {
                let envelope = rx.recv().await.unwrap();
                if envelope.message.classify() != MessageClass::Request {
                    return envelope.message;
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(5), wait)
            .await
            .expect("relay replied")
    }

    #[tokio::test]
    async fn forwards_registered_request_and_answers_with_same_id() {
        let bus = PageBus::new();
        let window = bus.open_window(dapp());
        let transport = ScriptedTransport::replying(Ok(json!({"success": true, "accounts": []})));
        let mut observer = window.subscribe();
        let shutdown = CancellationToken::new();
        Relay::new(window.clone(), transport.clone()).spawn(None, shutdown.clone());

        window.post(Message::request(
            "QUASAR_CONNECT",
            Some(json!({"address": "addr1"})),
            "req-1",
        ));
        let reply = next_reply(&mut observer).await;

        assert_eq!(reply.message_type, "QUASAR_CONNECT_RESPONSE");
        assert_eq!(reply.request_id.as_deref(), Some("req-1"));
        assert_eq!(reply.payload, Some(json!({"success": true, "accounts": []})));
        assert!(reply.error.is_none());

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].operation_type, "CONNECT_WALLET");
        assert_eq!(calls[0].origin, "https://dapp.test");
        assert_eq!(calls[0].hostname.as_deref(), Some("dapp.test"));
        assert_eq!(calls[0].payload, Some(json!({"address": "addr1"})));
        shutdown.cancel();
    }

    #[tokio::test]
    async fn payload_and_hostname_follow_registry_flags() {
        let bus = PageBus::new();
        let window = bus.open_window(dapp());
        let transport = ScriptedTransport::replying(Ok(json!({"success": true})));
        let mut observer = window.subscribe();
        Relay::new(window.clone(), transport.clone()).spawn(None, CancellationToken::new());

        window.post(Message::request(
            "QUASAR_DISCONNECT",
            Some(json!({"ignored": true})),
            "req-2",
        ));
        next_reply(&mut observer).await;

        let calls = transport.calls();
        assert_eq!(calls[0].operation_type, "DISCONNECT_WALLET");
        assert!(calls[0].payload.is_none());
        assert!(calls[0].hostname.is_none());
    }

    #[tokio::test]
    async fn unregistered_type_never_reaches_transport() {
        let bus = PageBus::new();
        let window = bus.open_window(dapp());
        let transport = ScriptedTransport::replying(Ok(json!({})));
        let mut observer = window.subscribe();
        Relay::new(window.clone(), transport.clone()).spawn(None, CancellationToken::new());

        window.post(Message::request("QUASAR_DRAIN_WALLET", None, "req-3"));
        let reply = next_reply(&mut observer).await;

        assert_eq!(reply.message_type, "QUASAR_DRAIN_WALLET_RESPONSE");
        assert_eq!(
            reply.error.as_deref(),
            Some("Unsupported message type: QUASAR_DRAIN_WALLET")
        );
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn broker_failure_becomes_error_response() {
        let bus = PageBus::new();
        let window = bus.open_window(dapp());
        let transport = ScriptedTransport::replying(Ok(json!({
            "success": false,
            "error": "Site is not connected to the wallet",
            "code": "not_connected"
        })));
        let mut observer = window.subscribe();
        Relay::new(window.clone(), transport).spawn(None, CancellationToken::new());

        window.post(Message::request("QUASAR_GET_ASSETS", None, "req-4"));
        let reply = next_reply(&mut observer).await;
        assert_eq!(reply.error.as_deref(), Some("Site is not connected to the wallet"));
        assert_eq!(reply.error_code(), Some("not_connected"));
    }

    #[tokio::test]
    async fn transport_failure_becomes_error_response() {
        let bus = PageBus::new();
        let window = bus.open_window(dapp());
        let transport =
            ScriptedTransport::replying(Err(BridgeError::Transport("port closed".into())));
        let mut observer = window.subscribe();
        Relay::new(window.clone(), transport).spawn(None, CancellationToken::new());

        window.post(Message::request("QUASAR_GET_NETWORK", None, "req-5"));
        let reply = next_reply(&mut observer).await;
        assert_eq!(reply.error.as_deref(), Some("Transport error: port closed"));
        assert_eq!(reply.error_code(), Some("transport_error"));
    }

    #[tokio::test]
    async fn foreign_windows_and_responses_are_ignored() {
        let bus = PageBus::new();
        let window = bus.open_window(dapp());
        let intruder = bus.open_window(dapp());
        let transport = ScriptedTransport::replying(Ok(json!({})));
        let mut observer = window.subscribe();
        Relay::new(window.clone(), transport.clone()).spawn(None, CancellationToken::new());

        intruder.post(Message::request("QUASAR_CONNECT", None, "spoof"));
        window.post(Message::response("QUASAR_CONNECT", json!({}), "loop"));
        window.post(Message::request("QUASAR_CHECK_CONNECTION", None, "req-6"));

        // Only the last message produces a reply.
        let reply = loop {
            let reply = next_reply(&mut observer).await;
            if reply.request_id.as_deref() != Some("loop") {
                break reply;
            }
        };
        assert_eq!(reply.request_id.as_deref(), Some("req-6"));

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].operation_type, "CHECK_CONNECTION");
    }

    #[tokio::test]
    async fn broker_events_reach_matching_origin_only() {
        let bus = PageBus::new();
        let window = bus.open_window(dapp());
        let (events_tx, events_rx) = broadcast::channel(8);
        let mut observer = window.subscribe();
        Relay::new(window.clone(), ScriptedTransport::replying(Ok(json!({}))))
            .spawn(Some(events_rx), CancellationToken::new());

        let other = Origin::parse("https://other.test").unwrap();
        events_tx
            .send(BrokerEvent::for_origin(EventKind::Disconnect, other, json!({})))
            .unwrap();
        events_tx
            .send(BrokerEvent::for_origin(
                EventKind::AccountsChanged,
                dapp(),
                json!({"accounts": []}),
            ))
            .unwrap();

        let event = next_reply(&mut observer).await;
        assert_eq!(event.message_type, "QUASAR_EVENT_ACCOUNTS_CHANGED");
        assert!(event.request_id.is_none());
        assert_eq!(event.payload, Some(json!({"accounts": []})));
    }
}
