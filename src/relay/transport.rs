// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Privileged messaging primitive between the Relay and the Broker.
//!
//! [`InProcessTransport`] hands envelopes to a Broker task in the same
//! process. [`HttpTransport`] posts them to a daemon's `/v1/relay` endpoint.
//! Both return the Broker's reply object untouched; interpreting it is the
//! Relay's job.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::broker::Broker;
use crate::error::BridgeError;
use crate::protocol::RelayEnvelope;

const CALL_QUEUE_CAPACITY: usize = 64;
const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait BrokerTransport: Send + Sync {
    /// Send one envelope and wait for the Broker's reply object.
    async fn send(&self, envelope: RelayEnvelope) -> Result<Value, BridgeError>;
}

struct TransportCall {
    envelope: RelayEnvelope,
    reply: oneshot::Sender<Value>,
}

/// Transport into a Broker task running in this process.
#[derive(Clone)]
pub struct InProcessTransport {
    tx: mpsc::Sender<TransportCall>,
}

impl InProcessTransport {
    /// Spawn the Broker's receive loop. Each call is handled on its own task
    /// so a long escalation never blocks other requests.
    pub fn spawn(broker: Arc<Broker>, shutdown: CancellationToken) -> Self {
        let (tx, mut rx) = mpsc::channel::<TransportCall>(CALL_QUEUE_CAPACITY);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    call = rx.recv() => {
                        let Some(call) = call else { break };
                        let broker = Arc::clone(&broker);
                        tokio::spawn(async move {
                            let reply = broker.handle_envelope(call.envelope).await;
                            if call.reply.send(reply).is_err() {
                                tracing::debug!("Relay went away before the Broker replied");
                            }
                        });
                    }
                }
            }
            tracing::debug!("In-process broker loop stopped");
        });

        Self { tx }
    }
}

#[async_trait]
impl BrokerTransport for InProcessTransport {
    async fn send(&self, envelope: RelayEnvelope) -> Result<Value, BridgeError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(TransportCall { envelope, reply })
            .await
            .map_err(|_| BridgeError::Transport("broker is not running".to_string()))?;
        rx.await
            .map_err(|_| BridgeError::Transport("broker dropped the request".to_string()))
    }
}

/// Transport to a daemon over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpTransport {
    /// `base_url` is the daemon root, e.g. `http://127.0.0.1:8787`.
    pub fn new(base_url: &str) -> Result<Self, BridgeError> {
        let client = reqwest::Client::builder()
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| BridgeError::Transport(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            endpoint: format!("{}/v1/relay", base_url.trim_end_matches('/')),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl BrokerTransport for HttpTransport {
    async fn send(&self, envelope: RelayEnvelope) -> Result<Value, BridgeError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&envelope)
            .send()
            .await
            .map_err(|e| BridgeError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BridgeError::Transport(format!(
                "HTTP {} from broker endpoint",
                response.status()
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| BridgeError::Transport(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::testing::RecordingSurface;
    use crate::broker::AuthorizationSet;
    use crate::config::BrokerSettings;
    use crate::wallet::FixedWallet;
    use axum::{routing::post, Json, Router};
    use serde_json::json;

    fn broker() -> Arc<Broker> {
        Arc::new(Broker::new(
            Arc::new(AuthorizationSet::in_memory()),
            Arc::new(RecordingSurface::default()),
            Arc::new(FixedWallet::new(&["addr1"])),
            BrokerSettings::default(),
        ))
    }

    fn envelope(operation_type: &str) -> RelayEnvelope {
        RelayEnvelope {
            operation_type: operation_type.to_string(),
            origin: "https://dapp.test".to_string(),
            hostname: None,
            payload: None,
        }
    }

    #[tokio::test]
    async fn in_process_round_trip() {
        let transport = InProcessTransport::spawn(broker(), CancellationToken::new());

        let reply = transport.send(envelope("CHECK_CONNECTION")).await.unwrap();
        assert_eq!(reply, json!({"connected": false, "accounts": []}));

        let reply = transport.send(envelope("GET_ACCOUNTS")).await.unwrap();
        assert_eq!(reply["success"], false);
    }

    #[tokio::test]
    async fn in_process_fails_after_shutdown() {
        let shutdown = CancellationToken::new();
        let transport = InProcessTransport::spawn(broker(), shutdown.clone());
        shutdown.cancel();

        // Give the loop a chance to observe the cancellation.
        while !transport.tx.is_closed() {
            tokio::task::yield_now().await;
        }
        let err = transport.send(envelope("CHECK_CONNECTION")).await.unwrap_err();
        assert!(matches!(err, BridgeError::Transport(_)));
    }

    #[tokio::test]
    async fn http_posts_envelope_to_relay_endpoint() {
        let app = Router::new().route(
            "/v1/relay",
            post(|Json(envelope): Json<RelayEnvelope>| async move {
                Json(json!({ "echo": envelope.operation_type }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });

        let transport = HttpTransport::new(&format!("http://{addr}/")).unwrap();
        assert_eq!(transport.endpoint(), format!("http://{addr}/v1/relay"));

        let reply = transport.send(envelope("GET_NETWORK")).await.unwrap();
        assert_eq!(reply, json!({"echo": "GET_NETWORK"}));
    }

    #[tokio::test]
    async fn http_maps_connection_failure_to_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = HttpTransport::new(&format!("http://{addr}")).unwrap();
        let err = transport.send(envelope("GET_NETWORK")).await.unwrap_err();
        assert!(matches!(err, BridgeError::Transport(_)));
    }
}
