// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Wallet Client
//!
//! The page-facing API. Every call registers a correlation waiter, posts one
//! `QUASAR_*` request on its window and waits for the matching
//! `<type>_RESPONSE`. Calls that need a connection fail locally while the
//! client believes it is disconnected; the Broker checks again regardless.
//!
//! ```ignore
//! let client = WalletClient::attach(window);
//! let accounts = client.connect("0xabc…").await?;
//! client.on(EventKind::AccountsChanged, |payload| println!("{payload}"));
//! ```

pub mod events;

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::{CancellationToken, DropGuard};

pub use events::{EventHandler, EventSubscriptions};

use crate::config::CLIENT_REQUEST_TIMEOUT;
use crate::correlation::CorrelationTable;
use crate::error::BridgeError;
use crate::page::{PageEnvelope, PageWindow};
use crate::protocol::{
    Account, Asset, AssetsQuery, ConnectParams, ConnectionStatus, EventKind, Message,
    MessageClass, NetworkInfo, Operation, SignMessageParams, SignedMessage, TransactionReceipt,
    TransactionRequest,
};

#[derive(Debug, Default)]
struct LocalState {
    connected: bool,
    accounts: Vec<Account>,
}

struct ClientInner {
    window: PageWindow,
    correlation: Arc<CorrelationTable>,
    state: RwLock<LocalState>,
    subscriptions: EventSubscriptions,
}

impl ClientInner {
    fn set_connected(&self, connected: bool, accounts: Option<Vec<Account>>) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.connected = connected;
        match accounts {
            Some(accounts) => state.accounts = accounts,
            None if !connected => state.accounts.clear(),
            None => {}
        }
    }

    fn on_envelope(&self, envelope: PageEnvelope) {
        if !self.window.is_own(&envelope) {
            return;
        }
        let message = envelope.message;
        match message.classify() {
            MessageClass::Response => {
                self.correlation.complete(message);
            }
            MessageClass::Event => self.on_event(message),
            MessageClass::Request | MessageClass::Foreign => {}
        }
    }

    fn on_event(&self, message: Message) {
        let Some(kind) = EventKind::from_message_type(&message.message_type) else {
            tracing::debug!(message_type = %message.message_type, "Ignoring unknown event");
            return;
        };
        let payload = message.payload.unwrap_or_else(|| json!({}));
        let accounts = accounts_in(&payload);

        match kind {
            EventKind::Connect => self.set_connected(true, accounts),
            EventKind::Disconnect => self.set_connected(false, None),
            EventKind::AccountsChanged => {
                if let Some(accounts) = accounts {
                    self.state
                        .write()
                        .unwrap_or_else(PoisonError::into_inner)
                        .accounts = accounts;
                }
            }
            EventKind::ChainChanged => {}
        }
        self.subscriptions.emit(kind, &payload);
    }
}

#[derive(Deserialize)]
struct AccountsReply {
    accounts: Vec<Account>,
}

#[derive(Deserialize)]
struct AssetsReply {
    assets: Vec<Asset>,
}

fn accounts_in(payload: &Value) -> Option<Vec<Account>> {
    let accounts = payload.get("accounts")?;
    serde_json::from_value(accounts.clone()).ok()
}

fn decode<T: DeserializeOwned>(operation: Operation, reply: Value) -> Result<T, BridgeError> {
    serde_json::from_value(reply).map_err(|e| {
        BridgeError::Protocol(format!(
            "malformed {} reply: {e}",
            operation.client_type()
        ))
    })
}

/// Page-side wallet API attached to one window.
pub struct WalletClient {
    inner: Arc<ClientInner>,
    timeout: Duration,
    _listener: DropGuard,
}

impl WalletClient {
    /// Attach to `window` and start listening for responses and events.
    pub fn attach(window: PageWindow) -> Self {
        let inner = Arc::new(ClientInner {
            correlation: CorrelationTable::new(),
            state: RwLock::new(LocalState::default()),
            subscriptions: EventSubscriptions::default(),
            window,
        });

        let page = inner.window.subscribe();
        let shutdown = CancellationToken::new();
        tokio::spawn(listen(Arc::clone(&inner), page, shutdown.clone()));

        Self {
            inner,
            timeout: CLIENT_REQUEST_TIMEOUT,
            _listener: shutdown.drop_guard(),
        }
    }

    /// Override the correlation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .connected
    }

    /// Accounts cached from the last connect, status check or event.
    pub fn cached_accounts(&self) -> Vec<Account> {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .accounts
            .clone()
    }

    pub fn on(&self, kind: EventKind, handler: impl Fn(&Value) + Send + Sync + 'static) {
        self.inner.subscriptions.subscribe(kind, Arc::new(handler));
    }

    pub fn off(&self, kind: EventKind) {
        self.inner.subscriptions.unsubscribe(kind);
    }

    /// Accepts a bare address or [`ConnectParams`].
    pub async fn connect(&self, params: impl Into<ConnectParams>) -> Result<Vec<Account>, BridgeError> {
        let params = params.into();
        let reply = self.call(Operation::Connect, Some(json!(params))).await?;
        let AccountsReply { accounts } = decode(Operation::Connect, reply)?;
        self.inner.set_connected(true, Some(accounts.clone()));
        Ok(accounts)
    }

    pub async fn disconnect(&self) -> Result<(), BridgeError> {
        self.call(Operation::Disconnect, None).await?;
        self.inner.set_connected(false, None);
        Ok(())
    }

    /// Ask the Broker and sync local state with its answer.
    pub async fn check_connection(&self) -> Result<ConnectionStatus, BridgeError> {
        let reply = self.call(Operation::CheckConnection, None).await?;
        let status: ConnectionStatus = decode(Operation::CheckConnection, reply)?;
        self.inner
            .set_connected(status.connected, Some(status.accounts.clone()));
        Ok(status)
    }

    pub async fn get_accounts(&self) -> Result<Vec<Account>, BridgeError> {
        let reply = self.call(Operation::GetAccounts, None).await?;
        let AccountsReply { accounts } = decode(Operation::GetAccounts, reply)?;
        Ok(accounts)
    }

    pub async fn get_assets(&self, address: Option<&str>) -> Result<Vec<Asset>, BridgeError> {
        let query = AssetsQuery {
            address: address.map(str::to_string),
        };
        let reply = self.call(Operation::GetAssets, Some(json!(query))).await?;
        let AssetsReply { assets } = decode(Operation::GetAssets, reply)?;
        Ok(assets)
    }

    pub async fn send_transaction(
        &self,
        request: TransactionRequest,
    ) -> Result<TransactionReceipt, BridgeError> {
        let reply = self
            .call(Operation::SendTransaction, Some(json!(request)))
            .await?;
        decode(Operation::SendTransaction, reply)
    }

    pub async fn sign_message(
        &self,
        message: &str,
        address: Option<&str>,
    ) -> Result<SignedMessage, BridgeError> {
        let params = SignMessageParams {
            message: message.to_string(),
            address: address.map(str::to_string),
        };
        let reply = self.call(Operation::SignMessage, Some(json!(params))).await?;
        decode(Operation::SignMessage, reply)
    }

    pub async fn get_network(&self) -> Result<NetworkInfo, BridgeError> {
        let reply = self.call(Operation::GetNetwork, None).await?;
        decode(Operation::GetNetwork, reply)
    }

    async fn call(&self, operation: Operation, payload: Option<Value>) -> Result<Value, BridgeError> {
        if operation.requires_connection() && !self.is_connected() {
            return Err(BridgeError::NotConnected);
        }

        let request_type = operation.client_type();
        let pending = self.inner.correlation.register(request_type);
        tracing::trace!(request_type, request_id = pending.id(), "Posting request");
        self.inner
            .window
            .post(Message::request(request_type, payload, pending.id()));

        let response = pending.wait(self.timeout).await?;
        let code = response.error_code().map(str::to_string);
        match response.error {
            Some(error) => {
                let error = BridgeError::relayed(error, code.as_deref());
                if error == BridgeError::NotConnected {
                    self.inner.set_connected(false, None);
                }
                Err(error)
            }
            None => Ok(response.payload.unwrap_or(Value::Null)),
        }
    }
}

async fn listen(
    inner: Arc<ClientInner>,
    mut page: broadcast::Receiver<PageEnvelope>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            envelope = page.recv() => match envelope {
                Ok(envelope) => inner.on_envelope(envelope),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Client lagged behind page bus");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
}
