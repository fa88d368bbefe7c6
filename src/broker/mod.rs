// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Request Broker
//!
//! Runs in the privileged process. Every request goes through one state
//! machine:
//!
//! ```text
//! RECEIVED ─┬─> AUTO_SATISFIED
//!           └─> ESCALATED ─┬─> RESOLVED
//!                          ├─> REJECTED      (explicit reject, surface closed)
//!                          └─> TIMED_OUT
//! ```
//!
//! Authorization is checked on every privileged request. Only `CONNECT_WALLET`
//! from an unknown origin and `SEND_TRANSACTION` escalate to the Approval
//! Surface; `SIGN_MESSAGE` escalates only when configured to.

pub mod approval;
pub mod authorization;
pub mod pending;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

pub use approval::{
    ApprovalDescriptor, ApprovalHandle, ApprovalKind, ApprovalResult, ApprovalSurface, RequestId,
    Settlement, SurfaceEvent, SurfaceId,
};
pub use authorization::AuthorizationSet;
pub use pending::PendingRequests;

use crate::config::BrokerSettings;
use crate::error::BridgeError;
use crate::protocol::{
    encode_reply, AssetsQuery, BrokerEvent, BrokerRequest, ConnectParams, ConnectionStatus,
    EventKind, InboundRequest, Origin, RelayEnvelope, SignMessageParams, TransactionRequest,
};
use crate::storage::{AuditEvent, AuditEventType, AuditRepository, FileStorage};
use crate::wallet::WalletBackend;

const EVENT_CHANNEL_CAPACITY: usize = 64;

pub struct Broker {
    authorization: Arc<AuthorizationSet>,
    pending: Arc<PendingRequests>,
    surface: Arc<dyn ApprovalSurface>,
    wallet: Arc<dyn WalletBackend>,
    events: broadcast::Sender<BrokerEvent>,
    audit: Option<Arc<FileStorage>>,
    settings: BrokerSettings,
}

impl std::fmt::Debug for Broker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broker")
            .field("pending", &self.pending)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Broker {
    pub fn new(
        authorization: Arc<AuthorizationSet>,
        surface: Arc<dyn ApprovalSurface>,
        wallet: Arc<dyn WalletBackend>,
        settings: BrokerSettings,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            authorization,
            pending: PendingRequests::new(),
            surface,
            wallet,
            events,
            audit: None,
            settings,
        }
    }

    /// Append authorization changes and escalation outcomes to the audit log.
    pub fn with_audit(mut self, storage: Arc<FileStorage>) -> Self {
        self.audit = Some(storage);
        self
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<BrokerEvent> {
        self.events.subscribe()
    }

    pub fn authorization(&self) -> &Arc<AuthorizationSet> {
        &self.authorization
    }

    pub fn settings(&self) -> &BrokerSettings {
        &self.settings
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn pending_requests(&self) -> Vec<ApprovalDescriptor> {
        self.pending.descriptors()
    }

    #[cfg(test)]
    pub(crate) fn surface_listeners(&self) -> usize {
        self.pending.surface_listeners()
    }

    /// Wire entry point: parse, dispatch, encode the reply object.
    pub async fn handle_envelope(&self, envelope: RelayEnvelope) -> Value {
        let operation_type = envelope.operation_type.clone();
        let result = match InboundRequest::parse(envelope) {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                tracing::warn!(operation = %operation_type, error = %e, "Rejected malformed broker request");
                Err(e)
            }
        };
        encode_reply(result)
    }

    /// [`Broker::handle_envelope`] on a task of its own.
    ///
    /// An escalation outlives the caller: if the waiting future is dropped
    /// (HTTP client gone, relay shut down) the decision is still applied and
    /// the surface is still dismissed once the entry settles.
    pub async fn dispatch(self: Arc<Self>, envelope: RelayEnvelope) -> Value {
        let task = tokio::spawn(async move { self.handle_envelope(envelope).await });
        match task.await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(error = %e, "Broker task failed");
                encode_reply(Err(BridgeError::Transport(
                    "broker task failed".to_string(),
                )))
            }
        }
    }

    /// Dispatch one typed request. Runs in the caller's future; wire callers
    /// go through [`Broker::dispatch`].
    pub async fn handle(&self, inbound: InboundRequest) -> Result<Value, BridgeError> {
        let InboundRequest {
            origin,
            hostname,
            request,
        } = inbound;
        let operation = request.operation();
        tracing::debug!(origin = %origin, operation = operation.broker_type(), "Dispatching broker request");

        let result = match request {
            BrokerRequest::Connect(params) => self.connect(origin.clone(), hostname, params).await,
            BrokerRequest::Disconnect => self.disconnect(&origin).await,
            BrokerRequest::CheckConnection => self.check_connection(&origin).await,
            BrokerRequest::GetAccounts => self.get_accounts(&origin).await,
            BrokerRequest::GetAssets(query) => self.get_assets(&origin, query).await,
            BrokerRequest::SendTransaction(tx) => {
                self.send_transaction(origin.clone(), hostname, tx).await
            }
            BrokerRequest::SignMessage(params) => {
                self.sign_message(origin.clone(), hostname, params).await
            }
            BrokerRequest::GetNetwork => self.get_network().await,
        };

        if let Err(e) = &result {
            tracing::info!(
                origin = %origin,
                operation = operation.broker_type(),
                code = e.code(),
                error = %e,
                "Broker request failed"
            );
        }
        result
    }

    async fn require_authorized(&self, origin: &Origin) -> Result<(), BridgeError> {
        if self.authorization.contains(origin).await {
            Ok(())
        } else {
            Err(BridgeError::NotConnected)
        }
    }

    // ========== Operations ==========

    async fn connect(
        &self,
        origin: Origin,
        hostname: String,
        params: ConnectParams,
    ) -> Result<Value, BridgeError> {
        if self.authorization.contains(&origin).await {
            let accounts = self.wallet.accounts().await?;
            return Ok(json!({ "success": true, "accounts": accounts }));
        }

        let descriptor = self.descriptor(
            ApprovalKind::Connect,
            &origin,
            &hostname,
            format!("{hostname} wants to connect to your wallet"),
        );
        let descriptor = ApprovalDescriptor {
            preferred_address: params.address,
            ..descriptor
        };

        let result = self
            .escalate(descriptor, self.settings.connect_timeout)
            .await?;
        if !result.success {
            return Err(rejection(result));
        }

        self.authorization.authorize(&origin).await;
        self.audit(AuditEvent::new(AuditEventType::SiteConnected).with_origin(origin.as_str()));

        let accounts = match result.accounts {
            Some(accounts) => accounts,
            None => self.wallet.accounts().await?,
        };
        self.emit(BrokerEvent::for_origin(
            EventKind::Connect,
            origin.clone(),
            json!({ "accounts": accounts }),
        ));
        tracing::info!(origin = %origin, "Site connected");

        Ok(json!({ "success": true, "accounts": accounts }))
    }

    async fn disconnect(&self, origin: &Origin) -> Result<Value, BridgeError> {
        self.revoke_site(origin).await;
        Ok(json!({ "success": true }))
    }

    async fn check_connection(&self, origin: &Origin) -> Result<Value, BridgeError> {
        let connected = self.authorization.contains(origin).await;
        let accounts = if connected {
            self.wallet.accounts().await?
        } else {
            Vec::new()
        };
        Ok(json!(ConnectionStatus {
            connected,
            accounts
        }))
    }

    async fn get_accounts(&self, origin: &Origin) -> Result<Value, BridgeError> {
        self.require_authorized(origin).await?;
        let accounts = self.wallet.accounts().await?;
        Ok(json!({ "accounts": accounts }))
    }

    async fn get_assets(&self, origin: &Origin, query: AssetsQuery) -> Result<Value, BridgeError> {
        self.require_authorized(origin).await?;
        let assets = self.wallet.assets(query.address.as_deref()).await?;
        Ok(json!({ "assets": assets }))
    }

    async fn send_transaction(
        &self,
        origin: Origin,
        hostname: String,
        tx: TransactionRequest,
    ) -> Result<Value, BridgeError> {
        self.require_authorized(&origin).await?;

        let descriptor = self.descriptor(
            ApprovalKind::SendTransaction,
            &origin,
            &hostname,
            format!("{hostname} requests a transfer of {} to {}", tx.amount, tx.to),
        );
        let descriptor = ApprovalDescriptor {
            preferred_address: tx.from.clone(),
            transaction: Some(json!(tx)),
            ..descriptor
        };

        let result = self
            .escalate(descriptor, self.settings.transaction_timeout)
            .await?;
        if !result.success {
            return Err(rejection(result));
        }

        // The site may have been disconnected while the user was deciding.
        self.require_authorized(&origin).await?;

        let receipt = match result.receipt {
            Some(receipt) => receipt,
            None => self.wallet.send_transaction(&tx).await?,
        };
        self.audit(
            AuditEvent::new(AuditEventType::TransactionSubmitted)
                .with_origin(origin.as_str())
                .with_resource("transaction", &receipt.tx_hash),
        );
        tracing::info!(origin = %origin, tx_hash = %receipt.tx_hash, "Transaction submitted");

        Ok(json!(receipt))
    }

    async fn sign_message(
        &self,
        origin: Origin,
        hostname: String,
        params: SignMessageParams,
    ) -> Result<Value, BridgeError> {
        self.require_authorized(&origin).await?;

        if self.settings.escalate_signing {
            let descriptor = self.descriptor(
                ApprovalKind::SignMessage,
                &origin,
                &hostname,
                format!("{hostname} requests a signature"),
            );
            let descriptor = ApprovalDescriptor {
                preferred_address: params.address.clone(),
                sign_message: Some(params.message.clone()),
                ..descriptor
            };
            let result = self
                .escalate(descriptor, self.settings.connect_timeout)
                .await?;
            if !result.success {
                return Err(rejection(result));
            }
        }

        let signed = self
            .wallet
            .sign_message(&params.message, params.address.as_deref())
            .await?;
        self.audit(
            AuditEvent::new(AuditEventType::MessageSigned)
                .with_origin(origin.as_str())
                .with_resource("account", &signed.address),
        );
        Ok(json!(signed))
    }

    async fn get_network(&self) -> Result<Value, BridgeError> {
        let network = self.wallet.network().await?;
        Ok(json!(network))
    }

    // ========== Escalation ==========

    fn descriptor(
        &self,
        kind: ApprovalKind,
        origin: &Origin,
        hostname: &str,
        message: String,
    ) -> ApprovalDescriptor {
        ApprovalDescriptor {
            request_id: RequestId::generate(),
            kind,
            origin: origin.clone(),
            hostname: hostname.to_string(),
            message,
            created_at: Utc::now(),
            preferred_address: None,
            transaction: None,
            sign_message: None,
        }
    }

    /// Open a surface for `descriptor` and wait for its single terminal
    /// transition.
    async fn escalate(
        &self,
        descriptor: ApprovalDescriptor,
        timeout: Duration,
    ) -> Result<ApprovalResult, BridgeError> {
        let request_id = descriptor.request_id.clone();
        let origin = descriptor.origin.clone();
        let kind = descriptor.kind;

        let settled = self.pending.insert(descriptor.clone(), timeout);
        tracing::info!(
            request_id = %request_id,
            origin = %origin,
            kind = ?kind,
            timeout_secs = timeout.as_secs(),
            "Escalating request for approval"
        );
        self.audit(
            AuditEvent::new(AuditEventType::ApprovalRequested)
                .with_origin(origin.as_str())
                .with_request(request_id.as_str())
                .with_details(json!({ "kind": kind })),
        );

        let handle = ApprovalHandle::new(request_id.clone(), Arc::clone(&self.pending));
        let surface_id = match self.surface.open(descriptor, handle).await {
            Ok(surface_id) => {
                if !self.pending.attach_surface(&request_id, surface_id.clone()) {
                    tracing::debug!(request_id = %request_id, "Request settled before surface attached");
                }
                Some(surface_id)
            }
            Err(e) => {
                tracing::warn!(request_id = %request_id, error = %e, "Failed to open approval surface");
                self.pending
                    .settle(&request_id, Settlement::Failed(e.to_string()));
                None
            }
        };

        let settlement = settled
            .await
            .unwrap_or_else(|_| Settlement::Failed("pending entry dropped".to_string()));

        if let Some(surface_id) = &surface_id {
            self.surface.dismiss(surface_id).await;
        }

        tracing::info!(request_id = %request_id, outcome = settlement.label(), "Approval settled");
        self.audit_settlement(&origin, &request_id, &settlement);

        match settlement {
            Settlement::Approved(result) => Ok(result),
            Settlement::Rejected(reason) => Err(BridgeError::UserRejected(reason)),
            Settlement::SurfaceClosed => Err(BridgeError::UserClosedSurface),
            Settlement::TimedOut => Err(BridgeError::RequestTimeout),
            Settlement::Failed(reason) => Err(BridgeError::ApprovalUnavailable(reason)),
        }
    }

    /// Surface-closed lifecycle event.
    pub fn surface_closed(&self, surface_id: &SurfaceId) -> bool {
        self.pending.surface_closed(surface_id)
    }

    /// Consume surface lifecycle events until shutdown or the sender closes.
    pub async fn run_surface_events(
        self: Arc<Self>,
        mut events: mpsc::UnboundedReceiver<SurfaceEvent>,
        shutdown: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Some(SurfaceEvent::Closed(surface_id)) => {
                        if !self.surface_closed(&surface_id) {
                            tracing::debug!(surface_id = %surface_id, "Close event for settled surface");
                        }
                    }
                    None => break,
                },
            }
        }
        tracing::debug!("Surface event loop stopped");
    }

    // ========== Wallet-side site management ==========

    /// Remove `origin` from the Authorization Set. Emits `DISCONNECT` to the
    /// origin when it was connected.
    pub async fn revoke_site(&self, origin: &Origin) -> bool {
        let removed = self.authorization.revoke(origin).await;
        if removed {
            self.audit(
                AuditEvent::new(AuditEventType::SiteDisconnected).with_origin(origin.as_str()),
            );
            self.emit(BrokerEvent::for_origin(
                EventKind::Disconnect,
                origin.clone(),
                json!({}),
            ));
            tracing::info!(origin = %origin, "Site disconnected");
        }
        removed
    }

    pub async fn connected_sites(&self) -> Vec<Origin> {
        self.authorization.sites().await
    }

    /// Tell every connected origin its account list changed.
    pub async fn publish_accounts_changed(&self) -> Result<(), BridgeError> {
        let accounts = self.wallet.accounts().await?;
        for origin in self.authorization.sites().await {
            self.emit(BrokerEvent::for_origin(
                EventKind::AccountsChanged,
                origin,
                json!({ "accounts": accounts }),
            ));
        }
        Ok(())
    }

    /// Tell every page the network changed.
    pub async fn publish_chain_changed(&self) -> Result<(), BridgeError> {
        let network = self.wallet.network().await?;
        self.emit(BrokerEvent::broadcast(EventKind::ChainChanged, json!(network)));
        Ok(())
    }

    fn emit(&self, event: BrokerEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("Broker event dropped: no relay subscribed");
        }
    }

    // ========== Audit ==========

    fn audit(&self, event: AuditEvent) {
        let Some(storage) = &self.audit else {
            return;
        };
        if let Err(e) = AuditRepository::new(storage).log(&event) {
            tracing::warn!(error = %e, event_type = ?event.event_type, "Failed to write audit event");
        }
    }

    fn audit_settlement(&self, origin: &Origin, request_id: &RequestId, settlement: &Settlement) {
        let event = match settlement {
            Settlement::Approved(result) if result.success => {
                AuditEvent::new(AuditEventType::ApprovalResolved)
            }
            Settlement::Approved(result) => AuditEvent::new(AuditEventType::ApprovalRejected)
                .failed(result.error.clone().unwrap_or_default()),
            Settlement::Rejected(reason) => {
                AuditEvent::new(AuditEventType::ApprovalRejected).failed(reason.clone())
            }
            Settlement::SurfaceClosed => {
                AuditEvent::new(AuditEventType::ApprovalClosed).failed("surface closed")
            }
            Settlement::TimedOut => {
                AuditEvent::new(AuditEventType::ApprovalTimedOut).failed("timed out")
            }
            Settlement::Failed(reason) => {
                AuditEvent::new(AuditEventType::ApprovalFailed).failed(reason.clone())
            }
        };
        self.audit(
            event
                .with_origin(origin.as_str())
                .with_request(request_id.as_str()),
        );
    }
}

fn rejection(result: ApprovalResult) -> BridgeError {
    BridgeError::UserRejected(
        result
            .error
            .unwrap_or_else(|| "request was declined".to_string()),
    )
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingSurface;
    use super::*;
    use crate::storage::fs::test_storage;
    use crate::wallet::FixedWallet;

    fn dapp() -> Origin {
        Origin::parse("https://dapp.test").unwrap()
    }

    fn broker_with(
        surface: Arc<RecordingSurface>,
        settings: BrokerSettings,
    ) -> Arc<Broker> {
        Arc::new(Broker::new(
            Arc::new(AuthorizationSet::in_memory()),
            surface,
            Arc::new(FixedWallet::new(&["addr-wallet"])),
            settings,
        ))
    }

    fn request(request: BrokerRequest) -> InboundRequest {
        InboundRequest {
            origin: dapp(),
            hostname: "dapp.test".into(),
            request,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn connect_escalates_then_authorizes() {
        let surface = Arc::new(RecordingSurface::default());
        let broker = broker_with(surface.clone(), BrokerSettings::default());
        let mut events = broker.subscribe_events();

        let task = tokio::spawn({
            let broker = broker.clone();
            async move { broker.handle(request(BrokerRequest::Connect(ConnectParams::default()))).await }
        });
        surface.wait_opened(1).await;

        let (_, descriptor, handle) = surface.last().unwrap();
        assert_eq!(descriptor.kind, ApprovalKind::Connect);
        assert_eq!(descriptor.origin, dapp());
        assert_eq!(broker.pending_count(), 1);

        assert!(handle.resolve(ApprovalResult::with_accounts(vec![
            crate::protocol::Account::new("addr1")
        ])));
        let reply = task.await.unwrap().unwrap();
        assert_eq!(reply, json!({"success": true, "accounts": [{"address": "addr1"}]}));

        assert!(broker.authorization().contains(&dapp()).await);
        assert_eq!(broker.pending_count(), 0);
        assert_eq!(surface.dismissed_count(), 1);

        let event = events.recv().await.unwrap();
        assert_eq!(event.kind, EventKind::Connect);
        assert_eq!(event.origin, Some(dapp()));
    }

    #[tokio::test]
    async fn authorized_connect_short_circuits() {
        let surface = Arc::new(RecordingSurface::default());
        let broker = broker_with(surface.clone(), BrokerSettings::default());
        broker.authorization().authorize(&dapp()).await;

        let reply = broker
            .handle(request(BrokerRequest::Connect(ConnectParams::default())))
            .await
            .unwrap();
        assert_eq!(reply["accounts"], json!([{"address": "addr-wallet"}]));
        assert_eq!(surface.opened_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn connect_declined_by_result_is_user_rejected() {
        let surface = Arc::new(RecordingSurface::default());
        let broker = broker_with(surface.clone(), BrokerSettings::default());

        let task = tokio::spawn({
            let broker = broker.clone();
            async move { broker.handle(request(BrokerRequest::Connect(ConnectParams::default()))).await }
        });
        surface.wait_opened(1).await;
        surface.last().unwrap().2.resolve(ApprovalResult {
            success: false,
            error: Some("nope".into()),
            ..ApprovalResult::default()
        });

        assert_eq!(
            task.await.unwrap(),
            Err(BridgeError::UserRejected("nope".into()))
        );
        assert!(!broker.authorization().contains(&dapp()).await);
    }

    #[tokio::test(start_paused = true)]
    async fn connect_times_out_after_budget() {
        let surface = Arc::new(RecordingSurface::default());
        let broker = broker_with(surface.clone(), BrokerSettings::default());

        let result = broker
            .handle(request(BrokerRequest::Connect(ConnectParams::default())))
            .await;
        assert_eq!(result, Err(BridgeError::RequestTimeout));
        assert_eq!(broker.pending_count(), 0);

        // A stale surface answering afterwards is a no-op.
        let (_, _, handle) = surface.last().unwrap();
        assert!(!handle.resolve(ApprovalResult::approved()));
        assert!(!broker.authorization().contains(&dapp()).await);
    }

    #[tokio::test(start_paused = true)]
    async fn surface_closed_rejects_with_user_closed() {
        let surface = Arc::new(RecordingSurface::default());
        let broker = broker_with(surface.clone(), BrokerSettings::default());

        let task = tokio::spawn({
            let broker = broker.clone();
            async move { broker.handle(request(BrokerRequest::Connect(ConnectParams::default()))).await }
        });
        surface.wait_opened(1).await;
        while broker.surface_listeners() == 0 {
            tokio::task::yield_now().await;
        }

        let (surface_id, _, handle) = surface.last().unwrap();
        assert!(broker.surface_closed(&surface_id));
        assert_eq!(task.await.unwrap(), Err(BridgeError::UserClosedSurface));
        assert!(!handle.reject("too late"));
        assert_eq!(broker.surface_listeners(), 0);
    }

    #[tokio::test]
    async fn failed_surface_open_is_approval_unavailable() {
        let surface = Arc::new(RecordingSurface::failing());
        let broker = broker_with(surface, BrokerSettings::default());

        let result = broker
            .handle(request(BrokerRequest::Connect(ConnectParams::default())))
            .await;
        assert!(matches!(result, Err(BridgeError::ApprovalUnavailable(_))));
        assert_eq!(broker.pending_count(), 0);
    }

    #[tokio::test]
    async fn privileged_requests_fail_closed_without_escalation() {
        let surface = Arc::new(RecordingSurface::default());
        let broker = broker_with(surface.clone(), BrokerSettings::default());

        let tx = TransactionRequest {
            from: None,
            to: "0xabc".into(),
            amount: "1".into(),
            asset_id: None,
            memo: None,
        };
        for req in [
            BrokerRequest::SendTransaction(tx),
            BrokerRequest::GetAssets(AssetsQuery::default()),
            BrokerRequest::GetAccounts,
            BrokerRequest::SignMessage(SignMessageParams {
                message: "hi".into(),
                address: None,
            }),
        ] {
            assert_eq!(broker.handle(request(req)).await, Err(BridgeError::NotConnected));
        }
        assert_eq!(surface.opened_count(), 0);
        assert_eq!(broker.pending_count(), 0);
    }

    #[tokio::test]
    async fn check_connection_never_escalates() {
        let surface = Arc::new(RecordingSurface::default());
        let broker = broker_with(surface.clone(), BrokerSettings::default());

        let reply = broker
            .handle(request(BrokerRequest::CheckConnection))
            .await
            .unwrap();
        assert_eq!(reply, json!({"connected": false, "accounts": []}));

        broker.authorization().authorize(&dapp()).await;
        let reply = broker
            .handle(request(BrokerRequest::CheckConnection))
            .await
            .unwrap();
        assert_eq!(reply["connected"], true);
        assert_eq!(surface.opened_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn send_transaction_uses_longer_budget_and_wallet_receipt() {
        let surface = Arc::new(RecordingSurface::default());
        let broker = broker_with(surface.clone(), BrokerSettings::default());
        broker.authorization().authorize(&dapp()).await;

        let tx = TransactionRequest {
            from: Some("addr-wallet".into()),
            to: "0xabc".into(),
            amount: "7".into(),
            asset_id: None,
            memo: None,
        };
        let task = tokio::spawn({
            let broker = broker.clone();
            async move { broker.handle(request(BrokerRequest::SendTransaction(tx))).await }
        });
        surface.wait_opened(1).await;

        // Still pending past the connect budget.
        tokio::time::sleep(Duration::from_secs(200)).await;
        assert_eq!(broker.pending_count(), 1);

        let (_, descriptor, handle) = surface.last().unwrap();
        assert_eq!(descriptor.kind, ApprovalKind::SendTransaction);
        assert_eq!(descriptor.transaction.as_ref().unwrap()["amount"], "7");
        handle.resolve(ApprovalResult::approved());

        let reply = task.await.unwrap().unwrap();
        assert_eq!(reply["txHash"], "0xhash");
        assert_eq!(reply["status"], "submitted");
        assert!(broker.authorization().contains(&dapp()).await);
    }

    #[tokio::test(start_paused = true)]
    async fn send_transaction_times_out_at_300_seconds() {
        let surface = Arc::new(RecordingSurface::default());
        let broker = broker_with(surface, BrokerSettings::default());
        broker.authorization().authorize(&dapp()).await;

        let started = tokio::time::Instant::now();
        let result = broker
            .handle(request(BrokerRequest::SendTransaction(TransactionRequest {
                from: None,
                to: "0xabc".into(),
                amount: "1".into(),
                asset_id: None,
                memo: None,
            })))
            .await;
        assert_eq!(result, Err(BridgeError::RequestTimeout));
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(300));
        assert!(elapsed < Duration::from_secs(301));
    }

    #[tokio::test]
    async fn sign_message_is_synchronous_by_default() {
        let surface = Arc::new(RecordingSurface::default());
        let broker = broker_with(surface.clone(), BrokerSettings::default());
        broker.authorization().authorize(&dapp()).await;

        let reply = broker
            .handle(request(BrokerRequest::SignMessage(SignMessageParams {
                message: "hello".into(),
                address: None,
            })))
            .await
            .unwrap();
        assert_eq!(reply["signature"], "0xsigned");
        assert_eq!(surface.opened_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn sign_message_escalates_when_configured() {
        let surface = Arc::new(RecordingSurface::default());
        let settings = BrokerSettings {
            escalate_signing: true,
            ..BrokerSettings::default()
        };
        let broker = broker_with(surface.clone(), settings);
        broker.authorization().authorize(&dapp()).await;

        let task = tokio::spawn({
            let broker = broker.clone();
            async move {
                broker
                    .handle(request(BrokerRequest::SignMessage(SignMessageParams {
                        message: "hello".into(),
                        address: None,
                    })))
                    .await
            }
        });
        surface.wait_opened(1).await;
        let (_, descriptor, handle) = surface.last().unwrap();
        assert_eq!(descriptor.kind, ApprovalKind::SignMessage);
        assert_eq!(descriptor.sign_message.as_deref(), Some("hello"));
        handle.reject("not today");

        assert_eq!(
            task.await.unwrap(),
            Err(BridgeError::UserRejected("not today".into()))
        );
    }

    #[tokio::test]
    async fn disconnect_is_idempotent_and_emits_once() {
        let surface = Arc::new(RecordingSurface::default());
        let broker = broker_with(surface, BrokerSettings::default());
        let mut events = broker.subscribe_events();
        broker.authorization().authorize(&dapp()).await;

        for _ in 0..2 {
            let reply = broker
                .handle(request(BrokerRequest::Disconnect))
                .await
                .unwrap();
            assert_eq!(reply, json!({"success": true}));
        }
        assert!(!broker.authorization().contains(&dapp()).await);

        let event = events.recv().await.unwrap();
        assert_eq!(event.kind, EventKind::Disconnect);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn accounts_changed_targets_connected_sites() {
        let surface = Arc::new(RecordingSurface::default());
        let broker = broker_with(surface, BrokerSettings::default());
        let mut events = broker.subscribe_events();
        let other = Origin::parse("https://other.test").unwrap();
        broker.authorization().authorize(&dapp()).await;
        broker.authorization().authorize(&other).await;

        broker.publish_accounts_changed().await.unwrap();
        let mut targets = vec![
            events.recv().await.unwrap().origin.unwrap(),
            events.recv().await.unwrap().origin.unwrap(),
        ];
        targets.sort();
        assert_eq!(targets, vec![dapp(), other]);

        broker.publish_chain_changed().await.unwrap();
        let chain = events.recv().await.unwrap();
        assert_eq!(chain.kind, EventKind::ChainChanged);
        assert!(chain.origin.is_none());
        assert_eq!(chain.payload["chainId"], "quasar-test");
    }

    #[tokio::test]
    async fn envelope_errors_encode_success_false() {
        let surface = Arc::new(RecordingSurface::default());
        let broker = broker_with(surface, BrokerSettings::default());

        let reply = broker
            .handle_envelope(RelayEnvelope {
                operation_type: "GET_ASSETS".into(),
                origin: "https://dapp.test".into(),
                hostname: None,
                payload: None,
            })
            .await;
        assert_eq!(reply["success"], false);
        assert_eq!(reply["error"], "Site is not connected to the wallet");

        let reply = broker
            .handle_envelope(RelayEnvelope {
                operation_type: "DRAIN".into(),
                origin: "https://dapp.test".into(),
                hostname: None,
                payload: None,
            })
            .await;
        assert_eq!(reply["code"], "protocol_error");
    }

    #[tokio::test(start_paused = true)]
    async fn escalation_outcomes_are_audited() {
        let (_dir, storage) = test_storage();
        let storage = Arc::new(storage);
        let surface = Arc::new(RecordingSurface::default());
        let broker = Arc::new(
            Broker::new(
                Arc::new(AuthorizationSet::in_memory()),
                surface.clone(),
                Arc::new(FixedWallet::new(&["addr1"])),
                BrokerSettings::default(),
            )
            .with_audit(storage.clone()),
        );

        let task = tokio::spawn({
            let broker = broker.clone();
            async move { broker.handle(request(BrokerRequest::Connect(ConnectParams::default()))).await }
        });
        surface.wait_opened(1).await;
        surface.last().unwrap().2.resolve(ApprovalResult::approved());
        task.await.unwrap().unwrap();

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let kinds: Vec<_> = AuditRepository::new(&storage)
            .read_events(&today)
            .unwrap()
            .into_iter()
            .map(|e| e.event_type)
            .collect();
        assert_eq!(
            kinds,
            vec![
                AuditEventType::ApprovalRequested,
                AuditEventType::ApprovalResolved,
                AuditEventType::SiteConnected,
            ]
        );
    }
}
