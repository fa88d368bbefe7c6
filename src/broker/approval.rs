// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Approval Surface contract.
//!
//! A surface is opened with an [`ApprovalDescriptor`] and an
//! [`ApprovalHandle`]. It answers through the handle exactly once, or it is
//! closed by the user, which it reports as [`SurfaceEvent::Closed`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use super::pending::PendingRequests;
use crate::error::BridgeError;
use crate::protocol::{Account, TransactionReceipt};

/// Opaque escalation id, generated per escalation and never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of one opened surface instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SurfaceId(String);

impl SurfaceId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SurfaceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalKind {
    Connect,
    SendTransaction,
    SignMessage,
}

/// What the surface is asked to approve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalDescriptor {
    #[schema(value_type = String)]
    pub request_id: RequestId,
    pub kind: ApprovalKind,
    #[schema(value_type = String)]
    pub origin: crate::protocol::Origin,
    pub hostname: String,
    /// Human-readable summary shown to the user.
    pub message: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub transaction: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sign_message: Option<String>,
}

/// The surface's answer on resolve.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalResult {
    pub success: bool,
    /// Accounts exposed to the site (connect).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accounts: Option<Vec<Account>>,
    /// Receipt when the surface already submitted the transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt: Option<TransactionReceipt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApprovalResult {
    pub fn approved() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn with_accounts(accounts: Vec<Account>) -> Self {
        Self {
            success: true,
            accounts: Some(accounts),
            ..Self::default()
        }
    }
}

/// Terminal transition of a pending entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    Approved(ApprovalResult),
    Rejected(String),
    SurfaceClosed,
    TimedOut,
    /// The surface could not be opened.
    Failed(String),
}

impl Settlement {
    pub fn label(&self) -> &'static str {
        match self {
            Settlement::Approved(_) => "approved",
            Settlement::Rejected(_) => "rejected",
            Settlement::SurfaceClosed => "surface_closed",
            Settlement::TimedOut => "timed_out",
            Settlement::Failed(_) => "failed",
        }
    }
}

/// Capability handed to a surface to answer one escalation.
///
/// Calls after the entry settled (timeout, close, earlier answer) return
/// `false` and change nothing.
#[derive(Clone)]
pub struct ApprovalHandle {
    request_id: RequestId,
    pending: Arc<PendingRequests>,
}

impl std::fmt::Debug for ApprovalHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalHandle")
            .field("request_id", &self.request_id)
            .finish_non_exhaustive()
    }
}

impl ApprovalHandle {
    pub(crate) fn new(request_id: RequestId, pending: Arc<PendingRequests>) -> Self {
        Self {
            request_id,
            pending,
        }
    }

    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    pub fn resolve(&self, result: ApprovalResult) -> bool {
        self.pending
            .settle(&self.request_id, Settlement::Approved(result))
    }

    pub fn reject(&self, reason: impl Into<String>) -> bool {
        self.pending
            .settle(&self.request_id, Settlement::Rejected(reason.into()))
    }

    /// Whether the entry is still waiting for a decision.
    pub fn is_pending(&self) -> bool {
        self.pending.contains(&self.request_id)
    }
}

/// Lifecycle notifications emitted by a surface implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    Closed(SurfaceId),
}

/// Transient UI that decides one escalated request.
#[async_trait]
pub trait ApprovalSurface: Send + Sync {
    /// Show the request. The surface must eventually call exactly one of
    /// `handle.resolve` / `handle.reject`, or report that it was closed.
    async fn open(
        &self,
        descriptor: ApprovalDescriptor,
        handle: ApprovalHandle,
    ) -> Result<SurfaceId, BridgeError>;

    /// Remove a surface the Broker opened. Idempotent.
    async fn dismiss(&self, surface_id: &SurfaceId);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn descriptor_serializes_camel_case_with_screaming_kind() {
        let descriptor = ApprovalDescriptor {
            request_id: RequestId("r1".into()),
            kind: ApprovalKind::Connect,
            origin: crate::protocol::Origin::parse("https://dapp.test").unwrap(),
            hostname: "dapp.test".into(),
            message: "connect?".into(),
            created_at: DateTime::from_timestamp(0, 0).unwrap(),
            preferred_address: None,
            transaction: None,
            sign_message: None,
        };
        let value = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(value["kind"], "CONNECT");
        assert_eq!(value["requestId"], "r1");
        assert_eq!(value["origin"], "https://dapp.test");
        assert!(value.get("transaction").is_none());
    }

    #[test]
    fn approval_result_parses_minimal_body() {
        let result: ApprovalResult = serde_json::from_value(json!({
            "success": true,
            "accounts": [{"address": "addr1"}]
        }))
        .unwrap();
        assert_eq!(result, ApprovalResult::with_accounts(vec![Account::new("addr1")]));
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(RequestId::generate(), RequestId::generate());
        assert_ne!(SurfaceId::generate(), SurfaceId::generate());
    }
}
