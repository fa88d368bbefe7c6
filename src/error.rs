// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Error Taxonomy
//!
//! [`BridgeError`] is shared by every context. Errors detected by the Client
//! or the Relay never cross into the privileged process; errors produced by
//! the Broker travel back to the page as the `error` string of the response
//! message.
//!
//! [`ApiError`] is the HTTP rendition used by the daemon's axum handlers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

/// Errors raised anywhere along the Client → Relay → Broker path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    /// Unregistered or malformed message type/payload.
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// Privileged operation attempted by an origin that never connected.
    #[error("Site is not connected to the wallet")]
    NotConnected,

    /// The approval surface explicitly rejected the request.
    #[error("User rejected the request: {0}")]
    UserRejected(String),

    /// The approval surface was closed without a decision.
    #[error("User closed the approval window")]
    UserClosedSurface,

    /// No decision arrived within the escalation budget.
    #[error("Request timed out waiting for approval")]
    RequestTimeout,

    /// The privileged messaging primitive failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Error string relayed back to the page by the Relay.
    #[error("{0}")]
    Relay(String),

    /// No response reached the client within its correlation window.
    #[error("No response received within {0} seconds")]
    ClientTimeout(u64),

    /// The approval surface could not be opened.
    #[error("Approval surface unavailable: {0}")]
    ApprovalUnavailable(String),

    /// Wallet-data/signing collaborator failure.
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// Persistence failure.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl BridgeError {
    /// Stable snake_case code carried next to the human-readable message.
    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::Protocol(_) => "protocol_error",
            BridgeError::NotConnected => "not_connected",
            BridgeError::UserRejected(_) => "user_rejected",
            BridgeError::UserClosedSurface => "user_closed_surface",
            BridgeError::RequestTimeout => "request_timeout",
            BridgeError::Transport(_) => "transport_error",
            BridgeError::Relay(_) => "relay_error",
            BridgeError::ClientTimeout(_) => "client_timeout",
            BridgeError::ApprovalUnavailable(_) => "approval_unavailable",
            BridgeError::Wallet(_) => "wallet_error",
            BridgeError::Storage(_) => "storage_error",
        }
    }

    /// Rebuild an error the Relay passed back as `error` text plus `code`.
    /// Only `not_connected` keeps its type; everything else stays a
    /// [`BridgeError::Relay`] with the message verbatim.
    pub fn relayed(message: String, code: Option<&str>) -> Self {
        match code {
            Some("not_connected") => BridgeError::NotConnected,
            _ => BridgeError::Relay(message),
        }
    }

    /// HTTP status used when the error surfaces through the daemon API.
    pub fn status_code(&self) -> StatusCode {
        match self {
            BridgeError::Protocol(_) => StatusCode::BAD_REQUEST,
            BridgeError::NotConnected => StatusCode::UNAUTHORIZED,
            BridgeError::UserRejected(_) | BridgeError::UserClosedSurface => StatusCode::FORBIDDEN,
            BridgeError::RequestTimeout | BridgeError::ClientTimeout(_) => {
                StatusCode::GATEWAY_TIMEOUT
            }
            BridgeError::Transport(_) | BridgeError::Relay(_) => StatusCode::BAD_GATEWAY,
            BridgeError::ApprovalUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            BridgeError::Wallet(_) | BridgeError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<crate::storage::StorageError> for BridgeError {
    fn from(e: crate::storage::StorageError) -> Self {
        BridgeError::Storage(e.to_string())
    }
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub code: &'static str,
}

/// JSON error body returned by the daemon API.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Human-readable error message.
    pub error: String,
    /// Stable error code.
    pub code: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }
}

impl From<BridgeError> for ApiError {
    fn from(e: BridgeError) -> Self {
        Self::new(e.status_code(), e.code(), e.to_string())
    }
}

impl From<crate::storage::StorageError> for ApiError {
    fn from(e: crate::storage::StorageError) -> Self {
        BridgeError::from(e).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
            code: self.code.to_string(),
        });
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn codes_are_stable() {
        assert_eq!(BridgeError::NotConnected.code(), "not_connected");
        assert_eq!(BridgeError::UserClosedSurface.code(), "user_closed_surface");
        assert_eq!(BridgeError::RequestTimeout.code(), "request_timeout");
        assert_eq!(BridgeError::Protocol("x".into()).code(), "protocol_error");
    }

    #[test]
    fn relay_error_displays_message_verbatim() {
        let err = BridgeError::Relay("Site is not connected to the wallet".into());
        assert_eq!(err.to_string(), "Site is not connected to the wallet");
    }

    #[test]
    fn relayed_errors_keep_not_connected_typed() {
        assert_eq!(
            BridgeError::relayed("Site is not connected to the wallet".into(), Some("not_connected")),
            BridgeError::NotConnected
        );
        assert_eq!(
            BridgeError::relayed("User closed the approval window".into(), Some("user_closed_surface")),
            BridgeError::Relay("User closed the approval window".into())
        );
        assert_eq!(
            BridgeError::relayed("Unsupported message type: X".into(), None),
            BridgeError::Relay("Unsupported message type: X".into())
        );
    }

    #[test]
    fn bridge_error_maps_to_status() {
        let api: ApiError = BridgeError::NotConnected.into();
        assert_eq!(api.status, StatusCode::UNAUTHORIZED);
        assert_eq!(api.code, "not_connected");

        let api: ApiError = BridgeError::ApprovalUnavailable("gone".into()).into();
        assert_eq!(api.status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn into_response_returns_json_body() {
        let response = ApiError::bad_request("bad data").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert_eq!(body, r#"{"error":"bad data","code":"bad_request"}"#);
    }
}
