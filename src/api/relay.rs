// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};
use serde_json::Value;

use crate::{protocol::RelayEnvelope, state::AppState};

/// Cross-process Broker endpoint used by [`crate::relay::HttpTransport`].
///
/// Always answers 200; failures travel in the body as
/// `{success: false, error, code}`.
#[utoipa::path(
    post,
    path = "/v1/relay",
    request_body(content = Object, description = "`{type, origin, hostname?, payload?}`"),
    tag = "Relay",
    responses((status = 200, description = "Broker reply object", body = Object))
)]
pub async fn relay(
    State(state): State<AppState>,
    Json(envelope): Json<RelayEnvelope>,
) -> Json<Value> {
    tracing::debug!(operation = %envelope.operation_type, origin = %envelope.origin, "Relay request received");
    Json(state.broker.clone().dispatch(envelope).await)
}
