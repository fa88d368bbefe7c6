// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};

use crate::{error::ApiError, protocol::NetworkInfo, state::AppState, wallet::WalletBackend};

#[utoipa::path(
    get,
    path = "/v1/network",
    tag = "Network",
    responses((status = 200, body = NetworkInfo))
)]
pub async fn get_network(State(state): State<AppState>) -> Result<Json<NetworkInfo>, ApiError> {
    Ok(Json(state.wallet.network().await?))
}

/// Switch the reported network. A real change is announced to every page.
#[utoipa::path(
    put,
    path = "/v1/network",
    request_body = NetworkInfo,
    tag = "Network",
    responses((status = 200, body = NetworkInfo))
)]
pub async fn set_network(
    State(state): State<AppState>,
    Json(network): Json<NetworkInfo>,
) -> Result<Json<NetworkInfo>, ApiError> {
    if network.chain_id.trim().is_empty() {
        return Err(ApiError::bad_request("chainId must not be empty"));
    }

    if state.wallet.set_network(network.clone()).await {
        tracing::info!(chain_id = %network.chain_id, "Network changed");
        state.broker.publish_chain_changed().await?;
    }
    Ok(Json(network))
}
