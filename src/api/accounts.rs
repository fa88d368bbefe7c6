// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    error::ApiError,
    state::AppState,
    storage::{AccountMetadata, AuditEvent, AuditEventType, AuditRepository},
};

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CreateAccountRequest {
    /// Display label for the new account.
    pub label: Option<String>,
}

#[utoipa::path(
    get,
    path = "/v1/accounts",
    tag = "Accounts",
    responses((status = 200, body = [AccountMetadata]))
)]
pub async fn list_accounts(State(state): State<AppState>) -> Json<Vec<AccountMetadata>> {
    Json(state.wallet.account_metadata().await)
}

/// Create an account and notify every connected site.
#[utoipa::path(
    post,
    path = "/v1/accounts",
    request_body = CreateAccountRequest,
    tag = "Accounts",
    responses((status = 201, body = AccountMetadata))
)]
pub async fn create_account(
    State(state): State<AppState>,
    Json(request): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<AccountMetadata>), ApiError> {
    let meta = state.wallet.create_account(request.label).await?;
    tracing::info!(account_id = %meta.account_id, address = %meta.address, "Account created");

    let event = AuditEvent::new(AuditEventType::AccountCreated)
        .with_resource("account", &meta.account_id);
    if let Err(e) = AuditRepository::new(&state.storage).log(&event) {
        tracing::warn!(error = %e, "Failed to write audit event");
    }

    if let Err(e) = state.broker.publish_accounts_changed().await {
        tracing::warn!(error = %e, "Failed to publish account change");
    }

    Ok((StatusCode::CREATED, Json(meta)))
}
