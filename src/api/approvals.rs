// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Approval Surface endpoints for the wallet UI.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    approval_queue::ApprovalView,
    broker::{ApprovalResult, SurfaceId},
    error::ApiError,
    state::AppState,
};

const DEFAULT_REJECT_REASON: &str = "User rejected the request";

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RejectApprovalRequest {
    /// Shown to the requesting page.
    pub reason: Option<String>,
}

fn gone(surface_id: &SurfaceId) -> ApiError {
    ApiError::not_found(format!("Approval {surface_id} not found or already settled"))
}

#[utoipa::path(
    get,
    path = "/v1/approvals",
    tag = "Approvals",
    responses((status = 200, body = [ApprovalView]))
)]
pub async fn list_approvals(State(state): State<AppState>) -> Json<Vec<ApprovalView>> {
    Json(state.approvals.list().await)
}

#[utoipa::path(
    get,
    path = "/v1/approvals/{surface_id}",
    params(("surface_id" = String, Path, description = "Approval surface identifier")),
    tag = "Approvals",
    responses(
        (status = 200, body = ApprovalView),
        (status = 404, description = "No such open approval")
    )
)]
pub async fn get_approval(
    Path(surface_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ApprovalView>, ApiError> {
    let surface_id = SurfaceId::from(surface_id);
    state
        .approvals
        .get(&surface_id)
        .await
        .map(Json)
        .ok_or_else(|| gone(&surface_id))
}

#[utoipa::path(
    post,
    path = "/v1/approvals/{surface_id}/resolve",
    params(("surface_id" = String, Path, description = "Approval surface identifier")),
    request_body = ApprovalResult,
    tag = "Approvals",
    responses(
        (status = 204, description = "Request approved"),
        (status = 404, description = "No such open approval")
    )
)]
pub async fn resolve_approval(
    Path(surface_id): Path<String>,
    State(state): State<AppState>,
    Json(result): Json<ApprovalResult>,
) -> Result<StatusCode, ApiError> {
    let surface_id = SurfaceId::from(surface_id);
    if state.approvals.resolve(&surface_id, result).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(gone(&surface_id))
    }
}

#[utoipa::path(
    post,
    path = "/v1/approvals/{surface_id}/reject",
    params(("surface_id" = String, Path, description = "Approval surface identifier")),
    request_body = RejectApprovalRequest,
    tag = "Approvals",
    responses(
        (status = 204, description = "Request rejected"),
        (status = 404, description = "No such open approval")
    )
)]
pub async fn reject_approval(
    Path(surface_id): Path<String>,
    State(state): State<AppState>,
    body: Option<Json<RejectApprovalRequest>>,
) -> Result<StatusCode, ApiError> {
    let surface_id = SurfaceId::from(surface_id);
    let reason = body
        .and_then(|Json(body)| body.reason)
        .unwrap_or_else(|| DEFAULT_REJECT_REASON.to_string());
    if state.approvals.reject(&surface_id, reason).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(gone(&surface_id))
    }
}

/// The user closed the surface without deciding.
#[utoipa::path(
    delete,
    path = "/v1/approvals/{surface_id}",
    params(("surface_id" = String, Path, description = "Approval surface identifier")),
    tag = "Approvals",
    responses(
        (status = 204, description = "Surface closed"),
        (status = 404, description = "No such open approval")
    )
)]
pub async fn close_approval(
    Path(surface_id): Path<String>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let surface_id = SurfaceId::from(surface_id);
    if state.approvals.close(&surface_id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(gone(&surface_id))
    }
}
