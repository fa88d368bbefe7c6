// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    approval_queue::ApprovalView,
    broker::{ApprovalDescriptor, ApprovalKind, ApprovalResult},
    error::ErrorBody,
    protocol::{Account, Asset, NetworkInfo, TransactionReceipt},
    state::AppState,
    storage::{AccountMetadata, AuditEvent, AuditEventType},
};

pub mod accounts;
pub mod approvals;
pub mod audit;
pub mod health;
pub mod network;
pub mod relay;
pub mod sites;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/relay", post(relay::relay))
        .route("/approvals", get(approvals::list_approvals))
        .route(
            "/approvals/{surface_id}",
            get(approvals::get_approval).delete(approvals::close_approval),
        )
        .route(
            "/approvals/{surface_id}/resolve",
            post(approvals::resolve_approval),
        )
        .route(
            "/approvals/{surface_id}/reject",
            post(approvals::reject_approval),
        )
        .route("/sites", get(sites::list_sites).delete(sites::revoke_site))
        .route(
            "/accounts",
            get(accounts::list_accounts).post(accounts::create_account),
        )
        .route(
            "/network",
            get(network::get_network).put(network::set_network),
        )
        .route("/audit", get(audit::query_audit));

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .nest("/v1", v1_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        relay::relay,
        approvals::list_approvals,
        approvals::get_approval,
        approvals::resolve_approval,
        approvals::reject_approval,
        approvals::close_approval,
        sites::list_sites,
        sites::revoke_site,
        accounts::list_accounts,
        accounts::create_account,
        network::get_network,
        network::set_network,
        audit::query_audit
    ),
    components(
        schemas(
            ApprovalView,
            ApprovalDescriptor,
            ApprovalKind,
            ApprovalResult,
            approvals::RejectApprovalRequest,
            sites::ConnectedSitesResponse,
            accounts::CreateAccountRequest,
            AccountMetadata,
            AuditEvent,
            AuditEventType,
            audit::AuditLogResponse,
            Account,
            Asset,
            NetworkInfo,
            TransactionReceipt,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse,
            ErrorBody
        )
    ),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Relay", description = "Cross-process Broker endpoint"),
        (name = "Approvals", description = "Pending approval surfaces"),
        (name = "Sites", description = "Connected-site management"),
        (name = "Accounts", description = "Wallet accounts"),
        (name = "Network", description = "Reported network"),
        (name = "Audit", description = "Authorization and approval audit trail")
    )
)]
struct ApiDoc;
