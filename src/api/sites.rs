// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{error::ApiError, protocol::Origin, state::AppState};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedSitesResponse {
    pub connected_sites: Vec<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SiteQuery {
    /// Origin to disconnect, e.g. `https://dapp.example`.
    pub origin: String,
}

#[utoipa::path(
    get,
    path = "/v1/sites",
    tag = "Sites",
    responses((status = 200, body = ConnectedSitesResponse))
)]
pub async fn list_sites(State(state): State<AppState>) -> Json<ConnectedSitesResponse> {
    let connected_sites = state
        .broker
        .connected_sites()
        .await
        .into_iter()
        .map(String::from)
        .collect();
    Json(ConnectedSitesResponse { connected_sites })
}

/// Disconnect a site from the wallet side. Idempotent.
#[utoipa::path(
    delete,
    path = "/v1/sites",
    params(SiteQuery),
    tag = "Sites",
    responses(
        (status = 204, description = "Site no longer connected"),
        (status = 400, description = "Invalid origin")
    )
)]
pub async fn revoke_site(
    State(state): State<AppState>,
    Query(query): Query<SiteQuery>,
) -> Result<StatusCode, ApiError> {
    let origin = Origin::parse(&query.origin).map_err(|e| ApiError::bad_request(e.to_string()))?;
    state.broker.revoke_site(&origin).await;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::test_app;

    #[tokio::test]
    async fn list_and_revoke() {
        let app = test_app();
        let origin = Origin::parse("https://dapp.test").unwrap();
        app.state.broker.authorization().authorize(&origin).await;

        let Json(body) = list_sites(State(app.state.clone())).await;
        assert_eq!(body.connected_sites, vec!["https://dapp.test".to_string()]);

        for _ in 0..2 {
            let status = revoke_site(
                State(app.state.clone()),
                Query(SiteQuery {
                    origin: "https://dapp.test".into(),
                }),
            )
            .await
            .unwrap();
            assert_eq!(status, StatusCode::NO_CONTENT);
        }

        let Json(body) = list_sites(State(app.state.clone())).await;
        assert!(body.connected_sites.is_empty());
    }

    #[tokio::test]
    async fn invalid_origin_is_bad_request() {
        let app = test_app();
        let err = revoke_site(
            State(app.state),
            Query(SiteQuery {
                origin: "not a url".into(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
