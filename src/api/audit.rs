// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Read-only view of the audit trail for the wallet UI.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    error::ApiError,
    storage::{AuditEvent, AuditEventType, AuditRepository},
    state::AppState,
};

const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 1000;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct AuditQuery {
    /// First day, `YYYY-MM-DD`. Defaults to today (UTC).
    pub start_date: Option<String>,
    /// Last day, inclusive. Defaults to today (UTC).
    pub end_date: Option<String>,
    /// Only events concerning this origin.
    pub origin: Option<String>,
    /// Only events of this type, e.g. `approval_timed_out`.
    pub event_type: Option<AuditEventType>,
    /// Default 100, at most 1000.
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuditLogResponse {
    pub events: Vec<AuditEvent>,
    /// Matches before `limit`/`offset`.
    pub total: usize,
    pub has_more: bool,
}

fn parse_day(value: Option<&str>, field: &str) -> Result<NaiveDate, ApiError> {
    match value {
        None => Ok(Utc::now().date_naive()),
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| ApiError::bad_request(format!("Invalid {field}. Use YYYY-MM-DD."))),
    }
}

#[utoipa::path(
    get,
    path = "/v1/audit",
    params(AuditQuery),
    tag = "Audit",
    responses(
        (status = 200, body = AuditLogResponse),
        (status = 400, description = "Invalid date or range")
    )
)]
pub async fn query_audit(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<AuditLogResponse>, ApiError> {
    let start = parse_day(query.start_date.as_deref(), "start_date")?;
    let end = parse_day(query.end_date.as_deref(), "end_date")?;
    if start > end {
        return Err(ApiError::bad_request("start_date is after end_date"));
    }

    let mut events = AuditRepository::new(&state.storage).read_events_range(start, end)?;
    if let Some(origin) = &query.origin {
        events.retain(|e| e.origin.as_deref() == Some(origin.as_str()));
    }
    if let Some(event_type) = &query.event_type {
        events.retain(|e| &e.event_type == event_type);
    }

    let total = events.len();
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    let offset = query.offset.unwrap_or(0);
    let events: Vec<AuditEvent> = events.into_iter().skip(offset).take(limit).collect();

    Ok(Json(AuditLogResponse {
        has_more: offset + events.len() < total,
        events,
        total,
    }))
}
