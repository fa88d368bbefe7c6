// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audit logging for authorization changes and approval outcomes.
//!
//! Events are appended to `audit/{date}/events.jsonl`, one JSON object per
//! line.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{FileStorage, StorageError, StorageResult};

/// Types of auditable events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // Authorization set
    SiteConnected,
    SiteDisconnected,

    // Escalation lifecycle
    ApprovalRequested,
    ApprovalResolved,
    ApprovalRejected,
    ApprovalClosed,
    ApprovalTimedOut,
    ApprovalFailed,

    // Wallet operations
    TransactionSubmitted,
    MessageSigned,
    AccountCreated,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    /// Page origin the event concerns (if any).
    pub origin: Option<String>,
    /// Escalation request id (if any).
    pub request_id: Option<String>,
    /// Resource affected (account id, tx hash, ...).
    pub resource_id: Option<String>,
    pub resource_type: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
    pub success: bool,
    pub error: Option<String>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            origin: None,
            request_id: None,
            resource_id: None,
            resource_type: None,
            details: None,
            success: true,
            error: None,
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn with_request(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_resource(
        mut self,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Mark as failed with error message.
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }
}

pub struct AuditRepository<'a> {
    storage: &'a FileStorage,
}

impl<'a> AuditRepository<'a> {
    pub fn new(storage: &'a FileStorage) -> Self {
        Self { storage }
    }

    /// Append an event to the daily log.
    pub fn log(&self, event: &AuditEvent) -> StorageResult<()> {
        let date = event.timestamp.format("%Y-%m-%d").to_string();
        let path = self.storage.paths().audit_events_file(&date);

        let mut line = serde_json::to_vec(event).map_err(|e| {
            StorageError::Encoding(format!("Failed to serialize audit event: {e}"))
        })?;
        line.push(b'\n');

        self.storage.append_raw(&path, &line)
    }

    pub fn read_events(&self, date: &str) -> StorageResult<Vec<AuditEvent>> {
        let path = self.storage.paths().audit_events_file(date);
        let content = self.storage.read_raw(&path)?;

        let content = String::from_utf8(content).map_err(|e| {
            StorageError::Encoding(format!("Invalid UTF-8 in audit log: {e}"))
        })?;

        let mut events = Vec::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let event: AuditEvent = serde_json::from_str(line).map_err(|e| {
                StorageError::Encoding(format!("Failed to deserialize audit event: {e}"))
            })?;
            events.push(event);
        }

        Ok(events)
    }

    /// Read events for an inclusive date range; missing days are skipped.
    pub fn read_events_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StorageResult<Vec<AuditEvent>> {
        let mut events = Vec::new();
        for day in start.iter_days().take_while(|day| *day <= end) {
            match self.read_events(&day.format("%Y-%m-%d").to_string()) {
                Ok(day_events) => events.extend(day_events),
                Err(StorageError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::fs::test_storage;

    fn today() -> String {
        Utc::now().format("%Y-%m-%d").to_string()
    }

    #[test]
    fn create_audit_event() {
        let event = AuditEvent::new(AuditEventType::SiteConnected)
            .with_origin("https://dapp.test")
            .with_request("req-1");

        assert_eq!(event.event_type, AuditEventType::SiteConnected);
        assert_eq!(event.origin.as_deref(), Some("https://dapp.test"));
        assert_eq!(event.request_id.as_deref(), Some("req-1"));
        assert!(event.success);
    }

    #[test]
    fn failed_event() {
        let event = AuditEvent::new(AuditEventType::ApprovalTimedOut).failed("no decision");

        assert!(!event.success);
        assert_eq!(event.error.as_deref(), Some("no decision"));
    }

    #[test]
    fn log_and_read_events_in_order() {
        let (_dir, storage) = test_storage();
        let repo = AuditRepository::new(&storage);

        repo.log(&AuditEvent::new(AuditEventType::ApprovalRequested).with_origin("https://a.test"))
            .unwrap();
        repo.log(&AuditEvent::new(AuditEventType::ApprovalResolved).with_origin("https://a.test"))
            .unwrap();

        let events = repo.read_events(&today()).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, AuditEventType::ApprovalRequested);
        assert_eq!(events[1].event_type, AuditEventType::ApprovalResolved);
    }

    #[test]
    fn range_skips_missing_days() {
        let (_dir, storage) = test_storage();
        let repo = AuditRepository::new(&storage);
        repo.log(&AuditEvent::new(AuditEventType::AccountCreated)).unwrap();

        let today = Utc::now().date_naive();
        let week_ago = today - chrono::Days::new(7);
        let events = repo.read_events_range(week_ago, today).unwrap();
        assert_eq!(events.len(), 1);
    }
}
