// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Page-level wire message and its namespace rules.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::events::EventKind;

/// Namespace prefix of every client-originated request type.
pub const REQUEST_PREFIX: &str = "QUASAR_";

/// Suffix appended to a request type to form its response type.
pub const RESPONSE_SUFFIX: &str = "_RESPONSE";

/// Namespace prefix of unsolicited Broker-originated events.
pub const EVENT_PREFIX: &str = "QUASAR_EVENT_";

/// How a page message must be treated by whoever reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageClass {
    /// A `QUASAR_` request awaiting a correlated response.
    Request,
    /// A reply travelling back to the page.
    Response,
    /// An unsolicited `QUASAR_EVENT_` notification.
    Event,
    /// Not in our namespace at all.
    Foreign,
}

/// `{ type, payload?, requestId?, error? }` as exchanged over the page bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(rename = "requestId", default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Message {
    pub fn request(
        message_type: impl Into<String>,
        payload: Option<Value>,
        request_id: impl Into<String>,
    ) -> Self {
        Self {
            message_type: message_type.into(),
            payload,
            request_id: Some(request_id.into()),
            error: None,
        }
    }

    /// Successful reply to `request_type`.
    pub fn response(request_type: &str, payload: Value, request_id: impl Into<String>) -> Self {
        Self {
            message_type: response_type(request_type),
            payload: Some(payload),
            request_id: Some(request_id.into()),
            error: None,
        }
    }

    /// Failed reply to `request_type`.
    pub fn error_response(
        request_type: &str,
        error: impl Into<String>,
        request_id: impl Into<String>,
    ) -> Self {
        Self {
            message_type: response_type(request_type),
            payload: None,
            request_id: Some(request_id.into()),
            error: Some(error.into()),
        }
    }

    /// Unsolicited event; never carries a request id.
    pub fn event(kind: EventKind, payload: Value) -> Self {
        Self {
            message_type: kind.message_type(),
            payload: Some(payload),
            request_id: None,
            error: None,
        }
    }

    pub fn classify(&self) -> MessageClass {
        let ty = self.message_type.as_str();
        if ty.ends_with(RESPONSE_SUFFIX) {
            MessageClass::Response
        } else if ty.starts_with(EVENT_PREFIX) {
            MessageClass::Event
        } else if ty.starts_with(REQUEST_PREFIX) {
            MessageClass::Request
        } else {
            MessageClass::Foreign
        }
    }

    pub fn is_response(&self) -> bool {
        self.classify() == MessageClass::Response
    }

    /// Attach a stable error code to an error response as `payload.code`.
    pub fn with_code(mut self, code: &str) -> Self {
        self.payload = Some(json!({ "code": code }));
        self
    }

    /// Error code of a failed response, when one was attached.
    pub fn error_code(&self) -> Option<&str> {
        self.error.as_ref()?;
        self.payload.as_ref()?.get("code")?.as_str()
    }
}

/// `<type>_RESPONSE`.
pub fn response_type(request_type: &str) -> String {
    format!("{request_type}{RESPONSE_SUFFIX}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classifies_by_namespace() {
        let req = Message::request("QUASAR_CONNECT", None, "r1");
        assert_eq!(req.classify(), MessageClass::Request);

        let resp = Message::response("QUASAR_CONNECT", json!({}), "r1");
        assert_eq!(resp.message_type, "QUASAR_CONNECT_RESPONSE");
        assert_eq!(resp.classify(), MessageClass::Response);

        let event = Message::event(EventKind::Disconnect, json!({}));
        assert_eq!(event.message_type, "QUASAR_EVENT_DISCONNECT");
        assert_eq!(event.classify(), MessageClass::Event);
        assert!(event.request_id.is_none());

        let other = Message::request("METAMASK_PING", None, "r2");
        assert_eq!(other.classify(), MessageClass::Foreign);
    }

    #[test]
    fn wire_shape_uses_camel_case_request_id() {
        let msg = Message::error_response("QUASAR_GET_ASSETS", "nope", "abc");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({"type": "QUASAR_GET_ASSETS_RESPONSE", "requestId": "abc", "error": "nope"})
        );

        let parsed: Message =
            serde_json::from_value(json!({"type": "QUASAR_DISCONNECT", "requestId": "x"})).unwrap();
        assert_eq!(parsed.request_id.as_deref(), Some("x"));
        assert!(parsed.payload.is_none());
    }

    #[test]
    fn error_code_travels_in_payload() {
        let msg = Message::error_response("QUASAR_GET_ASSETS", "nope", "abc").with_code("not_connected");
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "type": "QUASAR_GET_ASSETS_RESPONSE",
                "requestId": "abc",
                "error": "nope",
                "payload": {"code": "not_connected"}
            })
        );
        assert_eq!(msg.error_code(), Some("not_connected"));

        let ok = Message::response("QUASAR_GET_ASSETS", json!({"code": "x"}), "abc");
        assert_eq!(ok.error_code(), None);
    }
}
