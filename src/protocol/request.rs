// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relay → Broker wire form and its typed parse.
//!
//! The Relay builds a [`RelayEnvelope`] from a registry row; the Broker turns
//! it into an [`InboundRequest`], a closed variant whose payload shape is
//! bound to the operation. Anything that does not parse is a protocol error.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::origin::Origin;
use super::registry::{Operation, OperationSpec};
use super::types::{AssetsQuery, ConnectParams, SignMessageParams, TransactionRequest};
use crate::error::BridgeError;

/// `{ type, origin, hostname?, payload? }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayEnvelope {
    #[serde(rename = "type")]
    pub operation_type: String,
    pub origin: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl RelayEnvelope {
    /// Build the forwarding message for a page request, honouring the
    /// registry row's payload/hostname flags.
    pub fn forward(spec: &OperationSpec, origin: &Origin, payload: Option<Value>) -> Self {
        Self {
            operation_type: spec.broker_type.to_string(),
            origin: origin.to_string(),
            hostname: spec.include_hostname.then(|| origin.hostname()),
            payload: if spec.include_payload { payload } else { None },
        }
    }
}

/// Typed Broker request.
#[derive(Debug, Clone, PartialEq)]
pub enum BrokerRequest {
    Connect(ConnectParams),
    Disconnect,
    CheckConnection,
    GetAccounts,
    GetAssets(AssetsQuery),
    SendTransaction(TransactionRequest),
    SignMessage(SignMessageParams),
    GetNetwork,
}

impl BrokerRequest {
    pub fn operation(&self) -> Operation {
        match self {
            BrokerRequest::Connect(_) => Operation::Connect,
            BrokerRequest::Disconnect => Operation::Disconnect,
            BrokerRequest::CheckConnection => Operation::CheckConnection,
            BrokerRequest::GetAccounts => Operation::GetAccounts,
            BrokerRequest::GetAssets(_) => Operation::GetAssets,
            BrokerRequest::SendTransaction(_) => Operation::SendTransaction,
            BrokerRequest::SignMessage(_) => Operation::SignMessage,
            BrokerRequest::GetNetwork => Operation::GetNetwork,
        }
    }
}

/// A validated request together with the page identity it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundRequest {
    pub origin: Origin,
    pub hostname: String,
    pub request: BrokerRequest,
}

impl InboundRequest {
    pub fn parse(envelope: RelayEnvelope) -> Result<Self, BridgeError> {
        let operation = Operation::from_broker_type(&envelope.operation_type).ok_or_else(|| {
            BridgeError::Protocol(format!(
                "unregistered operation type {:?}",
                envelope.operation_type
            ))
        })?;
        let origin = Origin::parse(&envelope.origin)?;
        let hostname = envelope.hostname.unwrap_or_else(|| origin.hostname());
        let payload = envelope.payload;

        let request = match operation {
            Operation::Connect => BrokerRequest::Connect(optional_payload(operation, payload)?),
            Operation::Disconnect => BrokerRequest::Disconnect,
            Operation::CheckConnection => BrokerRequest::CheckConnection,
            Operation::GetAccounts => BrokerRequest::GetAccounts,
            Operation::GetAssets => BrokerRequest::GetAssets(optional_payload(operation, payload)?),
            Operation::SendTransaction => {
                BrokerRequest::SendTransaction(required_payload(operation, payload)?)
            }
            Operation::SignMessage => {
                BrokerRequest::SignMessage(required_payload(operation, payload)?)
            }
            Operation::GetNetwork => BrokerRequest::GetNetwork,
        };

        Ok(Self {
            origin,
            hostname,
            request,
        })
    }
}

fn optional_payload<T: DeserializeOwned + Default>(
    operation: Operation,
    payload: Option<Value>,
) -> Result<T, BridgeError> {
    match payload {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value) => decode(operation, value),
    }
}

fn required_payload<T: DeserializeOwned>(
    operation: Operation,
    payload: Option<Value>,
) -> Result<T, BridgeError> {
    match payload {
        None | Some(Value::Null) => Err(BridgeError::Protocol(format!(
            "{} requires a payload",
            operation.broker_type()
        ))),
        Some(value) => decode(operation, value),
    }
}

fn decode<T: DeserializeOwned>(operation: Operation, value: Value) -> Result<T, BridgeError> {
    serde_json::from_value(value).map_err(|e| {
        BridgeError::Protocol(format!(
            "malformed {} payload: {e}",
            operation.broker_type()
        ))
    })
}

/// Encode a Broker outcome as the reply object sent back over the transport.
pub fn encode_reply(result: Result<Value, BridgeError>) -> Value {
    match result {
        Ok(value) => value,
        Err(e) => json!({
            "success": false,
            "error": e.to_string(),
            "code": e.code(),
        }),
    }
}

/// Decode a reply object. `{success:false, error}` becomes a relayed error.
pub fn decode_reply(reply: Value) -> Result<Value, BridgeError> {
    let failed = reply.get("success").and_then(Value::as_bool) == Some(false);
    if !failed {
        return Ok(reply);
    }
    let message = reply
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("Request failed")
        .to_string();
    Err(BridgeError::Relay(message))
}
