// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Shared Protocol
//!
//! Message shapes, the Operation Registry and typed payloads shared by the
//! Client, the Relay and the Broker. Both sides of the Relay import this one
//! module so the vocabularies cannot drift.

pub mod events;
pub mod message;
pub mod origin;
pub mod registry;
pub mod request;
pub mod types;

pub use events::{BrokerEvent, EventKind};
pub use message::{response_type, Message, MessageClass, EVENT_PREFIX, REQUEST_PREFIX, RESPONSE_SUFFIX};
pub use origin::Origin;
pub use registry::{Operation, OperationSpec, OPERATION_REGISTRY};
pub use request::{decode_reply, encode_reply, BrokerRequest, InboundRequest, RelayEnvelope};
pub use types::{
    Account, Asset, AssetsQuery, ConnectParams, ConnectionStatus, NetworkInfo, SignMessageParams,
    SignedMessage, TransactionReceipt, TransactionRequest,
};
