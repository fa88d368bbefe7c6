// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The Operation Registry: the only bridge between the page vocabulary
//! (`QUASAR_*`) and the Broker vocabulary. Client, Relay and Broker all read
//! this one table.

/// Every operation a page may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Connect,
    Disconnect,
    CheckConnection,
    GetAccounts,
    GetAssets,
    SendTransaction,
    SignMessage,
    GetNetwork,
}

/// Registry row for one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationSpec {
    pub operation: Operation,
    pub client_type: &'static str,
    pub broker_type: &'static str,
    /// Forward the page payload (when present).
    pub include_payload: bool,
    /// Forward the page hostname.
    pub include_hostname: bool,
}

pub static OPERATION_REGISTRY: [OperationSpec; 8] = [
    OperationSpec {
        operation: Operation::Connect,
        client_type: "QUASAR_CONNECT",
        broker_type: "CONNECT_WALLET",
        include_payload: true,
        include_hostname: true,
    },
    OperationSpec {
        operation: Operation::Disconnect,
        client_type: "QUASAR_DISCONNECT",
        broker_type: "DISCONNECT_WALLET",
        include_payload: false,
        include_hostname: false,
    },
    OperationSpec {
        operation: Operation::CheckConnection,
        client_type: "QUASAR_CHECK_CONNECTION",
        broker_type: "CHECK_CONNECTION",
        include_payload: false,
        include_hostname: false,
    },
    OperationSpec {
        operation: Operation::GetAccounts,
        client_type: "QUASAR_GET_ACCOUNTS",
        broker_type: "GET_ACCOUNTS",
        include_payload: false,
        include_hostname: false,
    },
    OperationSpec {
        operation: Operation::GetAssets,
        client_type: "QUASAR_GET_ASSETS",
        broker_type: "GET_ASSETS",
        include_payload: true,
        include_hostname: false,
    },
    OperationSpec {
        operation: Operation::SendTransaction,
        client_type: "QUASAR_SEND_TRANSACTION",
        broker_type: "SEND_TRANSACTION",
        include_payload: true,
        include_hostname: true,
    },
    OperationSpec {
        operation: Operation::SignMessage,
        client_type: "QUASAR_SIGN_MESSAGE",
        broker_type: "SIGN_MESSAGE",
        include_payload: true,
        include_hostname: true,
    },
    OperationSpec {
        operation: Operation::GetNetwork,
        client_type: "QUASAR_GET_NETWORK",
        broker_type: "GET_NETWORK",
        include_payload: false,
        include_hostname: false,
    },
];

impl Operation {
    pub fn from_client_type(client_type: &str) -> Option<Self> {
        OPERATION_REGISTRY
            .iter()
            .find(|spec| spec.client_type == client_type)
            .map(|spec| spec.operation)
    }

    pub fn from_broker_type(broker_type: &str) -> Option<Self> {
        OPERATION_REGISTRY
            .iter()
            .find(|spec| spec.broker_type == broker_type)
            .map(|spec| spec.operation)
    }

    pub fn spec(self) -> &'static OperationSpec {
        // Every variant has exactly one row; checked by `registry_is_complete`.
        match OPERATION_REGISTRY.iter().find(|spec| spec.operation == self) {
            Some(spec) => spec,
            None => unreachable!("operation {self:?} missing from registry"),
        }
    }

    pub fn client_type(self) -> &'static str {
        self.spec().client_type
    }

    pub fn broker_type(self) -> &'static str {
        self.spec().broker_type
    }

    /// Calls the client refuses locally while disconnected.
    pub fn requires_connection(self) -> bool {
        matches!(
            self,
            Operation::GetAccounts
                | Operation::GetAssets
                | Operation::SendTransaction
                | Operation::SignMessage
        )
    }
}
