// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Web origin (scheme + host + port) used as the authorization key.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::BridgeError;

/// Normalized tuple origin, e.g. `https://dapp.test` or `http://localhost:3000`.
///
/// Parsing goes through the `url` crate so default ports are elided and
/// hosts are lowercased; paths, queries and fragments are dropped.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Origin(String);

impl Origin {
    pub fn parse(input: &str) -> Result<Self, BridgeError> {
        let url = Url::parse(input.trim())
            .map_err(|e| BridgeError::Protocol(format!("invalid origin {input:?}: {e}")))?;
        let origin = url.origin();
        if !origin.is_tuple() {
            return Err(BridgeError::Protocol(format!(
                "opaque origin {input:?} cannot be authorized"
            )));
        }
        Ok(Self(origin.ascii_serialization()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Host component, without port.
    pub fn hostname(&self) -> String {
        Url::parse(&self.0)
            .ok()
            .and_then(|url| url.host_str().map(str::to_owned))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Origin {
    type Error = BridgeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Origin::parse(&value)
    }
}

impl From<Origin> for String {
    fn from(value: Origin) -> Self {
        value.0
    }
}
