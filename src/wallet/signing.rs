// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Key material handling for local accounts.
//!
//! Accounts store their secp256k1 key as PKCS#8 PEM. This module generates
//! those keys and turns them back into alloy signers.

use alloy::signers::local::PrivateKeySigner;
use k256::ecdsa::SigningKey;
use k256::elliptic_curve::rand_core::OsRng;
use k256::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use k256::SecretKey;

#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Key generation failed: {0}")]
    Generation(String),
}

/// Parse a PEM private key (PKCS#8, or SEC1 as fallback) to hex.
pub fn pem_to_hex(pem_bytes: &[u8]) -> Result<String, KeyError> {
    let secret_key = secret_key_from_pem(pem_bytes)?;
    Ok(alloy::hex::encode(secret_key.to_bytes()))
}

fn secret_key_from_pem(pem_bytes: &[u8]) -> Result<SecretKey, KeyError> {
    let pem_str = std::str::from_utf8(pem_bytes)
        .map_err(|e| KeyError::InvalidPrivateKey(format!("Invalid UTF-8: {e}")))?;

    let pem = pem::parse(pem_str)
        .map_err(|e| KeyError::InvalidPrivateKey(format!("Invalid PEM: {e}")))?;

    SecretKey::from_pkcs8_der(pem.contents())
        .or_else(|_| SecretKey::from_sec1_der(pem.contents()))
        .map_err(|e| KeyError::InvalidPrivateKey(format!("Invalid key format: {e}")))
}

/// Create a signer from a PEM-encoded private key.
pub fn signer_from_pem(pem_bytes: &[u8]) -> Result<PrivateKeySigner, KeyError> {
    let secret_key = secret_key_from_pem(pem_bytes)?;
    PrivateKeySigner::from_slice(&secret_key.to_bytes())
        .map_err(|e| KeyError::InvalidPrivateKey(e.to_string()))
}

/// Generate a fresh keypair. Returns `(pkcs8_pem, checksummed_address)`.
pub fn generate_keypair() -> Result<(String, String), KeyError> {
    let signing_key = SigningKey::random(&mut OsRng);
    let private_key_pem = signing_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| KeyError::Generation(format!("failed to encode private key: {e}")))?;

    let signer = signer_from_pem(private_key_pem.as_bytes())?;
    Ok((private_key_pem.to_string(), signer.address().to_checksum(None)))
}
