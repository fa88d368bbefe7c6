// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Wallet-Data Collaborator
//!
//! The Broker never touches keys directly. It asks a [`WalletBackend`] for
//! accounts, assets and signatures once the origin is authorized (and, for
//! transactions, once the user approved).
//!
//! [`LocalWallet`] keeps secp256k1 accounts under `accounts/` and signs with
//! alloy's local signer. Nothing is broadcast to a chain: the receipt hash is
//! derived from the signature.

pub mod signing;

use std::sync::Arc;

use alloy::primitives::keccak256;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use async_trait::async_trait;
use serde_json::json;
use tokio::sync::RwLock;

use crate::error::BridgeError;
use crate::protocol::{
    Account, Asset, NetworkInfo, SignedMessage, TransactionReceipt, TransactionRequest,
};
use crate::storage::{AccountMetadata, AccountRepository, FileStorage};

/// Wallet data and signing, as seen by the Broker.
#[async_trait]
pub trait WalletBackend: Send + Sync {
    async fn accounts(&self) -> Result<Vec<Account>, BridgeError>;

    /// Holdings of `address`, or of the default account when `None`.
    async fn assets(&self, address: Option<&str>) -> Result<Vec<Asset>, BridgeError>;

    async fn sign_message(
        &self,
        message: &str,
        address: Option<&str>,
    ) -> Result<SignedMessage, BridgeError>;

    async fn send_transaction(
        &self,
        tx: &TransactionRequest,
    ) -> Result<TransactionReceipt, BridgeError>;

    async fn network(&self) -> Result<NetworkInfo, BridgeError>;
}

/// Holdings every bootstrapped account starts with.
pub fn default_assets() -> Vec<Asset> {
    vec![Asset {
        asset_id: "native".to_string(),
        symbol: "QSR".to_string(),
        name: "Quasar".to_string(),
        amount: "0".to_string(),
        decimals: 18,
    }]
}

struct LoadedAccount {
    meta: AccountMetadata,
    signer: PrivateKeySigner,
}

impl LoadedAccount {
    fn public(&self) -> Account {
        Account {
            address: self.meta.address.clone(),
            label: self.meta.label.clone(),
        }
    }
}

/// File-backed wallet with locally held keys.
pub struct LocalWallet {
    storage: Arc<FileStorage>,
    accounts: RwLock<Vec<LoadedAccount>>,
    network: RwLock<NetworkInfo>,
}

impl LocalWallet {
    /// Load every persisted account, creating a first one when none exist.
    pub fn open(storage: Arc<FileStorage>, network: NetworkInfo) -> Result<Self, BridgeError> {
        let repo = AccountRepository::new(&storage);
        let mut metas = repo.list()?;
        if metas.is_empty() {
            let meta = repo.create(Some("Account 1".to_string()), default_assets())?;
            tracing::info!(account_id = %meta.account_id, address = %meta.address, "Bootstrapped first account");
            metas.push(meta);
        }

        let mut loaded = Vec::with_capacity(metas.len());
        for meta in metas {
            loaded.push(load_account(&repo, meta)?);
        }

        Ok(Self {
            storage,
            accounts: RwLock::new(loaded),
            network: RwLock::new(network),
        })
    }

    /// Create and load a new account.
    pub async fn create_account(
        &self,
        label: Option<String>,
    ) -> Result<AccountMetadata, BridgeError> {
        let repo = AccountRepository::new(&self.storage);
        let meta = repo.create(label, default_assets())?;
        let account = load_account(&repo, meta.clone())?;
        self.accounts.write().await.push(account);
        Ok(meta)
    }

    pub async fn account_metadata(&self) -> Vec<AccountMetadata> {
        self.accounts
            .read()
            .await
            .iter()
            .map(|a| a.meta.clone())
            .collect()
    }

    /// Replace the reported network. Returns `true` when it changed.
    pub async fn set_network(&self, network: NetworkInfo) -> bool {
        let mut current = self.network.write().await;
        if *current == network {
            return false;
        }
        *current = network;
        true
    }

    async fn with_account<T>(
        &self,
        address: Option<&str>,
        f: impl FnOnce(&LoadedAccount) -> Result<T, BridgeError>,
    ) -> Result<T, BridgeError> {
        let accounts = self.accounts.read().await;
        let account = match address {
            None => accounts.first(),
            Some(address) => accounts
                .iter()
                .find(|a| a.meta.address.eq_ignore_ascii_case(address)),
        }
        .ok_or_else(|| {
            BridgeError::Wallet(format!(
                "Unknown account {}",
                address.unwrap_or("(default)")
            ))
        })?;
        f(account)
    }
}

fn load_account(
    repo: &AccountRepository<'_>,
    meta: AccountMetadata,
) -> Result<LoadedAccount, BridgeError> {
    let pem = repo.read_private_key(&meta.account_id)?;
    let signer =
        signing::signer_from_pem(&pem).map_err(|e| BridgeError::Wallet(e.to_string()))?;
    Ok(LoadedAccount { meta, signer })
}

fn sign_bytes(signer: &PrivateKeySigner, bytes: &[u8]) -> Result<[u8; 65], BridgeError> {
    let signature = signer
        .sign_message_sync(bytes)
        .map_err(|e| BridgeError::Wallet(format!("signing failed: {e}")))?;
    Ok(signature.as_bytes())
}

#[async_trait]
impl WalletBackend for LocalWallet {
    async fn accounts(&self) -> Result<Vec<Account>, BridgeError> {
        Ok(self
            .accounts
            .read()
            .await
            .iter()
            .map(LoadedAccount::public)
            .collect())
    }

    async fn assets(&self, address: Option<&str>) -> Result<Vec<Asset>, BridgeError> {
        self.with_account(address, |account| Ok(account.meta.assets.clone()))
            .await
    }

    async fn sign_message(
        &self,
        message: &str,
        address: Option<&str>,
    ) -> Result<SignedMessage, BridgeError> {
        self.with_account(address, |account| {
            let signature = sign_bytes(&account.signer, message.as_bytes())?;
            Ok(SignedMessage {
                address: account.meta.address.clone(),
                message: message.to_string(),
                signature: format!("0x{}", alloy::hex::encode(signature)),
            })
        })
        .await
    }

    async fn send_transaction(
        &self,
        tx: &TransactionRequest,
    ) -> Result<TransactionReceipt, BridgeError> {
        let chain_id = self.network.read().await.chain_id.clone();
        self.with_account(tx.from.as_deref(), |account| {
            let canonical = json!({
                "chainId": chain_id,
                "from": account.meta.address,
                "to": tx.to,
                "amount": tx.amount,
                "assetId": tx.asset_id,
                "memo": tx.memo,
            });
            let bytes = serde_json::to_vec(&canonical)
                .map_err(|e| BridgeError::Wallet(format!("encoding failed: {e}")))?;
            let signature = sign_bytes(&account.signer, &bytes)?;
            let tx_hash = keccak256(signature);

            Ok(TransactionReceipt {
                tx_hash: format!("0x{}", alloy::hex::encode(tx_hash)),
                from: account.meta.address.clone(),
                to: tx.to.clone(),
                amount: tx.amount.clone(),
                asset_id: tx.asset_id.clone(),
                status: "submitted".to_string(),
            })
        })
        .await
    }

    async fn network(&self) -> Result<NetworkInfo, BridgeError> {
        Ok(self.network.read().await.clone())
    }
}

/// Deterministic wallet for tests: fixed accounts, canned signatures.
#[cfg(test)]
pub(crate) struct FixedWallet {
    pub accounts: Vec<Account>,
}

#[cfg(test)]
impl FixedWallet {
    pub fn new(addresses: &[&str]) -> Self {
        Self {
            accounts: addresses.iter().map(|a| Account::new(*a)).collect(),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl WalletBackend for FixedWallet {
    async fn accounts(&self) -> Result<Vec<Account>, BridgeError> {
        Ok(self.accounts.clone())
    }

    async fn assets(&self, _address: Option<&str>) -> Result<Vec<Asset>, BridgeError> {
        Ok(default_assets())
    }

    async fn sign_message(
        &self,
        message: &str,
        address: Option<&str>,
    ) -> Result<SignedMessage, BridgeError> {
        Ok(SignedMessage {
            address: address
                .map(str::to_string)
                .or_else(|| self.accounts.first().map(|a| a.address.clone()))
                .unwrap_or_default(),
            message: message.to_string(),
            signature: "0xsigned".to_string(),
        })
    }

    async fn send_transaction(
        &self,
        tx: &TransactionRequest,
    ) -> Result<TransactionReceipt, BridgeError> {
        Ok(TransactionReceipt {
            tx_hash: "0xhash".to_string(),
            from: tx.from.clone().unwrap_or_default(),
            to: tx.to.clone(),
            amount: tx.amount.clone(),
            asset_id: tx.asset_id.clone(),
            status: "submitted".to_string(),
        })
    }

    async fn network(&self) -> Result<NetworkInfo, BridgeError> {
        Ok(NetworkInfo {
            chain_id: "quasar-test".to_string(),
            name: "Quasar Test".to_string(),
        })
    }
}
