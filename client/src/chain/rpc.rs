use anyhow::{Context, Result};
use async_trait::async_trait;
use solana_account_decoder::UiAccountEncoding;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::{RpcAccountInfoConfig, RpcProgramAccountsConfig};
use solana_client::rpc_filter::RpcFilterType;
use solana_sdk::account::Account;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::{self, Transaction};
use std::time::Duration;
use tracing::debug;

/// Cluster operations the chain client needs. `HttpRpcClient` talks to a
/// real node; tests run against an in-memory implementation.
#[async_trait]
pub trait SolanaRpc: Send + Sync {
    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>>;

    async fn get_program_accounts(
        &self,
        program_id: &Pubkey,
        filters: Vec<RpcFilterType>,
    ) -> Result<Vec<(Pubkey, Account)>>;

    async fn get_latest_blockhash(&self) -> Result<Hash>;

    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature>;

    /// `None` until the transaction reaches the client's commitment level.
    async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<transaction::Result<()>>>;
}

pub struct HttpRpcClient {
    client: RpcClient,
    commitment: CommitmentConfig,
}

impl HttpRpcClient {
    pub fn new(url: &str, commitment: CommitmentConfig, timeout: Duration) -> Self {
        Self {
            client: RpcClient::new_with_timeout_and_commitment(url.to_string(), timeout, commitment),
            commitment,
        }
    }
}

#[async_trait]
impl SolanaRpc for HttpRpcClient {
    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>> {
        debug!(%address, "getAccountInfo");
        let response = self
            .client
            .get_account_with_commitment(address, self.commitment)
            .await
            .with_context(|| format!("Failed to fetch account {}", address))?;
        Ok(response.value)
    }

    async fn get_program_accounts(
        &self,
        program_id: &Pubkey,
        filters: Vec<RpcFilterType>,
    ) -> Result<Vec<(Pubkey, Account)>> {
        debug!(%program_id, ?filters, "getProgramAccounts");
        let config = RpcProgramAccountsConfig {
            filters: Some(filters),
            account_config: RpcAccountInfoConfig {
                encoding: Some(UiAccountEncoding::Base64),
                commitment: Some(self.commitment),
                ..Default::default()
            },
            ..Default::default()
        };
        self.client
            .get_program_accounts_with_config(program_id, config)
            .await
            .with_context(|| format!("Failed to fetch accounts of program {}", program_id))
    }

    async fn get_latest_blockhash(&self) -> Result<Hash> {
        self.client
            .get_latest_blockhash()
            .await
            .context("Failed to fetch latest blockhash")
    }

    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature> {
        debug!(signature = ?transaction.signatures.first(), "sendTransaction");
        self.client
            .send_transaction(transaction)
            .await
            .context("Failed to send transaction")
    }

    async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<transaction::Result<()>>> {
        self.client
            .get_signature_status_with_commitment(signature, self.commitment)
            .await
            .with_context(|| format!("Failed to fetch status of {}", signature))
    }
}
