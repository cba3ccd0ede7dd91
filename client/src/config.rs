use anyhow::{Context, Result};
use serde::Deserialize;
use solana_sdk::commitment_config::CommitmentConfig;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use vax_common::Pubkey;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub solana: SolanaConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub endpoint: String,
    pub access_token: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SolanaConfig {
    pub rpc_url: String,
    /// Defaults to the program id compiled into `vax-common`
    pub program_id: Option<String>,
    #[serde(default = "default_commitment")]
    pub commitment: String,
    /// Keypair file; without one the client can only read
    pub keypair_path: Option<String>,
    /// Payee of on-chain appointment payments
    pub center_wallet: Option<String>,
    #[serde(default = "default_confirm_attempts")]
    pub confirm_attempts: u32,
    #[serde(default = "default_confirm_interval_ms")]
    pub confirm_interval_ms: u64,
}

impl SolanaConfig {
    pub fn program_id(&self) -> Result<Pubkey> {
        match self.program_id.as_deref() {
            Some(program_id) => program_id
                .parse()
                .with_context(|| format!("Invalid program_id in config: {}", program_id)),
            None => Ok(vax_common::ID),
        }
    }

    pub fn commitment(&self) -> Result<CommitmentConfig> {
        CommitmentConfig::from_str(&self.commitment)
            .with_context(|| format!("Invalid commitment in config: {}", self.commitment))
    }

    pub fn center_wallet(&self) -> Result<Option<Pubkey>> {
        self.center_wallet
            .as_deref()
            .map(|wallet| {
                wallet
                    .parse()
                    .with_context(|| format!("Invalid center_wallet in config: {}", wallet))
            })
            .transpose()
    }

    pub fn keypair_path(&self) -> Option<PathBuf> {
        self.keypair_path.as_deref().map(expand_home)
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => PathBuf::from(path),
        },
        None => PathBuf::from(path),
    }
}

// Default functions
fn default_timeout() -> u64 {
    30
}

fn default_commitment() -> String {
    "confirmed".to_string()
}

fn default_confirm_attempts() -> u32 {
    30
}

fn default_confirm_interval_ms() -> u64 {
    1000
}
