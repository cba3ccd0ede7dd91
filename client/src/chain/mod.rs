pub mod client;
pub mod rpc;

#[cfg(test)]
pub mod fake;

pub use client::{ChainRecordClient, CreatedRecord, PaymentRequest, RecordEntry};
pub use rpc::{HttpRpcClient, SolanaRpc};

use vax_common::{Pubkey, RecordError};

#[derive(Debug)]
pub enum ChainError {
    WalletNotConnected,
    CounterMissing,
    ProgramNotDeployed { program_id: Pubkey },
    PayeeNotConfigured,
    Validation(RecordError),
    // RPC or transaction failure while running `op`
    Operation {
        op: &'static str,
        source: anyhow::Error,
    },
}

impl ChainError {
    pub fn operation(op: &'static str) -> impl FnOnce(anyhow::Error) -> ChainError {
        move |source| ChainError::Operation { op, source }
    }
}

impl std::fmt::Display for ChainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainError::WalletNotConnected => write!(f, "Wallet not connected"),
            ChainError::CounterMissing => write!(
                f,
                "Counter account does not exist. Please initialize the counter first."
            ),
            ChainError::ProgramNotDeployed { program_id } => {
                write!(f, "Program {} is not deployed", program_id)
            }
            ChainError::PayeeNotConfigured => {
                write!(f, "No center wallet configured to receive payments")
            }
            ChainError::Validation(e) => write!(f, "{}", e),
            ChainError::Operation { op, source } => write!(f, "Failed to {}: {:#}", op, source),
        }
    }
}

impl std::error::Error for ChainError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ChainError::Validation(e) => Some(e),
            ChainError::Operation { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<RecordError> for ChainError {
    fn from(e: RecordError) -> Self {
        ChainError::Validation(e)
    }
}
