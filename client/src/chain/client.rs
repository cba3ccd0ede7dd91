use anyhow::{bail, Result};
use anchor_lang::Discriminator;
use solana_client::rpc_filter::{Memcmp, RpcFilterType};
use solana_sdk::instruction::Instruction;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::Transaction;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use vax_common::{
    counter_address, instruction, record_address, validate_doctor_id, Counter,
    CreateVaccinationRecordArgs, Pubkey, VaccinationRecord, VaccinationStatus, PATIENT_ID_OFFSET,
};

#[allow(deprecated)]
use solana_sdk::system_instruction;

use super::rpc::SolanaRpc;
use super::ChainError;

/// Addresses resolved once the program is known to be deployed.
#[derive(Debug, Clone)]
struct ProgramHandle {
    counter: Pubkey,
}

#[derive(Debug, Clone)]
pub struct CreatedRecord {
    pub signature: Signature,
    pub address: Pubkey,
    pub record: VaccinationRecord,
}

#[derive(Debug, Clone)]
pub struct RecordEntry {
    pub address: Pubkey,
    pub record: VaccinationRecord,
}

/// On-chain charge for a booked appointment.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub payment_id: String,
    pub amount: u64,
    pub appointment_id: String,
}

/// Client for the vaccination-record program. Reads work without a wallet;
/// every write needs one.
pub struct ChainRecordClient<R> {
    rpc: R,
    program_id: Pubkey,
    wallet: Option<Arc<Keypair>>,
    payee: Option<Pubkey>,
    confirm_attempts: u32,
    confirm_interval: Duration,
    program: OnceCell<ProgramHandle>,
}

impl<R: SolanaRpc> ChainRecordClient<R> {
    pub fn new(rpc: R, program_id: Pubkey) -> Self {
        Self {
            rpc,
            program_id,
            wallet: None,
            payee: None,
            confirm_attempts: 30,
            confirm_interval: Duration::from_millis(1000),
            program: OnceCell::new(),
        }
    }

    pub fn with_wallet(mut self, wallet: Arc<Keypair>) -> Self {
        self.wallet = Some(wallet);
        self
    }

    pub fn with_payee(mut self, payee: Pubkey) -> Self {
        self.payee = Some(payee);
        self
    }

    /// Polls the signature status up to `attempts` times, `interval` apart.
    pub fn with_confirmation(mut self, attempts: u32, interval: Duration) -> Self {
        self.confirm_attempts = attempts;
        self.confirm_interval = interval;
        self
    }

    pub fn rpc(&self) -> &R {
        &self.rpc
    }

    pub fn program_id(&self) -> &Pubkey {
        &self.program_id
    }

    pub fn authority(&self) -> Option<Pubkey> {
        self.wallet.as_ref().map(|wallet| wallet.pubkey())
    }

    fn wallet(&self) -> Result<&Keypair, ChainError> {
        self.wallet.as_deref().ok_or(ChainError::WalletNotConnected)
    }

    async fn program(&self) -> Result<&ProgramHandle, ChainError> {
        self.program.get_or_try_init(|| self.load_program()).await
    }

    async fn load_program(&self) -> Result<ProgramHandle, ChainError> {
        let account = self
            .rpc
            .get_account(&self.program_id)
            .await
            .map_err(ChainError::operation("load program"))?;
        match account {
            Some(account) if account.executable => {
                let counter = counter_address(&self.program_id);
                debug!(program_id = %self.program_id, %counter, "Program loaded");
                Ok(ProgramHandle { counter })
            }
            _ => Err(ChainError::ProgramNotDeployed {
                program_id: self.program_id,
            }),
        }
    }

    async fn fetch_counter(&self, counter: &Pubkey) -> Result<Option<Counter>> {
        match self.rpc.get_account(counter).await? {
            Some(account) if !account.data.is_empty() => Ok(Some(Counter::decode(&account.data)?)),
            _ => Ok(None),
        }
    }

    async fn fetch_record(&self, address: &Pubkey) -> Result<VaccinationRecord> {
        match self.rpc.get_account(address).await? {
            Some(account) => Ok(VaccinationRecord::decode(&account.data)?),
            None => bail!("Record account {} not found after creation", address),
        }
    }

    /// Current appointment counter, `None` before initialization.
    pub async fn get_counter(&self) -> Result<Option<Counter>, ChainError> {
        let program = self.program().await?;
        self.fetch_counter(&program.counter)
            .await
            .map_err(ChainError::operation("read counter"))
    }

    /// Creates the shared counter. Returns `None` without sending anything when
    /// it already exists.
    pub async fn initialize_counter(&self) -> Result<Option<Signature>, ChainError> {
        let wallet = self.wallet()?;
        let program = self.program().await?;

        let existing = self
            .fetch_counter(&program.counter)
            .await
            .map_err(ChainError::operation("initialize counter"))?;
        if let Some(counter) = existing {
            info!(
                counter = %program.counter,
                appointment_count = counter.appointment_count,
                "Counter account already exists"
            );
            return Ok(None);
        }

        let ix = instruction::initialize_counter(&self.program_id, &wallet.pubkey());
        let signature = self
            .send_and_confirm(&[ix], wallet)
            .await
            .map_err(ChainError::operation("initialize counter"))?;
        info!(%signature, counter = %program.counter, "Counter initialized");
        Ok(Some(signature))
    }

    pub async fn create_vaccination_record(
        &self,
        args: &CreateVaccinationRecordArgs,
    ) -> Result<CreatedRecord, ChainError> {
        args.validate()?;
        let wallet = self.wallet()?;
        let program = self.program().await?;
        let authority = wallet.pubkey();

        let counter = self
            .fetch_counter(&program.counter)
            .await
            .map_err(ChainError::operation("create vaccination record"))?
            .ok_or(ChainError::CounterMissing)?;
        let sequence = counter.appointment_count;
        let address = record_address(&self.program_id, &authority, sequence);

        let ix = instruction::create_vaccination_record(&self.program_id, &authority, sequence, args);
        let signature = self
            .send_and_confirm(&[ix], wallet)
            .await
            .map_err(ChainError::operation("create vaccination record"))?;
        let record = self
            .fetch_record(&address)
            .await
            .map_err(ChainError::operation("create vaccination record"))?;

        info!(%signature, record = %address, patient_id = args.patient_id, "Vaccination record created");
        Ok(CreatedRecord {
            signature,
            address,
            record,
        })
    }

    pub async fn get_vaccination_record(
        &self,
        address: &Pubkey,
    ) -> Result<Option<VaccinationRecord>, ChainError> {
        self.program().await?;
        let account = self
            .rpc
            .get_account(address)
            .await
            .map_err(ChainError::operation("fetch vaccination record"))?;
        match account {
            Some(account) if account.owner == self.program_id => {
                Ok(Some(VaccinationRecord::decode(&account.data)?))
            }
            _ => Ok(None),
        }
    }

    /// All records whose `patient_id` matches, filtered server-side.
    pub async fn get_vaccination_records(
        &self,
        patient_id: u64,
    ) -> Result<Vec<RecordEntry>, ChainError> {
        self.program().await?;
        let filters = vec![
            RpcFilterType::Memcmp(Memcmp::new_base58_encoded(0, VaccinationRecord::DISCRIMINATOR)),
            RpcFilterType::Memcmp(Memcmp::new_base58_encoded(
                PATIENT_ID_OFFSET,
                &patient_id.to_le_bytes(),
            )),
        ];
        let accounts = self
            .rpc
            .get_program_accounts(&self.program_id, filters)
            .await
            .map_err(ChainError::operation("fetch appointments"))?;

        let mut entries = Vec::with_capacity(accounts.len());
        for (address, account) in accounts {
            match VaccinationRecord::decode(&account.data) {
                Ok(record) => entries.push(RecordEntry { address, record }),
                Err(e) => warn!(%address, "Skipping undecodable record account: {}", e),
            }
        }
        entries.sort_by_key(|entry| entry.record.created_at);
        debug!(patient_id, count = entries.len(), "Fetched vaccination records");
        Ok(entries)
    }

    pub async fn update_vaccination_status(
        &self,
        record: &Pubkey,
        status: &str,
    ) -> Result<Signature, ChainError> {
        let status: VaccinationStatus = status.parse()?;
        let wallet = self.wallet()?;
        self.program().await?;

        let ix = instruction::update_vaccination_status(
            &self.program_id,
            record,
            &wallet.pubkey(),
            status,
        );
        let signature = self
            .send_and_confirm(&[ix], wallet)
            .await
            .map_err(ChainError::operation("update vaccination status"))?;
        info!(%signature, %record, %status, "Vaccination status updated");
        Ok(signature)
    }

    pub async fn update_doctor_id(
        &self,
        record: &Pubkey,
        doctor_id: u64,
    ) -> Result<Signature, ChainError> {
        validate_doctor_id(doctor_id)?;
        let wallet = self.wallet()?;
        self.program().await?;

        let ix = instruction::update_doctor_id(&self.program_id, record, &wallet.pubkey(), doctor_id);
        let signature = self
            .send_and_confirm(&[ix], wallet)
            .await
            .map_err(ChainError::operation("update doctor ID"))?;
        info!(%signature, %record, doctor_id, "Doctor assigned");
        Ok(signature)
    }

    /// Transfers `amount` lamports from the wallet to the center wallet.
    pub async fn process_payment(&self, payment: &PaymentRequest) -> Result<Signature, ChainError> {
        if payment.amount == 0 {
            return Err(ChainError::Validation(vax_common::RecordError::InvalidAmount));
        }
        let payee = self.payee.ok_or(ChainError::PayeeNotConfigured)?;
        let wallet = self.wallet()?;

        #[allow(deprecated)]
        let ix = system_instruction::transfer(&wallet.pubkey(), &payee, payment.amount);
        let signature = self
            .send_and_confirm(&[ix], wallet)
            .await
            .map_err(ChainError::operation("process payment"))?;
        info!(
            %signature,
            payment_id = %payment.payment_id,
            appointment_id = %payment.appointment_id,
            amount = %vax_common::lamports_as_sol_string(payment.amount),
            "Payment sent"
        );
        Ok(signature)
    }

    async fn send_and_confirm(&self, instructions: &[Instruction], wallet: &Keypair) -> Result<Signature> {
        let blockhash = self.rpc.get_latest_blockhash().await?;
        let mut transaction = Transaction::new_with_payer(instructions, Some(&wallet.pubkey()));
        transaction.try_sign(&[wallet], blockhash)?;

        let signature = self.rpc.send_transaction(&transaction).await?;
        debug!(%signature, "Transaction sent, awaiting confirmation");

        for _ in 0..self.confirm_attempts {
            match self.rpc.get_signature_status(&signature).await? {
                Some(Ok(())) => return Ok(signature),
                Some(Err(err)) => bail!("Transaction {} failed: {}", signature, err),
                None => tokio::time::sleep(self.confirm_interval).await,
            }
        }
        bail!(
            "Transaction {} not confirmed after {} attempts",
            signature,
            self.confirm_attempts
        )
    }
}
