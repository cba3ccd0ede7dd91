//! In-memory stand-in for a Solana node running the vaccination-record program.

use anchor_lang::{AnchorDeserialize, Discriminator};
use anyhow::{anyhow, bail, ensure, Result};
use async_trait::async_trait;
use solana_client::rpc_filter::RpcFilterType;
use solana_sdk::account::Account;
use solana_sdk::hash::Hash;
use solana_sdk::instruction::CompiledInstruction;
use solana_sdk::signature::Signature;
use solana_sdk::system_program;
use solana_sdk::transaction::{self, Transaction};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use vax_common::instruction::{
    CreateVaccinationRecord, InitializeCounter, UpdateDoctorId, UpdateVaccinationStatus,
};
use vax_common::{
    counter_address, record_address, Counter, CreateVaccinationRecordArgs, Pubkey,
    VaccinationRecord, VaccinationStatus,
};

use super::rpc::SolanaRpc;

// bincode tag of SystemInstruction::Transfer
const SYSTEM_TRANSFER_TAG: [u8; 4] = [2, 0, 0, 0];

#[derive(Default)]
struct FakeState {
    accounts: BTreeMap<Pubkey, Account>,
    confirmed: HashSet<Signature>,
    sent: Vec<Transaction>,
    requests: usize,
    clock: i64,
    fail_next_send: Option<String>,
    withhold_confirmations: bool,
}

/// Clones share state, so a test can keep a handle after moving one into a client.
#[derive(Clone)]
pub struct FakeRpc {
    program_id: Pubkey,
    state: Arc<Mutex<FakeState>>,
}

fn account(lamports: u64, owner: Pubkey, data: Vec<u8>, executable: bool) -> Account {
    Account {
        lamports,
        data,
        owner,
        executable,
        rent_epoch: 0,
    }
}

impl FakeRpc {
    pub fn new(program_id: Pubkey) -> Self {
        let rpc = Self::without_program_id(program_id);
        rpc.lock().accounts.insert(
            program_id,
            account(1, Pubkey::new_from_array([2u8; 32]), vec![], true),
        );
        rpc
    }

    pub fn without_program() -> Self {
        Self::without_program_id(Pubkey::new_from_array([42u8; 32]))
    }

    fn without_program_id(program_id: Pubkey) -> Self {
        Self {
            program_id,
            state: Arc::new(Mutex::new(FakeState {
                clock: 1_700_000_000,
                ..Default::default()
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn sent_count(&self) -> usize {
        self.lock().sent.len()
    }

    /// Number of RPC calls of any kind.
    pub fn request_count(&self) -> usize {
        self.lock().requests
    }

    pub fn fail_next_send(&self, message: &str) {
        self.lock().fail_next_send = Some(message.to_string());
    }

    pub fn withhold_confirmations(&self) {
        self.lock().withhold_confirmations = true;
    }

    pub fn fund(&self, address: &Pubkey, lamports: u64) {
        self.lock()
            .accounts
            .entry(*address)
            .or_insert_with(|| system_account(0))
            .lamports += lamports;
    }

    pub fn lamports(&self, address: &Pubkey) -> u64 {
        self.lock()
            .accounts
            .get(address)
            .map(|account| account.lamports)
            .unwrap_or_default()
    }

    pub fn record(&self, address: &Pubkey) -> Option<VaccinationRecord> {
        self.lock()
            .accounts
            .get(address)
            .and_then(|account| VaccinationRecord::decode(&account.data).ok())
    }

    /// Writes a record account directly, bypassing the program.
    pub fn insert_record(&self, address: Pubkey, record: &VaccinationRecord) {
        let data = record.encode().unwrap();
        let program_id = self.program_id;
        self.lock()
            .accounts
            .insert(address, account(1, program_id, data, false));
    }

    fn execute(&self, state: &mut FakeState, transaction: &Transaction) -> Result<()> {
        transaction.verify()?;
        let message = &transaction.message;
        let is_signer = |key: &Pubkey| {
            message
                .account_keys
                .iter()
                .position(|k| k == key)
                .is_some_and(|index| message.is_signer(index))
        };

        // Instructions apply to a scratch copy so a failing transaction leaves no trace
        let mut accounts = state.accounts.clone();
        let now = state.clock;
        for ix in &message.instructions {
            let program = message.account_keys[ix.program_id_index as usize];
            let keys: Vec<Pubkey> = ix
                .accounts
                .iter()
                .map(|index| message.account_keys[*index as usize])
                .collect();
            if program == system_program::ID {
                system_transfer(&mut accounts, &keys, &ix.data, &is_signer)?;
            } else if program == self.program_id {
                self.program_instruction(&mut accounts, &keys, ix, now, &is_signer)?;
            } else {
                bail!("unknown program {}", program);
            }
        }
        state.accounts = accounts;
        state.clock += 1;
        Ok(())
    }

    fn program_instruction(
        &self,
        accounts: &mut BTreeMap<Pubkey, Account>,
        keys: &[Pubkey],
        ix: &CompiledInstruction,
        now: i64,
        is_signer: &impl Fn(&Pubkey) -> bool,
    ) -> Result<()> {
        ensure!(ix.data.len() >= 8, "instruction data too short");
        let (discriminator, args) = ix.data.split_at(8);

        if discriminator == InitializeCounter::DISCRIMINATOR {
            let (counter, authority) = (keys[0], keys[1]);
            ensure!(is_signer(&authority), "missing required signature");
            ensure!(counter == counter_address(&self.program_id), "seeds constraint violated");
            ensure!(!accounts.contains_key(&counter), "account already in use");
            let data = Counter::default().encode()?;
            accounts.insert(counter, self.program_account(data));
        } else if discriminator == CreateVaccinationRecord::DISCRIMINATOR {
            let (record, counter_key, authority) = (keys[0], keys[1], keys[2]);
            ensure!(is_signer(&authority), "missing required signature");
            let args = CreateVaccinationRecord::try_from_slice(args)?;
            CreateVaccinationRecordArgs {
                patient_id: args.patient_id,
                vaccine_id: args.vaccine_id,
                appointment_date: args.appointment_date.clone(),
                center_id: args.center_id,
            }
            .validate()?;
            let counter_account = accounts
                .get(&counter_key)
                .ok_or_else(|| anyhow!("counter account not initialized"))?;
            let mut counter = Counter::decode(&counter_account.data)?;
            ensure!(
                record == record_address(&self.program_id, &authority, counter.appointment_count),
                "seeds constraint violated"
            );
            ensure!(!accounts.contains_key(&record), "account already in use");
            let created = VaccinationRecord {
                appointment_id: record,
                patient_id: args.patient_id,
                vaccine_id: args.vaccine_id,
                appointment_date: args.appointment_date,
                center_id: args.center_id,
                doctor_id: None,
                status: VaccinationStatus::Pending,
                authority,
                created_at: now,
                updated_at: now,
            };
            accounts.insert(record, self.program_account(created.encode()?));
            counter.appointment_count += 1;
            accounts.insert(counter_key, self.program_account(counter.encode()?));
        } else if discriminator == UpdateVaccinationStatus::DISCRIMINATOR {
            let args = UpdateVaccinationStatus::try_from_slice(args)?;
            self.update_record(accounts, keys, now, is_signer, |record| {
                record.status = args.status;
            })?;
        } else if discriminator == UpdateDoctorId::DISCRIMINATOR {
            let args = UpdateDoctorId::try_from_slice(args)?;
            ensure!(args.doctor_id != 0, "Invalid doctor ID");
            self.update_record(accounts, keys, now, is_signer, |record| {
                record.doctor_id = Some(args.doctor_id);
            })?;
        } else {
            bail!("unknown instruction");
        }
        Ok(())
    }

    fn update_record(
        &self,
        accounts: &mut BTreeMap<Pubkey, Account>,
        keys: &[Pubkey],
        now: i64,
        is_signer: &impl Fn(&Pubkey) -> bool,
        apply: impl FnOnce(&mut VaccinationRecord),
    ) -> Result<()> {
        let (address, authority) = (keys[0], keys[1]);
        ensure!(is_signer(&authority), "missing required signature");
        let account = accounts
            .get(&address)
            .ok_or_else(|| anyhow!("account {} not initialized", address))?;
        let mut record = VaccinationRecord::decode(&account.data)?;
        ensure!(record.authority == authority, "has_one constraint violated");
        apply(&mut record);
        record.updated_at = now;
        accounts.insert(address, self.program_account(record.encode()?));
        Ok(())
    }

    fn program_account(&self, data: Vec<u8>) -> Account {
        account(1_000_000, self.program_id, data, false)
    }
}

fn system_account(lamports: u64) -> Account {
    account(lamports, system_program::ID, vec![], false)
}

fn system_transfer(
    accounts: &mut BTreeMap<Pubkey, Account>,
    keys: &[Pubkey],
    data: &[u8],
    is_signer: &impl Fn(&Pubkey) -> bool,
) -> Result<()> {
    ensure!(
        data.len() == 12 && data[..4] == SYSTEM_TRANSFER_TAG,
        "unsupported system instruction"
    );
    let mut amount = [0u8; 8];
    amount.copy_from_slice(&data[4..]);
    let lamports = u64::from_le_bytes(amount);
    let (from, to) = (keys[0], keys[1]);
    ensure!(is_signer(&from), "missing required signature");

    let source = accounts.entry(from).or_insert_with(|| system_account(0));
    ensure!(source.lamports >= lamports, "insufficient lamports");
    source.lamports -= lamports;
    accounts.entry(to).or_insert_with(|| system_account(0)).lamports += lamports;
    Ok(())
}

fn filter_matches(filter: &RpcFilterType, data: &[u8]) -> bool {
    match filter {
        RpcFilterType::Memcmp(memcmp) => memcmp.bytes_match(data),
        RpcFilterType::DataSize(size) => data.len() as u64 == *size,
        _ => false,
    }
}

#[async_trait]
impl SolanaRpc for FakeRpc {
    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>> {
        let mut state = self.lock();
        state.requests += 1;
        Ok(state.accounts.get(address).cloned())
    }

    async fn get_program_accounts(
        &self,
        program_id: &Pubkey,
        filters: Vec<RpcFilterType>,
    ) -> Result<Vec<(Pubkey, Account)>> {
        let mut state = self.lock();
        state.requests += 1;
        Ok(state
            .accounts
            .iter()
            .filter(|(_, account)| account.owner == *program_id)
            .filter(|(_, account)| {
                filters
                    .iter()
                    .all(|filter| filter_matches(filter, &account.data))
            })
            .map(|(address, account)| (*address, account.clone()))
            .collect())
    }

    async fn get_latest_blockhash(&self) -> Result<Hash> {
        let mut state = self.lock();
        state.requests += 1;
        Ok(Hash::new_from_array([state.clock as u8; 32]))
    }

    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature> {
        let mut state = self.lock();
        state.requests += 1;
        if let Some(message) = state.fail_next_send.take() {
            bail!("{}", message);
        }
        self.execute(&mut state, transaction)?;
        let signature = *transaction
            .signatures
            .first()
            .ok_or_else(|| anyhow!("transaction has no signatures"))?;
        state.sent.push(transaction.clone());
        state.confirmed.insert(signature);
        Ok(signature)
    }

    async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<transaction::Result<()>>> {
        let mut state = self.lock();
        state.requests += 1;
        if state.withhold_confirmations || !state.confirmed.contains(signature) {
            return Ok(None);
        }
        Ok(Some(Ok(())))
    }
}
