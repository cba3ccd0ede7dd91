//! Instruction arguments and builders for the vaccination-record program.

use anchor_lang::prelude::*;
use anchor_lang::solana_program::instruction::Instruction;
use anchor_lang::{Discriminator, InstructionData, ToAccountMetas};

use crate::accounts;
use crate::pda::{counter_address, record_address};
use crate::record::{CreateVaccinationRecordArgs, VaccinationStatus};

#[derive(AnchorSerialize, AnchorDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitializeCounter;

impl Discriminator for InitializeCounter {
    const DISCRIMINATOR: &'static [u8] = &[67, 89, 100, 87, 231, 172, 35, 124];
}

impl InstructionData for InitializeCounter {}

#[derive(AnchorSerialize, AnchorDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct CreateVaccinationRecord {
    pub patient_id: u64,
    pub vaccine_id: u64,
    pub appointment_date: String,
    pub center_id: u64,
}

impl Discriminator for CreateVaccinationRecord {
    const DISCRIMINATOR: &'static [u8] = &[8, 117, 229, 112, 133, 42, 248, 35];
}

impl InstructionData for CreateVaccinationRecord {}

impl From<&CreateVaccinationRecordArgs> for CreateVaccinationRecord {
    fn from(args: &CreateVaccinationRecordArgs) -> Self {
        Self {
            patient_id: args.patient_id,
            vaccine_id: args.vaccine_id,
            appointment_date: args.appointment_date.clone(),
            center_id: args.center_id,
        }
    }
}

#[derive(AnchorSerialize, AnchorDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateVaccinationStatus {
    pub status: VaccinationStatus,
}

impl Discriminator for UpdateVaccinationStatus {
    const DISCRIMINATOR: &'static [u8] = &[186, 17, 75, 92, 57, 106, 169, 19];
}

impl InstructionData for UpdateVaccinationStatus {}

#[derive(AnchorSerialize, AnchorDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateDoctorId {
    pub doctor_id: u64,
}

impl Discriminator for UpdateDoctorId {
    const DISCRIMINATOR: &'static [u8] = &[81, 70, 9, 23, 117, 19, 140, 241];
}

impl InstructionData for UpdateDoctorId {}

fn build(program_id: &Pubkey, accounts: impl ToAccountMetas, args: impl InstructionData) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: accounts.to_account_metas(None),
        data: args.data(),
    }
}

pub fn initialize_counter(program_id: &Pubkey, authority: &Pubkey) -> Instruction {
    build(
        program_id,
        accounts::InitializeCounter {
            counter: counter_address(program_id),
            authority: *authority,
            system_program: anchor_lang::system_program::ID,
        },
        InitializeCounter,
    )
}

/// Creates the record at the address derived from `sequence`, the counter
/// value the program will read when it executes.
pub fn create_vaccination_record(
    program_id: &Pubkey,
    authority: &Pubkey,
    sequence: u64,
    args: &CreateVaccinationRecordArgs,
) -> Instruction {
    build(
        program_id,
        accounts::CreateVaccinationRecord {
            vaccination_record: record_address(program_id, authority, sequence),
            counter: counter_address(program_id),
            authority: *authority,
            system_program: anchor_lang::system_program::ID,
        },
        CreateVaccinationRecord::from(args),
    )
}

pub fn update_vaccination_status(
    program_id: &Pubkey,
    record: &Pubkey,
    authority: &Pubkey,
    status: VaccinationStatus,
) -> Instruction {
    build(
        program_id,
        accounts::UpdateVaccinationRecord {
            vaccination_record: *record,
            authority: *authority,
        },
        UpdateVaccinationStatus { status },
    )
}

pub fn update_doctor_id(
    program_id: &Pubkey,
    record: &Pubkey,
    authority: &Pubkey,
    doctor_id: u64,
) -> Instruction {
    build(
        program_id,
        accounts::UpdateVaccinationRecord {
            vaccination_record: *record,
            authority: *authority,
        },
        UpdateDoctorId { doctor_id },
    )
}
