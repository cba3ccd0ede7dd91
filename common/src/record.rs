use anchor_lang::prelude::*;
use anchor_lang::{AccountDeserialize, AccountSerialize, Discriminator};
use serde::{Deserialize, Serialize};

use crate::errors::RecordError;

pub const MAX_APPOINTMENT_DATE_LEN: usize = 60;

/// Byte offset of `patient_id` in a serialized record: discriminator + appointment_id.
pub const PATIENT_ID_OFFSET: usize = VaccinationRecord::DISCRIMINATOR.len() + 32;

/// Vaccination status as stored on-chain. The borsh tag order is part of the
/// program's account layout.
#[derive(
    AnchorSerialize, AnchorDeserialize, Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum VaccinationStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl VaccinationStatus {
    pub const ALL: [VaccinationStatus; 4] = [
        VaccinationStatus::Pending,
        VaccinationStatus::Confirmed,
        VaccinationStatus::Completed,
        VaccinationStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VaccinationStatus::Pending => "pending",
            VaccinationStatus::Confirmed => "confirmed",
            VaccinationStatus::Completed => "completed",
            VaccinationStatus::Cancelled => "cancelled",
        }
    }

    /// Only pending appointments may be cancelled by the patient
    pub fn is_cancellable(&self) -> bool {
        matches!(self, VaccinationStatus::Pending)
    }
}

impl std::fmt::Display for VaccinationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for VaccinationStatus {
    type Err = RecordError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(VaccinationStatus::Pending),
            "confirmed" => Ok(VaccinationStatus::Confirmed),
            "completed" => Ok(VaccinationStatus::Completed),
            "cancelled" => Ok(VaccinationStatus::Cancelled),
            _ => Err(RecordError::InvalidStatus {
                value: s.to_string(),
            }),
        }
    }
}

/// Shared sequence used to allocate record addresses.
#[account]
#[derive(Debug, Default, Copy, PartialEq, Eq)]
pub struct Counter {
    pub appointment_count: u64,
}

/// A vaccination record. Field order mirrors the on-chain account layout;
/// `appointment_id` is the record account's own address.
#[account]
#[derive(Debug, PartialEq, Eq)]
pub struct VaccinationRecord {
    pub appointment_id: Pubkey,
    pub patient_id: u64,
    pub vaccine_id: u64,
    pub appointment_date: String,
    pub center_id: u64,
    pub doctor_id: Option<u64>,
    pub status: VaccinationStatus,
    pub authority: Pubkey,
    pub created_at: i64,
    pub updated_at: i64,
}

fn decode<T: AccountDeserialize>(data: &[u8]) -> std::result::Result<T, RecordError> {
    let mut buf = data;
    Ok(T::try_deserialize(&mut buf)?)
}

fn encode<T: AccountSerialize>(account: &T) -> std::result::Result<Vec<u8>, RecordError> {
    let mut data = Vec::new();
    account.try_serialize(&mut data)?;
    Ok(data)
}

impl Counter {
    pub fn decode(data: &[u8]) -> std::result::Result<Self, RecordError> {
        decode(data)
    }

    pub fn encode(&self) -> std::result::Result<Vec<u8>, RecordError> {
        encode(self)
    }
}

impl VaccinationRecord {
    /// Trailing bytes after the record are ignored; accounts are allocated
    /// with room for the longest date.
    pub fn decode(data: &[u8]) -> std::result::Result<Self, RecordError> {
        decode(data)
    }

    pub fn encode(&self) -> std::result::Result<Vec<u8>, RecordError> {
        encode(self)
    }
}

/// Input of `create_vaccination_record`, checked before anything is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateVaccinationRecordArgs {
    pub patient_id: u64,
    pub vaccine_id: u64,
    pub appointment_date: String,
    pub center_id: u64,
}

impl CreateVaccinationRecordArgs {
    /// Checks the date length first, then the ids.
    pub fn validate(&self) -> std::result::Result<(), RecordError> {
        let len = self.appointment_date.chars().count();
        if len > MAX_APPOINTMENT_DATE_LEN {
            return Err(RecordError::DateTooLong { len });
        }
        if self.patient_id == 0 || self.vaccine_id == 0 || self.center_id == 0 {
            return Err(RecordError::InvalidId);
        }
        Ok(())
    }
}

pub fn validate_doctor_id(doctor_id: u64) -> std::result::Result<(), RecordError> {
    if doctor_id == 0 {
        return Err(RecordError::InvalidDoctorId);
    }
    Ok(())
}
