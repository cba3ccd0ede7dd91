pub mod accounts;
pub mod errors;
pub mod instruction;
pub mod pda;
pub mod record;

anchor_lang::declare_id!("6WZYySoDCmuojNLvGEcwMqjHt6f9gEnN1yWpV3JbtK4S");

pub use anchor_lang::prelude::Pubkey;
pub use errors::RecordError;
pub use pda::{counter_address, record_address};
pub use record::{
    validate_doctor_id, Counter, CreateVaccinationRecordArgs, VaccinationRecord,
    VaccinationStatus, MAX_APPOINTMENT_DATE_LEN, PATIENT_ID_OFFSET,
};

/// Lamports per SOL
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

pub fn lamports_as_sol_string(lamports: u64) -> String {
    format!(
        "{}.{:09} SOL",
        lamports / LAMPORTS_PER_SOL,
        lamports % LAMPORTS_PER_SOL
    )
}
