//! Program-derived addresses of the counter and the per-authority records.

use anchor_lang::prelude::Pubkey;

pub const COUNTER_SEED: &[u8] = b"counter";
pub const VACCINATION_SEED: &[u8] = b"vaccination";

/// Address of the shared appointment counter.
pub fn counter_address(program_id: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[COUNTER_SEED], program_id).0
}

/// Address of the record allocated to `authority` under counter value `sequence`.
pub fn record_address(program_id: &Pubkey, authority: &Pubkey, sequence: u64) -> Pubkey {
    Pubkey::find_program_address(
        &[VACCINATION_SEED, authority.as_ref(), &sequence.to_le_bytes()],
        program_id,
    )
    .0
}
