//! Account lists of the program's instructions, in the order the program
//! declares them.

use anchor_lang::prelude::*;
use anchor_lang::ToAccountMetas;

pub struct InitializeCounter {
    pub counter: Pubkey,
    pub authority: Pubkey,
    pub system_program: Pubkey,
}

impl ToAccountMetas for InitializeCounter {
    fn to_account_metas(&self, _is_signer: Option<bool>) -> Vec<AccountMeta> {
        vec![
            AccountMeta::new(self.counter, false),
            AccountMeta::new(self.authority, true),
            AccountMeta::new_readonly(self.system_program, false),
        ]
    }
}

pub struct CreateVaccinationRecord {
    pub vaccination_record: Pubkey,
    pub counter: Pubkey,
    pub authority: Pubkey,
    pub system_program: Pubkey,
}

impl ToAccountMetas for CreateVaccinationRecord {
    fn to_account_metas(&self, _is_signer: Option<bool>) -> Vec<AccountMeta> {
        vec![
            AccountMeta::new(self.vaccination_record, false),
            AccountMeta::new(self.counter, false),
            AccountMeta::new(self.authority, true),
            AccountMeta::new_readonly(self.system_program, false),
        ]
    }
}

/// Shared by `update_vaccination_status` and `update_doctor_id`; the record
/// must name `authority` as its owner.
pub struct UpdateVaccinationRecord {
    pub vaccination_record: Pubkey,
    pub authority: Pubkey,
}

impl ToAccountMetas for UpdateVaccinationRecord {
    fn to_account_metas(&self, _is_signer: Option<bool>) -> Vec<AccountMeta> {
        vec![
            AccountMeta::new(self.vaccination_record, false),
            AccountMeta::new_readonly(self.authority, true),
        ]
    }
}
