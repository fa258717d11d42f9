//! A single program invocation (`Instruction`) and its compiled,
//! account-table-indexed form (`CompiledInstruction`) used inside a message.

use keel_pubkey::Address;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One account referenced by an instruction, paired with whether it must
/// co-sign the transaction and whether the program may mutate it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AccountMeta {
    pub pubkey: Address,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    pub fn new(pubkey: Address, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: true,
        }
    }

    pub fn new_readonly(pubkey: Address, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: false,
        }
    }
}

/// Directs the runtime to invoke `program_id` with `data`, granting it
/// access to `accounts`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Instruction {
    pub program_id: Address,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

impl Instruction {
    pub fn new_with_bytes(program_id: Address, data: &[u8], accounts: Vec<AccountMeta>) -> Self {
        Self {
            program_id,
            accounts,
            data: data.to_vec(),
        }
    }

    #[cfg(feature = "bincode")]
    pub fn new_with_bincode<T: serde::Serialize>(
        program_id: Address,
        data: &T,
        accounts: Vec<AccountMeta>,
    ) -> Self {
        let data = bincode::serialize(data).expect("failed to serialize instruction data");
        Self {
            program_id,
            accounts,
            data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstructionError {
    /// The instruction references more accounts than the message's account
    /// table holds.
    AccountIndexOutOfBounds,
    /// Instruction data exceeded the maximum the runtime accepts.
    DataTooLarge,
}

impl std::error::Error for InstructionError {}

impl std::fmt::Display for InstructionError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            InstructionError::AccountIndexOutOfBounds => {
                f.write_str("account index out of bounds")
            }
            InstructionError::DataTooLarge => f.write_str("instruction data too large"),
        }
    }
}

/// An [`Instruction`] after its `program_id` and accounts have been
/// resolved to indices into a message's flat account-key table.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CompiledInstruction {
    /// Index into the transaction's account keys of the program to invoke.
    pub program_id_index: u8,
    /// Ordered indices into the transaction's account keys granted to this
    /// instruction.
    pub accounts: Vec<u8>,
    pub data: Vec<u8>,
}

impl CompiledInstruction {
    pub fn new(program_id_index: u8, accounts: Vec<u8>, data: Vec<u8>) -> Self {
        Self {
            program_id_index,
            accounts,
            data,
        }
    }

    pub fn program_id<'a>(&self, account_keys: &'a [Address]) -> &'a Address {
        &account_keys[self.program_id_index as usize]
    }
}

impl keel_sanitize::Sanitize for CompiledInstruction {
    fn sanitize(&self) -> Result<(), keel_sanitize::SanitizeError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_meta_defaults_writable() {
        let pubkey = Address::new_from_array([1; 32]);
        let meta = AccountMeta::new(pubkey, true);
        assert!(meta.is_writable);
        assert!(meta.is_signer);

        let readonly = AccountMeta::new_readonly(pubkey, false);
        assert!(!readonly.is_writable);
        assert!(!readonly.is_signer);
    }

    #[test]
    fn compiled_instruction_resolves_program_id() {
        let keys = vec![Address::new_from_array([1; 32]), Address::new_from_array([2; 32])];
        let ix = CompiledInstruction::new(1, vec![0], vec![9]);
        assert_eq!(ix.program_id(&keys), &keys[1]);
    }
}
