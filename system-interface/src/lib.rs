//! Instructions and constructors for the System program: account creation,
//! lamport transfer, allocation/assignment, and durable nonce management.

use {
    keel_instruction::{AccountMeta, Instruction},
    keel_pubkey::Address,
    keel_sdk_ids::system_program,
    serde::{Deserialize, Serialize},
};

pub const MAX_PERMITTED_DATA_LENGTH: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemError {
    AccountAlreadyInUse,
    ResultWithNegativeLamports,
    InvalidProgramId,
    InvalidAccountDataLength,
    MaxSeedLengthExceeded,
    AddressWithSeedMismatch,
    NonceNoRecentBlockhashes,
    NonceBlockhashNotExpired,
    NonceUnexpectedBlockhashValue,
    /// Some, but not all, of `base`/`seed`/`program_id` were supplied to a
    /// seed-variant builder — they must be given together or not at all.
    MissingSeedParams,
}

impl std::fmt::Display for SystemError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let msg = match self {
            SystemError::AccountAlreadyInUse => "an account with the same address already exists",
            SystemError::ResultWithNegativeLamports => {
                "account does not have enough SOL to perform the operation"
            }
            SystemError::InvalidProgramId => "cannot assign account to this program id",
            SystemError::InvalidAccountDataLength => "cannot allocate account data of this length",
            SystemError::MaxSeedLengthExceeded => "length of requested seed is too long",
            SystemError::AddressWithSeedMismatch => {
                "provided address does not match address derived from seed"
            }
            SystemError::NonceNoRecentBlockhashes => {
                "advancing stored nonce requires a populated recent blockhashes sysvar"
            }
            SystemError::NonceBlockhashNotExpired => "stored nonce is still in recent blockhashes",
            SystemError::NonceUnexpectedBlockhashValue => {
                "specified nonce does not match stored nonce"
            }
            SystemError::MissingSeedParams => {
                "base, seed, and program_id must be supplied together or not at all"
            }
        };
        f.write_str(msg)
    }
}
impl std::error::Error for SystemError {}

/// An instruction to the System program, in on-chain wire order. Bincode
/// serializes the variant tag as a little-endian `u32` ahead of its fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SystemInstruction {
    CreateAccount {
        lamports: u64,
        space: u64,
        owner: Address,
    },
    Assign {
        owner: Address,
    },
    Transfer {
        lamports: u64,
    },
    CreateAccountWithSeed {
        base: Address,
        seed: String,
        lamports: u64,
        space: u64,
        owner: Address,
    },
    AdvanceNonceAccount,
    WithdrawNonceAccount(u64),
    InitializeNonceAccount(Address),
    AuthorizeNonceAccount(Address),
    Allocate {
        space: u64,
    },
    AllocateWithSeed {
        base: Address,
        seed: String,
        space: u64,
        owner: Address,
    },
    AssignWithSeed {
        base: Address,
        seed: String,
        owner: Address,
    },
    TransferWithSeed {
        lamports: u64,
        from_seed: String,
        from_owner: Address,
    },
    UpgradeNonceAccount,
}

fn encode(ix: &SystemInstruction) -> Vec<u8> {
    bincode::serialize(ix).expect("system instruction is always serializable")
}

pub fn create_account(
    from_pubkey: &Address,
    to_pubkey: &Address,
    lamports: u64,
    space: u64,
    owner: &Address,
) -> Instruction {
    let account_metas = vec![
        AccountMeta::new(*from_pubkey, true),
        AccountMeta::new(*to_pubkey, true),
    ];
    Instruction::new_with_bytes(
        system_program::id(),
        &encode(&SystemInstruction::CreateAccount {
            lamports,
            space,
            owner: *owner,
        }),
        account_metas,
    )
}

pub fn create_account_with_seed(
    from_pubkey: &Address,
    to_pubkey: &Address,
    base: &Address,
    seed: &str,
    lamports: u64,
    space: u64,
    owner: &Address,
) -> Instruction {
    let mut account_metas = vec![
        AccountMeta::new(*from_pubkey, true),
        AccountMeta::new(*to_pubkey, false),
    ];
    if base != from_pubkey {
        account_metas.push(AccountMeta::new_readonly(*base, true));
    }
    Instruction::new_with_bytes(
        system_program::id(),
        &encode(&SystemInstruction::CreateAccountWithSeed {
            base: *base,
            seed: seed.to_string(),
            lamports,
            space,
            owner: *owner,
        }),
        account_metas,
    )
}

pub fn assign(pubkey: &Address, owner: &Address) -> Instruction {
    Instruction::new_with_bytes(
        system_program::id(),
        &encode(&SystemInstruction::Assign { owner: *owner }),
        vec![AccountMeta::new(*pubkey, true)],
    )
}

pub fn transfer(from_pubkey: &Address, to_pubkey: &Address, lamports: u64) -> Instruction {
    let account_metas = vec![
        AccountMeta::new(*from_pubkey, true),
        AccountMeta::new(*to_pubkey, false),
    ];
    Instruction::new_with_bytes(
        system_program::id(),
        &encode(&SystemInstruction::Transfer { lamports }),
        account_metas,
    )
}

pub fn allocate(pubkey: &Address, space: u64) -> Instruction {
    Instruction::new_with_bytes(
        system_program::id(),
        &encode(&SystemInstruction::Allocate { space }),
        vec![AccountMeta::new(*pubkey, true)],
    )
}

pub fn transfer_with_seed(
    from_pubkey: &Address,
    from_base: &Address,
    from_seed: &str,
    from_owner: &Address,
    to_pubkey: &Address,
    lamports: u64,
) -> Instruction {
    let account_metas = vec![
        AccountMeta::new(*from_pubkey, false),
        AccountMeta::new_readonly(*from_base, true),
        AccountMeta::new(*to_pubkey, false),
    ];
    Instruction::new_with_bytes(
        system_program::id(),
        &encode(&SystemInstruction::TransferWithSeed {
            lamports,
            from_seed: from_seed.to_string(),
            from_owner: *from_owner,
        }),
        account_metas,
    )
}

pub fn assign_with_seed(address: &Address, base: &Address, seed: &str, owner: &Address) -> Instruction {
    let account_metas = vec![
        AccountMeta::new(*address, false),
        AccountMeta::new_readonly(*base, true),
    ];
    Instruction::new_with_bytes(
        system_program::id(),
        &encode(&SystemInstruction::AssignWithSeed {
            base: *base,
            seed: seed.to_string(),
            owner: *owner,
        }),
        account_metas,
    )
}

pub fn allocate_with_seed(
    address: &Address,
    base: &Address,
    seed: &str,
    space: u64,
    owner: &Address,
) -> Instruction {
    let account_metas = vec![
        AccountMeta::new(*address, false),
        AccountMeta::new_readonly(*base, true),
    ];
    Instruction::new_with_bytes(
        system_program::id(),
        &encode(&SystemInstruction::AllocateWithSeed {
            base: *base,
            seed: seed.to_string(),
            space,
            owner: *owner,
        }),
        account_metas,
    )
}

/// Validates the optional `{base, seed, program_id}` triple accepted by
/// `try_create_account`/`try_transfer`/`try_assign`/`try_allocate`: all
/// three must be given together or none at all.
fn validate_seed_params<'a>(
    base: Option<&'a Address>,
    seed: Option<&'a str>,
    program_id: Option<&'a Address>,
) -> Result<Option<(&'a Address, &'a str, &'a Address)>, SystemError> {
    match (base, seed, program_id) {
        (None, None, None) => Ok(None),
        (Some(b), Some(s), Some(p)) => Ok(Some((b, s, p))),
        _ => Err(SystemError::MissingSeedParams),
    }
}

/// Emits [`create_account`] if no seed params are given, or
/// [`create_account_with_seed`] if all three are given.
#[allow(clippy::too_many_arguments)]
pub fn try_create_account(
    from_pubkey: &Address,
    to_pubkey: &Address,
    lamports: u64,
    space: u64,
    owner: &Address,
    base: Option<&Address>,
    seed: Option<&str>,
    seed_program_id: Option<&Address>,
) -> Result<Instruction, SystemError> {
    Ok(match validate_seed_params(base, seed, seed_program_id)? {
        None => create_account(from_pubkey, to_pubkey, lamports, space, owner),
        Some((base, seed, seed_owner)) => {
            create_account_with_seed(from_pubkey, to_pubkey, base, seed, lamports, space, seed_owner)
        }
    })
}

/// Emits [`transfer`] if no seed params are given, or [`transfer_with_seed`]
/// if all three are given.
pub fn try_transfer(
    from_pubkey: &Address,
    to_pubkey: &Address,
    lamports: u64,
    base: Option<&Address>,
    seed: Option<&str>,
    seed_program_id: Option<&Address>,
) -> Result<Instruction, SystemError> {
    Ok(match validate_seed_params(base, seed, seed_program_id)? {
        None => transfer(from_pubkey, to_pubkey, lamports),
        Some((base, seed, owner)) => {
            transfer_with_seed(from_pubkey, base, seed, owner, to_pubkey, lamports)
        }
    })
}

/// Emits [`assign`] if no seed params are given, or [`assign_with_seed`] if
/// all three are given.
pub fn try_assign(
    pubkey: &Address,
    owner: &Address,
    base: Option<&Address>,
    seed: Option<&str>,
    seed_program_id: Option<&Address>,
) -> Result<Instruction, SystemError> {
    Ok(match validate_seed_params(base, seed, seed_program_id)? {
        None => assign(pubkey, owner),
        Some((base, seed, seed_owner)) => assign_with_seed(pubkey, base, seed, seed_owner),
    })
}

/// Emits [`allocate`] if no seed params are given, or [`allocate_with_seed`]
/// if all three are given.
pub fn try_allocate(
    pubkey: &Address,
    space: u64,
    base: Option<&Address>,
    seed: Option<&str>,
    seed_program_id: Option<&Address>,
) -> Result<Instruction, SystemError> {
    Ok(match validate_seed_params(base, seed, seed_program_id)? {
        None => allocate(pubkey, space),
        Some((base, seed, owner)) => allocate_with_seed(pubkey, base, seed, space, owner),
    })
}

pub fn create_nonce_account(
    from_pubkey: &Address,
    nonce_pubkey: &Address,
    authority: &Address,
    lamports: u64,
) -> Vec<Instruction> {
    vec![
        create_account(
            from_pubkey,
            nonce_pubkey,
            lamports,
            NONCE_STATE_SIZE as u64,
            &system_program::id(),
        ),
        initialize_nonce_account(nonce_pubkey, authority),
    ]
}

/// On-chain size of a `nonce::State` account, used to size `create_account`.
pub const NONCE_STATE_SIZE: usize = 80;

pub fn initialize_nonce_account(nonce_pubkey: &Address, authority: &Address) -> Instruction {
    let account_metas = vec![
        AccountMeta::new(*nonce_pubkey, false),
        AccountMeta::new_readonly(keel_sdk_ids::sysvar::recent_blockhashes::id(), false),
        AccountMeta::new_readonly(keel_sdk_ids::sysvar::rent::id(), false),
    ];
    Instruction::new_with_bytes(
        system_program::id(),
        &encode(&SystemInstruction::InitializeNonceAccount(*authority)),
        account_metas,
    )
}

pub fn advance_nonce_account(nonce_pubkey: &Address, authorized_pubkey: &Address) -> Instruction {
    let account_metas = vec![
        AccountMeta::new(*nonce_pubkey, false),
        AccountMeta::new_readonly(keel_sdk_ids::sysvar::recent_blockhashes::id(), false),
        AccountMeta::new_readonly(*authorized_pubkey, true),
    ];
    Instruction::new_with_bytes(
        system_program::id(),
        &encode(&SystemInstruction::AdvanceNonceAccount),
        account_metas,
    )
}

pub fn withdraw_nonce_account(
    nonce_pubkey: &Address,
    authorized_pubkey: &Address,
    to_pubkey: &Address,
    lamports: u64,
) -> Instruction {
    let account_metas = vec![
        AccountMeta::new(*nonce_pubkey, false),
        AccountMeta::new(*to_pubkey, false),
        AccountMeta::new_readonly(keel_sdk_ids::sysvar::recent_blockhashes::id(), false),
        AccountMeta::new_readonly(keel_sdk_ids::sysvar::rent::id(), false),
        AccountMeta::new_readonly(*authorized_pubkey, true),
    ];
    Instruction::new_with_bytes(
        system_program::id(),
        &encode(&SystemInstruction::WithdrawNonceAccount(lamports)),
        account_metas,
    )
}

/// Returns `true` if `data` is the bincode encoding of
/// [`SystemInstruction::AdvanceNonceAccount`], the check used to detect a
/// durable-nonce transaction's first instruction.
pub fn is_advance_nonce_account(data: &[u8]) -> bool {
    matches!(
        bincode::deserialize::<SystemInstruction>(data),
        Ok(SystemInstruction::AdvanceNonceAccount)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_builds_expected_accounts() {
        let from = Address::new_from_array([1; 32]);
        let to = Address::new_from_array([2; 32]);
        let ix = transfer(&from, &to, 1_000_000);
        assert_eq!(ix.program_id, system_program::id());
        assert_eq!(ix.accounts.len(), 2);
        assert!(ix.accounts[0].is_signer);
        assert!(ix.accounts[0].is_writable);
        assert!(!ix.accounts[1].is_signer);
    }

    #[test]
    fn create_account_with_seed_omits_redundant_base_signer() {
        let from = Address::new_from_array([1; 32]);
        let to = Address::new_from_array([2; 32]);
        let owner = Address::new_from_array([3; 32]);
        let ix = create_account_with_seed(&from, &to, &from, "seed", 0, 0, &owner);
        assert_eq!(ix.accounts.len(), 2);

        let other_base = Address::new_from_array([9; 32]);
        let ix2 = create_account_with_seed(&from, &to, &other_base, "seed", 0, 0, &owner);
        assert_eq!(ix2.accounts.len(), 3);
    }

    #[test]
    fn advance_nonce_round_trips_through_detector() {
        let nonce = Address::new_from_array([1; 32]);
        let authority = Address::new_from_array([2; 32]);
        let ix = advance_nonce_account(&nonce, &authority);
        assert!(is_advance_nonce_account(&ix.data));
    }

    #[test]
    fn transfer_with_seed_lists_base_as_signer_not_from() {
        let from = Address::new_from_array([1; 32]);
        let base = Address::new_from_array([2; 32]);
        let owner = Address::new_from_array([3; 32]);
        let to = Address::new_from_array([4; 32]);
        let ix = transfer_with_seed(&from, &base, "seed", &owner, &to, 1_000);
        assert_eq!(ix.accounts.len(), 3);
        assert!(!ix.accounts[0].is_signer);
        assert!(ix.accounts[1].is_signer);
        assert_eq!(ix.accounts[1].pubkey, base);
    }

    #[test]
    fn assign_with_seed_and_allocate_with_seed_list_base_as_readonly_signer() {
        let address = Address::new_from_array([1; 32]);
        let base = Address::new_from_array([2; 32]);
        let owner = Address::new_from_array([3; 32]);

        let assign_ix = assign_with_seed(&address, &base, "seed", &owner);
        assert_eq!(assign_ix.accounts.len(), 2);
        assert!(assign_ix.accounts[1].is_signer);
        assert!(!assign_ix.accounts[1].is_writable);

        let allocate_ix = allocate_with_seed(&address, &base, "seed", 32, &owner);
        assert_eq!(allocate_ix.accounts.len(), 2);
        assert!(allocate_ix.accounts[1].is_signer);
    }

    #[test]
    fn try_builders_reject_partial_seed_params() {
        let pubkey = Address::new_from_array([1; 32]);
        let owner = Address::new_from_array([2; 32]);
        let base = Address::new_from_array([3; 32]);

        assert_eq!(
            try_assign(&pubkey, &owner, Some(&base), None, None),
            Err(SystemError::MissingSeedParams)
        );
        assert_eq!(
            try_allocate(&pubkey, 0, None, Some("seed"), None),
            Err(SystemError::MissingSeedParams)
        );
    }

    #[test]
    fn try_builders_dispatch_to_plain_or_seeded_variant() {
        let from = Address::new_from_array([1; 32]);
        let to = Address::new_from_array([2; 32]);
        let base = Address::new_from_array([3; 32]);
        let owner = Address::new_from_array([4; 32]);

        let plain = try_transfer(&from, &to, 100, None, None, None).unwrap();
        assert_eq!(plain.accounts.len(), 2);

        let seeded = try_transfer(&from, &to, 100, Some(&base), Some("seed"), Some(&owner)).unwrap();
        assert_eq!(seeded.accounts.len(), 3);
    }
}
