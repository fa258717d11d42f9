//! Instructions and constructors for the SPL Token program: mints, token
//! accounts, multisigs, and the transfer/approve/burn/freeze instruction set.

use {
    keel_instruction::{AccountMeta, Instruction},
    keel_option_schema::{FieldSchema, OptionKind, OptionValue, Schema},
    keel_pubkey::Address,
    keel_sdk_ids::{spl_token, sysvar},
    std::collections::BTreeMap,
};

pub const MINT_LEN: u64 = 82;
pub const TOKEN_ACCOUNT_LEN: u64 = 165;
pub const MULTISIG_LEN: u64 = 355;
pub const MAX_SIGNERS: usize = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenInstructionError {
    InvalidCheckedParams,
    InvalidMultisigThreshold,
    TooManySigners,
}

impl std::fmt::Display for TokenInstructionError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            TokenInstructionError::InvalidCheckedParams => {
                f.write_str("checked instruction requires both mint and decimals")
            }
            TokenInstructionError::InvalidMultisigThreshold => {
                f.write_str("multisig threshold m must be in 1..=11")
            }
            TokenInstructionError::TooManySigners => {
                f.write_str("multisig accepts at most 11 signer keys")
            }
        }
    }
}
impl std::error::Error for TokenInstructionError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AuthorityType {
    MintTokens = 0,
    FreezeAccount = 1,
    AccountOwner = 2,
    CloseAccount = 3,
}

fn push_u64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn push_option_address(buf: &mut Vec<u8>, addr: Option<&Address>) {
    match addr {
        Some(addr) => {
            buf.push(1);
            buf.extend_from_slice(addr.as_array());
        }
        None => buf.push(0),
    }
}

/// Appends the authority account(s) for an operation: a single signing
/// account, or (when `multi_signers` is non-empty) the authority as a
/// non-signer followed by each cosigner, matching on-chain multisig
/// evaluation.
fn push_authority_metas(metas: &mut Vec<AccountMeta>, authority: &Address, multi_signers: &[&Address]) {
    if multi_signers.is_empty() {
        metas.push(AccountMeta::new_readonly(*authority, true));
    } else {
        metas.push(AccountMeta::new_readonly(*authority, false));
        for signer in multi_signers {
            metas.push(AccountMeta::new_readonly(**signer, true));
        }
    }
}

pub fn initialize_mint(
    mint_pubkey: &Address,
    decimals: u8,
    mint_authority: &Address,
    freeze_authority: Option<&Address>,
) -> Instruction {
    let mut data = vec![0u8];
    data.push(decimals);
    data.extend_from_slice(mint_authority.as_array());
    push_option_address(&mut data, freeze_authority);

    let accounts = vec![
        AccountMeta::new(*mint_pubkey, false),
        AccountMeta::new_readonly(sysvar::rent::id(), false),
    ];
    Instruction::new_with_bytes(spl_token::id(), &data, accounts)
}

pub fn initialize_account(
    account_pubkey: &Address,
    mint_pubkey: &Address,
    owner_pubkey: &Address,
) -> Instruction {
    let accounts = vec![
        AccountMeta::new(*account_pubkey, false),
        AccountMeta::new_readonly(*mint_pubkey, false),
        AccountMeta::new_readonly(*owner_pubkey, false),
        AccountMeta::new_readonly(sysvar::rent::id(), false),
    ];
    Instruction::new_with_bytes(spl_token::id(), &[1u8], accounts)
}

pub fn initialize_multisig(
    multisig_pubkey: &Address,
    signer_pubkeys: &[&Address],
    m: u8,
) -> Result<Instruction, TokenInstructionError> {
    if m < 1 || m as usize > MAX_SIGNERS {
        return Err(TokenInstructionError::InvalidMultisigThreshold);
    }
    if signer_pubkeys.len() > MAX_SIGNERS {
        return Err(TokenInstructionError::TooManySigners);
    }
    let mut data = vec![2u8, m];
    let mut accounts = vec![
        AccountMeta::new(*multisig_pubkey, false),
        AccountMeta::new_readonly(sysvar::rent::id(), false),
    ];
    for signer in signer_pubkeys {
        accounts.push(AccountMeta::new_readonly(**signer, false));
    }
    Ok(Instruction::new_with_bytes(spl_token::id(), &data, accounts))
}

pub fn transfer(
    source_pubkey: &Address,
    destination_pubkey: &Address,
    authority_pubkey: &Address,
    multi_signers: &[&Address],
    amount: u64,
) -> Instruction {
    let mut data = vec![3u8];
    push_u64(&mut data, amount);
    let mut accounts = vec![
        AccountMeta::new(*source_pubkey, false),
        AccountMeta::new(*destination_pubkey, false),
    ];
    push_authority_metas(&mut accounts, authority_pubkey, multi_signers);
    Instruction::new_with_bytes(spl_token::id(), &data, accounts)
}

pub fn approve(
    source_pubkey: &Address,
    delegate_pubkey: &Address,
    owner_pubkey: &Address,
    multi_signers: &[&Address],
    amount: u64,
) -> Instruction {
    let mut data = vec![4u8];
    push_u64(&mut data, amount);
    let mut accounts = vec![
        AccountMeta::new(*source_pubkey, false),
        AccountMeta::new_readonly(*delegate_pubkey, false),
    ];
    push_authority_metas(&mut accounts, owner_pubkey, multi_signers);
    Instruction::new_with_bytes(spl_token::id(), &data, accounts)
}

pub fn revoke(source_pubkey: &Address, owner_pubkey: &Address, multi_signers: &[&Address]) -> Instruction {
    let mut accounts = vec![AccountMeta::new(*source_pubkey, false)];
    push_authority_metas(&mut accounts, owner_pubkey, multi_signers);
    Instruction::new_with_bytes(spl_token::id(), &[5u8], accounts)
}

pub fn set_authority(
    owned_pubkey: &Address,
    authority_type: AuthorityType,
    new_authority: Option<&Address>,
    owner_pubkey: &Address,
    multi_signers: &[&Address],
) -> Instruction {
    let mut data = vec![6u8, authority_type as u8];
    push_option_address(&mut data, new_authority);
    let mut accounts = vec![AccountMeta::new(*owned_pubkey, false)];
    push_authority_metas(&mut accounts, owner_pubkey, multi_signers);
    Instruction::new_with_bytes(spl_token::id(), &data, accounts)
}

pub fn mint_to(
    mint_pubkey: &Address,
    account_pubkey: &Address,
    owner_pubkey: &Address,
    multi_signers: &[&Address],
    amount: u64,
) -> Instruction {
    let mut data = vec![7u8];
    push_u64(&mut data, amount);
    let mut accounts = vec![
        AccountMeta::new(*mint_pubkey, false),
        AccountMeta::new(*account_pubkey, false),
    ];
    push_authority_metas(&mut accounts, owner_pubkey, multi_signers);
    Instruction::new_with_bytes(spl_token::id(), &data, accounts)
}

pub fn burn(
    account_pubkey: &Address,
    mint_pubkey: &Address,
    authority_pubkey: &Address,
    multi_signers: &[&Address],
    amount: u64,
) -> Instruction {
    let mut data = vec![8u8];
    push_u64(&mut data, amount);
    let mut accounts = vec![
        AccountMeta::new(*account_pubkey, false),
        AccountMeta::new(*mint_pubkey, false),
    ];
    push_authority_metas(&mut accounts, authority_pubkey, multi_signers);
    Instruction::new_with_bytes(spl_token::id(), &data, accounts)
}

pub fn close_account(
    account_pubkey: &Address,
    destination_pubkey: &Address,
    owner_pubkey: &Address,
    multi_signers: &[&Address],
) -> Instruction {
    let mut accounts = vec![
        AccountMeta::new(*account_pubkey, false),
        AccountMeta::new(*destination_pubkey, false),
    ];
    push_authority_metas(&mut accounts, owner_pubkey, multi_signers);
    Instruction::new_with_bytes(spl_token::id(), &[9u8], accounts)
}

pub fn freeze_account(
    account_pubkey: &Address,
    mint_pubkey: &Address,
    owner_pubkey: &Address,
    multi_signers: &[&Address],
) -> Instruction {
    let mut accounts = vec![
        AccountMeta::new(*account_pubkey, false),
        AccountMeta::new_readonly(*mint_pubkey, false),
    ];
    push_authority_metas(&mut accounts, owner_pubkey, multi_signers);
    Instruction::new_with_bytes(spl_token::id(), &[10u8], accounts)
}

pub fn thaw_account(
    account_pubkey: &Address,
    mint_pubkey: &Address,
    owner_pubkey: &Address,
    multi_signers: &[&Address],
) -> Instruction {
    let mut accounts = vec![
        AccountMeta::new(*account_pubkey, false),
        AccountMeta::new_readonly(*mint_pubkey, false),
    ];
    push_authority_metas(&mut accounts, owner_pubkey, multi_signers);
    Instruction::new_with_bytes(spl_token::id(), &[11u8], accounts)
}

#[allow(clippy::too_many_arguments)]
pub fn transfer_checked(
    source_pubkey: &Address,
    mint_pubkey: &Address,
    destination_pubkey: &Address,
    authority_pubkey: &Address,
    multi_signers: &[&Address],
    amount: u64,
    decimals: u8,
) -> Instruction {
    let mut data = vec![12u8];
    push_u64(&mut data, amount);
    data.push(decimals);
    let mut accounts = vec![
        AccountMeta::new(*source_pubkey, false),
        AccountMeta::new_readonly(*mint_pubkey, false),
        AccountMeta::new(*destination_pubkey, false),
    ];
    push_authority_metas(&mut accounts, authority_pubkey, multi_signers);
    Instruction::new_with_bytes(spl_token::id(), &data, accounts)
}

#[allow(clippy::too_many_arguments)]
pub fn approve_checked(
    source_pubkey: &Address,
    mint_pubkey: &Address,
    delegate_pubkey: &Address,
    owner_pubkey: &Address,
    multi_signers: &[&Address],
    amount: u64,
    decimals: u8,
) -> Instruction {
    let mut data = vec![13u8];
    push_u64(&mut data, amount);
    data.push(decimals);
    let mut accounts = vec![
        AccountMeta::new(*source_pubkey, false),
        AccountMeta::new_readonly(*mint_pubkey, false),
        AccountMeta::new_readonly(*delegate_pubkey, false),
    ];
    push_authority_metas(&mut accounts, owner_pubkey, multi_signers);
    Instruction::new_with_bytes(spl_token::id(), &data, accounts)
}

pub fn mint_to_checked(
    mint_pubkey: &Address,
    account_pubkey: &Address,
    owner_pubkey: &Address,
    multi_signers: &[&Address],
    amount: u64,
    decimals: u8,
) -> Instruction {
    let mut data = vec![14u8];
    push_u64(&mut data, amount);
    data.push(decimals);
    let mut accounts = vec![
        AccountMeta::new(*mint_pubkey, false),
        AccountMeta::new(*account_pubkey, false),
    ];
    push_authority_metas(&mut accounts, owner_pubkey, multi_signers);
    Instruction::new_with_bytes(spl_token::id(), &data, accounts)
}

pub fn burn_checked(
    account_pubkey: &Address,
    mint_pubkey: &Address,
    authority_pubkey: &Address,
    multi_signers: &[&Address],
    amount: u64,
    decimals: u8,
) -> Instruction {
    let mut data = vec![15u8];
    push_u64(&mut data, amount);
    data.push(decimals);
    let mut accounts = vec![
        AccountMeta::new(*account_pubkey, false),
        AccountMeta::new(*mint_pubkey, false),
    ];
    push_authority_metas(&mut accounts, authority_pubkey, multi_signers);
    Instruction::new_with_bytes(spl_token::id(), &data, accounts)
}

const CHECKED_PARAMS_SCHEMA: Schema = &[
    FieldSchema {
        name: "mint",
        kind: OptionKind::Key,
        required: true,
        default: None,
        doc: "mint account a checked instruction must name",
    },
    FieldSchema {
        name: "decimals",
        kind: OptionKind::IntegerRange { min: 0, max: 255 },
        required: true,
        default: None,
        doc: "decimals a checked instruction must carry",
    },
];

/// Validates the `{mint, decimals}` pair a checked instruction needs:
/// both absent means "build the unchecked variant", both present means
/// "build the checked variant", anything else is `InvalidCheckedParams`.
fn validate_checked_params(
    mint_pubkey: Option<&Address>,
    decimals: Option<u8>,
) -> Result<Option<(Address, u8)>, TokenInstructionError> {
    if mint_pubkey.is_none() && decimals.is_none() {
        return Ok(None);
    }
    let mut input = BTreeMap::new();
    if let Some(mint) = mint_pubkey {
        input.insert("mint".to_string(), OptionValue::Key(*mint));
    }
    if let Some(decimals) = decimals {
        input.insert("decimals".to_string(), OptionValue::Integer(decimals as i128));
    }
    let normalized = keel_option_schema::validate(CHECKED_PARAMS_SCHEMA, input)
        .map_err(|_| TokenInstructionError::InvalidCheckedParams)?;
    let mint = match normalized.get("mint") {
        Some(OptionValue::Key(key)) => *key,
        _ => unreachable!("schema guarantees a Key value for a required Key field"),
    };
    let decimals = match normalized.get("decimals") {
        Some(OptionValue::Integer(n)) => *n as u8,
        _ => unreachable!("schema guarantees an Integer value for a required IntegerRange field"),
    };
    Ok(Some((mint, decimals)))
}

/// Builds `Transfer` when `mint_pubkey`/`decimals` are both omitted, or
/// `TransferChecked` when both are supplied; returns `InvalidCheckedParams`
/// if only one of the pair is given.
#[allow(clippy::too_many_arguments)]
pub fn try_transfer(
    source_pubkey: &Address,
    destination_pubkey: &Address,
    authority_pubkey: &Address,
    multi_signers: &[&Address],
    amount: u64,
    mint_pubkey: Option<&Address>,
    decimals: Option<u8>,
) -> Result<Instruction, TokenInstructionError> {
    match validate_checked_params(mint_pubkey, decimals)? {
        None => Ok(transfer(source_pubkey, destination_pubkey, authority_pubkey, multi_signers, amount)),
        Some((mint, decimals)) => Ok(transfer_checked(
            source_pubkey,
            &mint,
            destination_pubkey,
            authority_pubkey,
            multi_signers,
            amount,
            decimals,
        )),
    }
}

/// Builds `Approve` or `ApproveChecked`; see [`try_transfer`] for the
/// all-or-nothing rule on `mint_pubkey`/`decimals`.
#[allow(clippy::too_many_arguments)]
pub fn try_approve(
    source_pubkey: &Address,
    delegate_pubkey: &Address,
    owner_pubkey: &Address,
    multi_signers: &[&Address],
    amount: u64,
    mint_pubkey: Option<&Address>,
    decimals: Option<u8>,
) -> Result<Instruction, TokenInstructionError> {
    match validate_checked_params(mint_pubkey, decimals)? {
        None => Ok(approve(source_pubkey, delegate_pubkey, owner_pubkey, multi_signers, amount)),
        Some((mint, decimals)) => Ok(approve_checked(
            source_pubkey,
            &mint,
            delegate_pubkey,
            owner_pubkey,
            multi_signers,
            amount,
            decimals,
        )),
    }
}

/// Builds `MintTo` when `decimals` is omitted, `MintToChecked` when given.
/// `mint_pubkey` is always required here (it names the account being
/// minted from, not an extra checked-only account), so the only optional
/// piece is `decimals` and there is no "some but not all" state to reject.
pub fn try_mint_to(
    mint_pubkey: &Address,
    account_pubkey: &Address,
    owner_pubkey: &Address,
    multi_signers: &[&Address],
    amount: u64,
    decimals: Option<u8>,
) -> Instruction {
    match decimals {
        None => mint_to(mint_pubkey, account_pubkey, owner_pubkey, multi_signers, amount),
        Some(decimals) => {
            mint_to_checked(mint_pubkey, account_pubkey, owner_pubkey, multi_signers, amount, decimals)
        }
    }
}

/// Builds `Burn` when `decimals` is omitted, `BurnChecked` when given; see
/// [`try_mint_to`] for why `mint_pubkey` itself is unconditionally required.
pub fn try_burn(
    account_pubkey: &Address,
    mint_pubkey: &Address,
    authority_pubkey: &Address,
    multi_signers: &[&Address],
    amount: u64,
    decimals: Option<u8>,
) -> Instruction {
    match decimals {
        None => burn(account_pubkey, mint_pubkey, authority_pubkey, multi_signers, amount),
        Some(decimals) => {
            burn_checked(account_pubkey, mint_pubkey, authority_pubkey, multi_signers, amount, decimals)
        }
    }
}

/// `CreateAccount(165, owner=Token) + InitializeAccount`, the standard way
/// to stand up a new token account for `mint` in one instruction pair.
pub fn init_token_account(
    payer: &Address,
    new_account: &Address,
    mint: &Address,
    owner: &Address,
    lamports: u64,
) -> Vec<Instruction> {
    vec![
        keel_system_interface::create_account(
            payer,
            new_account,
            lamports,
            TOKEN_ACCOUNT_LEN,
            &spl_token::id(),
        ),
        initialize_account(new_account, mint, owner),
    ]
}

/// `CreateAccount(82, owner=Token) + InitializeMint`.
pub fn init_mint(
    payer: &Address,
    mint: &Address,
    lamports: u64,
    decimals: u8,
    mint_authority: &Address,
    freeze_authority: Option<&Address>,
) -> Vec<Instruction> {
    vec![
        keel_system_interface::create_account(payer, mint, lamports, MINT_LEN, &spl_token::id()),
        initialize_mint(mint, decimals, mint_authority, freeze_authority),
    ]
}

/// `CreateAccount(355, owner=Token) + InitializeMultisig`.
pub fn init_multisig(
    payer: &Address,
    multisig: &Address,
    lamports: u64,
    m: u8,
    signer_pubkeys: &[&Address],
) -> Result<Vec<Instruction>, TokenInstructionError> {
    Ok(vec![
        keel_system_interface::create_account(
            payer,
            multisig,
            lamports,
            MULTISIG_LEN,
            &spl_token::id(),
        ),
        initialize_multisig(multisig, signer_pubkeys, m)?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_encodes_discriminant_and_amount() {
        let source = Address::new_from_array([1; 32]);
        let dest = Address::new_from_array([2; 32]);
        let authority = Address::new_from_array([3; 32]);
        let ix = transfer(&source, &dest, &authority, &[], 1_000);
        assert_eq!(ix.data[0], 3);
        assert_eq!(&ix.data[1..9], &1_000u64.to_le_bytes());
        assert_eq!(ix.accounts.len(), 3);
        assert!(ix.accounts[2].is_signer);
    }

    #[test]
    fn multi_signer_transfer_lists_authority_as_nonsigner() {
        let source = Address::new_from_array([1; 32]);
        let dest = Address::new_from_array([2; 32]);
        let authority = Address::new_from_array([3; 32]);
        let cosigner = Address::new_from_array([4; 32]);
        let ix = transfer(&source, &dest, &authority, &[&cosigner], 1);
        assert!(!ix.accounts[2].is_signer);
        assert!(ix.accounts[3].is_signer);
        assert_eq!(ix.accounts[3].pubkey, cosigner);
    }

    #[test]
    fn initialize_multisig_rejects_bad_threshold() {
        let multisig = Address::new_from_array([1; 32]);
        assert_eq!(
            initialize_multisig(&multisig, &[], 0),
            Err(TokenInstructionError::InvalidMultisigThreshold)
        );
    }

    #[test]
    fn try_transfer_rejects_partial_checked_params() {
        let source = Address::new_from_array([1; 32]);
        let dest = Address::new_from_array([2; 32]);
        let authority = Address::new_from_array([3; 32]);
        let mint = Address::new_from_array([4; 32]);

        assert_eq!(
            try_transfer(&source, &dest, &authority, &[], 1, Some(&mint), None),
            Err(TokenInstructionError::InvalidCheckedParams)
        );
        assert_eq!(
            try_transfer(&source, &dest, &authority, &[], 1, None, Some(6)),
            Err(TokenInstructionError::InvalidCheckedParams)
        );
    }

    #[test]
    fn try_transfer_dispatches_to_checked_or_unchecked() {
        let source = Address::new_from_array([1; 32]);
        let dest = Address::new_from_array([2; 32]);
        let authority = Address::new_from_array([3; 32]);
        let mint = Address::new_from_array([4; 32]);

        let unchecked = try_transfer(&source, &dest, &authority, &[], 1, None, None).unwrap();
        assert_eq!(unchecked.data[0], 3);

        let checked = try_transfer(&source, &dest, &authority, &[], 1, Some(&mint), Some(6)).unwrap();
        assert_eq!(checked.data[0], 12);
        assert_eq!(*checked.data.last().unwrap(), 6);
    }

    #[test]
    fn try_mint_to_and_try_burn_dispatch_on_decimals() {
        let mint = Address::new_from_array([1; 32]);
        let account = Address::new_from_array([2; 32]);
        let owner = Address::new_from_array([3; 32]);

        assert_eq!(try_mint_to(&mint, &account, &owner, &[], 1, None).data[0], 7);
        assert_eq!(try_mint_to(&mint, &account, &owner, &[], 1, Some(9)).data[0], 14);
        assert_eq!(try_burn(&account, &mint, &owner, &[], 1, None).data[0], 8);
        assert_eq!(try_burn(&account, &mint, &owner, &[], 1, Some(9)).data[0], 15);
    }

    #[test]
    fn init_token_account_emits_create_then_initialize() {
        let payer = Address::new_from_array([1; 32]);
        let account = Address::new_from_array([2; 32]);
        let mint = Address::new_from_array([3; 32]);
        let owner = Address::new_from_array([4; 32]);
        let ixs = init_token_account(&payer, &account, &mint, &owner, 2_000_000);
        assert_eq!(ixs.len(), 2);
        assert_eq!(ixs[1].data, vec![1u8]);
    }
}
