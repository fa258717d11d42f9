//! Address derivation and instruction builder for the Associated Token
//! Account (ATA) program: every wallet has exactly one canonical token
//! account per mint, deterministically derived as a PDA.

use {
    keel_instruction::{AccountMeta, Instruction},
    keel_pubkey::Address,
    keel_sdk_ids::{spl_associated_token_account, spl_token, sysvar, system_program},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociatedTokenError {
    /// `owner` is a PDA, not a wallet — it has no corresponding keypair, so
    /// it can never sign for the resulting associated token account.
    OwnerOffCurve,
}

impl std::fmt::Display for AssociatedTokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str("owner of an associated token account must be an ed25519 wallet address")
    }
}
impl std::error::Error for AssociatedTokenError {}

/// Derives the associated token account address for `(owner, mint)`,
/// rejecting owners that are themselves program-derived addresses.
pub fn find_address(
    mint: &Address,
    owner: &Address,
) -> Result<(Address, u8), AssociatedTokenError> {
    if !owner.is_on_curve() {
        return Err(AssociatedTokenError::OwnerOffCurve);
    }
    let token_program_id = spl_token::id();
    let seeds: [&[u8]; 3] = [owner.as_array(), token_program_id.as_array(), mint.as_array()];
    Ok(Address::find_program_address(
        &seeds,
        &spl_associated_token_account::id(),
    ))
}

/// Builds the `Create` instruction that stands up the associated token
/// account returned by [`find_address`].
pub fn create_associated_token_account(
    payer: &Address,
    owner: &Address,
    mint: &Address,
) -> Result<Instruction, AssociatedTokenError> {
    let (associated_account, _bump) = find_address(mint, owner)?;
    let accounts = vec![
        AccountMeta::new(*payer, true),
        AccountMeta::new(associated_account, false),
        AccountMeta::new_readonly(*owner, false),
        AccountMeta::new_readonly(*mint, false),
        AccountMeta::new_readonly(system_program::id(), false),
        AccountMeta::new_readonly(spl_token::id(), false),
        AccountMeta::new_readonly(sysvar::rent::id(), false),
    ];
    Ok(Instruction::new_with_bytes(
        spl_associated_token_account::id(),
        &[0u8],
        accounts,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_off_curve_owner() {
        // Derive an address guaranteed off-curve: a PDA of some arbitrary program.
        let (pda, _bump) =
            Address::find_program_address(&[b"not-a-wallet"], &spl_token::id());
        let mint = Address::new_from_array([7; 32]);
        assert_eq!(find_address(&mint, &pda), Err(AssociatedTokenError::OwnerOffCurve));
    }

    #[test]
    fn create_instruction_has_seven_accounts_and_single_byte_data() {
        use keel_signer::Signer;

        let payer = Address::new_from_array([1; 32]);
        let mint = Address::new_from_array([2; 32]);
        let owner = keel_keypair::Keypair::new().pubkey();

        let ix = create_associated_token_account(&payer, &owner, &mint).unwrap();
        assert_eq!(ix.data, vec![0u8]);
        assert_eq!(ix.accounts.len(), 7);
        assert!(ix.accounts[0].is_signer && ix.accounts[0].is_writable);
        assert!(ix.accounts[1].is_writable);
    }
}
