//! Instructions and constructors for the SPL Token Swap program: pool
//! initialization, swaps, and proportional deposit/withdraw of both token
//! types.

use {
    keel_instruction::{AccountMeta, Instruction},
    keel_pubkey::Address,
    keel_sdk_ids::spl_token_swap,
};

pub const SWAP_ACCOUNT_LEN: u64 = 324;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fee {
    pub numerator: u64,
    pub denominator: u64,
}

impl Fee {
    fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.numerator.to_le_bytes());
        buf.extend_from_slice(&self.denominator.to_le_bytes());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fees {
    pub trade_fee: Fee,
    pub owner_trade_fee: Fee,
    pub owner_withdraw_fee: Fee,
    pub host_fee: Fee,
}

impl Fees {
    fn write(&self, buf: &mut Vec<u8>) {
        self.trade_fee.write(buf);
        self.owner_trade_fee.write(buf);
        self.owner_withdraw_fee.write(buf);
        self.host_fee.write(buf);
    }
}

/// A swap curve selector: 0 ConstantProduct, 1 ConstantPrice, 2 Stable,
/// 3 Offset, each carrying a fixed 32-byte parameter block whose layout is
/// curve-specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapCurve {
    pub curve_type: u8,
    pub calculator_params: [u8; 32],
}

impl SwapCurve {
    fn write(&self, buf: &mut Vec<u8>) {
        buf.push(self.curve_type);
        buf.extend_from_slice(&self.calculator_params);
    }
}

#[allow(clippy::too_many_arguments)]
pub fn initialize(
    swap_pubkey: &Address,
    authority_pubkey: &Address,
    token_a_pubkey: &Address,
    token_b_pubkey: &Address,
    pool_mint_pubkey: &Address,
    fee_account_pubkey: &Address,
    destination_pubkey: &Address,
    token_program_id: &Address,
    fees: Fees,
    curve: SwapCurve,
) -> Instruction {
    let mut data = vec![0u8];
    fees.write(&mut data);
    curve.write(&mut data);

    let accounts = vec![
        AccountMeta::new(*swap_pubkey, false),
        AccountMeta::new_readonly(*authority_pubkey, false),
        AccountMeta::new_readonly(*token_a_pubkey, false),
        AccountMeta::new_readonly(*token_b_pubkey, false),
        AccountMeta::new(*pool_mint_pubkey, false),
        AccountMeta::new(*fee_account_pubkey, false),
        AccountMeta::new(*destination_pubkey, false),
        AccountMeta::new_readonly(*token_program_id, false),
    ];
    Instruction::new_with_bytes(spl_token_swap::id(), &data, accounts)
}

#[allow(clippy::too_many_arguments)]
pub fn swap(
    swap_pubkey: &Address,
    authority_pubkey: &Address,
    user_transfer_authority_pubkey: &Address,
    source_pubkey: &Address,
    swap_source_pubkey: &Address,
    swap_destination_pubkey: &Address,
    destination_pubkey: &Address,
    pool_mint_pubkey: &Address,
    pool_fee_pubkey: &Address,
    token_program_id: &Address,
    amount_in: u64,
    minimum_amount_out: u64,
) -> Instruction {
    let mut data = vec![1u8];
    data.extend_from_slice(&amount_in.to_le_bytes());
    data.extend_from_slice(&minimum_amount_out.to_le_bytes());

    let accounts = vec![
        AccountMeta::new_readonly(*swap_pubkey, false),
        AccountMeta::new_readonly(*authority_pubkey, false),
        AccountMeta::new_readonly(*user_transfer_authority_pubkey, true),
        AccountMeta::new(*source_pubkey, false),
        AccountMeta::new(*swap_source_pubkey, false),
        AccountMeta::new(*swap_destination_pubkey, false),
        AccountMeta::new(*destination_pubkey, false),
        AccountMeta::new(*pool_mint_pubkey, false),
        AccountMeta::new(*pool_fee_pubkey, false),
        AccountMeta::new_readonly(*token_program_id, false),
    ];
    Instruction::new_with_bytes(spl_token_swap::id(), &data, accounts)
}

#[allow(clippy::too_many_arguments)]
pub fn deposit_all_token_types(
    swap_pubkey: &Address,
    authority_pubkey: &Address,
    user_transfer_authority_pubkey: &Address,
    deposit_token_a_pubkey: &Address,
    deposit_token_b_pubkey: &Address,
    swap_token_a_pubkey: &Address,
    swap_token_b_pubkey: &Address,
    pool_mint_pubkey: &Address,
    destination_pubkey: &Address,
    token_program_id: &Address,
    pool_token_amount: u64,
    maximum_token_a_amount: u64,
    maximum_token_b_amount: u64,
) -> Instruction {
    let mut data = vec![2u8];
    data.extend_from_slice(&pool_token_amount.to_le_bytes());
    data.extend_from_slice(&maximum_token_a_amount.to_le_bytes());
    data.extend_from_slice(&maximum_token_b_amount.to_le_bytes());

    let accounts = vec![
        AccountMeta::new_readonly(*swap_pubkey, false),
        AccountMeta::new_readonly(*authority_pubkey, false),
        AccountMeta::new_readonly(*user_transfer_authority_pubkey, true),
        AccountMeta::new(*deposit_token_a_pubkey, false),
        AccountMeta::new(*deposit_token_b_pubkey, false),
        AccountMeta::new(*swap_token_a_pubkey, false),
        AccountMeta::new(*swap_token_b_pubkey, false),
        AccountMeta::new(*pool_mint_pubkey, false),
        AccountMeta::new(*destination_pubkey, false),
        AccountMeta::new_readonly(*token_program_id, false),
    ];
    Instruction::new_with_bytes(spl_token_swap::id(), &data, accounts)
}

#[allow(clippy::too_many_arguments)]
pub fn withdraw_all_token_types(
    swap_pubkey: &Address,
    authority_pubkey: &Address,
    user_transfer_authority_pubkey: &Address,
    pool_mint_pubkey: &Address,
    source_pubkey: &Address,
    swap_token_a_pubkey: &Address,
    swap_token_b_pubkey: &Address,
    destination_token_a_pubkey: &Address,
    destination_token_b_pubkey: &Address,
    fee_account_pubkey: &Address,
    token_program_id: &Address,
    pool_token_amount: u64,
    minimum_token_a_amount: u64,
    minimum_token_b_amount: u64,
) -> Instruction {
    let mut data = vec![3u8];
    data.extend_from_slice(&pool_token_amount.to_le_bytes());
    data.extend_from_slice(&minimum_token_a_amount.to_le_bytes());
    data.extend_from_slice(&minimum_token_b_amount.to_le_bytes());

    let accounts = vec![
        AccountMeta::new_readonly(*swap_pubkey, false),
        AccountMeta::new_readonly(*authority_pubkey, false),
        AccountMeta::new_readonly(*user_transfer_authority_pubkey, true),
        AccountMeta::new(*pool_mint_pubkey, false),
        AccountMeta::new(*source_pubkey, false),
        AccountMeta::new(*swap_token_a_pubkey, false),
        AccountMeta::new(*swap_token_b_pubkey, false),
        AccountMeta::new(*destination_token_a_pubkey, false),
        AccountMeta::new(*destination_token_b_pubkey, false),
        AccountMeta::new(*fee_account_pubkey, false),
        AccountMeta::new_readonly(*token_program_id, false),
    ];
    Instruction::new_with_bytes(spl_token_swap::id(), &data, accounts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address::new_from_array([b; 32])
    }

    fn zero_fee() -> Fee {
        Fee {
            numerator: 0,
            denominator: 1,
        }
    }

    #[test]
    fn initialize_encodes_fees_then_curve() {
        let fees = Fees {
            trade_fee: Fee {
                numerator: 25,
                denominator: 10_000,
            },
            owner_trade_fee: zero_fee(),
            owner_withdraw_fee: zero_fee(),
            host_fee: zero_fee(),
        };
        let curve = SwapCurve {
            curve_type: 0,
            calculator_params: [0u8; 32],
        };
        let ix = initialize(
            &addr(1),
            &addr(2),
            &addr(3),
            &addr(4),
            &addr(5),
            &addr(6),
            &addr(7),
            &addr(8),
            fees,
            curve,
        );
        assert_eq!(ix.data[0], 0);
        // 4 fee pairs * 16 bytes + 1 curve type byte + 32 param bytes.
        assert_eq!(ix.data.len(), 1 + 4 * 16 + 1 + 32);
        assert_eq!(&ix.data[1..9], &25u64.to_le_bytes());
        assert_eq!(ix.accounts.len(), 8);
    }

    #[test]
    fn swap_marks_only_user_authority_as_signer() {
        let ix = swap(
            &addr(1),
            &addr(2),
            &addr(3),
            &addr(4),
            &addr(5),
            &addr(6),
            &addr(7),
            &addr(8),
            &addr(9),
            &addr(10),
            1_000,
            1,
        );
        assert_eq!(ix.data[0], 1);
        assert!(ix.accounts[2].is_signer);
        assert!(ix.accounts.iter().enumerate().all(|(i, m)| i == 2 || !m.is_signer));
    }
}
