//! Compiles a list of [`Instruction`]s into a legacy [`Message`]: a
//! deduplicated, ordered account-key table plus a three-field header that
//! tells the runtime (and the sigverify stage) how many of the leading keys
//! must sign and which of the signing/non-signing ranges are read-only.
//!
//! Account ordering follows the fixed priority the runtime expects:
//! signer+writable, signer+readonly, non-signer+writable, non-signer+readonly.
//! The fee payer, if given, is always placed first.

use {
    keel_hash::Hash,
    keel_instruction::{CompiledInstruction, Instruction},
    keel_pubkey::Address,
    keel_sanitize::{Sanitize, SanitizeError},
    keel_sdk_ids::bpf_loader_upgradeable,
    std::collections::{HashMap, HashSet},
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MessageHeader {
    pub num_required_signatures: u8,
    pub num_readonly_signed_accounts: u8,
    pub num_readonly_unsigned_accounts: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct CompiledKeyMeta {
    is_signer: bool,
    is_writable: bool,
}

impl CompiledKeyMeta {
    fn union(self, other: Self) -> Self {
        Self {
            is_signer: self.is_signer || other.is_signer,
            is_writable: self.is_writable || other.is_writable,
        }
    }
}

/// Accumulates every account touched by a set of instructions, merging
/// signer/writable flags across repeated references to the same key while
/// preserving first-encounter order — spec §4.3 step 2's priority sort must
/// be stable, so ties within a priority tier keep their original order
/// rather than falling out however a key-ordered map happens to iterate.
struct CompiledKeys {
    keys: Vec<Address>,
    metas: Vec<CompiledKeyMeta>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileError {
    NoPayer,
    NoBlockhash,
    NoInstructions,
    NoProgram(usize),
    AccountIndexOverflow,
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            CompileError::NoPayer => f.write_str("no fee payer given"),
            CompileError::NoBlockhash => f.write_str("no recent blockhash given"),
            CompileError::NoInstructions => f.write_str("no instructions given"),
            CompileError::NoProgram(idx) => write!(f, "instruction {idx} has no program id"),
            CompileError::AccountIndexOverflow => {
                f.write_str("account index overflowed a u8 while compiling the message")
            }
        }
    }
}
impl std::error::Error for CompileError {}

fn upsert(
    keys: &mut Vec<Address>,
    metas: &mut Vec<CompiledKeyMeta>,
    index: &mut HashMap<Address, usize>,
    key: Address,
    meta: CompiledKeyMeta,
) {
    match index.get(&key) {
        Some(&i) => metas[i] = metas[i].union(meta),
        None => {
            index.insert(key, keys.len());
            keys.push(key);
            metas.push(meta);
        }
    }
}

impl CompiledKeys {
    /// Walks instructions (and the payer, if any) in encounter order,
    /// merging repeated references to the same key but never reordering
    /// first-seen keys — downstream bucketing relies on this order to stay
    /// stable within a priority tier.
    fn compile(instructions: &[Instruction], payer: Option<Address>) -> Self {
        let mut keys: Vec<Address> = Vec::new();
        let mut metas: Vec<CompiledKeyMeta> = Vec::new();
        let mut index: HashMap<Address, usize> = HashMap::new();

        for ix in instructions {
            upsert(&mut keys, &mut metas, &mut index, ix.program_id, CompiledKeyMeta::default());
            for account_meta in &ix.accounts {
                upsert(
                    &mut keys,
                    &mut metas,
                    &mut index,
                    account_meta.pubkey,
                    CompiledKeyMeta {
                        is_signer: account_meta.is_signer,
                        is_writable: account_meta.is_writable,
                    },
                );
            }
        }
        if let Some(payer) = payer {
            upsert(
                &mut keys,
                &mut metas,
                &mut index,
                payer,
                CompiledKeyMeta { is_signer: true, is_writable: true },
            );
        }
        Self { keys, metas }
    }

    fn try_into_message_components(
        self,
        payer: Option<Address>,
    ) -> Result<(MessageHeader, Vec<Address>), CompileError> {
        let mut writable_signer_keys: Vec<Address> = payer.into_iter().collect();
        let mut readonly_signer_keys = Vec::new();
        let mut writable_non_signer_keys = Vec::new();
        let mut readonly_non_signer_keys = Vec::new();

        // A stable partition over first-encounter order: within each
        // priority tier, keys keep the relative order they were first seen.
        for (key, meta) in self.keys.into_iter().zip(self.metas) {
            if Some(key) == payer {
                continue;
            }
            match (meta.is_signer, meta.is_writable) {
                (true, true) => writable_signer_keys.push(key),
                (true, false) => readonly_signer_keys.push(key),
                (false, true) => writable_non_signer_keys.push(key),
                (false, false) => readonly_non_signer_keys.push(key),
            }
        }

        let signers_len = writable_signer_keys
            .len()
            .checked_add(readonly_signer_keys.len())
            .ok_or(CompileError::AccountIndexOverflow)?;

        let header = MessageHeader {
            num_required_signatures: u8::try_from(signers_len)
                .map_err(|_| CompileError::AccountIndexOverflow)?,
            num_readonly_signed_accounts: u8::try_from(readonly_signer_keys.len())
                .map_err(|_| CompileError::AccountIndexOverflow)?,
            num_readonly_unsigned_accounts: u8::try_from(readonly_non_signer_keys.len())
                .map_err(|_| CompileError::AccountIndexOverflow)?,
        };

        let mut account_keys = writable_signer_keys;
        account_keys.extend(readonly_signer_keys);
        account_keys.extend(writable_non_signer_keys);
        account_keys.extend(readonly_non_signer_keys);

        let total = account_keys.len();
        if total > u8::MAX as usize + 1 {
            return Err(CompileError::AccountIndexOverflow);
        }

        Ok((header, account_keys))
    }
}

fn position(keys: &[Address], key: &Address) -> u8 {
    keys.iter()
        .position(|k| k == key)
        .expect("account key missing from compiled account table") as u8
}

fn compile_instruction(ix: &Instruction, keys: &[Address]) -> CompiledInstruction {
    let accounts = ix
        .accounts
        .iter()
        .map(|account_meta| position(keys, &account_meta.pubkey))
        .collect();
    CompiledInstruction::new(position(keys, &ix.program_id), accounts, ix.data.clone())
}

fn compile_instructions(ixs: &[Instruction], keys: &[Address]) -> Vec<CompiledInstruction> {
    ixs.iter().map(|ix| compile_instruction(ix, keys)).collect()
}

/// A legacy-format Solana transaction message.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Message {
    pub header: MessageHeader,
    #[cfg_attr(feature = "serde", serde(with = "short_vec_address"))]
    pub account_keys: Vec<Address>,
    pub recent_blockhash: Hash,
    #[cfg_attr(feature = "serde", serde(with = "short_vec_instruction"))]
    pub instructions: Vec<CompiledInstruction>,
}

#[cfg(feature = "serde")]
mod short_vec_address {
    use super::Address;
    use keel_short_vec::ShortVec;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(v: &[Address], s: S) -> Result<S::Ok, S::Error> {
        ShortVec(v.to_vec()).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Address>, D::Error> {
        Ok(ShortVec::<Address>::deserialize(d)?.0)
    }
}

#[cfg(feature = "serde")]
mod short_vec_instruction {
    use keel_instruction::CompiledInstruction;
    use keel_short_vec::ShortVec;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(v: &[CompiledInstruction], s: S) -> Result<S::Ok, S::Error> {
        ShortVec(v.to_vec()).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Vec<CompiledInstruction>, D::Error> {
        Ok(ShortVec::<CompiledInstruction>::deserialize(d)?.0)
    }
}

impl Sanitize for Message {
    fn sanitize(&self) -> Result<(), SanitizeError> {
        if self.header.num_required_signatures as usize
            + self.header.num_readonly_unsigned_accounts as usize
            > self.account_keys.len()
        {
            return Err(SanitizeError::IndexOutOfBounds);
        }
        if self.header.num_readonly_signed_accounts >= self.header.num_required_signatures
            && self.header.num_required_signatures > 0
        {
            return Err(SanitizeError::IndexOutOfBounds);
        }
        for ci in &self.instructions {
            if ci.program_id_index as usize >= self.account_keys.len() {
                return Err(SanitizeError::IndexOutOfBounds);
            }
            if ci.program_id_index == 0 {
                return Err(SanitizeError::IndexOutOfBounds);
            }
            for ai in &ci.accounts {
                if *ai as usize >= self.account_keys.len() {
                    return Err(SanitizeError::IndexOutOfBounds);
                }
            }
        }
        Ok(())
    }
}

impl Message {
    pub fn new(instructions: &[Instruction], payer: Option<&Address>) -> Self {
        Self::new_with_blockhash(instructions, payer, &Hash::default())
    }

    pub fn new_with_blockhash(
        instructions: &[Instruction],
        payer: Option<&Address>,
        blockhash: &Hash,
    ) -> Self {
        Self::try_compile(instructions, payer, Some(blockhash)).expect("failed to compile message")
    }

    /// Runs the ordered pre-check (payer given, blockhash given,
    /// instructions non-empty, every instruction names a program) before
    /// compiling the account table, returning the first check that fails
    /// rather than silently producing a malformed message.
    pub fn try_compile(
        instructions: &[Instruction],
        payer: Option<&Address>,
        blockhash: Option<&Hash>,
    ) -> Result<Self, CompileError> {
        let payer = payer.ok_or(CompileError::NoPayer)?;
        let blockhash = blockhash.ok_or(CompileError::NoBlockhash)?;
        if instructions.is_empty() {
            return Err(CompileError::NoInstructions);
        }
        for (idx, ix) in instructions.iter().enumerate() {
            if ix.program_id == Address::default() && ix.accounts.is_empty() && ix.data.is_empty() {
                return Err(CompileError::NoProgram(idx));
            }
        }

        let compiled_keys = CompiledKeys::compile(instructions, Some(*payer));
        let (header, account_keys) = compiled_keys.try_into_message_components(Some(*payer))?;
        let instructions = compile_instructions(instructions, &account_keys);
        Ok(Self {
            header,
            account_keys,
            recent_blockhash: *blockhash,
            instructions,
        })
    }

    pub fn compile_instruction(&self, ix: &Instruction) -> CompiledInstruction {
        compile_instruction(ix, &self.account_keys)
    }

    pub fn program_id(&self, instruction_index: usize) -> Option<&Address> {
        Some(&self.account_keys[self.instructions.get(instruction_index)?.program_id_index as usize])
    }

    pub fn is_writable_index(&self, i: usize) -> bool {
        i < (self.header.num_required_signatures as usize)
            .saturating_sub(self.header.num_readonly_signed_accounts as usize)
            || (i >= self.header.num_required_signatures as usize
                && i < self
                    .account_keys
                    .len()
                    .saturating_sub(self.header.num_readonly_unsigned_accounts as usize))
    }

    pub fn is_signer(&self, i: usize) -> bool {
        i < self.header.num_required_signatures as usize
    }

    pub fn signer_keys(&self) -> Vec<&Address> {
        let last_key = self
            .account_keys
            .len()
            .min(self.header.num_required_signatures as usize);
        self.account_keys[..last_key].iter().collect()
    }

    /// Returns `true` if `account_keys` has any duplicate keys: a sanitize
    /// failure every caller should check before signing.
    pub fn has_duplicates(&self) -> bool {
        let mut seen: HashSet<&Address> = HashSet::new();
        !self.account_keys.iter().all(|key| seen.insert(key))
    }

    pub fn is_upgradeable_loader_present(&self) -> bool {
        self.account_keys
            .iter()
            .any(|&key| key == bpf_loader_upgradeable::id())
    }

    #[cfg(feature = "bincode")]
    pub fn serialize(&self) -> Vec<u8> {
        bincode::serialize(self).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_instruction::AccountMeta;

    fn key(b: u8) -> Address {
        Address::new_from_array([b; 32])
    }

    #[test]
    fn payer_is_always_first() {
        let payer = key(1);
        let other = key(2);
        let program = key(9);
        let ix = Instruction {
            program_id: program,
            accounts: vec![AccountMeta::new(other, false)],
            data: vec![],
        };
        let msg = Message::new(&[ix], Some(&payer));
        assert_eq!(msg.account_keys[0], payer);
        assert!(msg.is_signer(0));
        assert!(msg.is_writable_index(0));
    }

    #[test]
    fn header_counts_match_account_partitions() {
        let payer = key(1);
        let writable_signer = key(2);
        let readonly_signer = key(3);
        let writable_other = key(4);
        let readonly_other = key(5);
        let program = key(9);

        let ix = Instruction {
            program_id: program,
            accounts: vec![
                AccountMeta::new(writable_signer, true),
                AccountMeta::new_readonly(readonly_signer, true),
                AccountMeta::new(writable_other, false),
                AccountMeta::new_readonly(readonly_other, false),
            ],
            data: vec![],
        };

        let msg = Message::new(&[ix], Some(&payer));
        assert_eq!(msg.header.num_required_signatures, 3);
        assert_eq!(msg.header.num_readonly_signed_accounts, 1);
        assert_eq!(msg.header.num_readonly_unsigned_accounts, 1);
        assert!(!msg.has_duplicates());
    }

    #[test]
    fn duplicate_accounts_are_merged_not_repeated() {
        let payer = key(1);
        let shared = key(2);
        let program = key(9);
        let ix = Instruction {
            program_id: program,
            accounts: vec![
                AccountMeta::new_readonly(shared, false),
                AccountMeta::new(shared, false),
            ],
            data: vec![],
        };
        let msg = Message::new(&[ix], Some(&payer));
        assert_eq!(msg.account_keys.iter().filter(|k| **k == shared).count(), 1);
        let shared_index = msg.account_keys.iter().position(|k| *k == shared).unwrap();
        assert!(msg.is_writable_index(shared_index));
    }

    #[test]
    fn sanitize_rejects_program_id_as_payer() {
        let payer = key(1);
        let ix = Instruction {
            program_id: payer,
            accounts: vec![],
            data: vec![],
        };
        let msg = Message::new(&[ix], Some(&payer));
        assert_eq!(msg.sanitize(), Err(SanitizeError::IndexOutOfBounds));
    }

    /// Two writable non-signer accounts in descending-key encounter order:
    /// a `BTreeMap`-keyed implementation would flip them back to ascending
    /// key order, which this asserts against directly.
    #[test]
    fn same_tier_accounts_keep_encounter_order() {
        let payer = key(1);
        let program = key(9);
        let first_seen = key(200);
        let second_seen = key(50);

        let ix = Instruction {
            program_id: program,
            accounts: vec![
                AccountMeta::new(first_seen, false),
                AccountMeta::new(second_seen, false),
            ],
            data: vec![],
        };
        let msg = Message::new(&[ix], Some(&payer));

        let non_signer_keys = &msg.account_keys[msg.header.num_required_signatures as usize..];
        assert_eq!(non_signer_keys, &[program, first_seen, second_seen]);
    }

    #[test]
    fn try_compile_rejects_missing_payer() {
        let program = key(9);
        let ix = Instruction {
            program_id: program,
            accounts: vec![],
            data: vec![1],
        };
        let result = Message::try_compile(&[ix], None, Some(&Hash::default()));
        assert_eq!(result, Err(CompileError::NoPayer));
    }

    #[test]
    fn try_compile_rejects_missing_blockhash() {
        let payer = key(1);
        let program = key(9);
        let ix = Instruction {
            program_id: program,
            accounts: vec![],
            data: vec![1],
        };
        let result = Message::try_compile(&[ix], Some(&payer), None);
        assert_eq!(result, Err(CompileError::NoBlockhash));
    }

    #[test]
    fn try_compile_rejects_empty_instructions() {
        let payer = key(1);
        let result = Message::try_compile(&[], Some(&payer), Some(&Hash::default()));
        assert_eq!(result, Err(CompileError::NoInstructions));
    }

    #[test]
    fn try_compile_rejects_unset_program_id() {
        let payer = key(1);
        let placeholder = Instruction {
            program_id: Address::default(),
            accounts: vec![],
            data: vec![],
        };
        let result = Message::try_compile(&[placeholder], Some(&payer), Some(&Hash::default()));
        assert_eq!(result, Err(CompileError::NoProgram(0)));
    }

    #[test]
    fn try_compile_checks_run_in_order() {
        // Missing payer is caught before the empty-instructions check fires.
        let result = Message::try_compile(&[], None, Some(&Hash::default()));
        assert_eq!(result, Err(CompileError::NoPayer));
    }
}
