//! An atomic, signed Solana transaction: a legacy [`Message`] plus one
//! [`Signature`] per required signer, in the same order as the message's
//! leading signer accounts.

use {
    keel_hash::Hash,
    keel_instruction::Instruction,
    keel_message::Message,
    keel_pubkey::Address,
    keel_sanitize::{Sanitize, SanitizeError},
    keel_signature::Signature,
    std::cmp::Ordering,
};

#[cfg(feature = "bincode")]
use keel_signer::{signers::Signers, SignerError};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod parse;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Transaction {
    #[cfg_attr(feature = "serde", serde(with = "short_vec_signature"))]
    pub signatures: Vec<Signature>,
    pub message: Message,
}

#[cfg(feature = "serde")]
mod short_vec_signature {
    use keel_short_vec::ShortVec;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(v: &[keel_signature::Signature], s: S) -> Result<S::Ok, S::Error> {
        ShortVec(v.to_vec()).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Vec<keel_signature::Signature>, D::Error> {
        Ok(ShortVec::<keel_signature::Signature>::deserialize(d)?.0)
    }
}

impl Sanitize for Transaction {
    fn sanitize(&self) -> Result<(), SanitizeError> {
        if self.signatures.len() as u64 > keel_short_vec_max() {
            return Err(SanitizeError::IndexOutOfBounds);
        }
        self.message.sanitize()?;
        self.sanitize_signatures()
    }
}

fn keel_short_vec_max() -> u64 {
    u16::MAX as u64
}

impl Transaction {
    /// Compiles `instructions` and signs the resulting message with every
    /// keypair in `keypairs`, in one call.
    #[cfg(feature = "bincode")]
    pub fn new<T: Signers + ?Sized>(
        keypairs: &T,
        message: Message,
        recent_blockhash: Hash,
    ) -> Self {
        let mut tx = Self::new_unsigned(message);
        tx.sign(keypairs, recent_blockhash);
        tx
    }

    pub fn new_unsigned(message: Message) -> Self {
        Self {
            signatures: vec![Signature::default(); message.header.num_required_signatures as usize],
            message,
        }
    }

    pub fn new_with_payer(instructions: &[Instruction], payer: Option<&Address>) -> Self {
        let message = Message::new(instructions, payer);
        Self::new_unsigned(message)
    }

    #[cfg(feature = "bincode")]
    pub fn new_signed_with_payer<T: Signers + ?Sized>(
        instructions: &[Instruction],
        payer: Option<&Address>,
        signing_keypairs: &T,
        recent_blockhash: Hash,
    ) -> Self {
        let message = Message::new_with_blockhash(instructions, payer, &recent_blockhash);
        Self::new(signing_keypairs, message, recent_blockhash)
    }

    fn key_index(&self, signer: &Address) -> Option<usize> {
        self.message.account_keys.iter().position(|k| k == signer)
    }

    /// Fills in signatures for every given keypair whose pubkey appears
    /// among the message's signer accounts, replacing the message's
    /// blockhash first if it's still the placeholder default.
    #[cfg(feature = "bincode")]
    pub fn partial_sign<T: Signers + ?Sized>(&mut self, keypairs: &T, recent_blockhash: Hash) {
        self.try_partial_sign(keypairs, recent_blockhash)
            .expect("partial_sign")
    }

    #[cfg(feature = "bincode")]
    pub fn try_partial_sign<T: Signers + ?Sized>(
        &mut self,
        keypairs: &T,
        recent_blockhash: Hash,
    ) -> Result<(), SignerError> {
        let positions = self
            .get_signing_keypair_positions(&keypairs.pubkeys())
            .map_err(|e| SignerError::TransactionError(e.to_string()))?;
        if positions.iter().any(Option::is_none) {
            return Err(SignerError::KeypairPubkeyMismatch);
        }
        let positions: Vec<usize> = positions.into_iter().flatten().collect();

        if recent_blockhash != self.message.recent_blockhash {
            self.message.recent_blockhash = recent_blockhash;
            self.signatures
                .iter_mut()
                .for_each(|signature| *signature = Signature::default());
        }

        let signatures = keypairs.try_sign_message(&self.message_data())?;
        for (position, signature) in positions.into_iter().zip(signatures) {
            self.signatures[position] = signature;
        }
        Ok(())
    }

    #[cfg(feature = "bincode")]
    pub fn sign<T: Signers + ?Sized>(&mut self, keypairs: &T, recent_blockhash: Hash) {
        self.try_sign(keypairs, recent_blockhash).expect("sign")
    }

    #[cfg(feature = "bincode")]
    pub fn try_sign<T: Signers + ?Sized>(
        &mut self,
        keypairs: &T,
        recent_blockhash: Hash,
    ) -> Result<(), SignerError> {
        self.try_partial_sign(keypairs, recent_blockhash)?;
        if !self.is_signed() {
            return Err(SignerError::NotEnoughSigners);
        }
        Ok(())
    }

    pub fn get_signing_keypair_positions(
        &self,
        pubkeys: &[Address],
    ) -> Result<Vec<Option<usize>>, TransactionError> {
        if self.message.account_keys.len() < self.message.header.num_required_signatures as usize
        {
            return Err(TransactionError::InvalidAccountIndex);
        }
        let signed_keys =
            &self.message.account_keys[0..self.message.header.num_required_signatures as usize];
        Ok(pubkeys
            .iter()
            .map(|pubkey| signed_keys.iter().position(|x| x == pubkey))
            .collect())
    }

    pub fn is_signed(&self) -> bool {
        self.signatures.iter().all(|sig| *sig != Signature::default())
    }

    #[cfg(feature = "bincode")]
    pub fn message_data(&self) -> Vec<u8> {
        self.message.serialize()
    }

    #[cfg(feature = "verify")]
    pub fn verify(&self) -> Result<(), TransactionError> {
        if self
            .verify_with_results()
            .iter()
            .all(|verify_result| *verify_result)
        {
            Ok(())
        } else {
            Err(TransactionError::SignatureFailure)
        }
    }

    #[cfg(feature = "verify")]
    pub fn verify_with_results(&self) -> Vec<bool> {
        let message_bytes = self.message_data();
        self.signatures
            .iter()
            .zip(self.message.account_keys.iter())
            .map(|(signature, pubkey)| signature.verify(pubkey.as_ref(), &message_bytes))
            .collect()
    }

    fn sanitize_signatures(&self) -> Result<(), SanitizeError> {
        match (self.message.header.num_required_signatures as usize).cmp(&self.signatures.len()) {
            Ordering::Greater => Err(SanitizeError::IndexOutOfBounds),
            Ordering::Less => Err(SanitizeError::InvalidValue),
            Ordering::Equal => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionError {
    InvalidAccountIndex,
    SignatureFailure,
}

impl std::fmt::Display for TransactionError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            TransactionError::InvalidAccountIndex => f.write_str("invalid account index"),
            TransactionError::SignatureFailure => f.write_str("signature verification failed"),
        }
    }
}
impl std::error::Error for TransactionError {}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_instruction::AccountMeta;
    use keel_keypair::Keypair;
    use keel_signer::Signer;

    #[test]
    fn new_signed_transaction_is_fully_signed() {
        let payer = Keypair::new();
        let program = Address::new_from_array([9; 32]);
        let ix = Instruction {
            program_id: program,
            accounts: vec![AccountMeta::new(payer.pubkey(), true)],
            data: vec![1, 2, 3],
        };
        let tx = Transaction::new_signed_with_payer(
            &[ix],
            Some(&payer.pubkey()),
            &[&payer],
            Hash::default(),
        );
        assert!(tx.is_signed());
        assert!(tx.sanitize().is_ok());
    }

    #[test]
    fn unsigned_transaction_is_not_signed() {
        let payer = Address::new_from_array([1; 32]);
        let program = Address::new_from_array([9; 32]);
        let ix = Instruction {
            program_id: program,
            accounts: vec![AccountMeta::new(payer, true)],
            data: vec![1, 2, 3],
        };
        let tx = Transaction::new_with_payer(&[ix], Some(&payer));
        assert!(!tx.is_signed());
    }

    #[test]
    #[should_panic(expected = "failed to compile message")]
    fn new_with_payer_rejects_empty_instructions() {
        let payer = Address::new_from_array([1; 32]);
        let _ = Transaction::new_with_payer(&[], Some(&payer));
    }
}
