//! `Signers`: a fixed-size or dynamic collection of signers that can be
//! asked, as a batch, for their pubkeys or to sign the same message bytes.

use crate::{Signer, SignerError};

pub trait Signers {
    fn pubkeys(&self) -> Vec<keel_pubkey::Address>;
    fn try_pubkeys(&self) -> Result<Vec<keel_pubkey::Address>, SignerError>;
    fn sign_message(&self, message: &[u8]) -> Vec<keel_signature::Signature>;
    fn try_sign_message(
        &self,
        message: &[u8],
    ) -> Result<Vec<keel_signature::Signature>, SignerError>;
    fn is_interactive(&self) -> bool;
}

macro_rules! default_keypairs_impl {
    () => {
        fn pubkeys(&self) -> Vec<keel_pubkey::Address> {
            self.iter().map(|keypair| keypair.pubkey()).collect()
        }

        fn try_pubkeys(&self) -> Result<Vec<keel_pubkey::Address>, SignerError> {
            let mut pubkeys = Vec::new();
            for keypair in self.iter() {
                pubkeys.push(keypair.try_pubkey()?);
            }
            Ok(pubkeys)
        }

        fn sign_message(&self, message: &[u8]) -> Vec<keel_signature::Signature> {
            self.iter().map(|keypair| keypair.sign_message(message)).collect()
        }

        fn try_sign_message(
            &self,
            message: &[u8],
        ) -> Result<Vec<keel_signature::Signature>, SignerError> {
            let mut signatures = Vec::new();
            for keypair in self.iter() {
                signatures.push(keypair.try_sign_message(message)?);
            }
            Ok(signatures)
        }

        fn is_interactive(&self) -> bool {
            self.iter().any(|s| s.is_interactive())
        }
    };
}

impl<T: Signer> Signers for [&T] {
    default_keypairs_impl!();
}

impl Signers for [&dyn Signer] {
    default_keypairs_impl!();
}

impl<T: Signer> Signers for Vec<&T> {
    default_keypairs_impl!();
}

impl Signers for Vec<&dyn Signer> {
    default_keypairs_impl!();
}

impl<T: Signer, const N: usize> Signers for [&T; N] {
    default_keypairs_impl!();
}

impl<const N: usize> Signers for [&dyn Signer; N] {
    default_keypairs_impl!();
}
