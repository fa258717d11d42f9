//! A [`Signer`] that wraps a signature produced out of band (offline signer,
//! multisig coordinator) and only verifies it against the message it's
//! asked to "sign".

use {
    crate::{PresignerError, Signer, SignerError},
    keel_pubkey::Address,
    keel_signature::Signature,
};

#[derive(Clone, Debug, Default)]
pub struct Presigner {
    pubkey: Address,
    signature: Signature,
}

impl Presigner {
    pub fn new(pubkey: &Address, signature: &Signature) -> Self {
        Self {
            pubkey: *pubkey,
            signature: *signature,
        }
    }
}

impl Signer for Presigner {
    fn try_pubkey(&self) -> Result<Address, SignerError> {
        Ok(self.pubkey)
    }

    fn try_sign_message(&self, message: &[u8]) -> Result<Signature, SignerError> {
        if self.signature.verify(self.pubkey.as_ref(), message) {
            Ok(self.signature)
        } else {
            Err(PresignerError::VerificationFailure.into())
        }
    }

    fn is_interactive(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_message() {
        let pubkey = Address::new_from_array([1; 32]);
        let presigner = Presigner::new(&pubkey, &Signature::default());
        assert!(presigner.try_sign_message(b"hello").is_err());
    }
}
