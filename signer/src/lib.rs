//! The `Signer` trait implemented by every concrete signing backend
//! (in-memory keypairs, presigned signatures, hardware wallets), plus the
//! helpers that operate generically over a collection of signers.

use {
    keel_pubkey::Address,
    keel_signature::Signature,
    std::{
        error,
        fs::{self, File, OpenOptions},
        io::{Read, Write},
        path::Path,
    },
};

pub mod presigner;
pub mod signers;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum SignerError {
    #[error("keypair-pubkey mismatch")]
    KeypairPubkeyMismatch,

    #[error("not enough signers")]
    NotEnoughSigners,

    #[error("transaction error")]
    TransactionError(String),

    #[error("custom error: {0}")]
    Custom(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no device found")]
    NoDeviceFound,

    #[error("{0}")]
    Protocol(String),

    #[error("user cancelled the request")]
    UserCancel,

    #[error("presigner error")]
    PresignerError(#[from] PresignerError),
}

#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum PresignerError {
    #[error("pre-generated signature cannot verify data")]
    VerificationFailure,
}

/// Anything able to produce signatures over arbitrary message bytes using a
/// single fixed keypair.
pub trait Signer {
    /// Infallibly fetches the pubkey, panicking if the signer is
    /// unreachable. Prefer [`Signer::try_pubkey`] in general-purpose code.
    fn pubkey(&self) -> Address {
        self.try_pubkey().expect("pubkey")
    }

    fn try_pubkey(&self) -> Result<Address, SignerError>;

    fn sign_message(&self, message: &[u8]) -> Signature {
        self.try_sign_message(message).expect("sign_message")
    }

    fn try_sign_message(&self, message: &[u8]) -> Result<Signature, SignerError>;

    /// Whether the signer requires interaction (e.g. a hardware prompt) to
    /// produce a signature.
    fn is_interactive(&self) -> bool;
}

impl PartialEq for dyn Signer {
    fn eq(&self, other: &Self) -> bool {
        self.pubkey() == other.pubkey()
    }
}

impl std::fmt::Debug for dyn Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Signer: {:?}", self.pubkey())
    }
}

impl<T: Signer> Signer for Box<T> {
    fn pubkey(&self) -> Address {
        (**self).pubkey()
    }
    fn try_pubkey(&self) -> Result<Address, SignerError> {
        (**self).try_pubkey()
    }
    fn sign_message(&self, message: &[u8]) -> Signature {
        (**self).sign_message(message)
    }
    fn try_sign_message(&self, message: &[u8]) -> Result<Signature, SignerError> {
        (**self).try_sign_message(message)
    }
    fn is_interactive(&self) -> bool {
        (**self).is_interactive()
    }
}

impl Signer for Box<dyn Signer> {
    fn pubkey(&self) -> Address {
        (**self).pubkey()
    }
    fn try_pubkey(&self) -> Result<Address, SignerError> {
        (**self).try_pubkey()
    }
    fn sign_message(&self, message: &[u8]) -> Signature {
        (**self).sign_message(message)
    }
    fn try_sign_message(&self, message: &[u8]) -> Result<Signature, SignerError> {
        (**self).try_sign_message(message)
    }
    fn is_interactive(&self) -> bool {
        (**self).is_interactive()
    }
}

/// A no-op signer that can stand in for a required signature slot that will
/// be filled in later (e.g. by an offline signer), identified only by pubkey.
#[derive(Clone, Debug, Default)]
pub struct NullSigner {
    pubkey: Address,
}

impl NullSigner {
    pub fn new(pubkey: &Address) -> Self {
        Self { pubkey: *pubkey }
    }
}

impl Signer for NullSigner {
    fn try_pubkey(&self) -> Result<Address, SignerError> {
        Ok(self.pubkey)
    }

    fn try_sign_message(&self, _message: &[u8]) -> Result<Signature, SignerError> {
        Ok(Signature::default())
    }

    fn is_interactive(&self) -> bool {
        false
    }
}

pub fn null_signer(pubkey: &Address) -> NullSigner {
    NullSigner::new(pubkey)
}

/// Filters duplicate signers (by pubkey), keeping the first occurrence of
/// each, the same way the runtime dedups a message's account-signer table.
pub fn unique_signers<'a>(signers: Vec<&'a dyn Signer>) -> Vec<&'a dyn Signer> {
    let mut seen = std::collections::HashSet::new();
    signers
        .into_iter()
        .filter(|signer| seen.insert(signer.pubkey()))
        .collect()
}

/// Persistence for a signer that can be represented as bytes: load from or
/// save to a JSON-array file the way `solana-keygen` does.
pub trait EncodableKey: Sized {
    fn read<R: Read>(reader: &mut R) -> Result<Self, Box<dyn error::Error>>;
    fn write<W: Write>(&self, writer: &mut W) -> Result<String, Box<dyn error::Error>>;

    fn read_from_file<F: AsRef<Path>>(path: F) -> Result<Self, Box<dyn error::Error>> {
        let mut file = File::open(path.as_ref())?;
        Self::read(&mut file)
    }

    fn write_to_file<F: AsRef<Path>>(&self, outfile: F) -> Result<String, Box<dyn error::Error>> {
        let outfile = outfile.as_ref();

        if let Some(outdir) = outfile.parent() {
            fs::create_dir_all(outdir)?;
        }

        let mut f = {
            #[cfg(not(unix))]
            {
                OpenOptions::new()
            }
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt;
                OpenOptions::new().mode(0o600)
            }
        }
        .write(true)
        .truncate(true)
        .create(true)
        .open(outfile)?;

        self.write(&mut f)
    }
}

/// Pairs an [`EncodableKey`] with the pubkey it signs for, for callers that
/// need the pubkey for display purposes without touching the secret.
pub trait EncodableKeypair: Signer {
    type Pubkey: std::fmt::Display;

    fn encodable_pubkey(&self) -> Self::Pubkey;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_signer_roundtrip() {
        let address = Address::new_from_array([3; 32]);
        let signer = null_signer(&address);
        assert_eq!(signer.pubkey(), address);
        assert!(!signer.is_interactive());
    }

    #[test]
    fn unique_signers_dedups_by_pubkey() {
        let a = null_signer(&Address::new_from_array([1; 32]));
        let b = null_signer(&Address::new_from_array([2; 32]));
        let signers: Vec<&dyn Signer> = vec![&a, &b, &a];
        assert_eq!(unique_signers(signers).len(), 2);
    }
}
