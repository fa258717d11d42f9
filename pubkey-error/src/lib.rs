//! Error types returned by key decoding and PDA derivation.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PubkeyError {
    /// Length of the seed is too long for address generation
    MaxSeedLengthExceeded,
    /// One or more seeds produce an address that does not lie off the
    /// ed25519 curve, or the derivation otherwise produced an illegal value
    InvalidSeeds,
    /// Provided owner is not allowed
    IllegalOwner,
}

impl std::error::Error for PubkeyError {}

impl fmt::Display for PubkeyError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PubkeyError::MaxSeedLengthExceeded => {
                f.write_str("length of the seed is too long for address generation")
            }
            PubkeyError::InvalidSeeds => {
                f.write_str("provided seeds do not result in a valid address")
            }
            PubkeyError::IllegalOwner => f.write_str("provided owner is not allowed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsePubkeyError {
    WrongSize,
    Invalid,
}

impl std::error::Error for ParsePubkeyError {}

impl fmt::Display for ParsePubkeyError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParsePubkeyError::WrongSize => f.write_str("string is the wrong size"),
            ParsePubkeyError::Invalid => f.write_str("invalid base58 string"),
        }
    }
}
