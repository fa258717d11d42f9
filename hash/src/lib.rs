//! A 32-byte hash, used both for recent blockhashes and for the signing
//! hash of a compiled transaction message.

use {
    keel_sanitize::{Sanitize, SanitizeError},
    sha2::{Digest, Sha256},
    std::{fmt, str::FromStr},
};

pub const HASH_BYTES: usize = 32;

#[repr(transparent)]
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Hash(pub(crate) [u8; HASH_BYTES]);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseHashError {
    WrongSize,
    Invalid,
}

impl std::error::Error for ParseHashError {}

impl fmt::Display for ParseHashError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParseHashError::WrongSize => f.write_str("string is the wrong size"),
            ParseHashError::Invalid => f.write_str("invalid base58 string"),
        }
    }
}

impl Hash {
    pub const fn new_from_array(hash_array: [u8; HASH_BYTES]) -> Self {
        Self(hash_array)
    }

    pub fn to_bytes(self) -> [u8; HASH_BYTES] {
        self.0
    }

    pub fn as_ref_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Hashes `val` with sha256 and wraps the digest.
pub fn hashv(vals: &[&[u8]]) -> Hash {
    let mut hasher = Sha256::new();
    for val in vals {
        hasher.update(val);
    }
    Hash(hasher.finalize().into())
}

pub fn hash(val: &[u8]) -> Hash {
    hashv(&[val])
}

impl Sanitize for Hash {
    fn sanitize(&self) -> Result<(), SanitizeError> {
        Ok(())
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for Hash {
    type Err = ParseHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() > HASH_BYTES * 2 {
            return Err(ParseHashError::WrongSize);
        }
        let mut bytes = [0; HASH_BYTES];
        five8::decode_32(s, &mut bytes).map_err(|_| ParseHashError::Invalid)?;
        Ok(Hash(bytes))
    }
}

fn write_as_base58(f: &mut fmt::Formatter, h: &Hash) -> fmt::Result {
    let mut out = [0u8; 44];
    let len = five8::encode_32(&h.0, &mut out) as usize;
    let as_str = unsafe { std::str::from_utf8_unchecked(&out[..len]) };
    f.write_str(as_str)
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write_as_base58(f, self)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write_as_base58(f, self)
    }
}

impl TryFrom<&[u8]> for Hash {
    type Error = ParseHashError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        <[u8; HASH_BYTES]>::try_from(bytes)
            .map(Hash::new_from_array)
            .map_err(|_| ParseHashError::WrongSize)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Hash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Hash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <&str>::deserialize(deserializer)?;
        Hash::from_str(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_roundtrip() {
        let h = hash(b"hello world");
        let s = h.to_string();
        let parsed: Hash = s.parse().unwrap();
        assert_eq!(h, parsed);
    }

    #[test]
    fn different_inputs_differ() {
        assert_ne!(hash(b"a"), hash(b"b"));
    }
}
