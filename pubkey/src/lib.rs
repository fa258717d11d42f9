//! 32-byte account addresses and program-derived address (PDA) derivation.
//!
//! Mirrors the on-curve / seed-derivation rules used by Solana's runtime:
//! an address is valid wire data whenever it decodes to exactly 32 bytes,
//! but a *derived* address must additionally fail the ed25519 on-curve
//! check so that no private key can ever exist for it.

use {
    curve25519_dalek::edwards::CompressedEdwardsY,
    keel_pubkey_error::{ParsePubkeyError, PubkeyError},
    keel_sanitize::{Sanitize, SanitizeError},
    sha2::{Digest, Sha256},
    std::{convert::TryFrom, fmt, str::FromStr},
};

/// Maximum length of derivation seed, as defined by the runtime.
pub const MAX_SEED_LEN: usize = 32;
/// Maximum number of seeds that can be passed to a derivation call.
pub const MAX_SEEDS: usize = 16;
/// Number of bytes in an address.
pub const ADDRESS_BYTES: usize = 32;

const PDA_MARKER: &[u8; 21] = b"ProgramDerivedAddress";

#[repr(transparent)]
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Address(pub(crate) [u8; ADDRESS_BYTES]);

impl Address {
    pub const fn new_from_array(address_array: [u8; ADDRESS_BYTES]) -> Self {
        Self(address_array)
    }

    pub fn to_bytes(self) -> [u8; ADDRESS_BYTES] {
        self.0
    }

    pub fn as_array(&self) -> &[u8; ADDRESS_BYTES] {
        &self.0
    }

    /// Decodes a base58 literal at compile time. Panics at compile time (or
    /// macro-expansion time) on an invalid literal; used by `declare_id!`.
    pub const fn from_str_const(s: &str) -> Self {
        Self(five8_const::decode_32_const(s))
    }

    /// Derives an address off the curve from a base key, a human-readable
    /// seed string, and an owning program, the same way `CreateAccountWithSeed`
    /// does on-chain.
    pub fn create_with_seed(
        base: &Address,
        seed: &str,
        owner: &Address,
    ) -> Result<Address, PubkeyError> {
        if seed.len() > MAX_SEED_LEN {
            return Err(PubkeyError::MaxSeedLengthExceeded);
        }

        let owner_suffix = &owner.0[ADDRESS_BYTES.saturating_sub(PDA_MARKER.len())..];
        if owner_suffix == PDA_MARKER.as_slice() {
            return Err(PubkeyError::IllegalOwner);
        }

        let mut hasher = Sha256::new();
        hasher.update(base.0);
        hasher.update(seed.as_bytes());
        hasher.update(owner.0);
        Ok(Address(hasher.finalize().into()))
    }

    /// Re-derives the address for the given seeds and program, without
    /// searching for a bump. Returns an error if the resulting address
    /// happens to lie on the ed25519 curve.
    pub fn create_program_address(
        seeds: &[&[u8]],
        program_id: &Address,
    ) -> Result<Address, PubkeyError> {
        if seeds.len() > MAX_SEEDS {
            return Err(PubkeyError::InvalidSeeds);
        }
        for seed in seeds {
            if seed.len() > MAX_SEED_LEN {
                return Err(PubkeyError::MaxSeedLengthExceeded);
            }
        }

        let mut hasher = Sha256::new();
        for seed in seeds {
            hasher.update(seed);
        }
        hasher.update(program_id.0);
        hasher.update(PDA_MARKER);
        let hash: [u8; 32] = hasher.finalize().into();

        if bytes_are_curve_point(hash) {
            return Err(PubkeyError::InvalidSeeds);
        }

        Ok(Address(hash))
    }

    /// Finds the canonical bump-seeded PDA for the given seeds and program,
    /// searching the bump space from 255 down to 1 and returning the first
    /// address that lies off curve.
    pub fn find_program_address(seeds: &[&[u8]], program_id: &Address) -> (Address, u8) {
        Self::try_find_program_address(seeds, program_id)
            .unwrap_or_else(|| panic!("Unable to find a viable program address bump seed"))
    }

    pub fn try_find_program_address(
        seeds: &[&[u8]],
        program_id: &Address,
    ) -> Option<(Address, u8)> {
        if seeds.len() > MAX_SEEDS - 1 {
            return None;
        }

        let mut bump_seed = [u8::MAX];
        for _ in 0..u8::MAX {
            {
                let mut seeds_with_bump = seeds.to_vec();
                seeds_with_bump.push(&bump_seed);
                match Self::create_program_address(&seeds_with_bump, program_id) {
                    Ok(address) => return Some((address, bump_seed[0])),
                    Err(PubkeyError::InvalidSeeds) => {}
                    Err(_) => break,
                }
            }
            bump_seed[0] -= 1;
        }
        None
    }

    pub fn is_on_curve(&self) -> bool {
        bytes_are_curve_point(self.0)
    }
}

fn bytes_are_curve_point<T: AsRef<[u8]>>(bytes: T) -> bool {
    CompressedEdwardsY::from_slice(bytes.as_ref())
        .ok()
        .and_then(|point| point.decompress())
        .is_some()
}

impl Sanitize for Address {
    fn sanitize(&self) -> Result<(), SanitizeError> {
        Ok(())
    }
}

impl TryFrom<&[u8]> for Address {
    type Error = ParsePubkeyError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        <[u8; ADDRESS_BYTES]>::try_from(bytes)
            .map(Address::new_from_array)
            .map_err(|_| ParsePubkeyError::WrongSize)
    }
}

impl TryFrom<Vec<u8>> for Address {
    type Error = Vec<u8>;

    fn try_from(bytes: Vec<u8>) -> Result<Self, Self::Error> {
        <[u8; ADDRESS_BYTES]>::try_from(bytes).map(Address::new_from_array)
    }
}

impl FromStr for Address {
    type Err = ParsePubkeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() > ADDRESS_BYTES * 2 {
            return Err(ParsePubkeyError::WrongSize);
        }
        let mut bytes = [0; ADDRESS_BYTES];
        five8::decode_32(s, &mut bytes).map_err(|_| ParsePubkeyError::Invalid)?;
        Ok(Address(bytes))
    }
}

fn write_as_base58(f: &mut fmt::Formatter, p: &Address) -> fmt::Result {
    let mut out = [0u8; 44];
    let len = five8::encode_32(&p.0, &mut out) as usize;
    let as_str = unsafe { std::str::from_utf8_unchecked(&out[..len]) };
    f.write_str(as_str)
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write_as_base58(f, self)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write_as_base58(f, self)
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Address {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <&str>::deserialize(deserializer)?;
        Address::from_str(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_seed_roundtrips() {
        let base = Address::new_from_array([1; 32]);
        let owner = Address::new_from_array([2; 32]);
        let derived = Address::create_with_seed(&base, "seed", &owner).unwrap();
        assert_ne!(derived, base);
    }

    #[test]
    fn with_seed_rejects_long_seed() {
        let base = Address::new_from_array([1; 32]);
        let owner = Address::new_from_array([2; 32]);
        let seed: String = std::iter::repeat('a').take(MAX_SEED_LEN + 1).collect();
        assert_eq!(
            Address::create_with_seed(&base, &seed, &owner),
            Err(PubkeyError::MaxSeedLengthExceeded)
        );
    }

    #[test]
    fn find_program_address_is_off_curve() {
        let program_id = Address::new_from_array([7; 32]);
        let (address, _bump) = Address::find_program_address(&[b"test"], &program_id);
        assert!(!address.is_on_curve());
    }

    #[test]
    fn find_program_address_matches_create_program_address() {
        let program_id = Address::new_from_array([9; 32]);
        let (address, bump) = Address::find_program_address(&[b"seed"], &program_id);
        let bump_seed = [bump];
        let recreated =
            Address::create_program_address(&[b"seed", &bump_seed], &program_id).unwrap();
        assert_eq!(address, recreated);
    }

    #[test]
    fn base58_roundtrip() {
        let address = Address::new_from_array([42; 32]);
        let s = address.to_string();
        let parsed: Address = s.parse().unwrap();
        assert_eq!(address, parsed);
    }

    #[test]
    fn from_str_rejects_too_long() {
        let s: String = std::iter::repeat('1').take(100).collect();
        assert_eq!(Address::from_str(&s), Err(ParsePubkeyError::WrongSize));
    }
}
