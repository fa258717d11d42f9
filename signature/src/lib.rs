//! 64-byte ed25519 signatures, as attached to transactions.

use {
    keel_sanitize::{Sanitize, SanitizeError},
    std::{fmt, str::FromStr},
};

pub const SIGNATURE_BYTES: usize = 64;

#[repr(transparent)]
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Signature([u8; SIGNATURE_BYTES]);

impl Default for Signature {
    fn default() -> Self {
        Self([0u8; SIGNATURE_BYTES])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseSignatureError {
    WrongSize,
    Invalid,
}

impl std::error::Error for ParseSignatureError {}

impl fmt::Display for ParseSignatureError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParseSignatureError::WrongSize => f.write_str("string is the wrong size"),
            ParseSignatureError::Invalid => f.write_str("invalid base58 string"),
        }
    }
}

impl Signature {
    pub fn new_unique() -> Self {
        #[cfg(feature = "rand")]
        {
            use rand::Rng;
            let mut bytes = [0u8; SIGNATURE_BYTES];
            rand::thread_rng().fill(&mut bytes[..]);
            Self(bytes)
        }
        #[cfg(not(feature = "rand"))]
        {
            Self::default()
        }
    }

    pub const fn from_bytes(bytes: [u8; SIGNATURE_BYTES]) -> Self {
        Self(bytes)
    }

    pub fn as_ref_bytes(&self) -> &[u8] {
        &self.0
    }

    #[cfg(feature = "verify")]
    pub fn verify(&self, pubkey_bytes: &[u8], message_bytes: &[u8]) -> bool {
        use ed25519_dalek::{PublicKey, Signature as DalekSignature, Verifier};
        let Ok(public_key) = PublicKey::from_bytes(pubkey_bytes) else {
            return false;
        };
        let Ok(signature) = DalekSignature::try_from(self.0.as_slice()) else {
            return false;
        };
        public_key.verify(message_bytes, &signature).is_ok()
    }
}

impl Sanitize for Signature {
    fn sanitize(&self) -> Result<(), SanitizeError> {
        Ok(())
    }
}

impl AsRef<[u8]> for Signature {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for Signature {
    type Error = ParseSignatureError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        <[u8; SIGNATURE_BYTES]>::try_from(bytes)
            .map(Signature)
            .map_err(|_| ParseSignatureError::WrongSize)
    }
}

impl TryFrom<Vec<u8>> for Signature {
    type Error = Vec<u8>;

    fn try_from(bytes: Vec<u8>) -> Result<Self, Self::Error> {
        <[u8; SIGNATURE_BYTES]>::try_from(bytes).map(Signature)
    }
}

impl FromStr for Signature {
    type Err = ParseSignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() > SIGNATURE_BYTES * 2 {
            return Err(ParseSignatureError::WrongSize);
        }
        let mut bytes = [0u8; SIGNATURE_BYTES];
        five8::decode_64(s, &mut bytes).map_err(|_| ParseSignatureError::Invalid)?;
        Ok(Signature(bytes))
    }
}

fn write_as_base58(f: &mut fmt::Formatter, sig: &Signature) -> fmt::Result {
    let mut out = [0u8; 88];
    let len = five8::encode_64(&sig.0, &mut out) as usize;
    let as_str = unsafe { std::str::from_utf8_unchecked(&out[..len]) };
    f.write_str(as_str)
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write_as_base58(f, self)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write_as_base58(f, self)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Signature {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Signature {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <&str>::deserialize(deserializer)?;
        Signature::from_str(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_base58() {
        let sig = Signature::from_bytes([7u8; SIGNATURE_BYTES]);
        let s = sig.to_string();
        let parsed: Signature = s.parse().unwrap();
        assert_eq!(sig, parsed);
    }

    #[test]
    fn rejects_overlong_string() {
        let s: String = std::iter::repeat('1').take(200).collect();
        assert_eq!(
            Signature::from_str(&s),
            Err(ParseSignatureError::WrongSize)
        );
    }

    #[cfg(feature = "verify")]
    #[test]
    fn verify_roundtrip() {
        use ed25519_dalek::{Keypair, Signer as DalekSigner};
        let mut csprng = rand::rngs::OsRng {};
        let keypair = Keypair::generate(&mut csprng);
        let message = b"hello";
        let dalek_sig = keypair.sign(message);
        let sig = Signature::from_bytes(dalek_sig.to_bytes());
        assert!(sig.verify(&keypair.public.to_bytes(), message));
        assert!(!sig.verify(&keypair.public.to_bytes(), b"goodbye"));
    }
}
