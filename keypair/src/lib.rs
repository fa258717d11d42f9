//! A vanilla ed25519 [`Signer`] built from a keypair held in memory.

use {
    ed25519_dalek::Signer as DalekSigner,
    keel_pubkey::Address,
    keel_signature::Signature,
    keel_signer::{EncodableKey, EncodableKeypair, Signer, SignerError},
    rand::rngs::OsRng,
    std::{
        error,
        io::{Read, Write},
        path::Path,
    },
};

pub const KEYPAIR_LENGTH: usize = 64;

#[derive(Debug)]
pub struct Keypair(ed25519_dalek::Keypair);

impl Keypair {
    pub const SECRET_KEY_LENGTH: usize = 32;

    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let mut rng = OsRng {};
        let secret = ed25519_dalek::SecretKey::generate(&mut rng);
        let public = ed25519_dalek::PublicKey::from(&secret);
        Self(ed25519_dalek::Keypair { secret, public })
    }

    pub fn new_from_array(secret_key: [u8; 32]) -> Self {
        let secret = ed25519_dalek::SecretKey::from_bytes(&secret_key)
            .expect("invalid secret key bytes");
        let public = ed25519_dalek::PublicKey::from(&secret);
        Self(ed25519_dalek::Keypair { secret, public })
    }

    pub fn to_bytes(&self) -> [u8; KEYPAIR_LENGTH] {
        self.0.to_bytes()
    }

    pub fn from_base58_string(s: &str) -> Self {
        let mut bytes = [0u8; KEYPAIR_LENGTH];
        five8::decode_64(s, &mut bytes).expect("invalid base58 keypair");
        Self::try_from(&bytes[..]).expect("invalid keypair bytes")
    }

    pub fn to_base58_string(&self) -> String {
        let mut out = [0u8; 88];
        let len = five8::encode_64(&self.to_bytes(), &mut out) as usize;
        unsafe { std::str::from_utf8_unchecked(&out[..len]).to_string() }
    }

    pub fn secret_bytes(&self) -> [u8; Self::SECRET_KEY_LENGTH] {
        self.0.secret.to_bytes()
    }

    /// Cloning a keypair duplicates secret key material; only do this in
    /// tests or where strictly required.
    pub fn insecure_clone(&self) -> Self {
        Self::new_from_array(self.secret_bytes())
    }
}

#[derive(Debug)]
pub struct KeypairFromBytesError(String);

impl std::fmt::Display for KeypairFromBytesError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl error::Error for KeypairFromBytesError {}

impl TryFrom<&[u8]> for Keypair {
    type Error = KeypairFromBytesError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        ed25519_dalek::Keypair::from_bytes(bytes)
            .map(Self)
            .map_err(|e| KeypairFromBytesError(e.to_string()))
    }
}

impl Signer for Keypair {
    fn try_pubkey(&self) -> Result<Address, SignerError> {
        Ok(Address::new_from_array(self.0.public.to_bytes()))
    }

    fn try_sign_message(&self, message: &[u8]) -> Result<Signature, SignerError> {
        Ok(Signature::from_bytes(self.0.sign(message).to_bytes()))
    }

    fn is_interactive(&self) -> bool {
        false
    }
}

impl<T: Signer> PartialEq<T> for Keypair {
    fn eq(&self, other: &T) -> bool {
        self.pubkey() == other.pubkey()
    }
}

impl EncodableKey for Keypair {
    fn read<R: Read>(reader: &mut R) -> Result<Self, Box<dyn error::Error>> {
        read_keypair(reader).map_err(|e| Box::new(e) as Box<dyn error::Error>)
    }

    fn write<W: Write>(&self, writer: &mut W) -> Result<String, Box<dyn error::Error>> {
        write_keypair(self, writer).map_err(|e| Box::new(e) as Box<dyn error::Error>)
    }
}

impl EncodableKeypair for Keypair {
    type Pubkey = Address;

    fn encodable_pubkey(&self) -> Self::Pubkey {
        self.pubkey()
    }
}

/// An error reading or writing a [`Keypair`] through the base58 on-disk
/// encoding, or deriving one from seed entropy.
#[derive(Debug)]
pub enum KeypairError {
    Io(std::io::Error),
    /// The line wasn't valid base58, or didn't decode to 64 bytes.
    InvalidEncoding,
    /// The 64 decoded bytes aren't a valid ed25519 expanded keypair.
    InvalidKeypairBytes(KeypairFromBytesError),
    /// Seed entropy shorter than [`Keypair::SECRET_KEY_LENGTH`].
    SeedTooShort { got: usize },
}

impl std::fmt::Display for KeypairError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            KeypairError::Io(e) => write!(f, "i/o error: {e}"),
            KeypairError::InvalidEncoding => f.write_str("not a valid base58-encoded keypair"),
            KeypairError::InvalidKeypairBytes(e) => write!(f, "invalid keypair bytes: {e}"),
            KeypairError::SeedTooShort { got } => write!(
                f,
                "seed must be at least {} bytes, got {got}",
                Keypair::SECRET_KEY_LENGTH
            ),
        }
    }
}
impl error::Error for KeypairError {}

impl From<std::io::Error> for KeypairError {
    fn from(e: std::io::Error) -> Self {
        KeypairError::Io(e)
    }
}

/// Reads a base58-encoded `Keypair` from a single line of text, the same
/// encoding [`Keypair::to_base58_string`] produces.
pub fn read_keypair<R: Read>(reader: &mut R) -> Result<Keypair, KeypairError> {
    let mut buffer = String::new();
    reader.read_to_string(&mut buffer)?;
    let mut bytes = [0u8; KEYPAIR_LENGTH];
    five8::decode_64(buffer.trim(), &mut bytes).map_err(|_| KeypairError::InvalidEncoding)?;
    Keypair::try_from(&bytes[..]).map_err(KeypairError::InvalidKeypairBytes)
}

pub fn read_keypair_file<F: AsRef<Path>>(path: F) -> Result<Keypair, KeypairError> {
    let mut file = std::fs::File::open(path)?;
    read_keypair(&mut file)
}

/// Writes a `Keypair` as a single base58-encoded line.
pub fn write_keypair<W: Write>(keypair: &Keypair, writer: &mut W) -> Result<String, KeypairError> {
    let encoded = keypair.to_base58_string();
    writer.write_all(encoded.as_bytes())?;
    writer.write_all(b"\n")?;
    Ok(encoded)
}

pub fn write_keypair_file<F: AsRef<Path>>(
    keypair: &Keypair,
    outfile: F,
) -> Result<String, KeypairError> {
    let mut file = std::fs::File::create(outfile)?;
    write_keypair(keypair, &mut file)
}

/// Constructs a `Keypair` deterministically from seed entropy (at least 32
/// bytes; only the first 32 are used).
pub fn keypair_from_seed(seed: &[u8]) -> Result<Keypair, KeypairError> {
    if seed.len() < Keypair::SECRET_KEY_LENGTH {
        return Err(KeypairError::SeedTooShort { got: seed.len() });
    }
    let mut secret_bytes = [0u8; Keypair::SECRET_KEY_LENGTH];
    secret_bytes.copy_from_slice(&seed[..Keypair::SECRET_KEY_LENGTH]);
    Ok(Keypair::new_from_array(secret_bytes))
}

#[cfg(test)]
mod tests {
    use {super::*, std::fs};

    fn tmp_file_path(name: &str) -> String {
        let out_dir = std::env::var("KEEL_TEST_DIR").unwrap_or_else(|_| "target".to_string());
        let keypair = Keypair::new();
        format!("{}/{}-{}", out_dir, name, keypair.pubkey())
    }

    #[test]
    fn write_and_read_keypair_file_roundtrip() {
        let outfile = tmp_file_path("write_and_read_keypair_file_roundtrip");
        let keypair = Keypair::new();
        write_keypair_file(&keypair, &outfile).unwrap();
        let read_back = read_keypair_file(&outfile).unwrap();
        assert_eq!(keypair, read_back);
        fs::remove_file(&outfile).unwrap();
    }

    #[test]
    fn keypair_from_seed_rejects_short_seed() {
        assert!(keypair_from_seed(&[0u8; 31]).is_err());
        assert!(keypair_from_seed(&[0u8; 32]).is_ok());
    }

    #[test]
    fn deterministic_from_same_seed() {
        let a = keypair_from_seed(&[5u8; 32]).unwrap();
        let b = keypair_from_seed(&[5u8; 32]).unwrap();
        assert_eq!(a.pubkey(), b.pubkey());
    }

    #[test]
    fn base58_roundtrip() {
        let keypair = keypair_from_seed(&[9u8; 32]).unwrap();
        let encoded = keypair.to_base58_string();
        let parsed = Keypair::from_base58_string(&encoded);
        assert_eq!(keypair, parsed);
    }

    #[test]
    fn read_keypair_rejects_non_base58_input() {
        let mut input = "not valid base58 !!!".as_bytes();
        assert!(matches!(
            read_keypair(&mut input),
            Err(KeypairError::InvalidEncoding)
        ));
    }

    #[test]
    fn keypair_from_seed_reports_got_length() {
        match keypair_from_seed(&[0u8; 10]) {
            Err(KeypairError::SeedTooShort { got: 10 }) => {}
            other => panic!("expected SeedTooShort {{ got: 10 }}, got {other:?}"),
        }
    }

    #[test]
    fn sign_and_verify() {
        let keypair = keypair_from_seed(&[1u8; 32]).unwrap();
        let message = b"hello world";
        let signature = keypair.sign_message(message);
        assert!(signature.verify(keypair.pubkey().as_ref(), message));
    }
}
