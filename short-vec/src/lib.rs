//! Compact-u16 length encoding ("short-vec"): a variable-length unsigned
//! integer encoding used to prefix the account table, instruction list and
//! per-instruction account-index/data arrays of a compiled transaction.
//!
//! Each byte contributes 7 bits of payload, low bit of each byte's 0x7f
//! mask first, with the high bit of a byte set whenever more bytes follow.
//! Every value in `0..2^21` round-trips in at most 3 bytes; values at or
//! past that boundary still round-trip, just using more bytes (`2^21`
//! itself takes 4).

use std::fmt;

/// Bounds the number of bytes `decode_len` will read before giving up,
/// guarding against a malformed stream with an unterminated continuation
/// bit. 5 bytes covers the spec's 21-bit range plus its `2^21` boundary
/// case with a byte of headroom.
const MAX_ENCODING_LENGTH: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortVecError {
    /// The value needs more than [`MAX_ENCODING_LENGTH`] bytes to encode.
    ValueTooLarge,
    /// The byte stream ended before a complete length could be read.
    UnexpectedEof,
    /// More than [`MAX_ENCODING_LENGTH`] bytes were seen without
    /// terminating (continuation bit clear).
    Overlong,
}

impl std::error::Error for ShortVecError {}

impl fmt::Display for ShortVecError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ShortVecError::ValueTooLarge => {
                write!(f, "value needs more than {MAX_ENCODING_LENGTH} bytes to encode")
            }
            ShortVecError::UnexpectedEof => f.write_str("unexpected end of data"),
            ShortVecError::Overlong => f.write_str("overlong compact-u16 encoding"),
        }
    }
}

/// Encodes `len` as compact-u16 and appends it to `out`.
pub fn encode_len(len: usize, out: &mut Vec<u8>) -> Result<(), ShortVecError> {
    if encoded_len_bytes(len) > MAX_ENCODING_LENGTH {
        return Err(ShortVecError::ValueTooLarge);
    }
    let mut rem_len = len;
    loop {
        let mut elem = (rem_len & 0x7f) as u8;
        rem_len >>= 7;
        if rem_len == 0 {
            out.push(elem);
            break;
        } else {
            elem |= 0x80;
            out.push(elem);
        }
    }
    Ok(())
}

/// Number of bytes `encode_len` would emit for `len`.
pub fn encoded_len_bytes(len: usize) -> usize {
    let mut rem_len = len;
    let mut count = 1;
    while rem_len > 0x7f {
        rem_len >>= 7;
        count += 1;
    }
    count
}

/// Decodes a compact-u16 length prefix from the front of `data`, returning
/// the decoded value and the number of bytes consumed.
pub fn decode_len(data: &[u8]) -> Result<(usize, &[u8]), ShortVecError> {
    let mut len: usize = 0;
    let mut size: usize = 0;
    loop {
        if size >= MAX_ENCODING_LENGTH {
            return Err(ShortVecError::Overlong);
        }
        let byte = *data.get(size).ok_or(ShortVecError::UnexpectedEof)?;
        let val = (byte & 0x7f) as usize;
        len |= val.checked_shl(size as u32 * 7).unwrap_or(0);
        size += 1;
        if byte & 0x80 == 0 {
            break;
        }
    }
    Ok((len, &data[size..]))
}

/// A `Vec<T>` that (de)serializes its length with [`encode_len`]/[`decode_len`]
/// instead of serde's default varint, matching the wire format of a
/// compiled transaction's account keys, instructions, and per-instruction
/// account/data arrays.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShortVec<T>(pub Vec<T>);

#[cfg(feature = "serde")]
mod serde_impl {
    use super::*;
    use serde::{
        de::{SeqAccess, Visitor},
        ser::SerializeTuple,
        Deserialize, Deserializer, Serialize, Serializer,
    };
    use std::marker::PhantomData;

    impl<T: Serialize> Serialize for ShortVec<T> {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            let mut len_buf = Vec::new();
            encode_len(self.0.len(), &mut len_buf)
                .map_err(|e| serde::ser::Error::custom(e.to_string()))?;
            let mut seq = serializer.serialize_tuple(len_buf.len() + self.0.len())?;
            for byte in &len_buf {
                seq.serialize_element(byte)?;
            }
            for item in &self.0 {
                seq.serialize_element(item)?;
            }
            seq.end()
        }
    }

    struct ShortVecVisitor<T>(PhantomData<T>);

    impl<'de, T: Deserialize<'de>> Visitor<'de> for ShortVecVisitor<T> {
        type Value = ShortVec<T>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a sequence prefixed with a compact-u16 length")
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut len: usize = 0;
            let mut shift = 0u32;
            loop {
                let byte: u8 = seq
                    .next_element()?
                    .ok_or_else(|| serde::de::Error::custom("unexpected end of compact-u16"))?;
                len |= ((byte & 0x7f) as usize) << shift;
                shift += 7;
                if byte & 0x80 == 0 {
                    break;
                }
            }
            let mut items = Vec::with_capacity(len);
            for _ in 0..len {
                let item: T = seq
                    .next_element()?
                    .ok_or_else(|| serde::de::Error::custom("unexpected end of vec elements"))?;
                items.push(item);
            }
            Ok(ShortVec(items))
        }
    }

    impl<'de, T: Deserialize<'de>> Deserialize<'de> for ShortVec<T> {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            deserializer.deserialize_tuple(usize::MAX, ShortVecVisitor(PhantomData))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_byte_values() {
        for len in [0usize, 1, 5, 0x7f] {
            let mut out = Vec::new();
            encode_len(len, &mut out).unwrap();
            assert_eq!(out.len(), 1);
            let (decoded, rest) = decode_len(&out).unwrap();
            assert_eq!(decoded, len);
            assert!(rest.is_empty());
        }
    }

    #[test]
    fn two_byte_values() {
        for len in [0x80usize, 0x81, 0x3fff] {
            let mut out = Vec::new();
            encode_len(len, &mut out).unwrap();
            assert_eq!(out.len(), 2);
            let (decoded, _) = decode_len(&out).unwrap();
            assert_eq!(decoded, len);
        }
    }

    #[test]
    fn three_byte_values() {
        for len in [0x4000usize, 0xffff] {
            let mut out = Vec::new();
            encode_len(len, &mut out).unwrap();
            assert_eq!(out.len(), 3);
            let (decoded, _) = decode_len(&out).unwrap();
            assert_eq!(decoded, len);
        }
    }

    #[test]
    fn rejects_value_too_large() {
        // Needs a 6th continuation byte, one past MAX_ENCODING_LENGTH.
        let mut out = Vec::new();
        assert_eq!(
            encode_len(1usize << 35, &mut out),
            Err(ShortVecError::ValueTooLarge)
        );
    }

    #[test]
    fn known_answer_table() {
        let cases: &[(usize, &[u8])] = &[
            (0x0, &[0x00]),
            (0x7f, &[0x7f]),
            (0x80, &[0x80, 0x01]),
            (0xff, &[0xff, 0x01]),
            (0x100, &[0x80, 0x02]),
            (0x7fff, &[0xff, 0xff, 0x01]),
            (0xffff, &[0xff, 0xff, 0x03]),
            (0x1f_ffff, &[0xff, 0xff, 0x7f]),
            (0x20_0000, &[0x80, 0x80, 0x80, 0x01]),
        ];
        for (len, expected) in cases {
            let mut out = Vec::new();
            encode_len(*len, &mut out).unwrap();
            assert_eq!(&out, expected, "encoding {len:#x}");
            let (decoded, rest) = decode_len(expected).unwrap();
            assert_eq!(decoded, *len);
            assert!(rest.is_empty());
        }
    }

    #[test]
    fn full_21_bit_range_round_trips() {
        for len in [0usize, 1, 0x3fff, 0x4000, 0x1f_ffff] {
            let mut out = Vec::new();
            encode_len(len, &mut out).unwrap();
            let (decoded, rest) = decode_len(&out).unwrap();
            assert_eq!(decoded, len);
            assert!(rest.is_empty());
        }
    }

    #[test]
    fn decode_trailing_bytes_are_preserved() {
        let mut buf = Vec::new();
        encode_len(5, &mut buf).unwrap();
        buf.extend_from_slice(&[9, 9, 9]);
        let (len, rest) = decode_len(&buf).unwrap();
        assert_eq!(len, 5);
        assert_eq!(rest, &[9, 9, 9]);
    }

    #[test]
    fn decode_rejects_truncated_input() {
        assert_eq!(decode_len(&[0x80]), Err(ShortVecError::UnexpectedEof));
    }
}
