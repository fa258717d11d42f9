//! Parses the raw wire bytes of a signed transaction (as sent over RPC, or
//! received from a websocket subscription) back into a [`Transaction`],
//! without going through bincode.

use {
    crate::Transaction,
    keel_hash::Hash,
    keel_instruction::CompiledInstruction,
    keel_message::{Message, MessageHeader},
    keel_pubkey::Address,
    keel_signature::Signature,
    std::io::{Cursor, Read},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseTransactionError {
    UnexpectedEof,
    InvalidShortVecLength,
}

impl std::fmt::Display for ParseTransactionError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ParseTransactionError::UnexpectedEof => f.write_str("unexpected end of transaction bytes"),
            ParseTransactionError::InvalidShortVecLength => {
                f.write_str("invalid compact-u16 length prefix")
            }
        }
    }
}

fn read_exact(cursor: &mut Cursor<&[u8]>, buf: &mut [u8]) -> Result<(), ParseTransactionError> {
    cursor
        .read_exact(buf)
        .map_err(|_| ParseTransactionError::UnexpectedEof)
}

fn read_u8(cursor: &mut Cursor<&[u8]>) -> Result<u8, ParseTransactionError> {
    let mut buf = [0u8; 1];
    read_exact(cursor, &mut buf)?;
    Ok(buf[0])
}

fn read_compact_len(cursor: &mut Cursor<&[u8]>) -> Result<usize, ParseTransactionError> {
    let mut len: usize = 0;
    let mut shift = 0u32;
    loop {
        let byte = read_u8(cursor)?;
        len |= ((byte & 0x7f) as usize)
            .checked_shl(shift)
            .ok_or(ParseTransactionError::InvalidShortVecLength)?;
        shift += 7;
        if byte & 0x80 == 0 {
            break;
        }
        if shift > 21 {
            return Err(ParseTransactionError::InvalidShortVecLength);
        }
    }
    Ok(len)
}

fn read_address(cursor: &mut Cursor<&[u8]>) -> Result<Address, ParseTransactionError> {
    let mut buf = [0u8; 32];
    read_exact(cursor, &mut buf)?;
    Ok(Address::new_from_array(buf))
}

fn read_hash(cursor: &mut Cursor<&[u8]>) -> Result<Hash, ParseTransactionError> {
    let mut buf = [0u8; 32];
    read_exact(cursor, &mut buf)?;
    Ok(Hash::new_from_array(buf))
}

fn read_signature(cursor: &mut Cursor<&[u8]>) -> Result<Signature, ParseTransactionError> {
    let mut buf = [0u8; 64];
    read_exact(cursor, &mut buf)?;
    Ok(Signature::from_bytes(buf))
}

fn read_bytes(
    cursor: &mut Cursor<&[u8]>,
    len: usize,
) -> Result<Vec<u8>, ParseTransactionError> {
    let mut buf = vec![0u8; len];
    read_exact(cursor, &mut buf)?;
    Ok(buf)
}

/// Parses a full wire-format transaction: signature count, signatures,
/// message header, account keys, blockhash, instructions.
pub fn parse(bytes: &[u8]) -> Result<Transaction, ParseTransactionError> {
    let mut cursor = Cursor::new(bytes);

    let num_signatures = read_compact_len(&mut cursor)?;
    let mut signatures = Vec::with_capacity(num_signatures);
    for _ in 0..num_signatures {
        signatures.push(read_signature(&mut cursor)?);
    }

    let num_required_signatures = read_u8(&mut cursor)?;
    let num_readonly_signed_accounts = read_u8(&mut cursor)?;
    let num_readonly_unsigned_accounts = read_u8(&mut cursor)?;

    let num_account_keys = read_compact_len(&mut cursor)?;
    let mut account_keys = Vec::with_capacity(num_account_keys);
    for _ in 0..num_account_keys {
        account_keys.push(read_address(&mut cursor)?);
    }

    let recent_blockhash = read_hash(&mut cursor)?;

    let num_instructions = read_compact_len(&mut cursor)?;
    let mut instructions = Vec::with_capacity(num_instructions);
    for _ in 0..num_instructions {
        let program_id_index = read_u8(&mut cursor)?;
        let num_accounts = read_compact_len(&mut cursor)?;
        let accounts = read_bytes(&mut cursor, num_accounts)?;
        let data_len = read_compact_len(&mut cursor)?;
        let data = read_bytes(&mut cursor, data_len)?;
        instructions.push(CompiledInstruction::new(program_id_index, accounts, data));
    }

    Ok(Transaction {
        signatures,
        message: Message {
            header: MessageHeader {
                num_required_signatures,
                num_readonly_signed_accounts,
                num_readonly_unsigned_accounts,
            },
            account_keys,
            recent_blockhash,
            instructions,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_minimal_transaction() {
        let mut bytes = Vec::new();
        bytes.push(1u8); // num signatures
        bytes.extend_from_slice(&[7u8; 64]); // signature
        bytes.push(1u8); // num_required_signatures
        bytes.push(0u8); // num_readonly_signed_accounts
        bytes.push(1u8); // num_readonly_unsigned_accounts
        bytes.push(2u8); // num account keys
        bytes.extend_from_slice(&[1u8; 32]);
        bytes.extend_from_slice(&[2u8; 32]);
        bytes.extend_from_slice(&[3u8; 32]); // recent blockhash
        bytes.push(1u8); // num instructions
        bytes.push(1u8); // program_id_index
        bytes.push(0u8); // num accounts in instruction
        bytes.push(0u8); // data len

        let tx = parse(&bytes).unwrap();
        assert_eq!(tx.signatures.len(), 1);
        assert_eq!(tx.message.account_keys.len(), 2);
        assert_eq!(tx.message.instructions.len(), 1);
        assert_eq!(tx.message.instructions[0].program_id_index, 1);
    }

    #[test]
    fn rejects_truncated_bytes() {
        assert_eq!(parse(&[1]), Err(ParseTransactionError::UnexpectedEof));
    }
}
