//! Compact storage codec for amounts and output scripts
//!
//! Amounts are squeezed through a digit transform that makes round satoshi
//! values short. Standard output scripts collapse to a tag byte plus their
//! hash or key material; everything else is stored raw behind a
//! length-plus-six prefix so the special tags stay unambiguous.
//!
//! The varint here is the base-128 form with a carry on every continuation
//! byte, not the CompactSize used on the transaction wire.

use crate::constants::MAX_SCRIPT_SIZE;
use crate::encode::Serializable;
use crate::error::{Error, Result};
use crate::opcodes::OP_RETURN;
use crate::script::Script;
use crate::template::{pay_to_pubkey, Template};
use crate::transaction::TxOut;
use crate::uint::Uint160;
use secp256k1::PublicKey;
use std::io;
use std::io::{Read, Write};

/// Number of script sizes reserved for the special compressed shapes.
const SPECIAL_SCRIPT_SIZES: u64 = 6;

/// Base-128 varint with an off-by-one carry per continuation byte. Every
/// value has exactly one encoding.
pub mod compact_varint {
    use super::*;

    pub fn write(mut value: u64, writer: &mut dyn Write) -> io::Result<()> {
        let mut bytes = [0u8; 10];
        let mut len = 0;
        loop {
            bytes[len] = (value & 0x7f) as u8 | if len > 0 { 0x80 } else { 0x00 };
            if value <= 0x7f {
                break;
            }
            value = (value >> 7) - 1;
            len += 1;
        }
        while len > 0 {
            writer.write_all(&[bytes[len]])?;
            len -= 1;
        }
        writer.write_all(&[bytes[0]])
    }

    pub fn read(reader: &mut dyn Read) -> Result<u64> {
        let mut value: u64 = 0;
        loop {
            let mut byte = [0u8; 1];
            reader.read_exact(&mut byte)?;
            if value > (u64::MAX >> 7) {
                return Err(Error::BadData("compact varint overflow".to_string()));
            }
            value = (value << 7) | (byte[0] & 0x7f) as u64;
            if byte[0] & 0x80 != 0 {
                if value == u64::MAX {
                    return Err(Error::BadData("compact varint overflow".to_string()));
                }
                value += 1;
            } else {
                return Ok(value);
            }
        }
    }

    pub fn size(mut value: u64) -> usize {
        let mut len = 1;
        while value > 0x7f {
            value = (value >> 7) - 1;
            len += 1;
        }
        len
    }
}

/// Compress a satoshi amount. Trailing decimal zeros become a short
/// exponent; the leading digits ride along. Zero maps to zero.
pub fn compress_amount(mut amount: u64) -> u64 {
    if amount == 0 {
        return 0;
    }
    let mut exponent = 0u64;
    while amount % 10 == 0 && exponent < 9 {
        amount /= 10;
        exponent += 1;
    }
    if exponent < 9 {
        let digit = amount % 10;
        amount /= 10;
        1 + (amount * 9 + digit - 1) * 10 + exponent
    } else {
        1 + (amount - 1) * 10 + 9
    }
}

/// Invert [`compress_amount`]. `None` when the decompressed value does not
/// fit a u64; the storage codec rejects such inputs.
pub fn decompress_amount(compressed: u64) -> Option<u64> {
    if compressed == 0 {
        return Some(0);
    }
    let mut value = compressed - 1;
    let mut exponent = value % 10;
    value /= 10;
    let mut amount = if exponent < 9 {
        let digit = value % 9 + 1;
        value /= 9;
        value.checked_mul(10)?.checked_add(digit)?
    } else {
        value + 1
    };
    while exponent > 0 {
        amount = amount.checked_mul(10)?;
        exponent -= 1;
    }
    Some(amount)
}

/// The special compressed form of a standard script, if it has one:
/// tag 0x00 P2PKH, 0x01 P2SH, 0x02/0x03 compressed-key P2PK, 0x04/0x05
/// uncompressed-key P2PK stored as its 32-byte x coordinate.
pub fn compress_script(script: &Script) -> Option<Vec<u8>> {
    match Template::from_script_pub_key(script)? {
        Template::PayToPubkeyHash { hash } => {
            let mut out = Vec::with_capacity(21);
            out.push(0x00);
            out.extend_from_slice(&hash.to_le_bytes());
            Some(out)
        }
        Template::PayToScriptHash { hash } => {
            let mut out = Vec::with_capacity(21);
            out.push(0x01);
            out.extend_from_slice(&hash.to_le_bytes());
            Some(out)
        }
        Template::PayToPubkey { pubkey } => {
            // Only keys that parse on the curve can be reconstructed.
            PublicKey::from_slice(&pubkey).ok()?;
            let mut out = Vec::with_capacity(33);
            match pubkey.len() {
                33 => {
                    out.push(pubkey[0]);
                    out.extend_from_slice(&pubkey[1..33]);
                }
                65 => {
                    out.push(0x04 | (pubkey[64] & 0x01));
                    out.extend_from_slice(&pubkey[1..33]);
                }
                _ => return None,
            }
            Some(out)
        }
        _ => None,
    }
}

fn decompress_special(tag: u64, payload: &[u8]) -> Result<Script> {
    match tag {
        0x00 => {
            let mut hash = [0u8; 20];
            hash.copy_from_slice(&payload[..20]);
            Ok(crate::template::pay_to_pubkey_hash(&Uint160::from_le_bytes(hash)))
        }
        0x01 => {
            let mut hash = [0u8; 20];
            hash.copy_from_slice(&payload[..20]);
            Ok(crate::template::pay_to_script_hash(&Uint160::from_le_bytes(hash)))
        }
        0x02 | 0x03 => {
            let mut pubkey = Vec::with_capacity(33);
            pubkey.push(tag as u8);
            pubkey.extend_from_slice(&payload[..32]);
            Ok(pay_to_pubkey(&pubkey))
        }
        0x04 | 0x05 => {
            let mut compressed = [0u8; 33];
            compressed[0] = (tag - 2) as u8;
            compressed[1..].copy_from_slice(&payload[..32]);
            let key = PublicKey::from_slice(&compressed)
                .map_err(|e| Error::BadData(format!("compressed pubkey not on curve: {}", e)))?;
            Ok(pay_to_pubkey(&key.serialize_uncompressed()))
        }
        _ => Err(Error::BadData(format!("unknown script compression tag {}", tag))),
    }
}

fn special_payload_size(tag: u64) -> usize {
    match tag {
        0x00 | 0x01 => 20,
        _ => 32,
    }
}

/// Write a script in compressed storage form.
pub fn write_script(script: &Script, writer: &mut dyn Write) -> io::Result<()> {
    if let Some(compressed) = compress_script(script) {
        return writer.write_all(&compressed);
    }
    compact_varint::write(script.len() as u64 + SPECIAL_SCRIPT_SIZES, writer)?;
    writer.write_all(script.as_bytes())
}

/// Read a script in compressed storage form. Oversized raw scripts are
/// consumed and replaced with a single unspendable OP_RETURN.
pub fn read_script(reader: &mut dyn Read) -> Result<Script> {
    let tag = compact_varint::read(reader)?;
    if tag < SPECIAL_SCRIPT_SIZES {
        let mut payload = vec![0u8; special_payload_size(tag)];
        reader.read_exact(&mut payload)?;
        return decompress_special(tag, &payload);
    }
    let len = (tag - SPECIAL_SCRIPT_SIZES) as usize;
    if len > MAX_SCRIPT_SIZE {
        if len > crate::constants::MAX_BLOCK_SIZE {
            return Err(Error::BadData(format!("compressed script length {}", len)));
        }
        // Consume the payload but replace it with an unspendable marker.
        let mut remainder = vec![0u8; len];
        reader.read_exact(&mut remainder)?;
        return Ok(Script::from_bytes(vec![OP_RETURN]));
    }
    let mut bytes = vec![0u8; len];
    reader.read_exact(&mut bytes)?;
    Ok(Script::from_bytes(bytes))
}

/// Storage codec for a spent output: compressed amount plus compressed
/// script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedTxOut(pub TxOut);

impl Serializable for CompressedTxOut {
    fn read(reader: &mut dyn Read) -> Result<CompressedTxOut> {
        let amount = decompress_amount(compact_varint::read(reader)?)
            .ok_or_else(|| Error::BadData("compressed amount overflow".to_string()))?;
        let script_pub_key = read_script(reader)?;
        Ok(CompressedTxOut(TxOut { value: amount as i64, script_pub_key }))
    }

    fn write(&self, writer: &mut dyn Write) -> io::Result<()> {
        compact_varint::write(compress_amount(self.0.value.max(0) as u64), writer)?;
        write_script(&self.0.script_pub_key, writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{MAX_MONEY, SATOSHIS_PER_BTC};
    use std::io::Cursor;

    #[test]
    fn amount_compression_round_trip() {
        let cases: [u64; 10] = [
            0,
            1,
            9,
            10,
            50_000,
            100_000_000,
            SATOSHIS_PER_BTC as u64 / 2,
            123_456_789,
            MAX_MONEY as u64 - 1,
            MAX_MONEY as u64,
        ];
        for amount in cases {
            assert_eq!(decompress_amount(compress_amount(amount)), Some(amount), "amount {}", amount);
        }
        // Sweep a mixed range.
        let mut amount = 1u64;
        while amount <= MAX_MONEY as u64 {
            assert_eq!(decompress_amount(compress_amount(amount)), Some(amount));
            assert_eq!(decompress_amount(compress_amount(amount + 7)), Some(amount + 7));
            amount = amount.saturating_mul(3);
        }
    }

    #[test]
    fn oversized_compressed_amounts_are_rejected() {
        assert_eq!(decompress_amount(u64::MAX), None);
        assert_eq!(decompress_amount(u64::MAX - 6), None);

        // A hostile amount varint fails the txout read instead of blowing up.
        let mut bytes = Vec::new();
        compact_varint::write(u64::MAX, &mut bytes).unwrap();
        bytes.push(0x00);
        bytes.extend_from_slice(&[0u8; 20]);
        assert!(CompressedTxOut::from_bytes(&bytes).is_err());
    }

    #[test]
    fn round_amounts_compress_small() {
        // Whole-BTC amounts fit a short varint.
        let compressed = compress_amount(SATOSHIS_PER_BTC as u64);
        assert!(compact_varint::size(compressed) <= 2);
        assert!(compressed < compress_amount(SATOSHIS_PER_BTC as u64 + 1));
    }

    #[test]
    fn compact_varint_round_trip() {
        for value in [0u64, 1, 0x7f, 0x80, 0x407f, 0x4080, u32::MAX as u64, u64::MAX] {
            let mut bytes = Vec::new();
            compact_varint::write(value, &mut bytes).unwrap();
            assert_eq!(bytes.len(), compact_varint::size(value));
            assert_eq!(compact_varint::read(&mut Cursor::new(&bytes)).unwrap(), value);
        }
        // Known encodings from the storage format.
        let mut bytes = Vec::new();
        compact_varint::write(0x80, &mut bytes).unwrap();
        assert_eq!(bytes, vec![0x80, 0x00]);
    }

    #[test]
    fn hash_scripts_compress_to_21_bytes() {
        let hash = Uint160::from_hex("00112233445566778899aabbccddeeff00112233").unwrap();
        for script in [
            crate::template::pay_to_pubkey_hash(&hash),
            crate::template::pay_to_script_hash(&hash),
        ] {
            let compressed = compress_script(&script).unwrap();
            assert_eq!(compressed.len(), 21);
            let mut bytes = Vec::new();
            write_script(&script, &mut bytes).unwrap();
            assert_eq!(bytes, compressed);
            assert_eq!(read_script(&mut Cursor::new(&bytes)).unwrap(), script);
        }
    }

    #[test]
    fn pubkey_scripts_round_trip() {
        let secp = secp256k1::Secp256k1::new();
        let secret = secp256k1::SecretKey::from_slice(&[0x42; 32]).unwrap();
        let key = PublicKey::from_secret_key(&secp, &secret);

        let compressed_script = pay_to_pubkey(&key.serialize());
        let bytes = compress_script(&compressed_script).unwrap();
        assert_eq!(bytes.len(), 33);
        assert!(bytes[0] == 0x02 || bytes[0] == 0x03);
        let mut wire = Vec::new();
        write_script(&compressed_script, &mut wire).unwrap();
        assert_eq!(read_script(&mut Cursor::new(&wire)).unwrap(), compressed_script);

        let uncompressed_script = pay_to_pubkey(&key.serialize_uncompressed());
        let bytes = compress_script(&uncompressed_script).unwrap();
        assert_eq!(bytes.len(), 33);
        assert!(bytes[0] == 0x04 || bytes[0] == 0x05);
        let mut wire = Vec::new();
        write_script(&uncompressed_script, &mut wire).unwrap();
        assert_eq!(read_script(&mut Cursor::new(&wire)).unwrap(), uncompressed_script);
    }

    #[test]
    fn nonstandard_scripts_store_raw() {
        let script = Script::new().push_int(1).push_op(crate::opcodes::OP_ADD);
        assert!(compress_script(&script).is_none());
        let mut bytes = Vec::new();
        write_script(&script, &mut bytes).unwrap();
        assert_eq!(bytes[0] as usize, script.len() + SPECIAL_SCRIPT_SIZES as usize);
        assert_eq!(read_script(&mut Cursor::new(&bytes)).unwrap(), script);
    }

    #[test]
    fn txout_codec_round_trip() {
        let hash = Uint160::from_hex("ffeeddccbbaa99887766554433221100ffeeddcc").unwrap();
        let txout = TxOut {
            value: 50 * SATOSHIS_PER_BTC,
            script_pub_key: crate::template::pay_to_pubkey_hash(&hash),
        };
        let compressed = CompressedTxOut(txout.clone());
        let bytes = compressed.to_bytes();
        // Far smaller than the 8 + 26 byte wire form.
        assert!(bytes.len() < 25);
        assert_eq!(CompressedTxOut::from_bytes(&bytes).unwrap().0, txout);
    }
}
