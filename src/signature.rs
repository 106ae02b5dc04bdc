//! Transaction signatures
//!
//! A signature inside a scriptSig is a DER-encoded ECDSA signature followed
//! by one sighash-type byte. Parsing accepts the lax encodings found in old
//! chain data; the strict structural check used by the DERSIG verification
//! flag lives here too and never errors on garbage, it just says no.

use crate::error::{Error, Result};
use crate::transaction::SigHash;
use secp256k1::ecdsa::Signature;

/// A DER signature with its trailing sighash type byte split off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionSignature {
    pub der: Vec<u8>,
    pub hash_type: SigHash,
}

impl TransactionSignature {
    /// Parse a scriptSig signature push. The DER body is accepted laxly,
    /// matching historical chain data.
    pub fn from_bytes(bytes: &[u8]) -> Result<TransactionSignature> {
        if bytes.len() < 2 {
            return Err(Error::BadData("signature too short".to_string()));
        }
        let (der, hash_type) = bytes.split_at(bytes.len() - 1);
        Signature::from_der_lax(der)?;
        Ok(TransactionSignature {
            der: der.to_vec(),
            hash_type: SigHash(hash_type[0] as u32),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.der.clone();
        bytes.push(self.hash_type.0 as u8);
        bytes
    }
}

/// Strict DER structural check over a signature push including its sighash
/// byte. This is the BIP-66 rule set; an empty push is not valid here.
pub fn is_der_encoding(sig: &[u8]) -> bool {
    if sig.len() < 9 || sig.len() > 73 {
        return false;
    }
    if sig[0] != 0x30 || sig[1] as usize != sig.len() - 3 {
        return false;
    }
    let len_r = sig[3] as usize;
    if 5 + len_r >= sig.len() {
        return false;
    }
    let len_s = sig[5 + len_r] as usize;
    if len_r + len_s + 7 != sig.len() {
        return false;
    }
    if sig[2] != 0x02 || len_r == 0 || sig[4] & 0x80 != 0 {
        return false;
    }
    if len_r > 1 && sig[4] == 0x00 && sig[5] & 0x80 == 0 {
        return false;
    }
    if sig[len_r + 4] != 0x02 || len_s == 0 || sig[len_r + 6] & 0x80 != 0 {
        return false;
    }
    if len_s > 1 && sig[len_r + 6] == 0x00 && sig[len_r + 7] & 0x80 == 0 {
        return false;
    }
    true
}

/// The trailing byte must name ALL, NONE or SINGLE, with or without the
/// ANYONE_CAN_PAY flag.
pub fn has_defined_hash_type(sig: &[u8]) -> bool {
    match sig.last() {
        Some(&byte) => {
            let base = byte as u32 & !SigHash::ANYONE_CAN_PAY.0;
            (SigHash::ALL.0..=SigHash::SINGLE.0).contains(&base)
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn der_sig(r: &[u8], s: &[u8]) -> Vec<u8> {
        let mut sig = vec![0x30, (r.len() + s.len() + 4) as u8, 0x02, r.len() as u8];
        sig.extend_from_slice(r);
        sig.push(0x02);
        sig.push(s.len() as u8);
        sig.extend_from_slice(s);
        sig
    }

    #[test]
    fn split_and_rebuild() {
        let mut push = der_sig(&[0x11; 32], &[0x22; 32]);
        push.push(0x01);
        let sig = TransactionSignature::from_bytes(&push).unwrap();
        assert_eq!(sig.hash_type, SigHash::ALL);
        assert_eq!(sig.to_bytes(), push);
        assert!(TransactionSignature::from_bytes(&[]).is_err());
        assert!(TransactionSignature::from_bytes(&[0xde, 0xad, 0x01]).is_err());
    }

    #[test]
    fn strict_der_check() {
        let mut push = der_sig(&[0x11; 32], &[0x22; 32]);
        push.push(0x01);
        assert!(is_der_encoding(&push));

        // Wrong outer tag.
        let mut bad = push.clone();
        bad[0] = 0x31;
        assert!(!is_der_encoding(&bad));

        // Negative R.
        let mut neg = der_sig(&[0x91; 32], &[0x22; 32]);
        neg.push(0x01);
        assert!(!is_der_encoding(&neg));

        // Unnecessary null padding on R.
        let mut r = vec![0x00];
        r.extend_from_slice(&[0x11; 32]);
        let mut padded = der_sig(&r, &[0x22; 32]);
        padded.push(0x01);
        assert!(!is_der_encoding(&padded));

        assert!(!is_der_encoding(&[]));
        assert!(!is_der_encoding(&[0x30; 80]));
    }

    #[test]
    fn defined_hash_types() {
        for byte in [0x01u8, 0x02, 0x03, 0x81, 0x82, 0x83] {
            assert!(has_defined_hash_type(&[0x30, byte]));
        }
        for byte in [0x00u8, 0x04, 0x80, 0xff] {
            assert!(!has_defined_hash_type(&[0x30, byte]));
        }
        assert!(!has_defined_hash_type(&[]));
    }
}
