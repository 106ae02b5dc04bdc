//! Hash functions used by the model
//!
//! Double-SHA256 for transaction ids and sighashes, SHA256+RIPEMD160 for
//! script and public key hashes.

use crate::uint::{Uint160, Uint256};
use bitcoin_hashes::{sha256d as bh_sha256d, Hash as _};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// SHA256(SHA256(data)) as a little-endian 256-bit value.
pub fn sha256d(data: &[u8]) -> Uint256 {
    Uint256::from_le_bytes(bh_sha256d::Hash::hash(data).into_inner())
}

/// RIPEMD160(SHA256(data)) as a little-endian 160-bit value.
pub fn hash160(data: &[u8]) -> Uint160 {
    let sha = Sha256::digest(data);
    let ripe = Ripemd160::digest(sha);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&ripe);
    Uint160::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256d_vector() {
        let data = hex::decode("0123456789abcdef").unwrap();
        assert_eq!(
            hex::encode(sha256d(&data).to_le_bytes()),
            "137ad663f79da06e282ed0abbec4d70523ced5ff8e39d5c2e5641d978c5925aa"
        );
    }

    #[test]
    fn hash160_of_empty() {
        assert_eq!(
            hex::encode(hash160(b"").to_le_bytes()),
            "b472a266d0bd89c13706a4132ccfb16f7c3b9fcb"
        );
    }
}
