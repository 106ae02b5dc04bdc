//! Standard output script templates
//!
//! Recognition of the standard scriptPubKey shapes, the generators that
//! produce them, and the scriptSig extractors used by signature combination.

use crate::constants::MAX_PUBKEYS_PER_MULTISIG;
use crate::error::{Error, Result};
use crate::hashes::hash160;
use crate::opcodes::{self, *};
use crate::script::{Op, Script};
use crate::uint::Uint160;

/// A recognized standard output script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Template {
    PayToPubkey { pubkey: Vec<u8> },
    PayToPubkeyHash { hash: Uint160 },
    PayToScriptHash { hash: Uint160 },
    Multisig { required: usize, pubkeys: Vec<Vec<u8>> },
    NullData { pushes: Vec<Vec<u8>> },
}

impl Template {
    /// Classify a scriptPubKey. At most one template matches a well-formed
    /// script, so the checking order does not affect the result.
    pub fn from_script_pub_key(script: &Script) -> Option<Template> {
        if script.is_pay_to_script_hash() {
            let mut hash = [0u8; 20];
            hash.copy_from_slice(&script.as_bytes()[2..22]);
            return Some(Template::PayToScriptHash { hash: Uint160::from_le_bytes(hash) });
        }
        if let Some(hash) = match_p2pkh(script) {
            return Some(Template::PayToPubkeyHash { hash });
        }
        let ops = script.ops();
        if ops.iter().any(|op| op.invalid) {
            return None;
        }
        if let [pk, checksig] = ops.as_slice() {
            if checksig.code == OP_CHECKSIG && !checksig.is_push() {
                if let Some(pubkey) = pk.push_bytes() {
                    if is_valid_pubkey(pubkey) {
                        return Some(Template::PayToPubkey { pubkey: pubkey.to_vec() });
                    }
                }
            }
        }
        if let Some((required, pubkeys)) = match_multisig(&ops) {
            return Some(Template::Multisig { required, pubkeys });
        }
        if let Some(pushes) = match_null_data(&ops) {
            return Some(Template::NullData { pushes });
        }
        None
    }
}

fn match_p2pkh(script: &Script) -> Option<Uint160> {
    let bytes = script.as_bytes();
    if bytes.len() == 25
        && bytes[0] == OP_DUP
        && bytes[1] == OP_HASH160
        && bytes[2] == 0x14
        && bytes[23] == OP_EQUALVERIFY
        && bytes[24] == OP_CHECKSIG
    {
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&bytes[3..23]);
        return Some(Uint160::from_le_bytes(hash));
    }
    None
}

fn match_multisig(ops: &[Op]) -> Option<(usize, Vec<Vec<u8>>)> {
    if ops.len() < 4 {
        return None;
    }
    let last = ops.len() - 1;
    if ops[last].code != OP_CHECKMULTISIG || ops[last].is_push() {
        return None;
    }
    let required = opcodes::small_int_value(ops[0].code)? as usize;
    let key_count = opcodes::small_int_value(ops[last - 1].code)? as usize;
    let pubkeys: Vec<Vec<u8>> = ops[1..last - 1]
        .iter()
        .filter_map(|op| op.push_bytes().map(<[u8]>::to_vec))
        .collect();
    if pubkeys.len() != ops.len() - 3 || pubkeys.len() != key_count {
        return None;
    }
    if required == 0 || required > key_count || key_count > MAX_PUBKEYS_PER_MULTISIG {
        return None;
    }
    if !pubkeys.iter().all(|pk| is_valid_pubkey(pk)) {
        return None;
    }
    Some((required, pubkeys))
}

fn match_null_data(ops: &[Op]) -> Option<Vec<Vec<u8>>> {
    let (first, rest) = ops.split_first()?;
    if first.code != OP_RETURN || first.is_push() {
        return None;
    }
    let mut pushes = Vec::with_capacity(rest.len());
    for op in rest {
        pushes.push(op.push_bytes()?.to_vec());
    }
    Some(pushes)
}

/// Syntactic public key check: 33 bytes starting 0x02/0x03, or 65 bytes
/// starting 0x04. No curve membership is checked here.
pub fn is_valid_pubkey(bytes: &[u8]) -> bool {
    match bytes.len() {
        33 => bytes[0] == 0x02 || bytes[0] == 0x03,
        65 => bytes[0] == 0x04,
        _ => false,
    }
}

pub fn pay_to_pubkey(pubkey: &[u8]) -> Script {
    Script::new().push_data(pubkey).push_op(OP_CHECKSIG)
}

pub fn pay_to_pubkey_hash(hash: &Uint160) -> Script {
    Script::new()
        .push_op(OP_DUP)
        .push_op(OP_HASH160)
        .push_data(&hash.to_le_bytes())
        .push_op(OP_EQUALVERIFY)
        .push_op(OP_CHECKSIG)
}

pub fn pay_to_script_hash(hash: &Uint160) -> Script {
    Script::new()
        .push_op(OP_HASH160)
        .push_data(&hash.to_le_bytes())
        .push_op(OP_EQUAL)
}

pub fn multisig(required: usize, pubkeys: &[Vec<u8>]) -> Result<Script> {
    if required == 0
        || required > pubkeys.len()
        || pubkeys.len() > MAX_PUBKEYS_PER_MULTISIG
        || !pubkeys.iter().all(|pk| is_valid_pubkey(pk))
    {
        return Err(Error::NotMultisig);
    }
    let mut script = Script::new().push_int(required as i64);
    for pubkey in pubkeys {
        script = script.push_data(pubkey);
    }
    Ok(script
        .push_int(pubkeys.len() as i64)
        .push_op(OP_CHECKMULTISIG))
}

pub fn null_data(payload: &[u8]) -> Script {
    Script::new().push_op(OP_RETURN).push_data(payload)
}

/// Split a pay-to-pubkey-hash scriptSig into its signature and public key.
pub fn p2pkh_script_sig(script_sig: &Script) -> Option<(Vec<u8>, Vec<u8>)> {
    let ops = script_sig.ops();
    if let [sig, pubkey] = ops.as_slice() {
        let sig = sig.push_bytes()?;
        let pubkey = pubkey.push_bytes()?;
        if !sig.is_empty() && is_valid_pubkey(pubkey) {
            return Some((sig.to_vec(), pubkey.to_vec()));
        }
    }
    None
}

/// Split a pay-to-script-hash scriptSig into its argument pushes and the
/// trailing redeem script.
pub fn p2sh_script_sig(script_sig: &Script) -> Option<(Vec<Vec<u8>>, Script)> {
    if !script_sig.is_push_only() {
        return None;
    }
    let mut pushes: Vec<Vec<u8>> = script_sig
        .ops()
        .into_iter()
        .filter_map(|op| op.data)
        .collect();
    let redeem = Script::from_bytes(pushes.pop()?);
    if !redeem.is_valid() || redeem.is_empty() {
        return None;
    }
    Some((pushes, redeem))
}

/// The destination a scriptSig is spending to, inferred from its shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    PubkeyHash(Uint160),
    ScriptHash(Uint160),
}

impl Destination {
    pub fn script_pub_key(&self) -> Script {
        match self {
            Destination::PubkeyHash(hash) => pay_to_pubkey_hash(hash),
            Destination::ScriptHash(hash) => pay_to_script_hash(hash),
        }
    }
}

/// Infer the signer of a scriptSig: the pubkey hash of a P2PKH spend or the
/// script hash of a P2SH spend.
pub fn signer_destination(script_sig: &Script) -> Option<Destination> {
    if let Some((_, pubkey)) = p2pkh_script_sig(script_sig) {
        return Some(Destination::PubkeyHash(hash160(&pubkey)));
    }
    if let Some((_, redeem)) = p2sh_script_sig(script_sig) {
        return Some(Destination::ScriptHash(redeem.script_hash()));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compressed_key(prefix: u8, fill: u8) -> Vec<u8> {
        let mut key = vec![fill; 33];
        key[0] = prefix;
        key
    }

    #[test]
    fn classify_standard_shapes() {
        let hash = Uint160::from_hex("1122334455667788990011223344556677889900").unwrap();

        let p2pkh = pay_to_pubkey_hash(&hash);
        assert_eq!(
            Template::from_script_pub_key(&p2pkh),
            Some(Template::PayToPubkeyHash { hash })
        );

        let p2sh = pay_to_script_hash(&hash);
        assert_eq!(
            Template::from_script_pub_key(&p2sh),
            Some(Template::PayToScriptHash { hash })
        );

        let key = compressed_key(0x02, 0xab);
        let p2pk = pay_to_pubkey(&key);
        assert_eq!(
            Template::from_script_pub_key(&p2pk),
            Some(Template::PayToPubkey { pubkey: key })
        );

        let data = null_data(b"hello");
        assert_eq!(
            Template::from_script_pub_key(&data),
            Some(Template::NullData { pushes: vec![b"hello".to_vec()] })
        );
    }

    #[test]
    fn classify_multisig() {
        let keys = vec![
            compressed_key(0x02, 0x11),
            compressed_key(0x03, 0x22),
            compressed_key(0x02, 0x33),
        ];
        let script = multisig(2, &keys).unwrap();
        assert_eq!(
            Template::from_script_pub_key(&script),
            Some(Template::Multisig { required: 2, pubkeys: keys.clone() })
        );

        assert!(multisig(0, &keys).is_err());
        assert!(multisig(4, &keys).is_err());
        let bad_key = vec![vec![0x05; 33]];
        assert!(multisig(1, &bad_key).is_err());
    }

    #[test]
    fn nonstandard_scripts_do_not_classify() {
        let script = Script::new().push_op(OP_DUP).push_op(OP_CHECKSIG);
        assert_eq!(Template::from_script_pub_key(&script), None);
        assert_eq!(Template::from_script_pub_key(&Script::new()), None);
    }

    #[test]
    fn script_sig_extraction() {
        let sig = vec![0x30, 0x44, 0x01, 0x02];
        let pubkey = compressed_key(0x03, 0x44);
        let script_sig = Script::new().push_data(&sig).push_data(&pubkey);
        assert_eq!(
            p2pkh_script_sig(&script_sig),
            Some((sig.clone(), pubkey.clone()))
        );
        assert_eq!(
            signer_destination(&script_sig),
            Some(Destination::PubkeyHash(hash160(&pubkey)))
        );

        let redeem = multisig(1, &[pubkey]).unwrap();
        let p2sh_sig = Script::new()
            .push_int(0)
            .push_data(&sig)
            .push_data(redeem.as_bytes());
        let (pushes, extracted) = p2sh_script_sig(&p2sh_sig).unwrap();
        assert_eq!(pushes.len(), 2);
        assert_eq!(extracted, redeem);
        assert_eq!(
            signer_destination(&p2sh_sig),
            Some(Destination::ScriptHash(redeem.script_hash()))
        );

        let non_push = Script::new().push_op(OP_DUP);
        assert_eq!(p2sh_script_sig(&non_push), None);
        assert_eq!(signer_destination(&non_push), None);
    }

    #[test]
    fn pubkey_syntax() {
        assert!(is_valid_pubkey(&compressed_key(0x02, 0)));
        assert!(is_valid_pubkey(&compressed_key(0x03, 0)));
        let mut long = vec![0x04; 65];
        assert!(is_valid_pubkey(&long));
        long[0] = 0x05;
        assert!(!is_valid_pubkey(&long));
        assert!(!is_valid_pubkey(&[0x02; 32]));
        assert!(!is_valid_pubkey(&[]));
    }
}
