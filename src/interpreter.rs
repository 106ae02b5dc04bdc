//! Script execution engine
//!
//! The interpreter is a stack machine over byte vectors. Execution of
//! untrusted scripts must never panic; every failure mode is a
//! [`ScriptError`] result code, and hitting one is ordinary control flow.

use crate::constants::{
    MAX_OPS_PER_SCRIPT, MAX_PUBKEYS_PER_MULTISIG, MAX_SCRIPT_ELEMENT_SIZE, MAX_SCRIPT_SIZE,
    MAX_STACK_SIZE,
};
use crate::error::ScriptError;
use crate::hashes;
use crate::opcodes::*;
use crate::script::{decode_num, encode_num, Op, Script};
use crate::signature::{has_defined_hash_type, is_der_encoding, TransactionSignature};
use crate::template::is_valid_pubkey;
use crate::transaction::{SigHash, Transaction};
use crate::uint::Uint256;
use bitcoin_hashes::{sha1, Hash as _};
use ripemd::Ripemd160;
use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey, Secp256k1};
use sha2::{Digest, Sha256};

/// No verification extras.
pub const VERIFY_NONE: u32 = 0;
/// Evaluate pay-to-script-hash redeem scripts.
pub const VERIFY_P2SH: u32 = 1 << 0;
/// Pubkeys must be well-formed and sighash types defined.
pub const VERIFY_STRICTENC: u32 = 1 << 1;
/// Signatures must be strict BIP-66 DER.
pub const VERIFY_DERSIG: u32 = 1 << 2;
/// Pushes and script numbers must use minimal encodings.
pub const VERIFY_MINIMALDATA: u32 = 1 << 6;
/// scriptSig must be push-only.
pub const VERIFY_SIGPUSHONLY: u32 = 1 << 5;
/// Exactly one element may remain after evaluation.
pub const VERIFY_CLEANSTACK: u32 = 1 << 8;
/// The standardness combination.
pub const VERIFY_STANDARD: u32 =
    VERIFY_P2SH | VERIFY_STRICTENC | VERIFY_DERSIG | VERIFY_MINIMALDATA | VERIFY_CLEANSTACK;

pub type Stack = Vec<Vec<u8>>;

/// Decides whether a signature over a script code is valid in some signing
/// context.
pub trait SignatureChecker {
    fn check_sig(&self, sig: &[u8], pubkey: &[u8], script_code: &Script) -> bool;
}

/// A checker with no context. Every signature is rejected; used when
/// replaying scriptSigs purely for their stack effect.
pub struct NoSignatureCheck;

impl SignatureChecker for NoSignatureCheck {
    fn check_sig(&self, _sig: &[u8], _pubkey: &[u8], _script_code: &Script) -> bool {
        false
    }
}

/// Signature checker bound to one input of a transaction.
pub struct TransactionChecker<'a> {
    pub tx: &'a Transaction,
    pub input: usize,
    pub amount: i64,
    /// When set, overrides the hash type carried in each signature.
    pub force_hash_type: Option<SigHash>,
}

impl SignatureChecker for TransactionChecker<'_> {
    fn check_sig(&self, sig: &[u8], pubkey: &[u8], script_code: &Script) -> bool {
        let parsed = match TransactionSignature::from_bytes(sig) {
            Ok(parsed) => parsed,
            Err(_) => return false,
        };
        let hash_type = self.force_hash_type.unwrap_or(parsed.hash_type);
        // The signature commits to the script code with itself removed.
        let script_code = script_code.find_and_delete_data(sig);
        let hash = self.tx.signature_hash(&script_code, self.input, hash_type);
        verify_ecdsa(&hash, &parsed.der, pubkey)
    }
}

fn verify_ecdsa(hash: &Uint256, der: &[u8], pubkey: &[u8]) -> bool {
    let message = match Message::from_digest_slice(&hash.to_le_bytes()) {
        Ok(message) => message,
        Err(_) => return false,
    };
    let key = match PublicKey::from_slice(pubkey) {
        Ok(key) => key,
        Err(_) => return false,
    };
    let mut signature = match Signature::from_der_lax(der) {
        Ok(signature) => signature,
        Err(_) => return false,
    };
    signature.normalize_s();
    let secp = Secp256k1::verification_only();
    secp.verify_ecdsa(&message, &signature, &key).is_ok()
}

/// Interpret stack bytes as a boolean: any nonzero byte counts, except a
/// lone sign bit in the last position (negative zero).
pub fn cast_to_bool(data: &[u8]) -> bool {
    for (i, &byte) in data.iter().enumerate() {
        if byte != 0 {
            return !(i == data.len() - 1 && byte == 0x80);
        }
    }
    false
}

fn bool_bytes(value: bool) -> Vec<u8> {
    if value {
        vec![1]
    } else {
        Vec::new()
    }
}

fn pop(stack: &mut Stack) -> Result<Vec<u8>, ScriptError> {
    stack.pop().ok_or(ScriptError::InvalidStackOperation)
}

fn peek(stack: &Stack, from_top: usize) -> Result<&Vec<u8>, ScriptError> {
    if from_top >= stack.len() {
        return Err(ScriptError::InvalidStackOperation);
    }
    Ok(&stack[stack.len() - 1 - from_top])
}

fn pop_num(stack: &mut Stack, flags: u32) -> Result<i64, ScriptError> {
    let data = pop(stack)?;
    decode_num(&data, flags & VERIFY_MINIMALDATA != 0, 4)
}

fn is_disabled(code: u8) -> bool {
    matches!(
        code,
        OP_CAT
            | OP_SUBSTR
            | OP_LEFT
            | OP_RIGHT
            | OP_INVERT
            | OP_AND
            | OP_OR
            | OP_XOR
            | OP_2MUL
            | OP_2DIV
            | OP_MUL
            | OP_DIV
            | OP_MOD
            | OP_LSHIFT
            | OP_RSHIFT
    )
}

fn check_signature_encoding(sig: &[u8], flags: u32) -> Result<(), ScriptError> {
    if sig.is_empty() {
        return Ok(());
    }
    if flags & (VERIFY_DERSIG | VERIFY_STRICTENC) != 0 && !is_der_encoding(sig) {
        return Err(ScriptError::SigEncoding);
    }
    if flags & VERIFY_STRICTENC != 0 && !has_defined_hash_type(sig) {
        return Err(ScriptError::SigEncoding);
    }
    Ok(())
}

fn check_pubkey_encoding(pubkey: &[u8], flags: u32) -> Result<(), ScriptError> {
    if flags & VERIFY_STRICTENC != 0 && !is_valid_pubkey(pubkey) {
        return Err(ScriptError::PubkeyEncoding);
    }
    Ok(())
}

/// Execute `script` against `stack`.
pub fn eval_script(
    stack: &mut Stack,
    script: &Script,
    flags: u32,
    checker: &dyn SignatureChecker,
) -> Result<(), ScriptError> {
    if script.len() > MAX_SCRIPT_SIZE {
        return Err(ScriptError::ScriptSize);
    }
    let mut alt_stack: Stack = Vec::new();
    let mut exec_stack: Vec<bool> = Vec::new();
    let mut op_count = 0usize;
    let mut last_separator = 0usize;
    let mut reader = script.reader();

    while let Some(op) = reader.next() {
        if op.invalid {
            return Err(ScriptError::BadOpcode);
        }
        let executing = exec_stack.iter().all(|&branch| branch);

        if op.code > OP_16 {
            op_count += 1;
            if op_count > MAX_OPS_PER_SCRIPT {
                return Err(ScriptError::OpCount);
            }
        }
        if is_disabled(op.code) {
            // Disabled opcodes poison the script even in dead branches.
            return Err(ScriptError::DisabledOpcode);
        }

        if let Some(data) = op.push_bytes() {
            if data.len() > MAX_SCRIPT_ELEMENT_SIZE {
                return Err(ScriptError::PushSize);
            }
            if executing {
                if flags & VERIFY_MINIMALDATA != 0
                    && op.code <= OP_PUSHDATA4
                    && Op::push_data(data).code != op.code
                {
                    return Err(ScriptError::MinimalData);
                }
                stack.push(data.to_vec());
            }
        } else if executing || (OP_IF..=OP_ENDIF).contains(&op.code) {
            match op.code {
                OP_NOP | OP_NOP1 | OP_NOP2 | OP_NOP3 | OP_NOP4 | OP_NOP5 | OP_NOP6
                | OP_NOP7 | OP_NOP8 | OP_NOP9 | OP_NOP10 => {}

                OP_IF | OP_NOTIF => {
                    let mut branch = false;
                    if executing {
                        let top = pop(stack).map_err(|_| ScriptError::UnbalancedConditional)?;
                        branch = cast_to_bool(&top);
                        if op.code == OP_NOTIF {
                            branch = !branch;
                        }
                    }
                    exec_stack.push(branch);
                }
                OP_ELSE => {
                    let last = exec_stack
                        .last_mut()
                        .ok_or(ScriptError::UnbalancedConditional)?;
                    *last = !*last;
                }
                OP_ENDIF => {
                    exec_stack
                        .pop()
                        .ok_or(ScriptError::UnbalancedConditional)?;
                }

                OP_VERIFY => {
                    let top = pop(stack)?;
                    if !cast_to_bool(&top) {
                        return Err(ScriptError::Verify);
                    }
                }
                OP_RETURN => return Err(ScriptError::OpReturn),

                OP_TOALTSTACK => alt_stack.push(pop(stack)?),
                OP_FROMALTSTACK => {
                    stack.push(alt_stack.pop().ok_or(ScriptError::InvalidStackOperation)?)
                }

                OP_2DROP => {
                    pop(stack)?;
                    pop(stack)?;
                }
                OP_2DUP => {
                    let a = peek(stack, 1)?.clone();
                    let b = peek(stack, 0)?.clone();
                    stack.push(a);
                    stack.push(b);
                }
                OP_3DUP => {
                    let a = peek(stack, 2)?.clone();
                    let b = peek(stack, 1)?.clone();
                    let c = peek(stack, 0)?.clone();
                    stack.push(a);
                    stack.push(b);
                    stack.push(c);
                }
                OP_2OVER => {
                    let a = peek(stack, 3)?.clone();
                    let b = peek(stack, 2)?.clone();
                    stack.push(a);
                    stack.push(b);
                }
                OP_2ROT => {
                    if stack.len() < 6 {
                        return Err(ScriptError::InvalidStackOperation);
                    }
                    let len = stack.len();
                    let drained: Vec<Vec<u8>> = stack.drain(len - 6..len - 4).collect();
                    stack.extend(drained);
                }
                OP_2SWAP => {
                    if stack.len() < 4 {
                        return Err(ScriptError::InvalidStackOperation);
                    }
                    let len = stack.len();
                    stack.swap(len - 4, len - 2);
                    stack.swap(len - 3, len - 1);
                }
                OP_IFDUP => {
                    let top = peek(stack, 0)?.clone();
                    if cast_to_bool(&top) {
                        stack.push(top);
                    }
                }
                OP_DEPTH => {
                    let depth = stack.len() as i64;
                    stack.push(encode_num(depth));
                }
                OP_DROP => {
                    pop(stack)?;
                }
                OP_DUP => stack.push(peek(stack, 0)?.clone()),
                OP_NIP => {
                    if stack.len() < 2 {
                        return Err(ScriptError::InvalidStackOperation);
                    }
                    let len = stack.len();
                    stack.remove(len - 2);
                }
                OP_OVER => stack.push(peek(stack, 1)?.clone()),
                OP_PICK | OP_ROLL => {
                    let n = pop_num(stack, flags)?;
                    if n < 0 || n as usize >= stack.len() {
                        return Err(ScriptError::InvalidStackOperation);
                    }
                    let index = stack.len() - 1 - n as usize;
                    if op.code == OP_PICK {
                        stack.push(stack[index].clone());
                    } else {
                        let item = stack.remove(index);
                        stack.push(item);
                    }
                }
                OP_ROT => {
                    if stack.len() < 3 {
                        return Err(ScriptError::InvalidStackOperation);
                    }
                    let len = stack.len();
                    let item = stack.remove(len - 3);
                    stack.push(item);
                }
                OP_SWAP => {
                    if stack.len() < 2 {
                        return Err(ScriptError::InvalidStackOperation);
                    }
                    let len = stack.len();
                    stack.swap(len - 2, len - 1);
                }
                OP_TUCK => {
                    if stack.len() < 2 {
                        return Err(ScriptError::InvalidStackOperation);
                    }
                    let top = peek(stack, 0)?.clone();
                    let len = stack.len();
                    stack.insert(len - 2, top);
                }
                OP_SIZE => {
                    let len = peek(stack, 0)?.len() as i64;
                    stack.push(encode_num(len));
                }

                OP_EQUAL | OP_EQUALVERIFY => {
                    let b = pop(stack)?;
                    let a = pop(stack)?;
                    let equal = a == b;
                    if op.code == OP_EQUALVERIFY {
                        if !equal {
                            return Err(ScriptError::EqualVerify);
                        }
                    } else {
                        stack.push(bool_bytes(equal));
                    }
                }

                OP_1ADD | OP_1SUB | OP_NEGATE | OP_ABS | OP_NOT | OP_0NOTEQUAL => {
                    let n = pop_num(stack, flags)?;
                    let result = match op.code {
                        OP_1ADD => n + 1,
                        OP_1SUB => n - 1,
                        OP_NEGATE => -n,
                        OP_ABS => n.abs(),
                        OP_NOT => (n == 0) as i64,
                        _ => (n != 0) as i64,
                    };
                    stack.push(encode_num(result));
                }
                OP_ADD | OP_SUB | OP_BOOLAND | OP_BOOLOR | OP_NUMEQUAL
                | OP_NUMEQUALVERIFY | OP_NUMNOTEQUAL | OP_LESSTHAN | OP_GREATERTHAN
                | OP_LESSTHANOREQUAL | OP_GREATERTHANOREQUAL | OP_MIN | OP_MAX => {
                    let b = pop_num(stack, flags)?;
                    let a = pop_num(stack, flags)?;
                    let result = match op.code {
                        OP_ADD => a + b,
                        OP_SUB => a - b,
                        OP_BOOLAND => (a != 0 && b != 0) as i64,
                        OP_BOOLOR => (a != 0 || b != 0) as i64,
                        OP_NUMEQUAL | OP_NUMEQUALVERIFY => (a == b) as i64,
                        OP_NUMNOTEQUAL => (a != b) as i64,
                        OP_LESSTHAN => (a < b) as i64,
                        OP_GREATERTHAN => (a > b) as i64,
                        OP_LESSTHANOREQUAL => (a <= b) as i64,
                        OP_GREATERTHANOREQUAL => (a >= b) as i64,
                        OP_MIN => a.min(b),
                        _ => a.max(b),
                    };
                    if op.code == OP_NUMEQUALVERIFY {
                        if result == 0 {
                            return Err(ScriptError::Verify);
                        }
                    } else {
                        stack.push(encode_num(result));
                    }
                }
                OP_WITHIN => {
                    let max = pop_num(stack, flags)?;
                    let min = pop_num(stack, flags)?;
                    let value = pop_num(stack, flags)?;
                    stack.push(bool_bytes(min <= value && value < max));
                }

                OP_RIPEMD160 => {
                    let data = pop(stack)?;
                    stack.push(Ripemd160::digest(&data).to_vec());
                }
                OP_SHA1 => {
                    let data = pop(stack)?;
                    stack.push(sha1::Hash::hash(&data).into_inner().to_vec());
                }
                OP_SHA256 => {
                    let data = pop(stack)?;
                    stack.push(Sha256::digest(&data).to_vec());
                }
                OP_HASH160 => {
                    let data = pop(stack)?;
                    stack.push(hashes::hash160(&data).to_le_bytes().to_vec());
                }
                OP_HASH256 => {
                    let data = pop(stack)?;
                    stack.push(hashes::sha256d(&data).to_le_bytes().to_vec());
                }

                OP_CODESEPARATOR => last_separator = reader.pos(),

                OP_CHECKSIG | OP_CHECKSIGVERIFY => {
                    let pubkey = pop(stack)?;
                    let sig = pop(stack)?;
                    check_signature_encoding(&sig, flags)?;
                    check_pubkey_encoding(&pubkey, flags)?;
                    let script_code =
                        Script::from_bytes(script.as_bytes()[last_separator..].to_vec());
                    let success =
                        !sig.is_empty() && checker.check_sig(&sig, &pubkey, &script_code);
                    if op.code == OP_CHECKSIGVERIFY {
                        if !success {
                            return Err(ScriptError::Verify);
                        }
                    } else {
                        stack.push(bool_bytes(success));
                    }
                }
                OP_CHECKMULTISIG | OP_CHECKMULTISIGVERIFY => {
                    let key_count = pop_num(stack, flags)?;
                    if key_count < 0 || key_count as usize > MAX_PUBKEYS_PER_MULTISIG {
                        return Err(ScriptError::PubkeyCount);
                    }
                    op_count += key_count as usize;
                    if op_count > MAX_OPS_PER_SCRIPT {
                        return Err(ScriptError::OpCount);
                    }
                    let mut keys = Vec::with_capacity(key_count as usize);
                    for _ in 0..key_count {
                        keys.push(pop(stack)?);
                    }
                    let sig_count = pop_num(stack, flags)?;
                    if sig_count < 0 || sig_count > key_count {
                        return Err(ScriptError::SigCount);
                    }
                    let mut sigs = Vec::with_capacity(sig_count as usize);
                    for _ in 0..sig_count {
                        sigs.push(pop(stack)?);
                    }
                    // The historical off-by-one consumes one extra element.
                    pop(stack)?;

                    // Every candidate signature is stripped from the script
                    // code before the first check.
                    let mut script_code =
                        Script::from_bytes(script.as_bytes()[last_separator..].to_vec());
                    for sig in &sigs {
                        script_code = script_code.find_and_delete_data(sig);
                    }
                    let mut success = true;
                    let mut isig = 0usize;
                    let mut ikey = 0usize;
                    let mut sigs_left = sigs.len();
                    let mut keys_left = keys.len();
                    while success && sigs_left > 0 {
                        let sig = &sigs[isig];
                        let key = &keys[ikey];
                        check_signature_encoding(sig, flags)?;
                        check_pubkey_encoding(key, flags)?;
                        if !sig.is_empty() && checker.check_sig(sig, key, &script_code) {
                            isig += 1;
                            sigs_left -= 1;
                        }
                        ikey += 1;
                        keys_left -= 1;
                        // Not enough keys remain for the outstanding sigs.
                        if sigs_left > keys_left {
                            success = false;
                        }
                    }
                    if op.code == OP_CHECKMULTISIGVERIFY {
                        if !success {
                            return Err(ScriptError::MultisigThreshold);
                        }
                    } else {
                        stack.push(bool_bytes(success));
                    }
                }

                _ => return Err(ScriptError::BadOpcode),
            }
        }

        if stack.len() + alt_stack.len() > MAX_STACK_SIZE {
            return Err(ScriptError::StackSize);
        }
    }

    if !exec_stack.is_empty() {
        return Err(ScriptError::UnbalancedConditional);
    }
    Ok(())
}

/// Run a scriptSig/scriptPubKey pair, including the pay-to-script-hash
/// redeem evaluation when the flag is set.
pub fn verify_script(
    script_sig: &Script,
    script_pub_key: &Script,
    flags: u32,
    checker: &dyn SignatureChecker,
) -> Result<(), ScriptError> {
    // CLEANSTACK is only defined on top of P2SH evaluation.
    debug_assert!(flags & VERIFY_CLEANSTACK == 0 || flags & VERIFY_P2SH != 0);

    if flags & VERIFY_SIGPUSHONLY != 0 && !script_sig.is_push_only() {
        return Err(ScriptError::SigPushOnly);
    }

    let mut stack: Stack = Vec::new();
    eval_script(&mut stack, script_sig, flags, checker)?;

    let p2sh = flags & VERIFY_P2SH != 0 && script_pub_key.is_pay_to_script_hash();
    let sig_stack = if p2sh { Some(stack.clone()) } else { None };

    eval_script(&mut stack, script_pub_key, flags, checker)?;
    let truthy = stack.last().map(|top| cast_to_bool(top)).unwrap_or(false);
    if !truthy {
        // Distinguish a wrong redeem script from a plain false result.
        if let Some(sig_stack) = &sig_stack {
            if let Some(redeem_bytes) = sig_stack.last() {
                let mut embedded = [0u8; 20];
                embedded.copy_from_slice(&script_pub_key.as_bytes()[2..22]);
                let redeem = Script::from_bytes(redeem_bytes.clone());
                if redeem.script_hash() != crate::uint::Uint160::from_le_bytes(embedded) {
                    return Err(ScriptError::ScriptHashMismatch);
                }
            }
        }
        return Err(ScriptError::EvalFalse);
    }

    if let Some(mut stack) = sig_stack {
        // Spending a script hash requires the scriptSig to be pure data.
        if !script_sig.is_push_only() {
            return Err(ScriptError::SigPushOnly);
        }
        let redeem_bytes = pop(&mut stack)?;
        let redeem = Script::from_bytes(redeem_bytes);
        eval_script(&mut stack, &redeem, flags, checker)?;
        let truthy = stack.last().map(|top| cast_to_bool(top)).unwrap_or(false);
        if !truthy {
            return Err(ScriptError::EvalFalse);
        }
        if flags & VERIFY_CLEANSTACK != 0 && stack.len() != 1 {
            return Err(ScriptError::CleanStack);
        }
        return Ok(());
    }

    if flags & VERIFY_CLEANSTACK != 0 && stack.len() != 1 {
        return Err(ScriptError::CleanStack);
    }
    Ok(())
}

impl Script {
    /// Verify one input of `tx` against the output script it spends.
    /// `sig_hash`, when given, overrides the hash type carried in every
    /// signature.
    pub fn verify(
        script_sig: &Script,
        script_pub_key: &Script,
        tx: &Transaction,
        input: usize,
        amount: i64,
        flags: u32,
        sig_hash: Option<SigHash>,
    ) -> Result<(), ScriptError> {
        let checker = TransactionChecker { tx, input, amount, force_hash_type: sig_hash };
        verify_script(script_sig, script_pub_key, flags, &checker)
    }
}
