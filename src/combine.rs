//! Partial-signature combination
//!
//! During multi-party signing each signer produces a scriptSig carrying the
//! signatures it knows. Combination merges two candidates for the same input
//! into the best single scriptSig. Both inputs are replayed for their stack
//! effect only; evaluation errors are swallowed and whatever landed on the
//! stack before the failure still participates.

use crate::interpreter::{eval_script, SignatureChecker, Stack, TransactionChecker, VERIFY_NONE};
use crate::script::Script;
use crate::template::Template;
use crate::transaction::Transaction;

/// Merge two candidate scriptSigs for input `input` of `tx` spending
/// `script_pub_key`.
pub fn combine_signatures(
    script_pub_key: &Script,
    tx: &Transaction,
    input: usize,
    amount: i64,
    script_sig1: &Script,
    script_sig2: &Script,
) -> Script {
    let checker = TransactionChecker { tx, input, amount, force_hash_type: None };
    let stack1 = replay_stack(script_sig1, &checker);
    let stack2 = replay_stack(script_sig2, &checker);
    combine(script_pub_key, &checker, stack1, stack2)
}

fn replay_stack(script_sig: &Script, checker: &dyn SignatureChecker) -> Stack {
    let mut stack = Vec::new();
    // A failing scriptSig still contributes its partial stack.
    let _ = eval_script(&mut stack, script_sig, VERIFY_NONE, checker);
    stack
}

fn push_all(stack: &Stack) -> Script {
    let mut script = Script::new();
    for item in stack {
        script = script.push_data(item);
    }
    script
}

fn combine(
    script_pub_key: &Script,
    checker: &dyn SignatureChecker,
    mut stack1: Stack,
    mut stack2: Stack,
) -> Script {
    match Template::from_script_pub_key(script_pub_key) {
        None | Some(Template::NullData { .. }) => {
            // Nothing to understand; keep whichever side knows more.
            if stack1.len() >= stack2.len() {
                push_all(&stack1)
            } else {
                push_all(&stack2)
            }
        }
        Some(Template::PayToPubkey { .. }) | Some(Template::PayToPubkeyHash { .. }) => {
            if stack1.first().map(Vec::is_empty).unwrap_or(true) {
                push_all(&stack2)
            } else {
                push_all(&stack1)
            }
        }
        Some(Template::PayToScriptHash { .. }) => {
            if stack1.last().map(Vec::is_empty).unwrap_or(true) {
                return push_all(&stack2);
            }
            if stack2.last().map(Vec::is_empty).unwrap_or(true) {
                return push_all(&stack1);
            }
            let redeem_bytes = match stack1.pop() {
                Some(bytes) => bytes,
                None => return push_all(&stack2),
            };
            stack2.pop();
            let redeem = Script::from_bytes(redeem_bytes.clone());
            combine(&redeem, checker, stack1, stack2).push_data(&redeem_bytes)
        }
        Some(Template::Multisig { required, pubkeys }) => {
            combine_multisig(script_pub_key, checker, &stack1, &stack2, required, &pubkeys)
        }
    }
}

fn combine_multisig(
    script_pub_key: &Script,
    checker: &dyn SignatureChecker,
    stack1: &Stack,
    stack2: &Stack,
    required: usize,
    pubkeys: &[Vec<u8>],
) -> Script {
    // First valid signature per pubkey wins, in pubkey order.
    let mut slots: Vec<Option<&Vec<u8>>> = vec![None; pubkeys.len()];
    for stack in [stack1, stack2] {
        for sig in stack {
            if sig.is_empty() {
                continue;
            }
            for (slot, pubkey) in slots.iter_mut().zip(pubkeys) {
                if slot.is_none() && checker.check_sig(sig, pubkey, script_pub_key) {
                    *slot = Some(sig);
                    break;
                }
            }
        }
    }
    // The leading empty push feeds the extra element CHECKMULTISIG pops.
    let mut script = Script::new().push_int(0);
    let mut have = 0usize;
    for slot in slots.into_iter().flatten() {
        if have == required {
            break;
        }
        script = script.push_data(slot);
        have += 1;
    }
    // Pad to shape so a later combination can still slot signatures in.
    for _ in have..required {
        script = script.push_int(0);
    }
    script
}
