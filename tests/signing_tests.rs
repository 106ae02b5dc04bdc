//! End-to-end signing, verification and combination scenarios

use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use txscript::combine::combine_signatures;
use txscript::hashes::hash160;
use txscript::interpreter::{VERIFY_P2SH, VERIFY_STANDARD};
use txscript::script::Script;
use txscript::template;
use txscript::transaction::{OutPoint, SigHash, Transaction, TxIn, TxOut};
use txscript::uint::Uint256;
use txscript::ScriptError;

fn keypair(seed: u8) -> (SecretKey, Vec<u8>) {
    let secp = Secp256k1::new();
    let secret = SecretKey::from_slice(&[seed; 32]).unwrap();
    let pubkey = PublicKey::from_secret_key(&secp, &secret);
    (secret, pubkey.serialize().to_vec())
}

fn spending_tx() -> Transaction {
    let mut tx = Transaction::new();
    tx.inputs.push(TxIn::new(
        OutPoint::new(Uint256::from_u64(0xdead), 0),
        Script::new(),
    ));
    tx.outputs.push(TxOut::new(90_000, Script::new()));
    tx
}

fn sign(tx: &Transaction, script_code: &Script, input: usize, secret: &SecretKey) -> Vec<u8> {
    let secp = Secp256k1::new();
    let sighash = tx.signature_hash(script_code, input, SigHash::ALL);
    let message = Message::from_digest_slice(&sighash.to_le_bytes()).unwrap();
    let signature = secp.sign_ecdsa(&message, secret);
    let mut push = signature.serialize_der().to_vec();
    push.push(SigHash::ALL.0 as u8);
    push
}

#[test]
fn p2pkh_sign_and_verify() {
    let (secret, pubkey) = keypair(0x11);
    let script_pub_key = template::pay_to_pubkey_hash(&hash160(&pubkey));
    let tx = spending_tx();

    let sig = sign(&tx, &script_pub_key, 0, &secret);
    let script_sig = Script::new().push_data(&sig).push_data(&pubkey);
    assert_eq!(
        Script::verify(&script_sig, &script_pub_key, &tx, 0, 100_000, VERIFY_STANDARD, None),
        Ok(())
    );
}

#[test]
fn p2pkh_wrong_pubkey_fails_with_hash_mismatch() {
    let (secret, pubkey) = keypair(0x11);
    let (_, other_pubkey) = keypair(0x22);
    let script_pub_key = template::pay_to_pubkey_hash(&hash160(&pubkey));
    let tx = spending_tx();

    let sig = sign(&tx, &script_pub_key, 0, &secret);
    let script_sig = Script::new().push_data(&sig).push_data(&other_pubkey);
    assert_eq!(
        Script::verify(&script_sig, &script_pub_key, &tx, 0, 100_000, VERIFY_STANDARD, None),
        Err(ScriptError::EqualVerify)
    );
}

#[test]
fn p2pkh_wrong_key_signature_is_false() {
    let (_, pubkey) = keypair(0x11);
    let (other_secret, _) = keypair(0x22);
    let script_pub_key = template::pay_to_pubkey_hash(&hash160(&pubkey));
    let tx = spending_tx();

    // Signed by a key that does not match the committed pubkey.
    let sig = sign(&tx, &script_pub_key, 0, &other_secret);
    let script_sig = Script::new().push_data(&sig).push_data(&pubkey);
    assert_eq!(
        Script::verify(&script_sig, &script_pub_key, &tx, 0, 100_000, VERIFY_STANDARD, None),
        Err(ScriptError::EvalFalse)
    );
}

#[test]
fn p2pk_sign_and_verify() {
    let (secret, pubkey) = keypair(0x33);
    let script_pub_key = template::pay_to_pubkey(&pubkey);
    let tx = spending_tx();

    let sig = sign(&tx, &script_pub_key, 0, &secret);
    let script_sig = Script::new().push_data(&sig);
    assert_eq!(
        Script::verify(&script_sig, &script_pub_key, &tx, 0, 0, VERIFY_STANDARD, None),
        Ok(())
    );
}

#[test]
fn bare_multisig_two_of_three_combination() {
    let (secret1, pubkey1) = keypair(0x41);
    let (secret2, pubkey2) = keypair(0x42);
    let (_, pubkey3) = keypair(0x43);
    let script_pub_key =
        template::multisig(2, &[pubkey1, pubkey2, pubkey3]).unwrap();
    let tx = spending_tx();

    let sig1 = sign(&tx, &script_pub_key, 0, &secret1);
    let sig2 = sign(&tx, &script_pub_key, 0, &secret2);

    // Each party contributes a scriptSig holding only its own signature.
    let partial1 = Script::new().push_int(0).push_data(&sig1);
    let partial2 = Script::new().push_int(0).push_data(&sig2);
    for partial in [&partial1, &partial2] {
        assert!(
            Script::verify(partial, &script_pub_key, &tx, 0, 0, VERIFY_P2SH, None).is_err()
        );
    }

    let combined = combine_signatures(&script_pub_key, &tx, 0, 0, &partial1, &partial2);
    assert_eq!(
        Script::verify(&combined, &script_pub_key, &tx, 0, 0, VERIFY_STANDARD, None),
        Ok(())
    );
    // Signature order follows pubkey order regardless of argument order.
    let flipped = combine_signatures(&script_pub_key, &tx, 0, 0, &partial2, &partial1);
    assert_eq!(flipped, combined);
}

#[test]
fn multisig_combination_is_incremental() {
    let (secret1, pubkey1) = keypair(0x51);
    let (secret2, pubkey2) = keypair(0x52);
    let (_, pubkey3) = keypair(0x53);
    let script_pub_key =
        template::multisig(2, &[pubkey1, pubkey2, pubkey3]).unwrap();
    let tx = spending_tx();

    let sig1 = sign(&tx, &script_pub_key, 0, &secret1);
    let sig2 = sign(&tx, &script_pub_key, 0, &secret2);
    let partial1 = Script::new().push_int(0).push_data(&sig1);

    // Combining with nothing yields a padded, still-unsatisfied scriptSig.
    let padded = combine_signatures(&script_pub_key, &tx, 0, 0, &partial1, &Script::new());
    assert!(
        Script::verify(&padded, &script_pub_key, &tx, 0, 0, VERIFY_P2SH, None).is_err()
    );

    // A later combination slots the second signature into the padding.
    let partial2 = Script::new().push_int(0).push_data(&sig2);
    let full = combine_signatures(&script_pub_key, &tx, 0, 0, &padded, &partial2);
    assert_eq!(
        Script::verify(&full, &script_pub_key, &tx, 0, 0, VERIFY_STANDARD, None),
        Ok(())
    );
}

#[test]
fn p2sh_multisig_sign_combine_verify() {
    let (secret1, pubkey1) = keypair(0x61);
    let (secret2, pubkey2) = keypair(0x62);
    let redeem = template::multisig(2, &[pubkey1, pubkey2]).unwrap();
    let script_pub_key = redeem.payment_script().clone();
    let tx = spending_tx();

    // Signatures commit to the redeem script, not the P2SH wrapper.
    let sig1 = sign(&tx, &redeem, 0, &secret1);
    let sig2 = sign(&tx, &redeem, 0, &secret2);

    let partial1 = Script::new()
        .push_int(0)
        .push_data(&sig1)
        .push_data(redeem.as_bytes());
    let partial2 = Script::new()
        .push_int(0)
        .push_data(&sig2)
        .push_data(redeem.as_bytes());

    let combined = combine_signatures(&script_pub_key, &tx, 0, 0, &partial1, &partial2);
    assert_eq!(
        Script::verify(&combined, &script_pub_key, &tx, 0, 0, VERIFY_STANDARD, None),
        Ok(())
    );

    // The wrong redeem script is called out specifically.
    let wrong_redeem = template::multisig(1, &[vec![0x02; 33]]).unwrap();
    let bad = Script::new()
        .push_int(0)
        .push_data(&sig1)
        .push_data(wrong_redeem.as_bytes());
    assert_eq!(
        Script::verify(&bad, &script_pub_key, &tx, 0, 0, VERIFY_STANDARD, None),
        Err(ScriptError::ScriptHashMismatch)
    );
}

#[test]
fn forced_hash_type_overrides_signature_byte() {
    let (secret, pubkey) = keypair(0x71);
    let script_pub_key = template::pay_to_pubkey(&pubkey);
    let tx = spending_tx();

    // Sign as ALL but tag the push as NONE; forcing ALL still verifies.
    let secp = Secp256k1::new();
    let sighash = tx.signature_hash(&script_pub_key, 0, SigHash::ALL);
    let message = Message::from_digest_slice(&sighash.to_le_bytes()).unwrap();
    let mut push = secp.sign_ecdsa(&message, &secret).serialize_der().to_vec();
    push.push(SigHash::NONE.0 as u8);

    let script_sig = Script::new().push_data(&push);
    assert_eq!(
        Script::verify(&script_sig, &script_pub_key, &tx, 0, 0, VERIFY_P2SH, Some(SigHash::ALL)),
        Ok(())
    );
    assert_eq!(
        Script::verify(&script_sig, &script_pub_key, &tx, 0, 0, VERIFY_P2SH, None),
        Err(ScriptError::EvalFalse)
    );
}
