//! Error types for the transaction model and script engine

use thiserror::Error;

/// Format and semantic errors raised by parsing and model operations.
///
/// Script *evaluation* failures are not represented here: they are returned
/// as [`ScriptError`] result codes so that untrusted scripts can be evaluated
/// without unwinding.
#[derive(Error, Debug)]
pub enum Error {
    #[error("bad format: {0}")]
    BadFormat(String),

    #[error("bad data: {0}")]
    BadData(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("P2SH coin is missing its redeem script")]
    MissingRedeemScript,

    #[error("the scriptPubKey is not a valid multisig")]
    NotMultisig,

    #[error("secp256k1 error: {0}")]
    Secp(#[from] secp256k1::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Structured result codes produced by script evaluation.
///
/// Evaluation of attacker-controlled scripts is routine, so failures are
/// values, not exceptions: `verify_script` returns `Err(code)` instead of
/// unwinding, and callers match on the code.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptError {
    #[error("script evaluated without error but finished with a false top element")]
    EvalFalse,

    #[error("OP_RETURN was encountered")]
    OpReturn,

    #[error("script is larger than the maximum script size")]
    ScriptSize,

    #[error("pushed element is larger than the maximum element size")]
    PushSize,

    #[error("operation limit exceeded")]
    OpCount,

    #[error("stack size limit exceeded")]
    StackSize,

    #[error("signature count is invalid for multisig")]
    SigCount,

    #[error("public key count is invalid for multisig")]
    PubkeyCount,

    #[error("operation required more items than were on the stack")]
    InvalidStackOperation,

    #[error("opcode is invalid or incompletely encoded")]
    BadOpcode,

    #[error("opcode is disabled")]
    DisabledOpcode,

    #[error("OP_IF/OP_NOTIF without matching OP_ENDIF")]
    UnbalancedConditional,

    #[error("OP_VERIFY failed")]
    Verify,

    #[error("OP_EQUALVERIFY failed")]
    EqualVerify,

    #[error("push used a longer-than-necessary encoding")]
    MinimalData,

    #[error("scriptSig is not push-only")]
    SigPushOnly,

    #[error("stack was not clean after evaluation")]
    CleanStack,

    #[error("signature encoding is invalid")]
    SigEncoding,

    #[error("public key encoding is invalid")]
    PubkeyEncoding,

    #[error("multisig signature threshold was not satisfied")]
    MultisigThreshold,

    #[error("redeem script does not hash to the committed script hash")]
    ScriptHashMismatch,

    #[error("script number overflows the allowed range")]
    NumberOverflow,
}
