//! # txscript
//!
//! Bitcoin transaction model and legacy script engine: serialization,
//! signature hashing, script evaluation and partial-signature combination.
//!
//! The crate is a value-type core. Callers hand it bytes or built values
//! (a `Transaction`, a `Script`, a 256-bit hash) and get values back;
//! networking, wallets and RPC live elsewhere.
//!
//! ## Layers
//!
//! - Hash primitives (`Uint256`/`Uint160`) and the wire codec
//! - Script values, the opcode reader and standard templates
//! - The transaction model with txid caching, sighash and BIP-68
//! - The stack-machine interpreter and signature combination
//!
//! ## Usage
//!
//! ```rust
//! use txscript::encode::Serializable;
//! use txscript::script::Script;
//! use txscript::transaction::Transaction;
//!
//! let script = Script::parse_asm("OP_1 OP_1 OP_ADD OP_2 OP_EQUAL").unwrap();
//! assert!(script.is_valid());
//!
//! let tx = Transaction::new();
//! assert_eq!(Transaction::from_bytes(&tx.to_bytes()).unwrap(), tx);
//! ```

pub mod coin;
pub mod combine;
pub mod compress;
pub mod constants;
pub mod encode;
pub mod error;
pub mod hashes;
pub mod interpreter;
pub mod opcodes;
pub mod script;
pub mod signature;
pub mod template;
pub mod transaction;
pub mod uint;

pub use coin::Coin;
pub use combine::combine_signatures;
pub use encode::Serializable;
pub use error::{Error, Result, ScriptError};
pub use script::{Op, Script, ScriptReader};
pub use template::Template;
pub use transaction::{
    OutPoint, SigHash, Transaction, TransactionCheckResult, TxIn, TxOut,
};
pub use uint::{Uint160, Uint256};
