//! Spent-output view used by fee computation and signing
//!
//! A [`Coin`] pairs an outpoint with the output it created. For a
//! pay-to-script-hash coin the redeem script must be attached before the
//! script code for signing can be produced.

use crate::error::{Error, Result};
use crate::script::Script;
use crate::transaction::{OutPoint, Transaction, TxOut};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub outpoint: OutPoint,
    pub tx_out: TxOut,
    pub redeem_script: Option<Script>,
}

impl Coin {
    pub fn new(outpoint: OutPoint, tx_out: TxOut) -> Coin {
        Coin { outpoint, tx_out, redeem_script: None }
    }

    /// The coin created by output `index` of `tx`.
    pub fn from_tx(tx: &Transaction, index: u32) -> Result<Coin> {
        let tx_out = tx
            .outputs
            .get(index as usize)
            .ok_or_else(|| {
                Error::BadData(format!(
                    "transaction {} has no output {}",
                    tx.txid(),
                    index
                ))
            })?
            .clone();
        Ok(Coin::new(OutPoint::new(tx.txid(), index), tx_out))
    }

    pub fn with_redeem_script(mut self, redeem_script: Script) -> Coin {
        self.redeem_script = Some(redeem_script);
        self
    }

    pub fn value(&self) -> i64 {
        self.tx_out.value
    }

    /// The script a signature for this coin commits to: the scriptPubKey
    /// itself, or the redeem script for a P2SH coin.
    pub fn script_code(&self) -> Result<&Script> {
        if !self.tx_out.script_pub_key.is_pay_to_script_hash() {
            return Ok(&self.tx_out.script_pub_key);
        }
        self.redeem_script.as_ref().ok_or(Error::MissingRedeemScript)
    }
}
