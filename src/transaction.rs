//! Transaction model, wire codec and signature hashing
//!
//! The codec is the legacy layout: version, input list, output list, lock
//! time. There is no witness segment. Parse then serialize is byte-identical
//! for every valid encoding, which is what makes the cached txid safe.

use crate::coin::Coin;
use crate::constants::*;
use crate::encode::{read_i64_le, read_u32_le, var_int, Serializable};
use crate::error::{Error, Result};
use crate::hashes::sha256d;
use crate::opcodes::OP_CODESEPARATOR;
use crate::script::Script;
use crate::uint::Uint256;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::io;
use std::io::{Read, Write};
use std::str::FromStr;
use std::sync::OnceLock;

/// Sighash type flag carried in the last byte of a signature push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SigHash(pub u32);

impl SigHash {
    pub const UNDEFINED: SigHash = SigHash(0);
    pub const ALL: SigHash = SigHash(1);
    pub const NONE: SigHash = SigHash(2);
    pub const SINGLE: SigHash = SigHash(3);
    pub const ANYONE_CAN_PAY: SigHash = SigHash(0x80);

    /// The base hash type with the input-scoping flag masked off.
    pub fn base(self) -> u32 {
        self.0 & 0x1f
    }

    pub fn anyone_can_pay(self) -> bool {
        self.0 & SigHash::ANYONE_CAN_PAY.0 != 0
    }
}

impl std::ops::BitOr for SigHash {
    type Output = SigHash;

    fn bitor(self, rhs: SigHash) -> SigHash {
        SigHash(self.0 | rhs.0)
    }
}

/// Reference to a transaction output: txid plus output index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub hash: Uint256,
    pub index: u32,
}

impl OutPoint {
    pub fn new(hash: Uint256, index: u32) -> OutPoint {
        OutPoint { hash, index }
    }

    /// The coinbase sentinel: zero hash, maximum index.
    pub fn null() -> OutPoint {
        OutPoint { hash: Uint256::ZERO, index: u32::MAX }
    }

    pub fn is_null(&self) -> bool {
        self.hash.is_zero() && self.index == u32::MAX
    }

    /// Parse the `<txid-hex>-<index>` text form.
    pub fn parse(s: &str) -> Result<OutPoint> {
        let (hash, index) = s
            .rsplit_once('-')
            .ok_or_else(|| Error::BadFormat(format!("malformed outpoint {}", s)))?;
        Ok(OutPoint {
            hash: Uint256::from_hex(hash)?,
            index: index
                .parse()
                .map_err(|_| Error::BadFormat(format!("bad outpoint index {}", index)))?,
        })
    }
}

impl Ord for OutPoint {
    fn cmp(&self, other: &OutPoint) -> Ordering {
        self.hash.cmp(&other.hash).then(self.index.cmp(&other.index))
    }
}

impl PartialOrd for OutPoint {
    fn partial_cmp(&self, other: &OutPoint) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}-{}", self.hash, self.index)
    }
}

impl FromStr for OutPoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<OutPoint> {
        OutPoint::parse(s)
    }
}

impl Serializable for OutPoint {
    fn read(reader: &mut dyn Read) -> Result<OutPoint> {
        Ok(OutPoint {
            hash: Uint256::read(reader)?,
            index: read_u32_le(reader)?,
        })
    }

    fn write(&self, writer: &mut dyn Write) -> io::Result<()> {
        self.hash.write(writer)?;
        writer.write_all(&self.index.to_le_bytes())
    }
}

/// Transaction input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxIn {
    pub prev_out: OutPoint,
    pub script_sig: Script,
    pub sequence: u32,
}

impl TxIn {
    pub fn new(prev_out: OutPoint, script_sig: Script) -> TxIn {
        TxIn { prev_out, script_sig, sequence: SEQUENCE_FINAL }
    }

    /// A coinbase input committing to its block height, BIP-34 style.
    pub fn coinbase(height: i32) -> TxIn {
        TxIn {
            prev_out: OutPoint::null(),
            script_sig: Script::new().push_int(height as i64),
            sequence: SEQUENCE_FINAL,
        }
    }

    pub fn is_final(&self) -> bool {
        self.sequence == SEQUENCE_FINAL
    }
}

impl Serializable for TxIn {
    fn read(reader: &mut dyn Read) -> Result<TxIn> {
        Ok(TxIn {
            prev_out: OutPoint::read(reader)?,
            script_sig: Script::read(reader)?,
            sequence: read_u32_le(reader)?,
        })
    }

    fn write(&self, writer: &mut dyn Write) -> io::Result<()> {
        self.prev_out.write(writer)?;
        self.script_sig.write(writer)?;
        writer.write_all(&self.sequence.to_le_bytes())
    }
}

/// Transaction output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    pub value: i64,
    pub script_pub_key: Script,
}

impl TxOut {
    pub fn new(value: i64, script_pub_key: Script) -> TxOut {
        TxOut { value, script_pub_key }
    }

    /// The blanked output used by the SINGLE sighash transform.
    pub fn null() -> TxOut {
        TxOut { value: -1, script_pub_key: Script::new() }
    }

    pub fn is_null(&self) -> bool {
        self.value == -1
    }

    /// Minimum value below which spending this output costs more than it is
    /// worth: three times the fee of the output plus a typical 148-byte
    /// spending input.
    pub fn dust_threshold(&self, fee_rate: &FeeRate) -> i64 {
        3 * fee_rate.fee(self.serialized_size() + 148)
    }

    pub fn is_dust(&self, fee_rate: &FeeRate) -> bool {
        self.value < self.dust_threshold(fee_rate)
    }
}

impl Serializable for TxOut {
    fn read(reader: &mut dyn Read) -> Result<TxOut> {
        Ok(TxOut {
            value: read_i64_le(reader)?,
            script_pub_key: Script::read(reader)?,
        })
    }

    fn write(&self, writer: &mut dyn Write) -> io::Result<()> {
        writer.write_all(&self.value.to_le_bytes())?;
        self.script_pub_key.write(writer)
    }
}

/// Fee rate in satoshis per 1000 virtual bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeeRate {
    pub satoshis_per_kvb: i64,
}

impl FeeRate {
    pub fn new(satoshis_per_kvb: i64) -> FeeRate {
        FeeRate { satoshis_per_kvb }
    }

    pub fn from_fee(fee: i64, vsize: usize) -> FeeRate {
        if vsize == 0 {
            return FeeRate { satoshis_per_kvb: 0 };
        }
        FeeRate { satoshis_per_kvb: fee.saturating_mul(1000) / vsize as i64 }
    }

    /// Fee for `size` bytes, never zero for a nonzero rate and size.
    pub fn fee(&self, size: usize) -> i64 {
        let fee = self.satoshis_per_kvb.saturating_mul(size as i64) / 1000;
        if fee == 0 && size != 0 && self.satoshis_per_kvb > 0 {
            return 1;
        }
        fee
    }
}

impl fmt::Display for FeeRate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} sat/kvB", self.satoshis_per_kvb)
    }
}

/// Structural validity verdict from [`Transaction::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionCheckResult {
    Success,
    NoInput,
    NoOutput,
    NegativeOutput,
    OutputTooLarge,
    OutputTotalTooLarge,
    TransactionTooLarge,
    DuplicateInputs,
    NullInputPrevOut,
    CoinbaseScriptTooLarge,
}

/// The combined BIP-68 relative lock of a transaction: the earliest block
/// height and time at which every input's relative lock is satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceLock {
    pub min_height: i32,
    pub min_time: i64,
}

impl SequenceLock {
    /// The lock that is satisfied everywhere.
    pub fn unlocked() -> SequenceLock {
        SequenceLock { min_height: -1, min_time: -1 }
    }

    pub fn evaluate(&self, block_height: i32, block_time: i64) -> bool {
        self.min_height < block_height && self.min_time < block_time
    }
}

/// A transaction with a write-once txid cache.
///
/// The cache is filled the first time [`Transaction::txid`] runs. Mutating a
/// transaction after its txid has been computed without calling
/// [`Transaction::invalidate_hashes`] is a caller error; the stale id will
/// keep being returned.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
    #[serde(skip)]
    txid: OnceLock<Uint256>,
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Transaction) -> bool {
        self.version == other.version
            && self.inputs == other.inputs
            && self.outputs == other.outputs
            && self.lock_time == other.lock_time
    }
}

impl Eq for Transaction {}

impl Transaction {
    pub fn new() -> Transaction {
        Transaction { version: 1, ..Transaction::default() }
    }

    /// Double-SHA256 of the serialized transaction, computed once.
    pub fn txid(&self) -> Uint256 {
        *self.txid.get_or_init(|| sha256d(&self.to_bytes()))
    }

    /// There is no witness codec, so the witness txid is the txid.
    pub fn wit_txid(&self) -> Uint256 {
        self.txid()
    }

    pub fn precompute_hashes(&self) {
        let _ = self.txid();
    }

    /// Reset the txid cache after mutating the transaction.
    pub fn invalidate_hashes(&mut self) {
        self.txid = OnceLock::new();
    }

    /// An independent copy sharing no buffers with the original. Dropping
    /// the cache forces the copy to recompute its txid after mutation.
    pub fn deep_clone(&self, preserve_cache: bool) -> Transaction {
        let mut copy = self.clone();
        if !preserve_cache {
            copy.invalidate_hashes();
        }
        copy
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].prev_out.is_null()
    }

    pub fn total_out(&self) -> i64 {
        self.outputs.iter().map(|out| out.value).sum()
    }

    /// Opted in to replace-by-fee: some input signals a non-final sequence
    /// below 0xFFFFFFFE.
    pub fn is_rbf(&self) -> bool {
        self.inputs.iter().any(|txin| txin.sequence < SEQUENCE_FINAL - 1)
    }

    /// Structural checks that need no chain context.
    pub fn check(&self) -> TransactionCheckResult {
        if self.inputs.is_empty() {
            return TransactionCheckResult::NoInput;
        }
        if self.outputs.is_empty() {
            return TransactionCheckResult::NoOutput;
        }
        if self.serialized_size() > MAX_BLOCK_SIZE {
            return TransactionCheckResult::TransactionTooLarge;
        }
        let mut total: i64 = 0;
        for out in &self.outputs {
            if out.value < 0 {
                return TransactionCheckResult::NegativeOutput;
            }
            if out.value > MAX_MONEY {
                return TransactionCheckResult::OutputTooLarge;
            }
            total = total.saturating_add(out.value);
            if total > MAX_MONEY {
                return TransactionCheckResult::OutputTotalTooLarge;
            }
        }
        let mut seen = HashSet::with_capacity(self.inputs.len());
        for txin in &self.inputs {
            if !seen.insert(txin.prev_out) {
                return TransactionCheckResult::DuplicateInputs;
            }
        }
        if self.is_coinbase() {
            let len = self.inputs[0].script_sig.len();
            if !(2..=100).contains(&len) {
                return TransactionCheckResult::CoinbaseScriptTooLarge;
            }
        } else if self.inputs.iter().any(|txin| txin.prev_out.is_null()) {
            return TransactionCheckResult::NullInputPrevOut;
        }
        TransactionCheckResult::Success
    }

    /// Weight per the fee-estimation formula. With no witness data the
    /// stripped and total sizes coincide.
    pub fn weight(&self) -> usize {
        let size = self.serialized_size();
        size * (WITNESS_SCALE_FACTOR - 1) + size
    }

    pub fn virtual_size(&self) -> usize {
        (self.weight() + WITNESS_SCALE_FACTOR - 1) / WITNESS_SCALE_FACTOR
    }

    /// Total fee given the spent coins. `None` when any spent coin is
    /// missing from `spent`; a coinbase pays no fee.
    pub fn fee(&self, spent: &[Coin]) -> Option<i64> {
        if self.is_coinbase() {
            return Some(0);
        }
        let mut total_in: i64 = 0;
        for txin in &self.inputs {
            let coin = spent.iter().find(|coin| coin.outpoint == txin.prev_out)?;
            total_in = total_in.saturating_add(coin.value());
        }
        Some(total_in - self.total_out())
    }

    pub fn fee_rate(&self, spent: &[Coin]) -> Option<FeeRate> {
        Some(FeeRate::from_fee(self.fee(spent)?, self.virtual_size()))
    }

    /// Absolute lock-time finality at a given chain position.
    pub fn is_final(&self, block_time: i64, block_height: i32) -> bool {
        if self.lock_time == 0 {
            return true;
        }
        let threshold = if self.lock_time < LOCKTIME_THRESHOLD {
            block_height as i64
        } else {
            block_time
        };
        if (self.lock_time as i64) < threshold {
            return true;
        }
        self.inputs.iter().all(TxIn::is_final)
    }

    /// BIP-68 relative lock calculation. `prev_heights[i]` is the height at
    /// which input `i`'s coin was confirmed; `median_time_past(h)` supplies
    /// the median time past of the block at height `h`.
    pub fn sequence_locks<F>(
        &self,
        prev_heights: &[i32],
        median_time_past: F,
    ) -> Result<SequenceLock>
    where
        F: Fn(i32) -> i64,
    {
        if prev_heights.len() != self.inputs.len() {
            return Err(Error::BadData(format!(
                "{} previous heights for {} inputs",
                prev_heights.len(),
                self.inputs.len()
            )));
        }
        let mut lock = SequenceLock::unlocked();
        if self.version < 2 {
            return Ok(lock);
        }
        for (txin, &coin_height) in self.inputs.iter().zip(prev_heights) {
            let sequence = txin.sequence;
            if sequence & SEQUENCE_LOCKTIME_DISABLE_FLAG != 0 {
                continue;
            }
            let masked = (sequence & SEQUENCE_LOCKTIME_MASK) as i64;
            if sequence & SEQUENCE_LOCKTIME_TYPE_FLAG != 0 {
                // Time lock counts from the MTP of the block before the coin.
                let start = median_time_past(std::cmp::max(coin_height - 1, 0));
                lock.min_time = std::cmp::max(
                    lock.min_time,
                    start + (masked << SEQUENCE_LOCKTIME_GRANULARITY) - 1,
                );
            } else {
                lock.min_height =
                    std::cmp::max(lock.min_height, coin_height + masked as i32 - 1);
            }
        }
        Ok(lock)
    }

    /// The legacy signing preimage hash for one input.
    ///
    /// Out-of-range indexes return `Uint256::ONE`, never an error: signing
    /// that sentinel is how the historical algorithm misbehaves, and staying
    /// bit-compatible means reproducing it.
    pub fn signature_hash(
        &self,
        script_code: &Script,
        input: usize,
        sig_hash: SigHash,
    ) -> Uint256 {
        if input >= self.inputs.len() {
            return Uint256::ONE;
        }
        let base = sig_hash.base();
        if base == SigHash::SINGLE.0 && input >= self.outputs.len() {
            return Uint256::ONE;
        }

        let script_code = script_code.find_and_delete_op(OP_CODESEPARATOR);
        let mut tx = self.deep_clone(false);
        for txin in &mut tx.inputs {
            txin.script_sig = Script::new();
        }
        tx.inputs[input].script_sig = script_code;

        if base == SigHash::NONE.0 {
            tx.outputs.clear();
        } else if base == SigHash::SINGLE.0 {
            tx.outputs.truncate(input + 1);
            for out in tx.outputs.iter_mut().take(input) {
                *out = TxOut::null();
            }
        }
        if base == SigHash::NONE.0 || base == SigHash::SINGLE.0 {
            for (i, txin) in tx.inputs.iter_mut().enumerate() {
                if i != input {
                    txin.sequence = 0;
                }
            }
        }
        if sig_hash.anyone_can_pay() {
            tx.inputs = vec![tx.inputs[input].clone()];
        }

        let mut preimage = tx.to_bytes();
        preimage.extend_from_slice(&sig_hash.0.to_le_bytes());
        sha256d(&preimage)
    }
}

impl Serializable for Transaction {
    fn read(reader: &mut dyn Read) -> Result<Transaction> {
        let version = read_u32_le(reader)?;
        let input_count = var_int::read(reader)?;
        if input_count > MAX_BLOCK_SIZE as u64 {
            return Err(Error::BadData(format!("{} inputs", input_count)));
        }
        let mut inputs = Vec::with_capacity(input_count as usize);
        for _ in 0..input_count {
            inputs.push(TxIn::read(reader)?);
        }
        let output_count = var_int::read(reader)?;
        if output_count > MAX_BLOCK_SIZE as u64 {
            return Err(Error::BadData(format!("{} outputs", output_count)));
        }
        let mut outputs = Vec::with_capacity(output_count as usize);
        for _ in 0..output_count {
            outputs.push(TxOut::read(reader)?);
        }
        let lock_time = read_u32_le(reader)?;
        Ok(Transaction { version, inputs, outputs, lock_time, txid: OnceLock::new() })
    }

    fn write(&self, writer: &mut dyn Write) -> io::Result<()> {
        writer.write_all(&self.version.to_le_bytes())?;
        var_int::write(self.inputs.len() as u64, writer)?;
        for txin in &self.inputs {
            txin.write(writer)?;
        }
        var_int::write(self.outputs.len() as u64, writer)?;
        for out in &self.outputs {
            out.write(writer)?;
        }
        writer.write_all(&self.lock_time.to_le_bytes())
    }
}
