//! Script values and the opcode reader
//!
//! A [`Script`] is an immutable byte buffer. Structure is imposed only when
//! reading: [`ScriptReader`] walks the buffer and yields one [`Op`] per
//! opcode, carrying the pushed payload when there is one. A malformed push
//! length does not abort with an error; it yields a single op marked
//! `invalid` and the iteration stops, so damaged scripts stay representable
//! and comparable.

use crate::encode::{read_var_bytes, write_var_bytes, Serializable};
use crate::error::{Error, Result, ScriptError};
use crate::hashes::hash160;
use crate::opcodes::{self, *};
use crate::uint::Uint160;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::io;
use std::io::{Read, Write};
use std::str::FromStr;
use std::sync::OnceLock;

/// A single script operation: an opcode plus its push payload, if any.
///
/// Small-integer opcodes (OP_0, OP_1..OP_16, OP_1NEGATE) carry their numeric
/// payload in `data` so that push-only checks and stack replay treat them
/// uniformly with explicit pushes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Op {
    pub code: u8,
    pub data: Option<Vec<u8>>,
    pub invalid: bool,
}

impl Op {
    /// An op for a bare opcode. Small-integer opcodes get their implied
    /// payload attached.
    pub fn from_code(code: u8) -> Op {
        let data = match code {
            OP_0 => Some(Vec::new()),
            OP_1NEGATE => Some(vec![0x81]),
            c if opcodes::is_small_int(c) => Some(vec![c - OP_1 + 1]),
            _ => None,
        };
        Op { code, data, invalid: false }
    }

    /// The minimal push encoding of `data`: OP_0 for empty, OP_1..OP_16 and
    /// OP_1NEGATE for their single-byte values, then direct length,
    /// PUSHDATA1, PUSHDATA2, PUSHDATA4 by size.
    pub fn push_data(data: &[u8]) -> Op {
        let code = match data.len() {
            0 => OP_0,
            1 if data[0] >= 1 && data[0] <= 16 => OP_1 + data[0] - 1,
            1 if data[0] == 0x81 => OP_1NEGATE,
            n if n < OP_PUSHDATA1 as usize => n as u8,
            n if n <= 0xff => OP_PUSHDATA1,
            n if n <= 0xffff => OP_PUSHDATA2,
            _ => OP_PUSHDATA4,
        };
        Op { code, data: Some(data.to_vec()), invalid: false }
    }

    /// Push `value` as a minimally encoded script number.
    pub fn push_int(value: i64) -> Op {
        match value {
            0 => Op::from_code(OP_0),
            -1 => Op::from_code(OP_1NEGATE),
            1..=16 => Op::from_code(OP_1 + value as u8 - 1),
            _ => Op::push_data(&encode_num(value)),
        }
    }

    /// True for every opcode that only places data on the stack.
    pub fn is_push(&self) -> bool {
        self.data.is_some()
    }

    pub fn push_bytes(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// Append the exact wire bytes of this op.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        if self.invalid {
            out.push(self.code);
            return;
        }
        match self.code {
            OP_0 | OP_1NEGATE => out.push(self.code),
            c if opcodes::is_small_int(c) => out.push(c),
            c if c < OP_PUSHDATA1 => {
                let data = self.data.as_deref().unwrap_or(&[]);
                out.push(c);
                out.extend_from_slice(data);
            }
            OP_PUSHDATA1 => {
                let data = self.data.as_deref().unwrap_or(&[]);
                out.push(OP_PUSHDATA1);
                out.push(data.len() as u8);
                out.extend_from_slice(data);
            }
            OP_PUSHDATA2 => {
                let data = self.data.as_deref().unwrap_or(&[]);
                out.push(OP_PUSHDATA2);
                out.extend_from_slice(&(data.len() as u16).to_le_bytes());
                out.extend_from_slice(data);
            }
            OP_PUSHDATA4 => {
                let data = self.data.as_deref().unwrap_or(&[]);
                out.push(OP_PUSHDATA4);
                out.extend_from_slice(&(data.len() as u32).to_le_bytes());
                out.extend_from_slice(data);
            }
            c => out.push(c),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        self.write_to(&mut bytes);
        bytes
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.invalid {
            return write!(f, "[invalid]");
        }
        match self.code {
            OP_0 | OP_1NEGATE => return write!(f, "{}", opcodes::name(self.code).unwrap_or("")),
            c if opcodes::is_small_int(c) => {
                return write!(f, "{}", opcodes::name(c).unwrap_or(""))
            }
            _ => {}
        }
        if let Some(data) = &self.data {
            // Minimal small numbers print as decimals, everything else as hex.
            if data.len() <= 4 {
                if let Ok(n) = decode_num(data, false, 4) {
                    if encode_num(n) == *data {
                        return write!(f, "{}", n);
                    }
                }
            }
            return write!(f, "0x{}", hex::encode(data));
        }
        if let Some(name) = opcodes::name(self.code) {
            return write!(f, "{}", name);
        }
        write!(f, "OP_UNKNOWN(0x{:02x})", self.code)
    }
}

/// Forward-only iterator over the ops of a script byte buffer.
pub struct ScriptReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ScriptReader<'a> {
    pub fn new(bytes: &'a [u8]) -> ScriptReader<'a> {
        ScriptReader { bytes, pos: 0 }
    }

    /// Byte offset just past the most recently yielded op.
    pub fn pos(&self) -> usize {
        self.pos
    }

    fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        if self.bytes.len() - self.pos < len {
            return None;
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Some(slice)
    }

    fn push_payload(&mut self, code: u8) -> Option<Vec<u8>> {
        let len = match code {
            c if c < OP_PUSHDATA1 => c as usize,
            OP_PUSHDATA1 => self.take(1)?[0] as usize,
            OP_PUSHDATA2 => {
                let raw = self.take(2)?;
                u16::from_le_bytes([raw[0], raw[1]]) as usize
            }
            OP_PUSHDATA4 => {
                let raw = self.take(4)?;
                u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize
            }
            _ => unreachable!(),
        };
        self.take(len).map(|slice| slice.to_vec())
    }
}

impl<'a> Iterator for ScriptReader<'a> {
    type Item = Op;

    fn next(&mut self) -> Option<Op> {
        if self.pos >= self.bytes.len() {
            return None;
        }
        let code = self.bytes[self.pos];
        self.pos += 1;
        if code > OP_0 && code <= OP_PUSHDATA4 {
            return match self.push_payload(code) {
                Some(data) => Some(Op { code, data: Some(data), invalid: false }),
                None => {
                    // Truncated push: surface one invalid op, then stop.
                    self.pos = self.bytes.len();
                    Some(Op { code, data: None, invalid: true })
                }
            };
        }
        Some(Op::from_code(code))
    }
}

/// An immutable script byte buffer.
///
/// Equality and hashing are over the raw bytes. The HASH160 of the buffer
/// and the pay-to-script-hash output paying to it are computed lazily and
/// cached for the lifetime of the value.
#[derive(Clone, Default)]
pub struct Script {
    bytes: Vec<u8>,
    script_hash: OnceLock<Uint160>,
    payment_script: OnceLock<Box<Script>>,
}

impl Script {
    pub fn new() -> Script {
        Script::default()
    }

    /// Wrap raw bytes without copying.
    pub fn from_bytes(bytes: Vec<u8>) -> Script {
        Script { bytes, script_hash: OnceLock::new(), payment_script: OnceLock::new() }
    }

    pub fn from_hex(s: &str) -> Result<Script> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| Error::BadFormat(format!("invalid script hex: {}", e)))?;
        Ok(Script::from_bytes(bytes))
    }

    pub fn from_ops(ops: &[Op]) -> Script {
        let mut bytes = Vec::new();
        for op in ops {
            op.write_to(&mut bytes);
        }
        Script::from_bytes(bytes)
    }

    /// Parse the space-separated ASM text form: `OP_*` mnemonics, decimal
    /// numbers, and `0x`-prefixed hex pushes. The round trip with `Display`
    /// is semantic, not byte-identical.
    pub fn parse_asm(asm: &str) -> Result<Script> {
        let mut ops = Vec::new();
        for token in asm.split_whitespace() {
            if let Some(code) = opcodes::from_name(token) {
                ops.push(Op::from_code(code));
            } else if let Ok(n) = token.parse::<i64>() {
                ops.push(Op::push_int(n));
            } else if let Some(hex_str) = token.strip_prefix("0x") {
                let data = hex::decode(hex_str)
                    .map_err(|e| Error::BadFormat(format!("bad push token {}: {}", token, e)))?;
                ops.push(Op::push_data(&data));
            } else {
                return Err(Error::BadFormat(format!("unknown script token {}", token)));
            }
        }
        Ok(Script::from_ops(&ops))
    }

    pub fn push_op(self, code: u8) -> Script {
        self.append(Op::from_code(code))
    }

    pub fn push_data(self, data: &[u8]) -> Script {
        self.append(Op::push_data(data))
    }

    pub fn push_int(self, value: i64) -> Script {
        self.append(Op::push_int(value))
    }

    fn append(self, op: Op) -> Script {
        let mut bytes = self.bytes;
        op.write_to(&mut bytes);
        Script::from_bytes(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    pub fn reader(&self) -> ScriptReader {
        ScriptReader::new(&self.bytes)
    }

    pub fn ops(&self) -> Vec<Op> {
        self.reader().collect()
    }

    /// True when every opcode parses cleanly to the end of the buffer.
    pub fn is_valid(&self) -> bool {
        self.reader().all(|op| !op.invalid)
    }

    pub fn is_push_only(&self) -> bool {
        self.reader().all(|op| !op.invalid && op.is_push())
    }

    /// True when every push in the script uses the smallest encoding able to
    /// carry its payload.
    pub fn has_canonical_pushes(&self) -> bool {
        for op in self.reader() {
            if op.invalid {
                return false;
            }
            if op.code > OP_16 {
                continue;
            }
            let len = op.data.as_ref().map(Vec::len).unwrap_or(0);
            if op.code < OP_PUSHDATA1 && op.code > OP_0 && len == 1 {
                let value = op.data.as_ref().map(|d| d[0]).unwrap_or(0);
                if value <= 16 {
                    // Could have used OP_0 or OP_1..OP_16.
                    return false;
                }
            } else if op.code == OP_PUSHDATA1 && len < OP_PUSHDATA1 as usize {
                return false;
            } else if op.code == OP_PUSHDATA2 && len <= 0xff {
                return false;
            } else if op.code == OP_PUSHDATA4 && len <= 0xffff {
                return false;
            }
        }
        true
    }

    /// OP_HASH160 <20 bytes> OP_EQUAL, byte-exact.
    pub fn is_pay_to_script_hash(&self) -> bool {
        self.bytes.len() == 23
            && self.bytes[0] == OP_HASH160
            && self.bytes[1] == 0x14
            && self.bytes[22] == OP_EQUAL
    }

    /// A script starting with OP_RETURN can never be satisfied.
    pub fn is_unspendable(&self) -> bool {
        !self.bytes.is_empty() && self.bytes[0] == OP_RETURN
    }

    /// HASH160 of the serialized bytes.
    pub fn script_hash(&self) -> Uint160 {
        *self.script_hash.get_or_init(|| hash160(&self.bytes))
    }

    /// The pay-to-script-hash output script paying to this script.
    pub fn payment_script(&self) -> &Script {
        self.payment_script.get_or_init(|| {
            let mut bytes = Vec::with_capacity(23);
            bytes.push(OP_HASH160);
            bytes.push(0x14);
            bytes.extend_from_slice(&self.script_hash().to_le_bytes());
            bytes.push(OP_EQUAL);
            Box::new(Script::from_bytes(bytes))
        })
    }

    /// Remove every occurrence of `code`. When nothing matches the original
    /// buffer is returned unchanged.
    pub fn find_and_delete_op(&self, code: u8) -> Script {
        self.find_and_delete(|op| !op.is_push() && op.code == code)
    }

    /// Remove every minimal push of `data`. A non-minimal encoding of the
    /// same payload stays; empty data deletes nothing.
    pub fn find_and_delete_data(&self, data: &[u8]) -> Script {
        if data.is_empty() {
            return self.clone();
        }
        let code = Op::push_data(data).code;
        self.find_and_delete(|op| op.code == code && op.push_bytes() == Some(data))
    }

    fn find_and_delete(&self, matches: impl Fn(&Op) -> bool) -> Script {
        let mut kept = Vec::with_capacity(self.bytes.len());
        let mut found = 0usize;
        for op in self.reader() {
            if !op.invalid && matches(&op) {
                found += 1;
            } else {
                op.write_to(&mut kept);
            }
        }
        if found == 0 {
            return self.clone();
        }
        Script::from_bytes(kept)
    }

    /// Count signature operations. In accurate mode a CHECKMULTISIG preceded
    /// by OP_1..OP_16 counts that many keys, otherwise the 20-key maximum is
    /// assumed.
    pub fn sig_op_count(&self, accurate: bool) -> usize {
        let mut count = 0;
        let mut last_code = OP_INVALIDOPCODE;
        for op in self.reader() {
            if op.invalid {
                break;
            }
            match op.code {
                OP_CHECKSIG | OP_CHECKSIGVERIFY => count += 1,
                OP_CHECKMULTISIG | OP_CHECKMULTISIGVERIFY => {
                    if accurate && opcodes::is_small_int(last_code) {
                        count += (last_code - OP_1 + 1) as usize;
                    } else {
                        count += crate::constants::MAX_PUBKEYS_PER_MULTISIG;
                    }
                }
                _ => {}
            }
            last_code = op.code;
        }
        count
    }

    /// Accurate sigop count of the redeem script carried by `script_sig`,
    /// for a pay-to-script-hash output. Falls back to the plain count when
    /// this script is not P2SH.
    pub fn sig_op_count_p2sh(&self, script_sig: &Script) -> usize {
        if !self.is_pay_to_script_hash() {
            return self.sig_op_count(true);
        }
        let mut redeem: Option<Vec<u8>> = None;
        for op in script_sig.reader() {
            if op.invalid || !op.is_push() {
                return 0;
            }
            redeem = op.data;
        }
        match redeem {
            Some(bytes) => Script::from_bytes(bytes).sig_op_count(true),
            None => 0,
        }
    }

    /// The script code beginning after the n-th OP_CODESEPARATOR.
    /// `separator_index` of `-1` selects the whole script.
    pub fn extract_script_code(&self, separator_index: i32) -> Result<Script> {
        if separator_index == -1 {
            return Ok(self.clone());
        }
        let mut seen = 0i32;
        let mut reader = self.reader();
        while let Some(op) = reader.next() {
            if op.invalid {
                break;
            }
            if op.code == OP_CODESEPARATOR {
                seen += 1;
                if seen == separator_index + 1 {
                    return Ok(Script::from_bytes(self.bytes[reader.pos..].to_vec()));
                }
            }
        }
        Err(Error::BadData(format!(
            "code separator {} not found",
            separator_index
        )))
    }
}

impl PartialEq for Script {
    fn eq(&self, other: &Script) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for Script {}

impl std::hash::Hash for Script {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut first = true;
        for op in self.reader() {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "{}", op)?;
            first = false;
        }
        Ok(())
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Script({})", self)
    }
}

impl FromStr for Script {
    type Err = Error;

    fn from_str(s: &str) -> Result<Script> {
        Script::parse_asm(s)
    }
}

impl Serializable for Script {
    fn read(reader: &mut dyn Read) -> Result<Script> {
        let bytes = read_var_bytes(reader, crate::constants::MAX_BLOCK_SIZE)?;
        Ok(Script::from_bytes(bytes))
    }

    fn write(&self, writer: &mut dyn Write) -> io::Result<()> {
        write_var_bytes(&self.bytes, writer)
    }
}

impl Serialize for Script {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Script {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Script, D::Error> {
        let s = String::deserialize(deserializer)?;
        Script::from_hex(&s).map_err(D::Error::custom)
    }
}

/// Encode a script number: little-endian magnitude with the sign carried in
/// the top bit of the last byte.
pub fn encode_num(value: i64) -> Vec<u8> {
    if value == 0 {
        return Vec::new();
    }
    let negative = value < 0;
    let mut magnitude = value.unsigned_abs();
    let mut bytes = Vec::new();
    while magnitude > 0 {
        bytes.push((magnitude & 0xff) as u8);
        magnitude >>= 8;
    }
    let last = *bytes.last().unwrap_or(&0);
    if last & 0x80 != 0 {
        bytes.push(if negative { 0x80 } else { 0x00 });
    } else if negative {
        let last = bytes.len() - 1;
        bytes[last] |= 0x80;
    }
    bytes
}

/// Decode a script number of at most `max_len` bytes.
pub fn decode_num(
    data: &[u8],
    require_minimal: bool,
    max_len: usize,
) -> std::result::Result<i64, ScriptError> {
    if data.len() > max_len {
        return Err(ScriptError::NumberOverflow);
    }
    if data.is_empty() {
        return Ok(0);
    }
    if require_minimal {
        // The last byte must contribute; a bare sign byte is allowed only
        // when the byte below it would otherwise overflow into the sign bit.
        if data[data.len() - 1] & 0x7f == 0
            && (data.len() == 1 || data[data.len() - 2] & 0x80 == 0)
        {
            return Err(ScriptError::MinimalData);
        }
    }
    let mut value = 0i64;
    for (i, &byte) in data.iter().enumerate() {
        value |= (byte as i64) << (8 * i);
    }
    if data[data.len() - 1] & 0x80 != 0 {
        let mask = !(0x80i64 << (8 * (data.len() - 1)));
        value = -(value & mask);
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_push_selection() {
        assert_eq!(Op::push_data(&[]).code, OP_0);
        assert_eq!(Op::push_data(&[7]).code, OP_7);
        assert_eq!(Op::push_data(&[0x81]).code, OP_1NEGATE);
        assert_eq!(Op::push_data(&[17]).code, 1);
        assert_eq!(Op::push_data(&[0u8; 75]).code, 75);
        assert_eq!(Op::push_data(&[0u8; 76]).code, OP_PUSHDATA1);
        assert_eq!(Op::push_data(&[0u8; 256]).code, OP_PUSHDATA2);
        assert_eq!(Op::push_data(&[0u8; 65536]).code, OP_PUSHDATA4);
    }

    #[test]
    fn op_wire_round_trip() {
        let ops = vec![
            Op::push_int(0),
            Op::push_int(5),
            Op::push_int(-1),
            Op::push_int(1000),
            Op::push_data(&[0xde, 0xad, 0xbe, 0xef]),
            Op::from_code(OP_DUP),
            Op::from_code(OP_CHECKSIG),
        ];
        let script = Script::from_ops(&ops);
        assert!(script.is_valid());
        assert_eq!(script.ops(), ops);
    }

    #[test]
    fn reader_flags_truncated_push() {
        // Direct push of 5 bytes with only 2 present.
        let script = Script::from_bytes(vec![0x05, 0xaa, 0xbb]);
        let ops = script.ops();
        assert_eq!(ops.len(), 1);
        assert!(ops[0].invalid);
        assert!(!script.is_valid());

        // PUSHDATA2 with a missing length byte.
        let script = Script::from_bytes(vec![OP_PUSHDATA2, 0x01]);
        let ops = script.ops();
        assert_eq!(ops.len(), 1);
        assert!(ops[0].invalid);
    }

    #[test]
    fn canonical_pushes() {
        let good = Script::new()
            .push_int(0)
            .push_int(16)
            .push_data(&[0x21; 33])
            .push_op(OP_CHECKSIG);
        assert!(good.has_canonical_pushes());

        // Direct one-byte push of a value OP_5 could carry.
        let bad = Script::from_bytes(vec![0x01, 0x05]);
        assert!(!bad.has_canonical_pushes());

        // PUSHDATA1 for a payload short enough for a direct push.
        let bad = Script::from_bytes(vec![OP_PUSHDATA1, 0x02, 0xaa, 0xbb]);
        assert!(!bad.has_canonical_pushes());
    }

    #[test]
    fn find_and_delete() {
        let sig = vec![0x30, 0x45, 0x01, 0x02];
        let script = Script::new()
            .push_data(&sig)
            .push_op(OP_DUP)
            .push_data(&sig)
            .push_op(OP_CHECKSIG);
        let stripped = script.find_and_delete_data(&sig);
        assert_eq!(
            stripped,
            Script::new().push_op(OP_DUP).push_op(OP_CHECKSIG)
        );

        // No match leaves the script untouched.
        let same = script.find_and_delete_data(&[0xff]);
        assert_eq!(same, script);

        let no_seps = script.find_and_delete_op(OP_CODESEPARATOR);
        assert_eq!(no_seps, script);

        // Empty data deletes nothing, not every OP_0.
        let zeros = Script::new().push_op(OP_0).push_op(OP_DUP).push_op(OP_0);
        assert_eq!(zeros.find_and_delete_data(&[]), zeros);

        // A non-minimal encoding of the payload is not a match.
        let loose = Script::from_bytes(vec![OP_PUSHDATA1, 0x04, 0x30, 0x45, 0x01, 0x02]);
        assert_eq!(loose.find_and_delete_data(&sig), loose);
    }

    #[test]
    fn p2sh_shape() {
        let redeem = Script::new().push_int(1);
        let payment = redeem.payment_script();
        assert!(payment.is_pay_to_script_hash());
        assert_eq!(payment.len(), 23);
        assert!(!redeem.is_pay_to_script_hash());
        assert_eq!(payment.as_bytes()[2..22], redeem.script_hash().to_le_bytes());
    }

    #[test]
    fn sig_op_counting() {
        let script = Script::new()
            .push_op(OP_CHECKSIG)
            .push_op(OP_2)
            .push_op(OP_CHECKMULTISIG);
        assert_eq!(script.sig_op_count(true), 3);
        assert_eq!(script.sig_op_count(false), 21);

        // Multisig without a preceding small int assumes the maximum.
        let script = Script::new().push_op(OP_CHECKMULTISIGVERIFY);
        assert_eq!(script.sig_op_count(true), 20);
    }

    #[test]
    fn p2sh_sig_op_count_reads_redeem_script() {
        let redeem = Script::new()
            .push_op(OP_2)
            .push_op(OP_CHECKMULTISIG);
        let payment = redeem.payment_script().clone();
        let script_sig = Script::new().push_data(redeem.as_bytes());
        assert_eq!(payment.sig_op_count_p2sh(&script_sig), 2);

        // Non push-only scriptSig contributes nothing.
        let bad_sig = Script::new().push_op(OP_DUP);
        assert_eq!(payment.sig_op_count_p2sh(&bad_sig), 0);
    }

    #[test]
    fn script_code_extraction() {
        let script = Script::new()
            .push_op(OP_1)
            .push_op(OP_CODESEPARATOR)
            .push_op(OP_2)
            .push_op(OP_CODESEPARATOR)
            .push_op(OP_3);
        assert_eq!(script.extract_script_code(-1).unwrap(), script);
        assert_eq!(
            script.extract_script_code(0).unwrap(),
            Script::new()
                .push_op(OP_2)
                .push_op(OP_CODESEPARATOR)
                .push_op(OP_3)
        );
        assert_eq!(
            script.extract_script_code(1).unwrap(),
            Script::new().push_op(OP_3)
        );
        assert!(script.extract_script_code(2).is_err());
    }

    #[test]
    fn asm_round_trip() {
        let script = Script::new()
            .push_op(OP_DUP)
            .push_op(OP_HASH160)
            .push_data(&[0x11; 20])
            .push_op(OP_EQUALVERIFY)
            .push_op(OP_CHECKSIG);
        let asm = script.to_string();
        assert_eq!(
            asm,
            format!("OP_DUP OP_HASH160 0x{} OP_EQUALVERIFY OP_CHECKSIG", hex::encode([0x11; 20]))
        );
        assert_eq!(Script::parse_asm(&asm).unwrap(), script);

        let numeric = Script::parse_asm("1000 OP_ADD -5 OP_EQUAL").unwrap();
        assert_eq!(numeric.to_string(), "1000 OP_ADD -5 OP_EQUAL");
        assert!(Script::parse_asm("OP_NOT_A_THING").is_err());
    }

    #[test]
    fn script_numbers() {
        let cases: [(i64, &[u8]); 8] = [
            (0, &[]),
            (1, &[0x01]),
            (-1, &[0x81]),
            (127, &[0x7f]),
            (128, &[0x80, 0x00]),
            (-128, &[0x80, 0x80]),
            (255, &[0xff, 0x00]),
            (0x0102_0304, &[0x04, 0x03, 0x02, 0x01]),
        ];
        for (value, bytes) in cases {
            assert_eq!(encode_num(value), bytes, "encoding {}", value);
            assert_eq!(decode_num(bytes, true, 4).unwrap(), value);
        }
        // Non-minimal zero padding rejected only when asked.
        assert_eq!(decode_num(&[0x01, 0x00], false, 4).unwrap(), 1);
        assert_eq!(decode_num(&[0x01, 0x00], true, 4), Err(ScriptError::MinimalData));
        assert_eq!(decode_num(&[0x01; 5], true, 4), Err(ScriptError::NumberOverflow));
    }

    #[test]
    fn hex_and_serde_round_trip() {
        let script = Script::new().push_op(OP_1).push_op(OP_CHECKSIG);
        let restored = Script::from_hex(&script.to_hex()).unwrap();
        assert_eq!(restored, script);

        let json = serde_json::to_string(&script).unwrap();
        assert_eq!(serde_json::from_str::<Script>(&json).unwrap(), script);
    }

    #[test]
    fn unspendable_and_push_only() {
        assert!(Script::new().push_op(OP_RETURN).is_unspendable());
        assert!(!Script::new().push_op(OP_1).is_unspendable());
        assert!(Script::new().push_int(3).push_data(&[1, 2, 3]).is_push_only());
        assert!(!Script::new().push_op(OP_DUP).is_push_only());
    }
}
