//! Consensus constants for the transaction model and script engine

/// Maximum money supply: 21,000,000 BTC in satoshis
pub const MAX_MONEY: i64 = 21_000_000 * 100_000_000;

/// Maximum serialized transaction size (legacy block size bound)
pub const MAX_BLOCK_SIZE: usize = 1_000_000;

/// Maximum script length
pub const MAX_SCRIPT_SIZE: usize = 10_000;

/// Maximum size of a single pushed stack element
pub const MAX_SCRIPT_ELEMENT_SIZE: usize = 520;

/// Maximum number of non-push operations per script
pub const MAX_OPS_PER_SCRIPT: usize = 201;

/// Maximum combined stack + altstack size during script execution
pub const MAX_STACK_SIZE: usize = 1000;

/// Maximum number of public keys in a CHECKMULTISIG
pub const MAX_PUBKEYS_PER_MULTISIG: usize = 20;

/// Lock times below this threshold are block heights, above are unix times
pub const LOCKTIME_THRESHOLD: u32 = 500_000_000;

/// Sequence number that makes an input final
pub const SEQUENCE_FINAL: u32 = 0xffff_ffff;

/// BIP-68: if set, the sequence number carries no relative lock-time meaning
pub const SEQUENCE_LOCKTIME_DISABLE_FLAG: u32 = 1 << 31;

/// BIP-68: if set, the lock-time value counts ~512s intervals, else blocks
pub const SEQUENCE_LOCKTIME_TYPE_FLAG: u32 = 1 << 22;

/// BIP-68: mask extracting the relative lock-time value
pub const SEQUENCE_LOCKTIME_MASK: u32 = 0x0000_ffff;

/// BIP-68: time-based lock values are shifted by this many bits (512 = 2^9)
pub const SEQUENCE_LOCKTIME_GRANULARITY: u32 = 9;

/// Weight scale factor used by the virtual-size formula
pub const WITNESS_SCALE_FACTOR: usize = 4;

/// Satoshis per BTC
pub const SATOSHIS_PER_BTC: i64 = 100_000_000;
