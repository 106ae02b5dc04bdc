//! Fixed-width 256-bit and 160-bit hash values
//!
//! These are the identifier primitives threaded through the whole model:
//! transaction ids, script hashes, public key hashes. Internally each value
//! is a row of little-endian 32-bit limbs; comparison runs from the most
//! significant limb down, so ordering agrees with the numeric interpretation.
//!
//! Display order and wire order differ: the hex text form is the
//! *reverse-byte-order* (big-endian) rendering, while the wire codec emits
//! raw little-endian bytes.

use crate::encode::Serializable;
use crate::error::{Error, Result};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::io;
use std::io::{Read, Write};
use std::str::FromStr;

macro_rules! impl_uint {
    ($name:ident, $limbs:expr, $bytes:expr, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name {
            limbs: [u32; $limbs],
        }

        impl $name {
            pub const ZERO: $name = $name { limbs: [0; $limbs] };

            pub const ONE: $name = {
                let mut limbs = [0u32; $limbs];
                limbs[0] = 1;
                $name { limbs }
            };

            /// Width of the value in bytes.
            pub const SIZE: usize = $bytes;

            pub fn from_u64(value: u64) -> $name {
                let mut limbs = [0u32; $limbs];
                limbs[0] = value as u32;
                limbs[1] = (value >> 32) as u32;
                $name { limbs }
            }

            /// Construct from raw wire bytes (little-endian).
            pub fn from_le_bytes(bytes: [u8; $bytes]) -> $name {
                let mut limbs = [0u32; $limbs];
                for (i, limb) in limbs.iter_mut().enumerate() {
                    let mut word = [0u8; 4];
                    word.copy_from_slice(&bytes[i * 4..i * 4 + 4]);
                    *limb = u32::from_le_bytes(word);
                }
                $name { limbs }
            }

            /// Construct from display-order (big-endian) bytes.
            pub fn from_be_bytes(mut bytes: [u8; $bytes]) -> $name {
                bytes.reverse();
                $name::from_le_bytes(bytes)
            }

            /// Parse the big-endian hex text form. An optional `0x` prefix
            /// and surrounding whitespace are accepted; anything else that is
            /// not exactly the right number of hex digits is a format error.
            pub fn from_hex(s: &str) -> Result<$name> {
                let s = s.trim();
                let s = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
                if s.len() != $bytes * 2 {
                    return Err(Error::BadFormat(format!(
                        "expected {} hex characters, got {}",
                        $bytes * 2,
                        s.len()
                    )));
                }
                let decoded = hex::decode(s)
                    .map_err(|e| Error::BadFormat(format!("invalid hex: {}", e)))?;
                let mut bytes = [0u8; $bytes];
                bytes.copy_from_slice(&decoded);
                Ok($name::from_be_bytes(bytes))
            }

            /// Raw wire bytes (little-endian).
            pub fn to_le_bytes(&self) -> [u8; $bytes] {
                let mut bytes = [0u8; $bytes];
                for (i, limb) in self.limbs.iter().enumerate() {
                    bytes[i * 4..i * 4 + 4].copy_from_slice(&limb.to_le_bytes());
                }
                bytes
            }

            /// Display-order (big-endian) bytes.
            pub fn to_be_bytes(&self) -> [u8; $bytes] {
                let mut bytes = self.to_le_bytes();
                bytes.reverse();
                bytes
            }

            /// The byte at `index` of the little-endian representation.
            pub fn byte(&self, index: usize) -> u8 {
                (self.limbs[index / 4] >> ((index % 4) * 8)) as u8
            }

            pub fn low_u64(&self) -> u64 {
                self.limbs[0] as u64 | ((self.limbs[1] as u64) << 32)
            }

            pub fn is_zero(&self) -> bool {
                self.limbs.iter().all(|&limb| limb == 0)
            }
        }

        impl Ord for $name {
            fn cmp(&self, other: &$name) -> Ordering {
                for i in (0..$limbs).rev() {
                    match self.limbs[i].cmp(&other.limbs[i]) {
                        Ordering::Equal => continue,
                        ordering => return ordering,
                    }
                }
                Ordering::Equal
            }
        }

        impl PartialOrd for $name {
            fn partial_cmp(&self, other: &$name) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}", hex::encode(self.to_be_bytes()))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}", self)
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<$name> {
                $name::from_hex(s)
            }
        }

        impl Serializable for $name {
            fn read(reader: &mut dyn Read) -> Result<$name> {
                let mut bytes = [0u8; $bytes];
                reader.read_exact(&mut bytes)?;
                Ok($name::from_le_bytes(bytes))
            }

            fn write(&self, writer: &mut dyn Write) -> io::Result<()> {
                writer.write_all(&self.to_le_bytes())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<$name, D::Error> {
                let s = String::deserialize(deserializer)?;
                $name::from_hex(&s).map_err(D::Error::custom)
            }
        }
    };
}

impl_uint!(
    Uint256,
    8,
    32,
    "256-bit hash value: transaction ids and sighashes."
);
impl_uint!(
    Uint160,
    5,
    20,
    "160-bit hash value: public key hashes and script hashes."
);
