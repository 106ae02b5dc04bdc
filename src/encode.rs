//! Binary wire codec primitives
//!
//! Everything on the wire is little-endian; list lengths and script payloads
//! are prefixed with the Bitcoin compact-size varint.

use crate::error::{Error, Result};
use std::io;
use std::io::{Read, Write};

/// A value with a canonical binary wire form.
///
/// Reading and writing are symmetric: `read(write(v)) == v`, and for any
/// valid encoding, parse-then-serialize reproduces the original bytes.
pub trait Serializable: Sized {
    fn read(reader: &mut dyn Read) -> Result<Self>;

    fn write(&self, writer: &mut dyn Write) -> io::Result<()>;

    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        self.write(&mut bytes).expect("writing to a Vec cannot fail");
        bytes
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::read(&mut io::Cursor::new(bytes))
    }

    fn serialized_size(&self) -> usize {
        self.to_bytes().len()
    }
}

/// Compact-size variable-length integers.
///
/// Values below 0xFD are one byte; 0xFD, 0xFE and 0xFF prefix 2-, 4- and
/// 8-byte little-endian payloads respectively.
pub mod var_int {
    use super::*;

    pub fn read(reader: &mut dyn Read) -> Result<u64> {
        let mut tag = [0u8; 1];
        reader.read_exact(&mut tag)?;
        match tag[0] {
            0xff => {
                let mut bytes = [0u8; 8];
                reader.read_exact(&mut bytes)?;
                Ok(u64::from_le_bytes(bytes))
            }
            0xfe => {
                let mut bytes = [0u8; 4];
                reader.read_exact(&mut bytes)?;
                Ok(u32::from_le_bytes(bytes) as u64)
            }
            0xfd => {
                let mut bytes = [0u8; 2];
                reader.read_exact(&mut bytes)?;
                Ok(u16::from_le_bytes(bytes) as u64)
            }
            n => Ok(n as u64),
        }
    }

    pub fn write(value: u64, writer: &mut dyn Write) -> io::Result<()> {
        if value < 0xfd {
            writer.write_all(&[value as u8])
        } else if value <= 0xffff {
            writer.write_all(&[0xfd])?;
            writer.write_all(&(value as u16).to_le_bytes())
        } else if value <= 0xffff_ffff {
            writer.write_all(&[0xfe])?;
            writer.write_all(&(value as u32).to_le_bytes())
        } else {
            writer.write_all(&[0xff])?;
            writer.write_all(&value.to_le_bytes())
        }
    }

    pub fn size(value: u64) -> usize {
        if value < 0xfd {
            1
        } else if value <= 0xffff {
            3
        } else if value <= 0xffff_ffff {
            5
        } else {
            9
        }
    }
}

pub fn read_u32_le(reader: &mut dyn Read) -> Result<u32> {
    let mut bytes = [0u8; 4];
    reader.read_exact(&mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

pub fn read_i64_le(reader: &mut dyn Read) -> Result<i64> {
    let mut bytes = [0u8; 8];
    reader.read_exact(&mut bytes)?;
    Ok(i64::from_le_bytes(bytes))
}

/// Read a compact-size-prefixed byte vector, bounded to reject absurd
/// lengths before allocating.
pub fn read_var_bytes(reader: &mut dyn Read, max: usize) -> Result<Vec<u8>> {
    let len = var_int::read(reader)?;
    if len > max as u64 {
        return Err(Error::BadData(format!("length {} exceeds maximum {}", len, max)));
    }
    let mut bytes = vec![0u8; len as usize];
    reader.read_exact(&mut bytes)?;
    Ok(bytes)
}

pub fn write_var_bytes(bytes: &[u8], writer: &mut dyn Write) -> io::Result<()> {
    var_int::write(bytes.len() as u64, writer)?;
    writer.write_all(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn var_int_boundaries() {
        let cases: [(u64, usize); 8] = [
            (0, 1),
            (0xfc, 1),
            (0xfd, 3),
            (0xffff, 3),
            (0x10000, 5),
            (0xffff_ffff, 5),
            (0x1_0000_0000, 9),
            (u64::MAX, 9),
        ];
        for (value, expected_size) in cases {
            let mut bytes = Vec::new();
            var_int::write(value, &mut bytes).unwrap();
            assert_eq!(bytes.len(), expected_size);
            assert_eq!(var_int::size(value), expected_size);
            assert_eq!(var_int::read(&mut Cursor::new(&bytes)).unwrap(), value);
        }
    }

    #[test]
    fn var_int_exact_encodings() {
        let mut bytes = Vec::new();
        var_int::write(0xfd, &mut bytes).unwrap();
        assert_eq!(bytes, vec![0xfd, 0xfd, 0x00]);

        bytes.clear();
        var_int::write(0x1234_5678, &mut bytes).unwrap();
        assert_eq!(bytes, vec![0xfe, 0x78, 0x56, 0x34, 0x12]);
    }

    #[test]
    fn var_bytes_bounded() {
        let mut bytes = Vec::new();
        write_var_bytes(&[1, 2, 3], &mut bytes).unwrap();
        assert_eq!(read_var_bytes(&mut Cursor::new(&bytes), 10).unwrap(), vec![1, 2, 3]);
        assert!(read_var_bytes(&mut Cursor::new(&bytes), 2).is_err());
    }
}
