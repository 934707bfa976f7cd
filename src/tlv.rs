// SPDX-License-Identifier: MIT OR Apache-2.0

//! Type-length-value encoding in the NDN packet-format style.
//!
//! Types and lengths are variable-width numbers: one byte below 253, otherwise a marker byte
//! (253/254/255) followed by the value in 2, 4 or 8 big-endian bytes. Numeric values encode as
//! non-negative integers of minimal width 1, 2, 4 or 8 bytes.
//!
//! <https://named-data.net/doc/NDN-packet-spec/current/tlv.html>
use bytes::{BufMut, BytesMut};
use thiserror::Error;

/// Appends TLV blocks to a growable buffer.
#[derive(Debug, Default)]
pub struct TlvWriter {
    buf: BytesMut,
}

impl TlvWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one block with raw bytes as value.
    pub fn put_bytes(&mut self, typ: u32, value: &[u8]) {
        put_varnum(&mut self.buf, u64::from(typ));
        put_varnum(&mut self.buf, value.len() as u64);
        self.buf.put_slice(value);
    }

    /// Appends one block holding a non-negative integer of minimal width.
    pub fn put_number(&mut self, typ: u32, value: u64) {
        let width = number_width(value);
        put_varnum(&mut self.buf, u64::from(typ));
        put_varnum(&mut self.buf, width as u64);
        self.buf
            .put_slice(&value.to_be_bytes()[8 - width..]);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf.to_vec()
    }
}

/// Walks TLV blocks of an encoded buffer in order.
#[derive(Debug)]
pub struct TlvReader<'a> {
    buf: &'a [u8],
}

impl<'a> TlvReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Reads the next block, requiring it to carry the expected type.
    pub fn next_bytes(&mut self, expected: u32) -> Result<&'a [u8], TlvError> {
        let (typ, value) = self.next_block()?;
        if typ != u64::from(expected) {
            return Err(TlvError::UnexpectedType {
                expected,
                found: typ,
            });
        }
        Ok(value)
    }

    /// Reads the next block as a non-negative integer, requiring the expected type.
    pub fn next_number(&mut self, expected: u32) -> Result<u64, TlvError> {
        let value = self.next_bytes(expected)?;
        read_number(value)
    }

    /// Reads the next block if one is present and carries the expected type.
    ///
    /// Leaves the reader untouched when the buffer is exhausted or the type differs.
    pub fn next_bytes_opt(&mut self, expected: u32) -> Result<Option<&'a [u8]>, TlvError> {
        if self.buf.is_empty() {
            return Ok(None);
        }
        let mut probe = TlvReader { buf: self.buf };
        let (typ, value) = probe.next_block()?;
        if typ != u64::from(expected) {
            return Ok(None);
        }
        self.buf = probe.buf;
        Ok(Some(value))
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn next_block(&mut self) -> Result<(u64, &'a [u8]), TlvError> {
        let typ = self.read_varnum()?;
        let len = self.read_varnum()? as usize;
        if self.buf.len() < len {
            return Err(TlvError::Truncated);
        }
        let (value, rest) = self.buf.split_at(len);
        self.buf = rest;
        Ok((typ, value))
    }

    fn read_varnum(&mut self) -> Result<u64, TlvError> {
        let (first, rest) = self.buf.split_first().ok_or(TlvError::Truncated)?;
        let (width, buf) = match first {
            253 => (2, rest),
            254 => (4, rest),
            255 => (8, rest),
            byte => {
                self.buf = rest;
                return Ok(u64::from(*byte));
            }
        };
        if buf.len() < width {
            return Err(TlvError::Truncated);
        }
        let (value, rest) = buf.split_at(width);
        self.buf = rest;
        read_number(value)
    }
}

fn put_varnum(buf: &mut BytesMut, value: u64) {
    if value < 253 {
        buf.put_u8(value as u8);
    } else if value <= u64::from(u16::MAX) {
        buf.put_u8(253);
        buf.put_u16(value as u16);
    } else if value <= u64::from(u32::MAX) {
        buf.put_u8(254);
        buf.put_u32(value as u32);
    } else {
        buf.put_u8(255);
        buf.put_u64(value);
    }
}

fn number_width(value: u64) -> usize {
    if value <= u64::from(u8::MAX) {
        1
    } else if value <= u64::from(u16::MAX) {
        2
    } else if value <= u64::from(u32::MAX) {
        4
    } else {
        8
    }
}

/// Decodes a big-endian non-negative integer of width 1, 2, 4 or 8.
pub fn read_number(bytes: &[u8]) -> Result<u64, TlvError> {
    if !matches!(bytes.len(), 1 | 2 | 4 | 8) {
        return Err(TlvError::BadNumberWidth(bytes.len()));
    }
    let mut value = 0u64;
    for byte in bytes {
        value = value << 8 | u64::from(*byte);
    }
    Ok(value)
}

/// Encodes a non-negative integer of minimal width.
pub fn write_number(value: u64) -> Vec<u8> {
    let width = number_width(value);
    value.to_be_bytes()[8 - width..].to_vec()
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TlvError {
    #[error("tlv block extends past end of buffer")]
    Truncated,

    #[error("expected tlv type {expected}, found {found}")]
    UnexpectedType { expected: u32, found: u64 },

    #[error("{0} bytes is not a valid non-negative integer width")]
    BadNumberWidth(usize),
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::{TlvError, TlvReader, TlvWriter};

    #[test]
    fn blocks_round_trip() {
        let mut writer = TlvWriter::new();
        writer.put_number(36, 1_700_000_000_000_000);
        writer.put_bytes(150, &[0xab; 32]);
        writer.put_bytes(130, &[]);
        let encoded = writer.into_bytes();

        let mut reader = TlvReader::new(&encoded);
        assert_eq!(reader.next_number(36).unwrap(), 1_700_000_000_000_000);
        assert_eq!(reader.next_bytes(150).unwrap(), &[0xab; 32]);
        assert_eq!(reader.next_bytes(130).unwrap(), &[] as &[u8]);
        assert!(reader.is_empty());
    }

    #[test]
    fn wide_types_and_lengths() {
        let mut writer = TlvWriter::new();
        writer.put_bytes(300, &vec![1u8; 300]);
        let encoded = writer.into_bytes();

        // Type 300 and length 300 both need the 253-marker form.
        assert_eq!(encoded[0], 253);
        assert_eq!(&encoded[1..3], &300u16.to_be_bytes());
        assert_eq!(encoded[3], 253);

        let mut reader = TlvReader::new(&encoded);
        assert_eq!(reader.next_bytes(300).unwrap().len(), 300);
    }

    #[test]
    fn unexpected_type_is_reported() {
        let mut writer = TlvWriter::new();
        writer.put_number(36, 7);
        let encoded = writer.into_bytes();

        let mut reader = TlvReader::new(&encoded);
        assert_eq!(
            reader.next_bytes(150).unwrap_err(),
            TlvError::UnexpectedType {
                expected: 150,
                found: 36
            }
        );
    }

    #[test]
    fn truncated_buffers_are_rejected() {
        let mut writer = TlvWriter::new();
        writer.put_bytes(150, &[1, 2, 3, 4]);
        let encoded = writer.into_bytes();

        for cut in 1..encoded.len() {
            let mut reader = TlvReader::new(&encoded[..cut]);
            assert_eq!(reader.next_bytes(150).unwrap_err(), TlvError::Truncated);
        }
    }

    #[test]
    fn optional_block() {
        let mut writer = TlvWriter::new();
        writer.put_number(36, 1);
        let encoded = writer.into_bytes();

        let mut reader = TlvReader::new(&encoded);
        // Peeking for a different type leaves the block readable.
        assert_eq!(reader.next_bytes_opt(130).unwrap(), None);
        assert_eq!(reader.next_number(36).unwrap(), 1);
        assert_eq!(reader.next_bytes_opt(130).unwrap(), None);
    }

    proptest! {
        #[test]
        fn numbers_round_trip(value in any::<u64>()) {
            let mut writer = TlvWriter::new();
            writer.put_number(36, value);
            let encoded = writer.into_bytes();

            let mut reader = TlvReader::new(&encoded);
            prop_assert_eq!(reader.next_number(36).unwrap(), value);
            prop_assert!(reader.is_empty());
        }
    }
}
