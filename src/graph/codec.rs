//! Big-endian primitives shared by the record and proposal encodings

use super::record::RecordError;

/// Forward-only reader over an encoded buffer.
///
/// Tracks the byte offset so decode failures can point at the
/// position where the input stopped making sense.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_u8(&mut self) -> Result<u8, RecordError> {
        let bytes = self.take(1)?;
        Ok(bytes[0])
    }

    pub fn read_i32(&mut self) -> Result<i32, RecordError> {
        let bytes = self.take(4)?;
        Ok(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], RecordError> {
        if self.remaining() < len {
            return Err(RecordError::Truncated {
                offset: self.offset,
                needed: len - self.remaining(),
            });
        }
        let bytes = &self.buf[self.offset..self.offset + len];
        self.offset += len;
        Ok(bytes)
    }
}

pub fn put_i32(buf: &mut Vec<u8>, value: i32) {
    buf.extend_from_slice(&value.to_be_bytes());
}
