//! Minimal XDR (RFC 4506) primitives.
//!
//! Only the pieces the transaction envelope codec needs: big-endian
//! integers, booleans, fixed and variable-length opaques with 4-byte
//! alignment padding.

use crate::error::EnvelopeError;

pub struct XdrReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> XdrReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], EnvelopeError> {
        if self.pos + n > self.data.len() {
            return Err(EnvelopeError::Xdr(format!(
                "truncated: need {n} bytes at offset {}, have {}",
                self.pos,
                self.data.len() - self.pos,
            )));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u32(&mut self) -> Result<u32, EnvelopeError> {
        // XDR integers are big-endian.
        let b = self.take(4)?;
        Ok(u32::from_be_bytes(b.try_into().unwrap()))
    }

    pub fn read_u64(&mut self) -> Result<u64, EnvelopeError> {
        let b = self.take(8)?;
        Ok(u64::from_be_bytes(b.try_into().unwrap()))
    }

    pub fn read_i64(&mut self) -> Result<i64, EnvelopeError> {
        let b = self.take(8)?;
        Ok(i64::from_be_bytes(b.try_into().unwrap()))
    }

    pub fn read_bool(&mut self) -> Result<bool, EnvelopeError> {
        match self.read_u32()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(EnvelopeError::Xdr(format!("invalid bool: {other}"))),
        }
    }

    pub fn read_fixed<const N: usize>(&mut self) -> Result<[u8; N], EnvelopeError> {
        let b = self.take(N)?;
        Ok(b.try_into().unwrap())
    }

    /// Variable-length opaque: u32 length, bytes, zero padding to 4.
    pub fn read_var_bytes(&mut self, max: usize) -> Result<Vec<u8>, EnvelopeError> {
        let len = self.read_u32()? as usize;
        if len > max {
            return Err(EnvelopeError::Xdr(format!(
                "opaque length {len} exceeds limit {max}"
            )));
        }
        let bytes = self.take(len)?.to_vec();
        let pad = (4 - len % 4) % 4;
        let padding = self.take(pad)?;
        if padding.iter().any(|&b| b != 0) {
            return Err(EnvelopeError::Xdr("nonzero padding".into()));
        }
        Ok(bytes)
    }

    pub fn read_string(&mut self, max: usize) -> Result<String, EnvelopeError> {
        let bytes = self.read_var_bytes(max)?;
        String::from_utf8(bytes).map_err(|e| EnvelopeError::Xdr(format!("invalid utf-8: {e}")))
    }

    /// True when every byte has been consumed.
    pub fn is_done(&self) -> bool {
        self.pos == self.data.len()
    }
}

#[derive(Default)]
pub struct XdrWriter {
    buf: Vec<u8>,
}

impl XdrWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_bool(&mut self, v: bool) {
        self.write_u32(v as u32);
    }

    pub fn write_fixed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_var_bytes(&mut self, bytes: &[u8]) {
        self.write_u32(bytes.len() as u32);
        self.buf.extend_from_slice(bytes);
        let pad = (4 - bytes.len() % 4) % 4;
        self.buf.extend_from_slice(&[0u8; 3][..pad]);
    }

    pub fn write_string(&mut self, s: &str) {
        self.write_var_bytes(s.as_bytes());
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}
