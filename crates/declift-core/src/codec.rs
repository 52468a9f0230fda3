//! Framed binary records.
//!
//! Types and expressions are persisted as nested records. Every record is
//! laid out as
//!
//! ```text
//! tag: u8 | oper: uleb | body_len: uleb | body | FID_EXP_END: uleb | 0: uleb
//! ```
//!
//! The body length lets a reader skip a record whose tag it does not know
//! without losing its place in the enclosing stream. Integers use LEB128,
//! 7 bits per byte with the high bit flagging continuation.

use crate::CodecError;

/// Field id that closes every record. It is always followed by a zero length.
pub const FID_EXP_END: u64 = 0x7e;

/// Append an unsigned LEB128 value.
pub fn encode_uleb128(mut value: u64, out: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Append a signed LEB128 value.
pub fn encode_sleb128(mut value: i64, out: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        let done = (value == 0 && byte & 0x40 == 0) || (value == -1 && byte & 0x40 != 0);
        if done {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Decode an unsigned LEB128 value from bytes.
/// Returns the value and the number of bytes consumed.
pub fn decode_uleb128(data: &[u8]) -> Result<(u64, usize), CodecError> {
    let mut result: u64 = 0;
    let mut shift: u32 = 0;
    let mut index = 0;

    loop {
        let Some(&byte) = data.get(index) else {
            return Err(CodecError::truncated(index + 1, data.len(), "ULEB128 value"));
        };
        index += 1;

        let low_bits = (byte & 0x7F) as u64;
        if shift >= 64 || (shift == 63 && low_bits > 1) {
            return Err(CodecError::InvalidValue("ULEB128 overflow"));
        }

        result |= low_bits << shift;
        shift += 7;

        if byte & 0x80 == 0 {
            break;
        }
    }

    Ok((result, index))
}

/// Decode a signed LEB128 value from bytes.
/// Returns the value and the number of bytes consumed.
pub fn decode_sleb128(data: &[u8]) -> Result<(i64, usize), CodecError> {
    let mut result: i64 = 0;
    let mut shift: u32 = 0;
    let mut index = 0;
    let mut last_byte;

    loop {
        let Some(&byte) = data.get(index) else {
            return Err(CodecError::truncated(index + 1, data.len(), "SLEB128 value"));
        };
        last_byte = byte;
        index += 1;

        if shift >= 64 {
            return Err(CodecError::InvalidValue("SLEB128 overflow"));
        }
        result |= ((byte & 0x7F) as i64) << shift;
        shift += 7;

        if byte & 0x80 == 0 {
            break;
        }
    }

    // Sign extend from bit 6 of the final byte
    if shift < 64 && (last_byte & 0x40) != 0 {
        result |= !0i64 << shift;
    }

    Ok((result, index))
}

/// Builds a byte stream of records.
#[derive(Debug, Default, Clone)]
pub struct RecordWriter {
    buf: Vec<u8>,
}

impl RecordWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consume the writer, returning its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_uleb(&mut self, value: u64) {
        encode_uleb128(value, &mut self.buf);
    }

    pub fn write_sleb(&mut self, value: i64) {
        encode_sleb128(value, &mut self.buf);
    }

    /// Write a float as its little-endian bit pattern.
    pub fn write_f64(&mut self, value: f64) {
        self.buf.extend_from_slice(&value.to_bits().to_le_bytes());
    }

    /// Write a length-prefixed UTF-8 string.
    pub fn write_str(&mut self, value: &str) {
        self.write_uleb(value.len() as u64);
        self.buf.extend_from_slice(value.as_bytes());
    }

    /// Write one complete record. `body` fills in the payload, which may
    /// itself contain nested records.
    pub fn record(&mut self, tag: u8, oper: u64, body: impl FnOnce(&mut RecordWriter)) {
        let mut inner = RecordWriter::new();
        body(&mut inner);

        self.write_u8(tag);
        self.write_uleb(oper);
        self.write_uleb(inner.buf.len() as u64);
        self.buf.extend_from_slice(&inner.buf);
        self.write_uleb(FID_EXP_END);
        self.write_uleb(0);
    }
}

/// Reads values and records back from a byte slice.
#[derive(Debug, Clone)]
pub struct RecordReader<'a> {
    data: &'a [u8],
    pos: usize,
}

/// A record header together with a reader over its body.
#[derive(Debug, Clone)]
pub struct Record<'a> {
    pub tag: u8,
    pub oper: u64,
    pub body: RecordReader<'a>,
}

impl<'a> RecordReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current offset into the underlying slice.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, len: usize, context: &'static str) -> Result<&'a [u8], CodecError> {
        if self.remaining() < len {
            return Err(CodecError::truncated(len, self.remaining(), context));
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1, "byte")?[0])
    }

    pub fn read_uleb(&mut self) -> Result<u64, CodecError> {
        let (value, used) = decode_uleb128(&self.data[self.pos..])?;
        self.pos += used;
        Ok(value)
    }

    pub fn read_sleb(&mut self) -> Result<i64, CodecError> {
        let (value, used) = decode_sleb128(&self.data[self.pos..])?;
        self.pos += used;
        Ok(value)
    }

    pub fn read_f64(&mut self) -> Result<f64, CodecError> {
        let bytes = self.take(8, "f64 value")?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(f64::from_bits(u64::from_le_bytes(raw)))
    }

    pub fn read_str(&mut self) -> Result<String, CodecError> {
        let len = self.read_uleb()? as usize;
        let bytes = self.take(len, "string body")?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidValue("string is not UTF-8"))
    }

    /// Read the next record, leaving this reader positioned after its end
    /// marker. The body is returned unread so callers that do not understand
    /// the tag can simply drop it.
    pub fn read_record(&mut self) -> Result<Record<'a>, CodecError> {
        let tag = self.read_u8()?;
        let oper = self.read_uleb()?;
        let len = self.read_uleb()? as usize;
        let body = self.take(len, "record body")?;

        let fid = self.read_uleb()?;
        if fid != FID_EXP_END {
            return Err(CodecError::BadEndMarker { found: fid });
        }
        if self.read_uleb()? != 0 {
            return Err(CodecError::InvalidValue("end of record marker carries a length"));
        }

        Ok(Record {
            tag,
            oper,
            body: RecordReader::new(body),
        })
    }
}
