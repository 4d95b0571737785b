// Little-endian primitives shared by every on-disk structure.
//
// Module overview: node records are built in memory and written in one
// atomic step, so the writer side is plain appends onto a `Vec<u8>` and
// the reader side is a cursor over a borrowed slice. Every multi-byte
// integer is little-endian. Variable-length fields carry a `u32` length
// prefix so a reader can skip what it does not understand.
//
// See also: `record` for the outer envelope that frames whole node files.

use crate::WireError;

/// Hard cap on any single length-prefixed field. Matches the record-level
/// cap in [`crate::record::MAX_RECORD_LEN`]; a prefix above this is corrupt
/// regardless of how many bytes actually follow.
pub const MAX_FIELD_LEN: usize = crate::record::MAX_RECORD_LEN;

pub fn put_u8(buf: &mut Vec<u8>, value: u8) {
    buf.push(value);
}

pub fn put_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

pub fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

pub fn put_u64(buf: &mut Vec<u8>, value: u64) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Appends a `u32` length prefix followed by the bytes themselves.
///
/// Fields longer than `u32::MAX` cannot be represented; callers keep
/// individual fields far below that, so this is a debug assertion rather
/// than a runtime error.
pub fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    debug_assert!(bytes.len() <= u32::MAX as usize);
    put_u32(buf, bytes.len() as u32);
    buf.extend_from_slice(bytes);
}

/// Cursor over a borrowed byte slice.
///
/// Reads advance the position; any read past the end reports the offset
/// where the data ran out so corruption messages can point at the byte.
#[derive(Debug)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> ByteReader<'a> {
        ByteReader { buf, pos: 0 }
    }

    /// Current offset from the start of the underlying slice.
    pub fn offset(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos == self.buf.len()
    }

    /// Takes the next `len` bytes as a subslice of the original buffer.
    pub fn take(&mut self, len: usize) -> Result<&'a [u8], WireError> {
        if len > self.remaining() {
            return Err(WireError::Truncated { offset: self.buf.len() });
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, WireError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, WireError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, WireError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_u64(&mut self) -> Result<u64, WireError> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(raw))
    }

    /// Reads a `u32` length prefix and then that many bytes.
    pub fn read_bytes(&mut self) -> Result<&'a [u8], WireError> {
        let len = self.read_u32()? as usize;
        if len > MAX_FIELD_LEN {
            return Err(WireError::Oversized { declared: len as u64, limit: MAX_FIELD_LEN as u64 });
        }
        self.take(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_round_trip() {
        let mut buf = Vec::new();
        put_u8(&mut buf, 0xab);
        put_u16(&mut buf, 0x1234);
        put_u32(&mut buf, 0xdead_beef);
        put_u64(&mut buf, 0x0123_4567_89ab_cdef);

        let mut reader = ByteReader::new(&buf);
        assert_eq!(reader.read_u8().unwrap(), 0xab);
        assert_eq!(reader.read_u16().unwrap(), 0x1234);
        assert_eq!(reader.read_u32().unwrap(), 0xdead_beef);
        assert_eq!(reader.read_u64().unwrap(), 0x0123_4567_89ab_cdef);
        assert!(reader.is_empty());
    }

    #[test]
    fn length_prefixed_bytes_round_trip() {
        let mut buf = Vec::new();
        put_bytes(&mut buf, b"carrot");
        put_bytes(&mut buf, b"");

        let mut reader = ByteReader::new(&buf);
        assert_eq!(reader.read_bytes().unwrap(), b"carrot");
        assert_eq!(reader.read_bytes().unwrap(), b"");
        assert!(reader.is_empty());
    }

    #[test]
    fn truncated_read_reports_end_offset() {
        let buf = [0x01, 0x02];
        let mut reader = ByteReader::new(&buf);
        let err = reader.read_u32().unwrap_err();
        assert!(matches!(err, WireError::Truncated { offset: 2 }));
    }

    #[test]
    fn absurd_length_prefix_is_oversized() {
        let mut buf = Vec::new();
        put_u32(&mut buf, u32::MAX);
        let mut reader = ByteReader::new(&buf);
        assert!(matches!(reader.read_bytes().unwrap_err(), WireError::Oversized { .. }));
    }

    #[test]
    fn take_is_a_view_into_the_original_buffer() {
        let buf = [1u8, 2, 3, 4, 5];
        let mut reader = ByteReader::new(&buf);
        reader.read_u8().unwrap();
        let slice = reader.take(3).unwrap();
        assert_eq!(slice, &[2, 3, 4]);
        assert_eq!(reader.remaining(), 1);
        assert_eq!(reader.offset(), 4);
    }
}
