// Node record envelope: the outermost frame of every node file.
//
// Module overview: a node's entire persisted state is one record. The
// record starts with a fixed header (magic, format version, reserved
// flags, CRC32 of everything after the header) followed by a run of
// sections, each framed as a `u16` tag plus a length-prefixed body.
// Readers walk sections in order and skip tags they do not recognize,
// so the envelope can grow new sections without breaking older builds.
//
// **Critical constraint: a record is verified before it is believed.**
// The CRC covers the full section stream, and a mismatch rejects the
// record as a whole; there is no partial recovery from inside a record.

use crate::WireError;
use crate::framing::{ByteReader, put_bytes, put_u16, put_u32};

/// First four bytes of every node file.
pub const NODE_MAGIC: [u8; 4] = *b"WNOD";

/// Format version this build reads and writes.
pub const FORMAT_VERSION: u16 = 1;

/// Section tag for the entity archetype tables of a node.
pub const SECTION_ENTITIES: u16 = 1;

/// Section tag for the voxel chunks of a node.
pub const SECTION_VOXELS: u16 = 2;

/// Upper bound on a whole node record. A node holding every chunk at a
/// large `chunk_size` stays well under this; anything bigger is corrupt.
pub const MAX_RECORD_LEN: usize = 64 << 20;

/// magic + version + flags + crc.
const HEADER_LEN: usize = 12;

/// Accumulates sections and seals them into a checksummed record.
pub struct RecordWriter {
    body: Vec<u8>,
}

impl RecordWriter {
    pub fn new() -> RecordWriter {
        RecordWriter { body: Vec::new() }
    }

    /// Appends one section. Sections are written in call order and read
    /// back in the same order.
    pub fn section(&mut self, tag: u16, body: &[u8]) {
        put_u16(&mut self.body, tag);
        put_bytes(&mut self.body, body);
    }

    /// Seals the record: header, checksum, then the section stream.
    pub fn finish(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.body.len());
        out.extend_from_slice(&NODE_MAGIC);
        put_u16(&mut out, FORMAT_VERSION);
        put_u16(&mut out, 0); // reserved flags
        put_u32(&mut out, crc32fast::hash(&self.body));
        out.extend_from_slice(&self.body);
        out
    }
}

impl Default for RecordWriter {
    fn default() -> RecordWriter {
        RecordWriter::new()
    }
}

/// Validates a record's envelope and iterates its sections.
#[derive(Debug)]
pub struct RecordReader<'a> {
    reader: ByteReader<'a>,
}

impl<'a> RecordReader<'a> {
    /// Checks magic, version, and checksum up front. A reader that
    /// constructs successfully is walking verified bytes.
    pub fn new(bytes: &'a [u8]) -> Result<RecordReader<'a>, WireError> {
        if bytes.len() > MAX_RECORD_LEN {
            return Err(WireError::Oversized {
                declared: bytes.len() as u64,
                limit: MAX_RECORD_LEN as u64,
            });
        }
        let mut reader = ByteReader::new(bytes);
        let magic = reader.take(4)?;
        if magic != NODE_MAGIC {
            let mut found = [0u8; 4];
            found.copy_from_slice(magic);
            return Err(WireError::BadMagic { found });
        }
        let version = reader.read_u16()?;
        if version != FORMAT_VERSION {
            return Err(WireError::UnsupportedVersion(version));
        }
        // Reserved flags; newer writers may set bits older readers ignore.
        let _ = reader.read_u16()?;
        let stored = reader.read_u32()?;
        let computed = crc32fast::hash(&bytes[HEADER_LEN..]);
        if stored != computed {
            return Err(WireError::ChecksumMismatch { stored, computed });
        }
        Ok(RecordReader { reader })
    }

    /// Next section as `(tag, body)`, or `None` at the end of the record.
    pub fn next_section(&mut self) -> Result<Option<(u16, &'a [u8])>, WireError> {
        if self.reader.is_empty() {
            return Ok(None);
        }
        let tag = self.reader.read_u16()?;
        let body = self.reader.read_bytes()?;
        Ok(Some((tag, body)))
    }
}
