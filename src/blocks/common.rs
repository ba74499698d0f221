use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use crate::error::WdmError;

/// Length of every record in a WDM file (512 four-byte words).
pub const RECORD_LEN: usize = 2048;
/// Length of the common record header.
pub const HEADER_LEN: usize = 16;
/// Records written when a file is created; 20 x 2048 bytes = 40 KiB.
pub const INITIAL_RECORDS: u32 = 20;
/// Size of a freshly created file.
pub const INITIAL_FILE_LEN: u64 = INITIAL_RECORDS as u64 * RECORD_LEN as u64;
/// Highest data-set number a file can address.
pub const MAX_DSN: i32 = 32_000;
/// Data-set numbers covered by one directory record.
pub const DSNS_PER_DIRECTORY: usize = 500;
/// Directory records needed to cover `1..=MAX_DSN`.
pub const DIRECTORY_RECORDS: usize = 64;

/// Fails with [`WdmError::TooShortBuffer`] when `$bytes` is shorter than `$expected`.
macro_rules! ensure_len {
    ($bytes:expr, $expected:expr) => {
        if $bytes.len() < $expected {
            return Err($crate::error::WdmError::TooShortBuffer {
                actual:   $bytes.len(),
                expected: $expected,
                file:     file!(),
                line:     line!(),
            });
        }
    };
}
pub(crate) use ensure_len;

/// Header shared by every record.
///
/// # Structure (16 bytes):
/// - `id` (4 bytes): ASCII record type, e.g. `##LB`
/// - `reserved0` (4 bytes)
/// - `next` (4 bytes): following record in a chain, 0 for none
/// - `prev` (4 bytes): preceding record in a chain, 0 for none
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    pub id: String,
    pub reserved0: u32,
    pub next: u32,
    pub prev: u32,
}

impl RecordHeader {
    pub fn new(id: &str) -> Self {
        RecordHeader {
            id: id.to_string(),
            reserved0: 0,
            next: 0,
            prev: 0,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WdmError> {
        ensure_len!(bytes, HEADER_LEN);
        Ok(RecordHeader {
            id: String::from_utf8_lossy(&bytes[0..4]).to_string(),
            reserved0: LittleEndian::read_u32(&bytes[4..8]),
            next: LittleEndian::read_u32(&bytes[8..12]),
            prev: LittleEndian::read_u32(&bytes[12..16]),
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, WdmError> {
        let id = self.id.as_bytes();
        if id.len() != 4 {
            return Err(WdmError::BlockSerializationError(format!(
                "record id must be 4 bytes, found {:?}",
                self.id
            )));
        }
        let mut buffer = Vec::with_capacity(HEADER_LEN);
        buffer.extend_from_slice(id);
        buffer.extend_from_slice(&self.reserved0.to_le_bytes());
        buffer.extend_from_slice(&self.next.to_le_bytes());
        buffer.extend_from_slice(&self.prev.to_le_bytes());
        Ok(buffer)
    }
}

/// Shared parsing behaviour of all record types.
pub trait BlockParse<'a>: Sized {
    const ID: &'static str;

    fn from_bytes(bytes: &'a [u8]) -> Result<Self, WdmError>;

    /// Reads the header and checks that it carries [`Self::ID`].
    fn parse_header(bytes: &[u8]) -> Result<RecordHeader, WdmError> {
        let header = RecordHeader::from_bytes(bytes)?;
        if header.id != Self::ID {
            return Err(WdmError::BlockIDError {
                actual: header.id,
                expected: Self::ID.to_string(),
            });
        }
        Ok(header)
    }
}

/// Zero-pads a serialized record to [`RECORD_LEN`].
pub fn pad_record(mut buffer: Vec<u8>, what: &str) -> Result<Vec<u8>, WdmError> {
    if buffer.len() > RECORD_LEN {
        return Err(WdmError::BlockSerializationError(format!(
            "{what} needs {} bytes, a record holds {RECORD_LEN}",
            buffer.len()
        )));
    }
    buffer.resize(RECORD_LEN, 0);
    Ok(buffer)
}

/// Reads `n` little-endian `u32` values starting at `offset`.
pub fn read_u32_array(bytes: &[u8], offset: usize, n: usize) -> Vec<u32> {
    bytes[offset..offset + n * 4]
        .chunks_exact(4)
        .map(LittleEndian::read_u32)
        .collect()
}

/// Storage type of a search attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeKind {
    Int = 1,
    Real = 2,
    String = 3,
}

impl AttributeKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(AttributeKind::Int),
            2 => Some(AttributeKind::Real),
            3 => Some(AttributeKind::String),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Four-byte words needed to hold a value of `len` elements.
    pub fn words(self, len: usize) -> usize {
        match self {
            AttributeKind::Int | AttributeKind::Real => len,
            AttributeKind::String => len.div_ceil(4),
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            AttributeKind::Int => "integer",
            AttributeKind::Real => "real",
            AttributeKind::String => "string",
        }
    }
}
