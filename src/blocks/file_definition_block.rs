use byteorder::{ByteOrder, LittleEndian};

use crate::blocks::common::{
    ensure_len, pad_record, read_u32_array, BlockParse, RecordHeader, DIRECTORY_RECORDS,
    HEADER_LEN, INITIAL_RECORDS,
};
use crate::error::WdmError;

/// Value stored in `check` of every valid file ("WDM1").
pub const CHECK_VALUE: u32 = u32::from_le_bytes(*b"WDM1");
pub const FORMAT_VERSION: u32 = 1;

const BODY_LEN: usize = 20 + DIRECTORY_RECORDS * 4;

/// First record of every file.
///
/// # Structure:
/// - RecordHeader (16 bytes) with id `##FD`
/// - `check` (4 bytes): [`CHECK_VALUE`]
/// - `version` (4 bytes)
/// - `record_count` (4 bytes): records currently in the file
/// - `free_head` (4 bytes): first record of the free chain
/// - `dsn_count` (4 bytes): active data sets
/// - `directory` (64 x 4 bytes): directory record per 500 DSNs, 0 if unallocated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDefinitionBlock {
    pub header: RecordHeader,
    pub check: u32,
    pub version: u32,
    pub record_count: u32,
    pub free_head: u32,
    pub dsn_count: u32,
    pub directory: Vec<u32>,
}

impl BlockParse<'_> for FileDefinitionBlock {
    const ID: &'static str = "##FD";

    fn from_bytes(bytes: &[u8]) -> Result<Self, WdmError> {
        let header = Self::parse_header(bytes)?;
        ensure_len!(bytes, HEADER_LEN + BODY_LEN);

        let b = &bytes[HEADER_LEN..];
        Ok(Self {
            header,
            check: LittleEndian::read_u32(&b[0..4]),
            version: LittleEndian::read_u32(&b[4..8]),
            record_count: LittleEndian::read_u32(&b[8..12]),
            free_head: LittleEndian::read_u32(&b[12..16]),
            dsn_count: LittleEndian::read_u32(&b[16..20]),
            directory: read_u32_array(b, 20, DIRECTORY_RECORDS),
        })
    }
}

impl FileDefinitionBlock {
    /// File definition for a brand new file: every record after the first
    /// starts out on the free chain.
    pub fn new() -> Self {
        FileDefinitionBlock {
            header: RecordHeader::new(Self::ID),
            check: CHECK_VALUE,
            version: FORMAT_VERSION,
            record_count: INITIAL_RECORDS,
            free_head: if INITIAL_RECORDS > 1 { 2 } else { 0 },
            dsn_count: 0,
            directory: vec![0; DIRECTORY_RECORDS],
        }
    }

    pub fn is_valid(&self) -> bool {
        self.check == CHECK_VALUE && self.version == FORMAT_VERSION
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, WdmError> {
        if self.directory.len() != DIRECTORY_RECORDS {
            return Err(WdmError::BlockSerializationError(format!(
                "file definition must hold {DIRECTORY_RECORDS} directory pointers, found {}",
                self.directory.len()
            )));
        }
        let mut buffer = self.header.to_bytes()?;
        buffer.extend_from_slice(&self.check.to_le_bytes());
        buffer.extend_from_slice(&self.version.to_le_bytes());
        buffer.extend_from_slice(&self.record_count.to_le_bytes());
        buffer.extend_from_slice(&self.free_head.to_le_bytes());
        buffer.extend_from_slice(&self.dsn_count.to_le_bytes());
        for ptr in &self.directory {
            buffer.extend_from_slice(&ptr.to_le_bytes());
        }
        pad_record(buffer, "file definition record")
    }
}

impl Default for FileDefinitionBlock {
    fn default() -> Self {
        Self::new()
    }
}
