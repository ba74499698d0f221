use byteorder::{ByteOrder, LittleEndian};

use crate::blocks::common::{
    ensure_len, pad_record, read_u32_array, BlockParse, RecordHeader, DSNS_PER_DIRECTORY,
    HEADER_LEN,
};
use crate::error::WdmError;

/// Maps 500 consecutive data-set numbers to their label records.
///
/// # Structure:
/// - RecordHeader (16 bytes) with id `##DR`
/// - `first_dsn` (4 bytes): DSN held in slot 0
/// - `labels` (500 x 4 bytes): label record per DSN, 0 when the DSN is unused
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryBlock {
    pub header: RecordHeader,
    pub first_dsn: i32,
    pub labels: Vec<u32>,
}

impl BlockParse<'_> for DirectoryBlock {
    const ID: &'static str = "##DR";

    fn from_bytes(bytes: &[u8]) -> Result<Self, WdmError> {
        let header = Self::parse_header(bytes)?;
        ensure_len!(bytes, HEADER_LEN + 4 + DSNS_PER_DIRECTORY * 4);
        Ok(Self {
            header,
            first_dsn: LittleEndian::read_i32(&bytes[16..20]),
            labels: read_u32_array(bytes, 20, DSNS_PER_DIRECTORY),
        })
    }
}

impl DirectoryBlock {
    /// Empty directory record for the chunk containing `dsn`.
    pub fn for_dsn(dsn: i32) -> Self {
        let chunk = (dsn - 1) / DSNS_PER_DIRECTORY as i32;
        DirectoryBlock {
            header: RecordHeader::new(Self::ID),
            first_dsn: chunk * DSNS_PER_DIRECTORY as i32 + 1,
            labels: vec![0; DSNS_PER_DIRECTORY],
        }
    }

    /// Slot of `dsn` within this record, if it belongs here.
    pub fn slot(&self, dsn: i32) -> Option<usize> {
        let slot = dsn.checked_sub(self.first_dsn)?;
        usize::try_from(slot).ok().filter(|s| *s < DSNS_PER_DIRECTORY)
    }

    pub fn label_of(&self, dsn: i32) -> Option<u32> {
        self.slot(dsn)
            .map(|s| self.labels[s])
            .filter(|record| *record != 0)
    }

    /// Active DSNs in this record, ascending.
    pub fn active(&self) -> impl Iterator<Item = i32> + '_ {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, record)| **record != 0)
            .map(|(slot, _)| self.first_dsn + slot as i32)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, WdmError> {
        if self.labels.len() != DSNS_PER_DIRECTORY {
            return Err(WdmError::BlockSerializationError(format!(
                "directory record must hold {DSNS_PER_DIRECTORY} pointers, found {}",
                self.labels.len()
            )));
        }
        let mut buffer = self.header.to_bytes()?;
        buffer.extend_from_slice(&self.first_dsn.to_le_bytes());
        for ptr in &self.labels {
            buffer.extend_from_slice(&ptr.to_le_bytes());
        }
        pad_record(buffer, "directory record")
    }
}
