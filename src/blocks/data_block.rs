use byteorder::{ByteOrder, LittleEndian};

use crate::blocks::common::{ensure_len, pad_record, BlockParse, RecordHeader, HEADER_LEN, RECORD_LEN};
use crate::error::WdmError;

/// Bytes between the header and the first value.
const FIXED_LEN: usize = 48;
/// Values that fit in one data record.
pub const VALUES_PER_RECORD: usize = (RECORD_LEN - HEADER_LEN - FIXED_LEN) / 4;

/// One record of time-series values.
///
/// A group's values are held in a chain of these records linked through the
/// header's `next`/`prev` pointers. Each record carries the date of its first
/// value so that a group can start part way through its period.
///
/// # Structure:
/// - RecordHeader (16 bytes) with id `##TS`
/// - `dsn` (4 bytes), `group` (4 bytes): owning data set and data-pointer slot
/// - `start` (6 x 4 bytes): date of `values[0]`
/// - `tcode`, `tsstep` (4 bytes each)
/// - `count` (4 bytes): values held, at most [`VALUES_PER_RECORD`]
/// - reserved (4 bytes)
/// - `values` (count x 4 bytes): little-endian `f32`
#[derive(Debug, Clone, PartialEq)]
pub struct DataBlock {
    pub header: RecordHeader,
    pub dsn: i32,
    pub group: u32,
    pub start: [i32; 6],
    pub tcode: i32,
    pub tsstep: i32,
    pub values: Vec<f32>,
}

impl BlockParse<'_> for DataBlock {
    const ID: &'static str = "##TS";

    fn from_bytes(bytes: &[u8]) -> Result<Self, WdmError> {
        let header = Self::parse_header(bytes)?;
        ensure_len!(bytes, HEADER_LEN + FIXED_LEN);

        let b = &bytes[HEADER_LEN..];
        let mut start = [0i32; 6];
        LittleEndian::read_i32_into(&b[8..32], &mut start);
        let count = LittleEndian::read_u32(&b[40..44]) as usize;
        if count > VALUES_PER_RECORD {
            return Err(WdmError::CorruptRecord(format!(
                "data record claims {count} values, at most {VALUES_PER_RECORD} fit"
            )));
        }
        let values_at = HEADER_LEN + FIXED_LEN;
        ensure_len!(bytes, values_at + count * 4);
        let mut values = vec![0f32; count];
        LittleEndian::read_f32_into(&bytes[values_at..values_at + count * 4], &mut values);

        Ok(Self {
            header,
            dsn: LittleEndian::read_i32(&b[0..4]),
            group: LittleEndian::read_u32(&b[4..8]),
            start,
            tcode: LittleEndian::read_i32(&b[32..36]),
            tsstep: LittleEndian::read_i32(&b[36..40]),
            values,
        })
    }
}

impl DataBlock {
    pub fn new(dsn: i32, group: u32, start: [i32; 6], tcode: i32, tsstep: i32) -> Self {
        DataBlock {
            header: RecordHeader::new(Self::ID),
            dsn,
            group,
            start,
            tcode,
            tsstep,
            values: Vec::new(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, WdmError> {
        if self.values.len() > VALUES_PER_RECORD {
            return Err(WdmError::BlockSerializationError(format!(
                "DataBlock holds at most {VALUES_PER_RECORD} values, found {}",
                self.values.len()
            )));
        }
        let mut buffer = Vec::with_capacity(RECORD_LEN);
        buffer.extend_from_slice(&self.header.to_bytes()?);
        buffer.extend_from_slice(&self.dsn.to_le_bytes());
        buffer.extend_from_slice(&self.group.to_le_bytes());
        for part in &self.start {
            buffer.extend_from_slice(&part.to_le_bytes());
        }
        buffer.extend_from_slice(&self.tcode.to_le_bytes());
        buffer.extend_from_slice(&self.tsstep.to_le_bytes());
        buffer.extend_from_slice(&(self.values.len() as u32).to_le_bytes());
        buffer.extend_from_slice(&[0u8; 4]);
        for v in &self.values {
            buffer.extend_from_slice(&v.to_le_bytes());
        }
        pad_record(buffer, "data record")
    }
}
