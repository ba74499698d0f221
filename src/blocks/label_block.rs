use byteorder::{ByteOrder, LittleEndian};
use nom::IResult;
use nom::Parser;
use nom::multi::count;
use nom::number::complete::{le_u16, le_u8};

use crate::blocks::common::{
    ensure_len, pad_record, read_u32_array, AttributeKind, BlockParse, RecordHeader, HEADER_LEN,
    RECORD_LEN,
};
use crate::error::WdmError;
use crate::retcode::{self, Retcode};

/// Bytes between the header and the variable-length sections.
const FIXED_LEN: usize = 36;
const SLOT_LEN: usize = 8;

/// Directory geometry of a label.
///
/// Defaults are the values every time-series data set is created with:
/// 10 down pointers, 10 up pointers, 30 search attributes, 100 words of
/// attribute space and 300 data pointers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelGeometry {
    pub ndn: u32,
    pub nup: u32,
    pub nsa: u32,
    pub nsasp: u32,
    pub ndp: u32,
}

impl Default for LabelGeometry {
    fn default() -> Self {
        LabelGeometry { ndn: 10, nup: 10, nsa: 30, nsasp: 100, ndp: 300 }
    }
}

impl LabelGeometry {
    /// Serialized size of a label with this geometry.
    pub fn record_len(&self) -> usize {
        HEADER_LEN
            + FIXED_LEN
            + 4 * (self.ndn + self.nup) as usize
            + SLOT_LEN * self.nsa as usize
            + 4 * self.nsasp as usize
            + 4 * self.ndp as usize
    }

    pub fn fits(&self) -> bool {
        self.nsa <= u32::from(u16::MAX) && self.record_len() <= RECORD_LEN
    }
}

/// One entry of the search-attribute table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeSlot {
    pub index: u16,
    /// Word offset into the attribute space.
    pub offset: u16,
    pub kind: AttributeKind,
    pub len: u8,
}

impl AttributeSlot {
    pub fn words(&self) -> usize {
        self.kind.words(self.len as usize)
    }
}

/// Label (directory entry) of one data set.
///
/// # Structure:
/// - RecordHeader (16 bytes) with id `##LB`
/// - `dsn`, `dstype` (4 bytes each)
/// - geometry NDN, NUP, NSA, NSASP, NDP (4 bytes each)
/// - `slots_used`, `space_used` (4 bytes each)
/// - down pointers (NDN x 4 bytes), up pointers (NUP x 4 bytes)
/// - search-attribute table (NSA x 8 bytes): index u16, word offset u16,
///   kind u8, length u8, 2 reserved bytes
/// - attribute space (NSASP x 4 bytes)
/// - data pointers (NDP x 4 bytes): first data record of each group
#[derive(Debug, Clone, PartialEq)]
pub struct LabelBlock {
    pub header: RecordHeader,
    pub dsn: i32,
    pub dstype: i32,
    pub geometry: LabelGeometry,
    pub down: Vec<u32>,
    pub up: Vec<u32>,
    pub slots: Vec<AttributeSlot>,
    pub space_used: u32,
    pub space: Vec<u8>,
    pub data: Vec<u32>,
}

type RawSlot = (u16, u16, u8, u8, u16);

fn raw_slot(input: &[u8]) -> IResult<&[u8], RawSlot> {
    (le_u16, le_u16, le_u8, le_u8, le_u16).parse(input)
}

fn slot_table(input: &[u8], used: usize) -> IResult<&[u8], Vec<RawSlot>> {
    count(raw_slot, used).parse(input)
}

impl BlockParse<'_> for LabelBlock {
    const ID: &'static str = "##LB";

    fn from_bytes(bytes: &[u8]) -> Result<Self, WdmError> {
        let header = Self::parse_header(bytes)?;
        ensure_len!(bytes, HEADER_LEN + FIXED_LEN);

        let b = &bytes[HEADER_LEN..];
        let dsn = LittleEndian::read_i32(&b[0..4]);
        let dstype = LittleEndian::read_i32(&b[4..8]);
        let geometry = LabelGeometry {
            ndn: LittleEndian::read_u32(&b[8..12]),
            nup: LittleEndian::read_u32(&b[12..16]),
            nsa: LittleEndian::read_u32(&b[16..20]),
            nsasp: LittleEndian::read_u32(&b[20..24]),
            ndp: LittleEndian::read_u32(&b[24..28]),
        };
        let slots_used = LittleEndian::read_u32(&b[28..32]) as usize;
        let space_used = LittleEndian::read_u32(&b[32..36]);

        if !geometry.fits() || slots_used > geometry.nsa as usize || space_used > geometry.nsasp {
            return Err(WdmError::CorruptRecord(format!(
                "label of DSN {dsn} has inconsistent geometry {geometry:?}"
            )));
        }
        ensure_len!(bytes, geometry.record_len());

        let mut off = HEADER_LEN + FIXED_LEN;
        let down = read_u32_array(bytes, off, geometry.ndn as usize);
        off += 4 * geometry.ndn as usize;
        let up = read_u32_array(bytes, off, geometry.nup as usize);
        off += 4 * geometry.nup as usize;

        let (_, raw) = slot_table(&bytes[off..], slots_used).map_err(|e| {
            WdmError::CorruptRecord(format!("attribute table of DSN {dsn}: {e}"))
        })?;
        let mut slots = Vec::with_capacity(raw.len());
        for (index, offset, kind, len, _) in raw {
            let kind = AttributeKind::from_u8(kind).ok_or_else(|| {
                WdmError::CorruptRecord(format!("attribute {index} of DSN {dsn} has kind {kind}"))
            })?;
            slots.push(AttributeSlot { index, offset, kind, len });
        }
        off += SLOT_LEN * geometry.nsa as usize;

        let space_len = 4 * geometry.nsasp as usize;
        let space = bytes[off..off + space_len].to_vec();
        off += space_len;
        let data = read_u32_array(bytes, off, geometry.ndp as usize);

        Ok(Self {
            header,
            dsn,
            dstype,
            geometry,
            down,
            up,
            slots,
            space_used,
            space,
            data,
        })
    }
}

impl LabelBlock {
    /// A blank label with no attributes and no data.
    pub fn new(dsn: i32, dstype: i32, geometry: LabelGeometry) -> Result<Self, WdmError> {
        if !geometry.fits() {
            return Err(WdmError::BlockSerializationError(format!(
                "label geometry {geometry:?} needs {} bytes, a record holds {RECORD_LEN}",
                geometry.record_len()
            )));
        }
        Ok(LabelBlock {
            header: RecordHeader::new(Self::ID),
            dsn,
            dstype,
            geometry,
            down: vec![0; geometry.ndn as usize],
            up: vec![0; geometry.nup as usize],
            slots: Vec::new(),
            space_used: 0,
            space: vec![0; 4 * geometry.nsasp as usize],
            data: vec![0; geometry.ndp as usize],
        })
    }

    pub fn slot(&self, index: u16) -> Option<&AttributeSlot> {
        self.slots.iter().find(|s| s.index == index)
    }

    /// Raw bytes of attribute `index`, or [`retcode::ATTRIBUTE_NOT_PRESENT`].
    pub fn get_raw(&self, index: u16) -> Result<(AttributeSlot, &[u8]), Retcode> {
        let slot = *self
            .slot(index)
            .ok_or(Retcode::new(retcode::ATTRIBUTE_NOT_PRESENT))?;
        let start = 4 * slot.offset as usize;
        let end = start + 4 * slot.words();
        match self.space.get(start..end) {
            Some(bytes) => Ok((slot, bytes)),
            None => Err(Retcode::new(retcode::NO_SPACE_FOR_ATTRIBUTE)),
        }
    }

    /// Stores `bytes` as attribute `index`, adding a slot if it is new.
    ///
    /// `bytes` must already be padded to whole words. The label is left
    /// untouched whenever a non-zero status is returned.
    pub fn put_raw(&mut self, index: u16, kind: AttributeKind, len: u8, bytes: &[u8]) -> Retcode {
        let words = kind.words(len as usize);
        if bytes.len() != 4 * words {
            return Retcode::new(retcode::BAD_ATTRIBUTE_VALUE);
        }
        if let Some(slot) = self.slot(index).copied() {
            if slot.kind != kind || slot.len != len {
                return Retcode::new(retcode::TYPES_DO_NOT_MATCH);
            }
            let start = 4 * slot.offset as usize;
            self.space[start..start + bytes.len()].copy_from_slice(bytes);
            return Retcode::new(retcode::SUCCESS);
        }
        if self.slots.len() >= self.geometry.nsa as usize {
            return Retcode::new(retcode::NO_ROOM_ON_LABEL);
        }
        let offset = self.space_used as usize;
        if offset + words > self.geometry.nsasp as usize {
            return Retcode::new(retcode::NO_SPACE_FOR_ATTRIBUTE);
        }
        self.space[4 * offset..4 * offset + bytes.len()].copy_from_slice(bytes);
        self.slots.push(AttributeSlot {
            index,
            offset: offset as u16,
            kind,
            len,
        });
        self.space_used += words as u32;
        Retcode::new(retcode::SUCCESS)
    }

    pub fn has_data(&self) -> bool {
        self.data.iter().any(|p| *p != 0)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, WdmError> {
        let g = &self.geometry;
        if self.header.id != Self::ID {
            return Err(WdmError::BlockSerializationError(format!(
                "LabelBlock must have ID '{}', found '{}'",
                Self::ID,
                self.header.id
            )));
        }
        if !g.fits()
            || self.down.len() != g.ndn as usize
            || self.up.len() != g.nup as usize
            || self.slots.len() > g.nsa as usize
            || self.space.len() != 4 * g.nsasp as usize
            || self.data.len() != g.ndp as usize
        {
            return Err(WdmError::BlockSerializationError(format!(
                "label of DSN {} does not match its geometry {g:?}",
                self.dsn
            )));
        }

        let mut buffer = Vec::with_capacity(RECORD_LEN);
        buffer.extend_from_slice(&self.header.to_bytes()?);
        buffer.extend_from_slice(&self.dsn.to_le_bytes());
        buffer.extend_from_slice(&self.dstype.to_le_bytes());
        for v in [g.ndn, g.nup, g.nsa, g.nsasp, g.ndp] {
            buffer.extend_from_slice(&v.to_le_bytes());
        }
        buffer.extend_from_slice(&(self.slots.len() as u32).to_le_bytes());
        buffer.extend_from_slice(&self.space_used.to_le_bytes());
        for ptr in self.down.iter().chain(&self.up) {
            buffer.extend_from_slice(&ptr.to_le_bytes());
        }
        for slot in &self.slots {
            buffer.extend_from_slice(&slot.index.to_le_bytes());
            buffer.extend_from_slice(&slot.offset.to_le_bytes());
            buffer.push(slot.kind.to_u8());
            buffer.push(slot.len);
            buffer.extend_from_slice(&[0u8; 2]);
        }
        buffer.resize(buffer.len() + SLOT_LEN * (g.nsa as usize - self.slots.len()), 0);
        buffer.extend_from_slice(&self.space);
        for ptr in &self.data {
            buffer.extend_from_slice(&ptr.to_le_bytes());
        }
        debug_assert_eq!(buffer.len(), g.record_len());
        pad_record(buffer, "label record")
    }
}
