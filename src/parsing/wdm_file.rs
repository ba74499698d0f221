//! Record-level access to a WDM file.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, WriteBytesExt};
use memmap2::Mmap;
use tracing::debug;

use crate::blocks::common::{
    BlockParse, RecordHeader, DSNS_PER_DIRECTORY, INITIAL_FILE_LEN, INITIAL_RECORDS, MAX_DSN,
    RECORD_LEN,
};
use crate::blocks::directory_block::DirectoryBlock;
use crate::blocks::file_definition_block::FileDefinitionBlock;
use crate::blocks::label_block::LabelBlock;
use crate::error::{Result, WdmError};
use crate::retcode::{self, Retcode};

/// Offset of the `next` pointer inside every record header.
pub const NEXT_OFFSET: u64 = 8;
/// Offset of the `prev` pointer inside every record header.
pub const PREV_OFFSET: u64 = 12;

/// Id written into records sitting on the free chain.
const FREE_ID: &str = "##FR";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
    /// Create a new file; fails if the path already exists.
    Create,
}

#[derive(Debug)]
enum Backing {
    Mapped(Mmap),
    File(File),
}

/// An open WDM file.
///
/// Read-only handles memory map the file; writable handles use positioned
/// reads and writes. The file definition record is cached and rewritten
/// whenever allocation or the directory changes it.
#[derive(Debug)]
pub struct WdmFile {
    path: PathBuf,
    unit: i32,
    mode: OpenMode,
    backing: Backing,
    definition: FileDefinitionBlock,
}

impl WdmFile {
    /// Opens `path` as `unit` (the slot number it is known by in the open-file table).
    ///
    /// # Arguments
    /// * `path` - Location of the WDM file.
    /// * `unit` - Slot number used when reporting on this handle.
    /// * `mode` - Read-only, read-write or create.
    ///
    /// # Returns
    /// The open handle, [`WdmError::FileNotFound`] when a read mode is asked
    /// for a missing path, or [`WdmError::FileExists`] when creating over an
    /// existing one.
    pub fn open(path: impl AsRef<Path>, unit: i32, mode: OpenMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let backing = match mode {
            OpenMode::ReadOnly | OpenMode::ReadWrite if !path.exists() => {
                return Err(WdmError::FileNotFound(path));
            }
            OpenMode::Create if path.exists() => return Err(WdmError::FileExists(path)),
            OpenMode::ReadOnly => {
                let file = File::open(&path)?;
                let mmap = unsafe { Mmap::map(&file)? };
                Backing::Mapped(mmap)
            }
            OpenMode::ReadWrite => {
                Backing::File(OpenOptions::new().read(true).write(true).open(&path)?)
            }
            OpenMode::Create => {
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create_new(true)
                    .open(&path)?;
                Backing::File(file)
            }
        };

        let mut wdm = WdmFile {
            path,
            unit,
            mode,
            backing,
            definition: FileDefinitionBlock::new(),
        };
        if mode == OpenMode::Create {
            wdm.initialize()?;
        }
        wdm.load_definition()?;
        debug!(path = %wdm.path.display(), unit, ?mode, "opened WDM file");
        Ok(wdm)
    }

    /// Lays out a brand new file: the definition record followed by free records.
    fn initialize(&mut self) -> Result<()> {
        let file = self.file_mut()?;
        file.set_len(INITIAL_FILE_LEN)?;
        let definition = FileDefinitionBlock::new();
        self.write_record(1, &definition.to_bytes()?)?;
        for record in 2..=INITIAL_RECORDS {
            let mut header = RecordHeader::new(FREE_ID);
            header.next = if record < INITIAL_RECORDS { record + 1 } else { 0 };
            self.write_record(record, &header.to_bytes()?)?;
        }
        self.definition = definition;
        Ok(())
    }

    fn load_definition(&mut self) -> Result<()> {
        let len = match &self.backing {
            Backing::Mapped(mmap) => mmap.len() as u64,
            Backing::File(file) => file.metadata()?.len(),
        };
        if len < RECORD_LEN as u64 || len % RECORD_LEN as u64 != 0 {
            return Retcode::new(retcode::BAD_CHECK_DIGIT).check(&[], || {
                format!("open file={} length={len}", self.path.display())
            });
        }
        let bytes = self.read_raw(1)?;
        let definition = FileDefinitionBlock::from_bytes(&bytes)?;
        let status = if definition.is_valid()
            && u64::from(definition.record_count) * RECORD_LEN as u64 == len
        {
            Retcode::new(retcode::SUCCESS)
        } else {
            Retcode::new(retcode::BAD_CHECK_DIGIT)
        };
        status.check(&[], || format!("open file={}", self.path.display()))?;
        self.definition = definition;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn unit(&self) -> i32 {
        self.unit
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn is_writable(&self) -> bool {
        matches!(self.backing, Backing::File(_))
    }

    pub fn definition(&self) -> &FileDefinitionBlock {
        &self.definition
    }

    pub fn record_count(&self) -> u32 {
        self.definition.record_count
    }

    fn file_mut(&mut self) -> Result<&mut File> {
        match &mut self.backing {
            Backing::File(file) => Ok(file),
            Backing::Mapped(_) => Err(WdmError::engine(
                Retcode::new(retcode::READ_ONLY),
                format!("write file={}", self.path.display()),
            )),
        }
    }

    fn check_record(&self, record: u32) -> Result<()> {
        if record == 0 || record > self.definition.record_count {
            return Err(WdmError::BlockLinkError(format!(
                "record {record} outside 1..={} of {}",
                self.definition.record_count,
                self.path.display()
            )));
        }
        Ok(())
    }

    fn read_raw(&mut self, record: u32) -> Result<Vec<u8>> {
        let offset = (u64::from(record) - 1) * RECORD_LEN as u64;
        match &mut self.backing {
            Backing::Mapped(mmap) => {
                let start = offset as usize;
                mmap.get(start..start + RECORD_LEN)
                    .map(<[u8]>::to_vec)
                    .ok_or(WdmError::TooShortBuffer {
                        actual:   mmap.len(),
                        expected: start + RECORD_LEN,
                        file:     file!(),
                        line:     line!(),
                    })
            }
            Backing::File(file) => {
                let mut buffer = vec![0u8; RECORD_LEN];
                file.seek(SeekFrom::Start(offset))?;
                file.read_exact(&mut buffer)?;
                Ok(buffer)
            }
        }
    }

    /// Reads the raw bytes of `record` (numbered from 1).
    pub fn read_record(&mut self, record: u32) -> Result<Vec<u8>> {
        self.check_record(record)?;
        self.read_raw(record)
    }

    /// Reads and parses `record` as block type `B`.
    pub fn read_block<B>(&mut self, record: u32) -> Result<B>
    where
        B: for<'a> BlockParse<'a>,
    {
        let bytes = self.read_record(record)?;
        B::from_bytes(&bytes)
    }

    /// Writes a full record. `bytes` shorter than a record are zero padded.
    pub fn write_record(&mut self, record: u32, bytes: &[u8]) -> Result<()> {
        if bytes.len() > RECORD_LEN {
            return Err(WdmError::BlockSerializationError(format!(
                "record {record} payload is {} bytes, a record holds {RECORD_LEN}",
                bytes.len()
            )));
        }
        let offset = (u64::from(record) - 1) * RECORD_LEN as u64;
        let file = self.file_mut()?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(bytes)?;
        if bytes.len() < RECORD_LEN {
            file.write_all(&vec![0u8; RECORD_LEN - bytes.len()])?;
        }
        Ok(())
    }

    /// Updates a link (u32 record pointer) at `field_offset` within `record`.
    pub fn update_link(&mut self, record: u32, field_offset: u64, target: u32) -> Result<()> {
        self.check_record(record)?;
        let offset = (u64::from(record) - 1) * RECORD_LEN as u64 + field_offset;
        let file = self.file_mut()?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_u32::<LittleEndian>(target)?;
        Ok(())
    }

    fn store_definition(&mut self) -> Result<()> {
        let bytes = self.definition.to_bytes()?;
        self.write_record(1, &bytes)
    }

    /// Takes a record off the free chain, growing the file when the chain is empty.
    ///
    /// The returned record still holds whatever it held before; callers
    /// overwrite it completely.
    pub fn allocate(&mut self) -> Result<u32> {
        let free_head = self.definition.free_head;
        let record = match free_head {
            0 => {
                let record = self.definition.record_count + 1;
                let new_len = u64::from(record) * RECORD_LEN as u64;
                self.file_mut()?.set_len(new_len)?;
                self.definition.record_count = record;
                record
            }
            head => {
                let header = RecordHeader::from_bytes(&self.read_record(head)?)?;
                if header.id != FREE_ID {
                    return Err(WdmError::CorruptRecord(format!(
                        "record {head} is on the free chain but has id {:?}",
                        header.id
                    )));
                }
                self.definition.free_head = header.next;
                head
            }
        };
        self.store_definition()?;
        debug!(path = %self.path.display(), record, "allocated record");
        Ok(record)
    }

    /// Returns `record` to the free chain.
    pub fn release(&mut self, record: u32) -> Result<()> {
        self.check_record(record)?;
        if record == 1 {
            return Err(WdmError::BlockLinkError("record 1 cannot be released".into()));
        }
        let mut header = RecordHeader::new(FREE_ID);
        header.next = self.definition.free_head;
        self.write_record(record, &header.to_bytes()?)?;
        self.definition.free_head = record;
        self.store_definition()?;
        debug!(path = %self.path.display(), record, "released record");
        Ok(())
    }

    /// Walks a chain of records starting at `first` through the `next` links.
    pub fn chain(&mut self, first: u32) -> Result<Vec<u32>> {
        let mut records = Vec::new();
        let mut seen = HashSet::new();
        let mut next = first;
        while next != 0 {
            if !seen.insert(next) {
                return Err(WdmError::CorruptRecord(format!(
                    "record chain starting at {first} loops at {next}"
                )));
            }
            records.push(next);
            next = RecordHeader::from_bytes(&self.read_record(next)?)?.next;
        }
        Ok(records)
    }

    fn check_dsn(dsn: i32) -> Result<usize> {
        if !(1..=MAX_DSN).contains(&dsn) {
            return Err(WdmError::DsnOutOfRange(dsn));
        }
        Ok((dsn as usize - 1) / DSNS_PER_DIRECTORY)
    }

    /// Record holding the label of `dsn`, if the data set exists.
    pub fn label_record(&mut self, dsn: i32) -> Result<Option<u32>> {
        let chunk = Self::check_dsn(dsn)?;
        let directory_record = self.definition.directory[chunk];
        match directory_record {
            0 => Ok(None),
            dir => {
                let directory: DirectoryBlock = self.read_block(dir)?;
                Ok(directory.label_of(dsn))
            }
        }
    }

    pub fn exists(&mut self, dsn: i32) -> Result<bool> {
        Ok(self.label_record(dsn)?.is_some())
    }

    /// Points the directory entry of `dsn` at `label` (0 clears it).
    pub fn set_label_record(&mut self, dsn: i32, label: u32) -> Result<()> {
        let chunk = Self::check_dsn(dsn)?;
        let current = self.definition.directory[chunk];
        let (record, mut directory) = match current {
            0 if label == 0 => return Ok(()),
            0 => {
                let record = self.allocate()?;
                self.definition.directory[chunk] = record;
                self.store_definition()?;
                (record, DirectoryBlock::for_dsn(dsn))
            }
            record => (record, self.read_block::<DirectoryBlock>(record)?),
        };
        let slot = directory.slot(dsn).ok_or_else(|| {
            WdmError::CorruptRecord(format!(
                "directory record {record} starting at DSN {} does not cover DSN {dsn}",
                directory.first_dsn
            ))
        })?;
        let was_active = directory.labels[slot] != 0;
        directory.labels[slot] = label;
        self.write_record(record, &directory.to_bytes()?)?;

        match (was_active, label != 0) {
            (false, true) => self.definition.dsn_count += 1,
            (true, false) => self.definition.dsn_count = self.definition.dsn_count.saturating_sub(1),
            _ => return Ok(()),
        }
        self.store_definition()
    }

    /// Label of `dsn` with the record it lives in.
    pub fn read_label(&mut self, dsn: i32) -> Result<Option<(u32, LabelBlock)>> {
        match self.label_record(dsn)? {
            None => Ok(None),
            Some(record) => Ok(Some((record, self.read_block(record)?))),
        }
    }

    /// Label of `dsn`, failing with [`WdmError::DsnNotFound`] when it is missing.
    pub fn require_label(&mut self, dsn: i32) -> Result<(u32, LabelBlock)> {
        self.read_label(dsn)?.ok_or(WdmError::DsnNotFound(dsn))
    }

    pub fn write_label(&mut self, record: u32, label: &LabelBlock) -> Result<()> {
        let bytes = label.to_bytes()?;
        self.write_record(record, &bytes)
    }

    /// Every active data-set number, ascending.
    pub fn active_dsns(&mut self) -> Result<Vec<i32>> {
        let mut dsns = Vec::new();
        let directories: Vec<u32> = self
            .definition
            .directory
            .iter()
            .copied()
            .filter(|r| *r != 0)
            .collect();
        for record in directories {
            let directory: DirectoryBlock = self.read_block(record)?;
            dsns.extend(directory.active());
        }
        Ok(dsns)
    }

    /// Flushes pending writes to disk.
    pub fn flush(&mut self) -> Result<()> {
        if let Backing::File(file) = &mut self.backing {
            file.flush()?;
            file.sync_data()?;
        }
        Ok(())
    }

    /// Flushes and releases the handle.
    pub fn close(mut self) -> Result<()> {
        self.flush()?;
        debug!(path = %self.path.display(), unit = self.unit, "closed WDM file");
        Ok(())
    }
}
