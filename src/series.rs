//! Time-series data store.
//!
//! Values of a data set are split into groups, one per TGROUP period
//! (hour, day, month, year or century) counted from January 1st of the base
//! year TSBYR. Each group's values live in a chain of [`DataBlock`] records
//! whose first record is held in the label's data-pointer slot for that
//! group. Writes always replace the whole series.

use serde::Serialize;
use tracing::{debug, info};

use crate::blocks::data_block::{DataBlock, VALUES_PER_RECORD};
use crate::blocks::label_block::LabelBlock;
use crate::catalog::{TCODE, TGROUP, TSBYR, TSFILL, TSSTEP};
use crate::date::{time_difference, TimeCode, WdmDate};
use crate::error::{Result, WdmError};
use crate::parsing::wdm_file::{WdmFile, NEXT_OFFSET};
use crate::retcode::{self, Retcode};

/// Base year assumed when a label has no TSBYR.
pub const DEFAULT_BASE_YEAR: i32 = 1900;

/// Period covered by one data group (`TGROUP`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GroupSpan {
    Hour = 3,
    Day = 4,
    Month = 5,
    Year = 6,
    Century = 7,
}

impl GroupSpan {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            3 => Some(GroupSpan::Hour),
            4 => Some(GroupSpan::Day),
            5 => Some(GroupSpan::Month),
            6 => Some(GroupSpan::Year),
            7 => Some(GroupSpan::Century),
            _ => None,
        }
    }

    fn unit(self) -> (TimeCode, i32) {
        match self {
            GroupSpan::Hour => (TimeCode::Hour, 1),
            GroupSpan::Day => (TimeCode::Day, 1),
            GroupSpan::Month => (TimeCode::Month, 1),
            GroupSpan::Year => (TimeCode::Year, 1),
            GroupSpan::Century => (TimeCode::Year, 100),
        }
    }

    /// Group holding `date` for a data set whose base year is `base_year`.
    pub fn index_of(self, base_year: i32, date: WdmDate) -> Result<i64> {
        let (tcode, step) = self.unit();
        time_difference(WdmDate::ymd(base_year, 1, 1), date, tcode, step)
    }

    /// First instant of group `index`.
    pub fn start_of(self, base_year: i32, index: i64) -> Result<WdmDate> {
        let (tcode, step) = self.unit();
        WdmDate::ymd(base_year, 1, 1).advance(tcode, step, index)
    }
}

/// How values are combined when reading at a coarser step than stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transform {
    /// Average of the combined values; at the stored step, the values themselves.
    #[default]
    Mean,
    Sum,
    Max,
    Min,
}

impl Transform {
    fn apply(self, values: &[f32]) -> f32 {
        let sum = || values.iter().sum::<f32>();
        match self {
            Transform::Mean => sum() / values.len() as f32,
            Transform::Sum => sum(),
            Transform::Max => values.iter().copied().fold(f32::NEG_INFINITY, f32::max),
            Transform::Min => values.iter().copied().fold(f32::INFINITY, f32::min),
        }
    }
}

/// Layout attributes of a time-series label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesLayout {
    pub tcode: TimeCode,
    pub tsstep: i32,
    pub base_year: i32,
    pub group: GroupSpan,
    pub fill: f32,
}

impl SeriesLayout {
    /// Like [`SeriesLayout::from_label`], but a label without TCODE or TSSTEP
    /// gives `None` instead of an error.
    pub fn try_from_label(label: &LabelBlock, default_fill: f32) -> Result<Option<Self>> {
        if label.int_attribute(TCODE)?.is_none() || label.int_attribute(TSSTEP)?.is_none() {
            return Ok(None);
        }
        Self::from_label(label, default_fill).map(Some)
    }

    pub fn from_label(label: &LabelBlock, default_fill: f32) -> Result<Self> {
        let required = |index: u16, name: &str| -> Result<i32> {
            label.int_attribute(index)?.ok_or_else(|| {
                WdmError::engine(
                    Retcode::new(retcode::ATTRIBUTE_NOT_PRESENT),
                    format!("series layout dsn={} name={name}", label.dsn),
                )
            })
        };
        let tcode = TimeCode::try_from_code(required(TCODE, "TCODE")?)?;
        let tsstep = required(TSSTEP, "TSSTEP")?;
        if tsstep <= 0 {
            return Err(WdmError::engine(
                Retcode::new(retcode::BAD_ATTRIBUTE_VALUE),
                format!("series layout dsn={} TSSTEP={tsstep}", label.dsn),
            ));
        }
        let group_code = label.int_attribute(TGROUP)?.unwrap_or(GroupSpan::Year as i32);
        let group = GroupSpan::from_code(group_code).ok_or_else(|| {
            WdmError::engine(
                Retcode::new(retcode::BAD_ATTRIBUTE_VALUE),
                format!("series layout dsn={} TGROUP={group_code}", label.dsn),
            )
        })?;
        Ok(SeriesLayout {
            tcode,
            tsstep,
            base_year: label.int_attribute(TSBYR)?.unwrap_or(DEFAULT_BASE_YEAR),
            group,
            fill: label.real_attribute(TSFILL)?.unwrap_or(default_fill),
        })
    }

    /// Fails with [`WdmError::FrequencyMismatch`] unless `tcode`/`tsstep` match exactly.
    pub fn ensure_interval(&self, dsn: i32, tcode: TimeCode, tsstep: i32) -> Result<()> {
        if tcode != self.tcode || tsstep != self.tsstep {
            return Err(WdmError::FrequencyMismatch {
                dsn,
                expected_tcode: self.tcode.code(),
                expected_tsstep: self.tsstep,
                tcode: tcode.code(),
                tsstep,
            });
        }
        Ok(())
    }

    /// Number of steps from `start` to `end`.
    pub fn steps(&self, start: WdmDate, end: WdmDate) -> Result<i64> {
        time_difference(start, end, self.tcode, self.tsstep)
    }

    /// `start` moved by `count` steps.
    pub fn advance(&self, start: WdmDate, count: i64) -> Result<WdmDate> {
        start.advance(self.tcode, self.tsstep, count)
    }
}

/// Stored span of a data set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Extent {
    pub first_record: u32,
    /// Date of the first stored value.
    pub start: WdmDate,
    /// One step past the last stored value.
    pub end: WdmDate,
    pub count: usize,
}

fn chain_blocks(file: &mut WdmFile, dsn: i32, first: u32) -> Result<Vec<DataBlock>> {
    let mut blocks = Vec::new();
    for record in file.chain(first)? {
        let block: DataBlock = file.read_block(record)?;
        if block.dsn != dsn {
            return Err(WdmError::CorruptRecord(format!(
                "data record {record} belongs to DSN {}, reached from DSN {dsn}",
                block.dsn
            )));
        }
        blocks.push(block);
    }
    Ok(blocks)
}

/// Probes the stored span of `dsn`.
///
/// # Returns
/// `None` for a data set that exists but holds no data.
pub fn find_extent(file: &mut WdmFile, dsn: i32, layout: &SeriesLayout) -> Result<Option<Extent>> {
    let (_, label) = file.require_label(dsn)?;
    let mut groups = label.data.iter().copied().filter(|p| *p != 0);
    let Some(first_record) = groups.next() else {
        return Ok(None);
    };
    let last_record = groups.last().unwrap_or(first_record);

    let first: DataBlock = file.read_block(first_record)?;
    let start = WdmDate::from_parts(first.start)?;
    let tail = chain_blocks(file, dsn, last_record)?;
    let end = match tail.last() {
        Some(block) => layout.advance(WdmDate::from_parts(block.start)?, block.values.len() as i64)?,
        None => start,
    };
    let count = usize::try_from(layout.steps(start, end)?).unwrap_or(0);
    Ok(Some(Extent { first_record, start, end, count }))
}

/// Every stored value of `dsn` from the start of its extent, fill where nothing was written.
fn stored_values(
    file: &mut WdmFile,
    label: &LabelBlock,
    layout: &SeriesLayout,
    extent: &Extent,
) -> Result<Vec<f32>> {
    let mut values = vec![layout.fill; extent.count];
    let firsts: Vec<u32> = label.data.iter().copied().filter(|p| *p != 0).collect();
    for first in firsts {
        for block in chain_blocks(file, label.dsn, first)? {
            let block_start = WdmDate::from_parts(block.start)?;
            let offset = usize::try_from(layout.steps(extent.start, block_start)?).map_err(|_| {
                WdmError::CorruptRecord(format!(
                    "data record of DSN {} starts at {block_start}, before {}",
                    label.dsn, extent.start
                ))
            })?;
            for (slot, value) in values.iter_mut().skip(offset).zip(&block.values) {
                *slot = *value;
            }
        }
    }
    Ok(values)
}

/// Reads `count` values of `dsn` starting at `start`.
///
/// `tcode`/`tsstep` give the interval wanted. It must be the stored interval
/// or a whole multiple of its step in the same unit; in the latter case
/// consecutive stored values are combined with `transform` and any combined
/// group touching a fill value yields fill. The requested range must lie
/// inside the stored extent.
///
/// # Returns
/// The values with fill left in place, or [`WdmError::NoDataAvailable`]
/// when the data set holds no values.
#[allow(clippy::too_many_arguments)]
pub fn get_series(
    file: &mut WdmFile,
    dsn: i32,
    tsstep: i32,
    start: WdmDate,
    count: usize,
    transform: Transform,
    tcode: TimeCode,
    default_fill: f32,
) -> Result<Vec<f32>> {
    let (_, label) = file.require_label(dsn)?;
    let layout = SeriesLayout::from_label(&label, default_fill)?;
    if tcode != layout.tcode || tsstep <= 0 || tsstep % layout.tsstep != 0 {
        layout.ensure_interval(dsn, tcode, tsstep)?;
    }
    let factor = (tsstep / layout.tsstep) as usize;

    let extent = match find_extent(file, dsn, &layout)? {
        Some(extent) if extent.count > 0 => extent,
        _ => return Err(WdmError::NoDataAvailable { dsn }),
    };
    let start = start.normalize()?;
    let offset = layout.steps(extent.start, start)?;
    let wanted = count.checked_mul(factor);
    let in_range = start >= extent.start
        && layout.advance(extent.start, offset)? == start
        && wanted.is_some_and(|w| offset as usize + w <= extent.count);
    if !in_range {
        return Err(WdmError::engine(
            Retcode::new(retcode::OUT_OF_VALID_RANGE),
            format!(
                "get dsn={dsn} start={start} count={count} extent={}..{}",
                extent.start, extent.end
            ),
        ));
    }

    let stored = stored_values(file, &label, &layout, &extent)?;
    let window = &stored[offset as usize..offset as usize + count * factor];
    if factor == 1 {
        return Ok(window.to_vec());
    }
    Ok(window
        .chunks_exact(factor)
        .map(|chunk| {
            if chunk.contains(&layout.fill) {
                layout.fill
            } else {
                transform.apply(chunk)
            }
        })
        .collect())
}

/// Releases every data record of `label` and clears its data pointers.
///
/// The label itself is not written back.
fn release_data(file: &mut WdmFile, label: &mut LabelBlock) -> Result<usize> {
    let mut released = 0;
    for slot in 0..label.data.len() {
        let first = label.data[slot];
        if first == 0 {
            continue;
        }
        for record in file.chain(first)? {
            file.release(record)?;
            released += 1;
        }
        label.data[slot] = 0;
    }
    Ok(released)
}

/// Removes all data from `dsn`, leaving its label and attributes in place.
pub fn clear_series(file: &mut WdmFile, dsn: i32) -> Result<()> {
    let (record, mut label) = file.require_label(dsn)?;
    let released = release_data(file, &mut label)?;
    file.write_label(record, &label)?;
    debug!(dsn, released, "cleared data");
    Ok(())
}

/// Writes one group's values as a chain of data records.
fn write_chain(
    file: &mut WdmFile,
    dsn: i32,
    group: u32,
    start: WdmDate,
    layout: &SeriesLayout,
    values: &[f32],
) -> Result<u32> {
    let mut first = 0;
    let mut prev = 0;
    let mut block_start = start;
    for chunk in values.chunks(VALUES_PER_RECORD) {
        let record = file.allocate()?;
        let mut block = DataBlock::new(
            dsn,
            group,
            block_start.to_parts(),
            layout.tcode.code(),
            layout.tsstep,
        );
        block.header.prev = prev;
        block.values = chunk.to_vec();
        file.write_record(record, &block.to_bytes()?)?;
        if prev == 0 {
            first = record;
        } else {
            file.update_link(prev, NEXT_OFFSET, record)?;
        }
        prev = record;
        block_start = layout.advance(block_start, chunk.len() as i64)?;
    }
    Ok(first)
}

/// Replaces the data of `dsn` with `values` starting at `start`.
///
/// `values` already carry fill in place of missing values.
pub(crate) fn store(
    file: &mut WdmFile,
    dsn: i32,
    start: WdmDate,
    values: &[f32],
    default_fill: f32,
) -> Result<()> {
    let (record, mut label) = file.require_label(dsn)?;
    let layout = SeriesLayout::from_label(&label, default_fill)?;
    let start = start.normalize()?.truncate(layout.tcode);
    if start.year < layout.base_year {
        return Err(WdmError::BaseYearViolation {
            dsn,
            base_year: layout.base_year,
            year: start.year,
        });
    }

    release_data(file, &mut label)?;
    let mut written = 0;
    let mut cursor = start;
    while written < values.len() {
        let group = layout.group.index_of(layout.base_year, cursor)?;
        let slot = usize::try_from(group)
            .ok()
            .filter(|s| *s < label.data.len())
            .ok_or_else(|| {
                WdmError::engine(
                    Retcode::new(retcode::OUT_OF_VALID_RANGE),
                    format!(
                        "put dsn={dsn} date={cursor} group={group} base_year={} groups={}",
                        layout.base_year,
                        label.data.len()
                    ),
                )
            })?;
        let group_end = layout.group.start_of(layout.base_year, group + 1)?;
        let whole = layout.steps(cursor, group_end)?;
        let fits = if layout.advance(cursor, whole)? < group_end { whole + 1 } else { whole };
        let n = usize::try_from(fits).unwrap_or(1).max(1).min(values.len() - written);

        label.data[slot] = write_chain(file, dsn, slot as u32, cursor, &layout, &values[written..written + n])?;
        written += n;
        cursor = layout.advance(cursor, n as i64)?;
    }
    file.write_label(record, &label)?;
    debug!(dsn, count = values.len(), start = %start, "stored values");
    Ok(())
}

/// Writes `values` as the complete series of `dsn` starting at `start`.
///
/// The interval must match the data set exactly, `start` (truncated to the
/// data set's time unit) may not fall before its base year, and NaN values
/// are stored as the data set's fill value.
pub fn put_series(
    file: &mut WdmFile,
    dsn: i32,
    tsstep: i32,
    start: WdmDate,
    tcode: TimeCode,
    values: &[f64],
    default_fill: f32,
) -> Result<()> {
    let (_, label) = file.require_label(dsn)?;
    let layout = SeriesLayout::from_label(&label, default_fill)?;
    layout.ensure_interval(dsn, tcode, tsstep)?;
    let stored: Vec<f32> = values
        .iter()
        .map(|v| if v.is_nan() { layout.fill } else { *v as f32 })
        .collect();
    store(file, dsn, start, &stored, default_fill)?;
    info!(dsn, count = values.len(), %start, "wrote series");
    Ok(())
}

/// Copies the stored values of `dsn_in` onto `dsn_out` of another file.
///
/// The destination label must already carry the same layout attributes.
pub(crate) fn copy_values(
    src: &mut WdmFile,
    dsn_in: i32,
    dst: &mut WdmFile,
    dsn_out: i32,
    default_fill: f32,
) -> Result<usize> {
    let (_, label) = src.require_label(dsn_in)?;
    let layout = SeriesLayout::from_label(&label, default_fill)?;
    let Some(extent) = find_extent(src, dsn_in, &layout)? else {
        return Ok(0);
    };
    let values = stored_values(src, &label, &layout, &extent)?;
    store(dst, dsn_out, extent.start, &values, default_fill)?;
    Ok(values.len())
}
