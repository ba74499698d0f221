//! Data-set lifecycle: create, delete, renumber and label copies.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::blocks::data_block::DataBlock;
use crate::blocks::label_block::{LabelBlock, LabelGeometry};
use crate::catalog::{
    AttributeCatalog, COMPFG, IDCONS, IDLOCN, IDSCEN, STAID, STANAM, TCODE, TGROUP, TSBYR,
    TSFILL, TSFORM, TSSTEP, TSTYPE, VBTIME,
};
use crate::date::TimeCode;
use crate::error::{Result, WdmError};
use crate::label::AttributeValue;
use crate::parsing::wdm_file::WdmFile;

/// Data-set type of every time-series label.
pub const DSTYPE_TIMESERIES: i32 = 1;

/// Attributes of a new time-series data set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DsnSpec {
    pub tstype: String,
    pub base_year: i32,
    pub tcode: TimeCode,
    pub tsstep: i32,
    pub statid: String,
    pub scenario: String,
    pub location: String,
    pub description: String,
    pub constituent: String,
    pub tsfill: f32,
}

impl Default for DsnSpec {
    fn default() -> Self {
        DsnSpec {
            tstype: String::new(),
            base_year: 1900,
            tcode: TimeCode::Day,
            tsstep: 1,
            statid: String::new(),
            scenario: String::new(),
            location: String::new(),
            description: String::new(),
            constituent: String::new(),
            tsfill: -999.0,
        }
    }
}

impl DsnSpec {
    /// Attributes in the order they are written to the label.
    fn attributes(&self) -> Vec<(u16, AttributeValue)> {
        let text = |s: &str| AttributeValue::Text(s.to_string());
        vec![
            (TGROUP, AttributeValue::Int(6)),
            (COMPFG, AttributeValue::Int(1)),
            (TSFORM, AttributeValue::Int(1)),
            (VBTIME, AttributeValue::Int(1)),
            (TCODE, AttributeValue::Int(self.tcode.code())),
            (TSSTEP, AttributeValue::Int(self.tsstep)),
            (TSBYR, AttributeValue::Int(self.base_year)),
            (TSFILL, AttributeValue::Real(self.tsfill)),
            (STAID, text(&self.statid)),
            (TSTYPE, text(&self.tstype)),
            (STANAM, text(&self.description)),
            (IDSCEN, text(&self.scenario)),
            (IDCONS, text(&self.constituent)),
            (IDLOCN, text(&self.location)),
        ]
    }
}

/// Creates `dsn` with the default geometry and the attributes of `spec`.
///
/// If any attribute is rejected the partly created data set is deleted
/// again before the error is returned.
pub fn create_dsn(
    file: &mut WdmFile,
    catalog: &AttributeCatalog,
    dsn: i32,
    spec: &DsnSpec,
) -> Result<()> {
    if file.exists(dsn)? {
        return Err(WdmError::DsnExists(dsn));
    }
    let mut label = LabelBlock::new(dsn, DSTYPE_TIMESERIES, LabelGeometry::default())?;
    let record = file.allocate()?;
    file.write_label(record, &label)?;
    file.set_label_record(dsn, record)?;

    let applied = apply_attributes(file, catalog, record, &mut label, spec);
    if let Err(err) = applied {
        delete_dsn(file, dsn)?;
        return Err(err);
    }
    info!(dsn, tcode = %spec.tcode, tsstep = spec.tsstep, "created DSN");
    Ok(())
}

fn apply_attributes(
    file: &mut WdmFile,
    catalog: &AttributeCatalog,
    record: u32,
    label: &mut LabelBlock,
    spec: &DsnSpec,
) -> Result<()> {
    if spec.tsstep <= 0 {
        return Err(WdmError::AttributeTypeMismatch {
            name: "TSSTEP".to_string(),
            expected: "positive integer",
            value: spec.tsstep.to_string(),
        });
    }
    for (index, value) in spec.attributes() {
        let def = catalog.require_index(index)?;
        label.set_attribute(def, &value)?;
    }
    file.write_label(record, label)
}

/// Deletes `dsn` with all its data.
///
/// # Returns
/// `false` when there was nothing to delete.
pub fn delete_dsn(file: &mut WdmFile, dsn: i32) -> Result<bool> {
    let Some((record, label)) = file.read_label(dsn)? else {
        return Ok(false);
    };
    for first in label.data.iter().copied().filter(|p| *p != 0) {
        for data in file.chain(first)? {
            file.release(data)?;
        }
    }
    file.set_label_record(dsn, 0)?;
    file.release(record)?;
    info!(dsn, "deleted DSN");
    Ok(true)
}

/// Moves the label and data of `old` to the number `new`.
pub fn renumber_dsn(file: &mut WdmFile, old: i32, new: i32) -> Result<()> {
    let (record, mut label) = file.require_label(old)?;
    if file.exists(new)? {
        return Err(WdmError::DsnExists(new));
    }
    let firsts: Vec<u32> = label.data.iter().copied().filter(|p| *p != 0).collect();
    for first in firsts {
        for data in file.chain(first)? {
            let mut block: DataBlock = file.read_block(data)?;
            block.dsn = new;
            file.write_record(data, &block.to_bytes()?)?;
        }
    }
    label.dsn = new;
    file.write_label(record, &label)?;
    file.set_label_record(new, record)?;
    file.set_label_record(old, 0)?;
    info!(old, new, "renumbered DSN");
    Ok(())
}

/// Copies the label of `dsn_in` in `src` to `dsn_out` in `dst`, without data.
///
/// The two handles must refer to different files.
pub fn copy_label(src: &mut WdmFile, dsn_in: i32, dst: &mut WdmFile, dsn_out: i32) -> Result<()> {
    if src.path() == dst.path() {
        return Err(WdmError::SamePath(src.path().to_path_buf()));
    }
    let (_, source) = src.require_label(dsn_in)?;
    if dst.exists(dsn_out)? {
        return Err(WdmError::DsnExists(dsn_out));
    }
    let mut label = LabelBlock::new(dsn_out, source.dstype, source.geometry)?;
    label.slots = source.slots.clone();
    label.space = source.space.clone();
    label.space_used = source.space_used;

    let record = dst.allocate()?;
    dst.write_label(record, &label)?;
    dst.set_label_record(dsn_out, record)?;
    info!(dsn_in, dsn_out, to = %dst.path().display(), "copied label");
    Ok(())
}

/// Active data-set numbers, ascending.
pub fn list(file: &mut WdmFile) -> Result<Vec<i32>> {
    file.active_dsns()
}
