use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::api::description::{AttributeSelection, Description, Series};
use crate::api::open_files::{normalize_path, OpenFiles};
use crate::catalog::{canonical_name, AttributeCatalog, DEFAULT_SET};
use crate::config::EngineConfig;
use crate::date::{TimeCode, WdmDate};
use crate::directory::{self, DsnSpec};
use crate::error::{Result, WdmError};
use crate::label::AttributeValue;
use crate::lock::PathLock;
use crate::parsing::wdm_file::{OpenMode, WdmFile};
use crate::series::{self, SeriesLayout, Transform};

/// Names that describe derived fields rather than stored attributes.
const DERIVED: [&str; 3] = ["DSN", "START_DATE", "END_DATE"];

/// Entry point for working with WDM files.
///
/// A `Wdm` owns the table of open files and the attribute catalog. Every
/// public operation opens what it needs, and closes all open files again
/// before returning, whether it succeeded or not. Operations that modify a
/// file hold that file's advisory lock until it is closed.
#[derive(Debug)]
pub struct Wdm {
    pub(crate) config: EngineConfig,
    pub(crate) catalog: AttributeCatalog,
    pub(crate) files: OpenFiles,
}

impl Wdm {
    /// A context with default settings and the built-in catalog.
    pub fn new() -> Self {
        Wdm {
            config: EngineConfig::default(),
            catalog: AttributeCatalog::builtin(),
            files: OpenFiles::default(),
        }
    }

    /// A context using `config`, loading its catalog file when one is named.
    pub fn with_config(config: EngineConfig) -> Result<Self> {
        let catalog = match &config.catalog_path {
            Some(path) => AttributeCatalog::from_file(path)?,
            None => AttributeCatalog::builtin(),
        };
        Ok(Wdm { config, catalog, files: OpenFiles::default() })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &AttributeCatalog {
        &self.catalog
    }

    /// Number of files currently open; zero between operations.
    pub fn open_file_count(&self) -> usize {
        self.files.len()
    }

    /// Runs `op`, then closes every open file.
    ///
    /// When `op` fails, the files are closed before the error is returned.
    pub(crate) fn run<T>(&mut self, op: &'static str, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        match f(self) {
            Ok(value) => {
                self.files.close_all()?;
                Ok(value)
            }
            Err(err) => {
                if !self.files.is_empty() {
                    warn!(op, error = %err, open = self.files.len(), "closing all open WDM files");
                }
                if let Err(close_err) = self.files.close_all() {
                    warn!(op, error = %close_err, "close after failure also failed");
                }
                Err(err)
            }
        }
    }

    pub(crate) fn lock(&self, path: &Path) -> Result<PathLock> {
        PathLock::acquire(path, &self.config)
    }

    /// Runs a mutating `op` on `path` while holding its lock.
    fn mutate<T>(
        &mut self,
        path: &Path,
        op: &'static str,
        f: impl FnOnce(&mut Self, &Path) -> Result<T>,
    ) -> Result<T> {
        let path = normalize_path(path)?;
        let _lock = self.lock(&path)?;
        self.run(op, |wdm| f(wdm, &path))
    }

    fn read<T>(
        &mut self,
        path: &Path,
        op: &'static str,
        f: impl FnOnce(&mut Self, &Path) -> Result<T>,
    ) -> Result<T> {
        let path = normalize_path(path)?;
        self.run(op, |wdm| f(wdm, &path))
    }

    /// Creates an empty WDM file at `path`.
    ///
    /// # Arguments
    /// * `path` - Where to create the file.
    /// * `overwrite` - Replace an existing file instead of failing with
    ///   [`WdmError::FileExists`].
    pub fn create_wdm(&mut self, path: impl AsRef<Path>, overwrite: bool) -> Result<()> {
        self.mutate(path.as_ref(), "create_wdm", |wdm, path| wdm.create_file(path, overwrite))
    }

    pub(crate) fn create_file(&mut self, path: &Path, overwrite: bool) -> Result<()> {
        if path.exists() {
            if !overwrite {
                return Err(WdmError::FileExists(path.to_path_buf()));
            }
            self.files.close(path)?;
            std::fs::remove_file(path)?;
        }
        self.files.open(path, OpenMode::Create)?;
        info!(path = %path.display(), "created WDM file");
        Ok(())
    }

    /// Creates time-series data set `dsn` in the file at `path`.
    pub fn create_dsn(&mut self, path: impl AsRef<Path>, dsn: i32, spec: &DsnSpec) -> Result<()> {
        self.mutate(path.as_ref(), "create_dsn", |wdm, path| {
            let file = wdm.files.open(path, OpenMode::ReadWrite)?;
            directory::create_dsn(file, &wdm.catalog, dsn, spec)
        })
    }

    /// Deletes `dsn`; succeeds without change when it does not exist.
    pub fn delete_dsn(&mut self, path: impl AsRef<Path>, dsn: i32) -> Result<()> {
        self.mutate(path.as_ref(), "delete_dsn", |wdm, path| {
            let file = wdm.files.open(path, OpenMode::ReadWrite)?;
            directory::delete_dsn(file, dsn).map(|_| ())
        })
    }

    /// Renames data set `old` to `new`.
    pub fn renumber_dsn(&mut self, path: impl AsRef<Path>, old: i32, new: i32) -> Result<()> {
        self.mutate(path.as_ref(), "renumber_dsn", |wdm, path| {
            let file = wdm.files.open(path, OpenMode::ReadWrite)?;
            directory::renumber_dsn(file, old, new)
        })
    }

    /// Sets attribute `name` of `dsn` from its textual `value`.
    ///
    /// The text is parsed according to the attribute's catalog type.
    pub fn set_attribute(
        &mut self,
        path: impl AsRef<Path>,
        dsn: i32,
        name: &str,
        value: &str,
    ) -> Result<()> {
        self.mutate(path.as_ref(), "set_attribute", |wdm, path| {
            let def = wdm.catalog.resolve(name)?;
            let value = AttributeValue::parse(def, value)?;
            let file = wdm.files.open(path, OpenMode::ReadWrite)?;
            let (record, mut label) = file.require_label(dsn)?;
            label.set_attribute(def, &value)?;
            file.write_label(record, &label)?;
            info!(dsn, name = %def.name, %value, "set attribute");
            Ok(())
        })
    }

    /// Reports the attributes in `selection` together with the stored period.
    pub fn describe_dsn(
        &mut self,
        path: impl AsRef<Path>,
        dsn: i32,
        selection: &AttributeSelection,
    ) -> Result<Description> {
        self.read(path.as_ref(), "describe_dsn", |wdm, path| {
            let file = wdm.files.open(path, OpenMode::ReadOnly)?;
            describe(file, &wdm.catalog, &wdm.config, dsn, selection)
        })
    }

    /// Default description of every data set in the file, by DSN.
    pub fn list_dsns(&mut self, path: impl AsRef<Path>) -> Result<BTreeMap<i32, Description>> {
        self.read(path.as_ref(), "list_dsns", |wdm, path| {
            let file = wdm.files.open(path, OpenMode::ReadOnly)?;
            let mut listing = BTreeMap::new();
            for dsn in directory::list(file)? {
                let description = describe(file, &wdm.catalog, &wdm.config, dsn, &AttributeSelection::Default)?;
                listing.insert(dsn, description);
            }
            Ok(listing)
        })
    }

    /// Reads the values of `dsn`, optionally clipped to `start..=end`.
    ///
    /// Values equal to the data set's fill come back as `None`. A data set
    /// without data yields an empty [`Series`].
    pub fn read_series(
        &mut self,
        path: impl AsRef<Path>,
        dsn: i32,
        start: Option<WdmDate>,
        end: Option<WdmDate>,
    ) -> Result<Series> {
        self.read(path.as_ref(), "read_series", |wdm, path| {
            let default_fill = wdm.config.default_fill;
            let file = wdm.files.open(path, OpenMode::ReadOnly)?;
            read_clipped(file, dsn, start, end, default_fill)
        })
    }

    /// Replaces the data of `dsn` with `values` starting at `start`.
    ///
    /// `tcode`/`tsstep` describe the spacing of `values` and must equal the
    /// data set's. NaN marks a missing value.
    pub fn write_series(
        &mut self,
        path: impl AsRef<Path>,
        dsn: i32,
        values: &[f64],
        start: WdmDate,
        tcode: TimeCode,
        tsstep: i32,
    ) -> Result<()> {
        self.mutate(path.as_ref(), "write_series", |wdm, path| {
            let default_fill = wdm.config.default_fill;
            let file = wdm.files.open(path, OpenMode::ReadWrite)?;
            series::put_series(file, dsn, tsstep, start, tcode, values, default_fill)
        })
    }

    /// Writes `series` back, mapping `None` to missing.
    pub fn write_values(&mut self, path: impl AsRef<Path>, series: &Series) -> Result<()> {
        let Some(start) = series.start else {
            return Ok(());
        };
        let values: Vec<f64> = series.values.iter().map(|v| v.unwrap_or(f64::NAN)).collect();
        self.write_series(path, series.dsn, &values, start, series.tcode, series.tsstep)
    }

    /// Removes all data of `dsn`, keeping its attributes.
    pub fn clear_series(&mut self, path: impl AsRef<Path>, dsn: i32) -> Result<()> {
        self.mutate(path.as_ref(), "clear_series", |wdm, path| {
            let file = wdm.files.open(path, OpenMode::ReadWrite)?;
            series::clear_series(file, dsn)
        })
    }

    /// Closes any file left open.
    pub fn close_all(&mut self) -> Result<()> {
        self.files.close_all()
    }

    /// Normalized form of `path` as used for locking and the open-file table.
    pub fn normalize(path: impl AsRef<Path>) -> Result<PathBuf> {
        normalize_path(path.as_ref())
    }
}

impl Default for Wdm {
    fn default() -> Self {
        Self::new()
    }
}

fn describe(
    file: &mut WdmFile,
    catalog: &AttributeCatalog,
    config: &EngineConfig,
    dsn: i32,
    selection: &AttributeSelection,
) -> Result<Description> {
    let (_, label) = file.require_label(dsn)?;
    let mut attributes = BTreeMap::new();
    match selection {
        AttributeSelection::Default => {
            for index in DEFAULT_SET {
                let def = catalog.require_index(index)?;
                attributes.insert(def.name.clone(), label.attribute(def)?);
            }
        }
        AttributeSelection::All => {
            for def in catalog.all() {
                let value = label.attribute(def)?;
                if value.is_present() {
                    attributes.insert(def.name.clone(), value);
                }
            }
        }
        AttributeSelection::Names(names) => {
            for name in names {
                if DERIVED.contains(&canonical_name(name).as_str()) {
                    continue;
                }
                let def = catalog.resolve(name)?;
                attributes.insert(def.name.clone(), label.attribute(def)?);
            }
        }
    }

    let layout = SeriesLayout::try_from_label(&label, config.default_fill)?;
    let extent = match &layout {
        Some(layout) => series::find_extent(file, dsn, layout)?,
        None => None,
    };
    let (start_date, end_date) = match (&layout, extent) {
        (Some(layout), Some(extent)) => (Some(extent.start), Some(layout.advance(extent.end, -1)?)),
        _ => (None, None),
    };
    Ok(Description {
        dsn,
        attributes,
        tcode: layout.map(|l| l.tcode),
        tcode_name: layout.map(|l| l.tcode.freq_alias()),
        tsstep: layout.map(|l| l.tsstep),
        start_date,
        end_date,
        llsdat: start_date.map(|d| d.to_parts()),
        lledat: end_date.map(|d| d.to_parts()),
    })
}

/// First step at or after `date`, counted from `origin`.
fn steps_at_or_after(layout: &SeriesLayout, origin: WdmDate, date: WdmDate) -> Result<i64> {
    let steps = layout.steps(origin, date)?;
    if layout.advance(origin, steps)? < date { Ok(steps + 1) } else { Ok(steps) }
}

fn read_clipped(
    file: &mut WdmFile,
    dsn: i32,
    start: Option<WdmDate>,
    end: Option<WdmDate>,
    default_fill: f32,
) -> Result<Series> {
    let (_, label) = file.require_label(dsn)?;
    let layout = SeriesLayout::from_label(&label, default_fill)?;
    let empty = Series {
        dsn,
        start: None,
        tcode: layout.tcode,
        tsstep: layout.tsstep,
        values: Vec::new(),
    };
    let Some(extent) = series::find_extent(file, dsn, &layout)? else {
        return Ok(empty);
    };
    let last = layout.advance(extent.end, -1)?;
    let start = start.map(WdmDate::normalize).transpose()?;
    let end = end.map(WdmDate::normalize).transpose()?;

    if let (Some(s), Some(e)) = (start, end) {
        if s > e {
            return Err(WdmError::InvalidDate(format!("start {s} is after end {e}")));
        }
    }
    if let Some(s) = start.filter(|s| *s > last) {
        return Err(WdmError::DateOutOfRange {
            what: "start",
            requested: s.to_string(),
            start: extent.start.to_string(),
            end: last.to_string(),
        });
    }
    if let Some(e) = end.filter(|e| *e < extent.start) {
        return Err(WdmError::DateOutOfRange {
            what: "end",
            requested: e.to_string(),
            start: extent.start.to_string(),
            end: last.to_string(),
        });
    }

    let first = match start {
        Some(s) if s > extent.start => steps_at_or_after(&layout, extent.start, s)?,
        _ => 0,
    };
    let final_step = match end {
        Some(e) if e < last => layout.steps(extent.start, e)?,
        _ => extent.count as i64 - 1,
    };
    if final_step < first {
        return Ok(empty);
    }
    let begin = layout.advance(extent.start, first)?;
    let count = (final_step - first + 1) as usize;
    let raw = series::get_series(
        file,
        dsn,
        layout.tsstep,
        begin,
        count,
        Transform::Mean,
        layout.tcode,
        default_fill,
    )?;
    let values = raw
        .into_iter()
        .map(|v| if v == layout.fill { None } else { Some(f64::from(v)) })
        .collect();
    Ok(Series { dsn, start: Some(begin), tcode: layout.tcode, tsstep: layout.tsstep, values })
}
