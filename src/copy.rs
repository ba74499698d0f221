//! Copying data sets between files, and within one file.

use std::path::Path;

use tracing::{info, warn};

use crate::api::open_files::normalize_path;
use crate::api::wdm::Wdm;
use crate::directory;
use crate::error::{Result, WdmError};
use crate::parsing::wdm_file::OpenMode;
use crate::series;

/// Name of the scratch file used to stage a copy within one file.
const STAGE_FILE: &str = "stage.wdm";

impl Wdm {
    /// Copies label and data of `dsn_in` in `path_in` to `dsn_out` in `path_out`.
    ///
    /// The two paths may name the same file; the copy is then staged through
    /// a scratch WDM file. With `overwrite`, an existing `dsn_out` is deleted
    /// first, otherwise it fails with [`WdmError::DsnExists`].
    pub fn copy_dsn(
        &mut self,
        path_in: impl AsRef<Path>,
        dsn_in: i32,
        path_out: impl AsRef<Path>,
        dsn_out: i32,
        overwrite: bool,
    ) -> Result<()> {
        self.copy(path_in.as_ref(), dsn_in, path_out.as_ref(), dsn_out, overwrite, true)
    }

    /// Like [`Wdm::copy_dsn`] but copies only the label, leaving the destination empty.
    pub fn copy_dsn_label(
        &mut self,
        path_in: impl AsRef<Path>,
        dsn_in: i32,
        path_out: impl AsRef<Path>,
        dsn_out: i32,
        overwrite: bool,
    ) -> Result<()> {
        self.copy(path_in.as_ref(), dsn_in, path_out.as_ref(), dsn_out, overwrite, false)
    }

    fn copy(
        &mut self,
        path_in: &Path,
        dsn_in: i32,
        path_out: &Path,
        dsn_out: i32,
        overwrite: bool,
        with_data: bool,
    ) -> Result<()> {
        let src = normalize_path(path_in)?;
        let dst = normalize_path(path_out)?;
        if !src.exists() {
            return Err(WdmError::FileNotFound(src));
        }
        let _lock = self.lock(&dst)?;
        if src == dst {
            let stage_dir = tempfile::tempdir()?;
            let stage = stage_dir.path().join(STAGE_FILE);
            self.run("stage", |wdm| wdm.create_file(&stage, false))?;
            self.transfer(&src, dsn_in, &stage, dsn_in, false, with_data)?;
            self.transfer(&stage, dsn_in, &dst, dsn_out, overwrite, with_data)?;
        } else {
            self.transfer(&src, dsn_in, &dst, dsn_out, overwrite, with_data)?;
        }
        info!(from = %src.display(), dsn_in, to = %dst.display(), dsn_out, with_data, "copied DSN");
        Ok(())
    }

    /// Copies between two distinct, normalized paths. The caller holds the lock on `dst`.
    fn transfer(
        &mut self,
        src: &Path,
        dsn_in: i32,
        dst: &Path,
        dsn_out: i32,
        overwrite: bool,
        with_data: bool,
    ) -> Result<()> {
        self.run("copy_dsn", |wdm| {
            let default_fill = wdm.config.default_fill;
            let [input, output] = wdm.files.pair(src, dst)?;
            // Fail before touching the destination when the source is missing.
            input.require_label(dsn_in)?;
            if overwrite {
                directory::delete_dsn(output, dsn_out)?;
            }
            directory::copy_label(input, dsn_in, output, dsn_out)?;
            if with_data {
                series::copy_values(input, dsn_in, output, dsn_out, default_fill)?;
            }
            Ok(())
        })
    }

    /// Copies every data set of `path_in` into a newly created `path_out`.
    ///
    /// Data sets that fail to copy are logged and skipped.
    ///
    /// # Returns
    /// The data-set numbers that were copied.
    pub fn clean_copy(
        &mut self,
        path_in: impl AsRef<Path>,
        path_out: impl AsRef<Path>,
        overwrite: bool,
    ) -> Result<Vec<i32>> {
        let src = normalize_path(path_in.as_ref())?;
        let dst = normalize_path(path_out.as_ref())?;
        if src == dst {
            return Err(WdmError::SamePath(src));
        }
        let dsns = self.run("clean_copy", |wdm| {
            let file = wdm.files.open(&src, OpenMode::ReadOnly)?;
            directory::list(file)
        })?;

        let _lock = self.lock(&dst)?;
        self.run("clean_copy", |wdm| wdm.create_file(&dst, overwrite))?;
        let mut copied = Vec::with_capacity(dsns.len());
        for dsn in dsns {
            match self.transfer(&src, dsn, &dst, dsn, false, true) {
                Ok(()) => copied.push(dsn),
                Err(e) => warn!(dsn, error = %e, "skipping DSN in clean copy"),
            }
        }
        info!(from = %src.display(), to = %dst.display(), copied = copied.len(), "clean copy finished");
        Ok(copied)
    }
}
