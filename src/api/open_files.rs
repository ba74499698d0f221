use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{Result, WdmError};
use crate::parsing::wdm_file::{OpenMode, WdmFile};

/// Absolute, symlink-free form of `path` used as the key of the open-file table.
///
/// Paths that do not exist yet are made absolute without resolving links.
pub fn normalize_path(path: &Path) -> Result<PathBuf> {
    if path.exists() {
        Ok(std::fs::canonicalize(path)?)
    } else {
        Ok(std::path::absolute(path)?)
    }
}

/// Open WDM files keyed by normalized path.
///
/// Opening a path that is already open reuses its handle; a read-only handle
/// is reopened writable when a writable one is asked for.
#[derive(Debug, Default)]
pub struct OpenFiles {
    files: HashMap<PathBuf, WdmFile>,
    next_unit: i32,
}

impl OpenFiles {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    fn allocate_unit(&mut self) -> i32 {
        self.next_unit += 1;
        self.next_unit
    }

    /// Opens `path` (already normalized) in `mode`, or returns the open handle.
    pub fn open(&mut self, path: &Path, mode: OpenMode) -> Result<&mut WdmFile> {
        let reopen = match self.files.get(path) {
            Some(file) => mode != OpenMode::ReadOnly && !file.is_writable(),
            None => true,
        };
        if reopen {
            if let Some(old) = self.files.remove(path) {
                old.close()?;
            }
            let unit = self.allocate_unit();
            let file = WdmFile::open(path, unit, mode)?;
            self.files.insert(path.to_path_buf(), file);
        }
        self.files
            .get_mut(path)
            .ok_or_else(|| WdmError::FileNotFound(path.to_path_buf()))
    }

    /// Opens `src` for reading and `dst` for writing.
    pub fn pair(&mut self, src: &Path, dst: &Path) -> Result<[&mut WdmFile; 2]> {
        if src == dst {
            return Err(WdmError::SamePath(src.to_path_buf()));
        }
        self.open(src, OpenMode::ReadOnly)?;
        self.open(dst, OpenMode::ReadWrite)?;
        match self.files.get_disjoint_mut([src, dst]) {
            [Some(a), Some(b)] => Ok([a, b]),
            _ => Err(WdmError::FileNotFound(dst.to_path_buf())),
        }
    }

    /// Closes `path` if it is open.
    pub fn close(&mut self, path: &Path) -> Result<()> {
        match self.files.remove(path) {
            Some(file) => file.close(),
            None => Ok(()),
        }
    }

    /// Closes every open file, returning the first failure.
    pub fn close_all(&mut self) -> Result<()> {
        let mut first_error = None;
        for (path, file) in self.files.drain() {
            if let Err(e) = file.close() {
                warn!(path = %path.display(), error = %e, "failed to close WDM file");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
