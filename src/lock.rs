//! Advisory, path-scoped locking for mutating operations.

use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;

use fs2::FileExt;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::{Result, WdmError};

/// Exclusive lock on a WDM path, held through a sibling lock file.
///
/// The lock is released when the value is dropped. Other processes and
/// other handles in this process that ask for the same path wait until then.
#[derive(Debug)]
pub struct PathLock {
    file: File,
    lock_path: PathBuf,
}

/// Lock file used for `path`: the path with `suffix` appended.
pub fn lock_path_for(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

impl PathLock {
    /// Waits up to `config.lock_timeout_ms` for the lock on `path`.
    pub fn acquire(path: &Path, config: &EngineConfig) -> Result<Self> {
        let lock_path = lock_path_for(path, &config.lock_suffix);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        let timeout = config.lock_timeout();
        let started = Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => break,
                Err(e) if is_contended(&e) => {
                    let waited = started.elapsed();
                    if waited >= timeout {
                        warn!(path = %path.display(), ?waited, "gave up waiting for WDM lock");
                        return Err(WdmError::LockTimeout { path: path.to_path_buf(), waited });
                    }
                    std::thread::sleep(config.lock_poll().min(timeout - waited));
                }
                Err(e) => return Err(e.into()),
            }
        }
        debug!(lock = %lock_path.display(), "acquired WDM lock");
        Ok(PathLock { file, lock_path })
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

fn is_contended(err: &std::io::Error) -> bool {
    err.kind() == ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

impl Drop for PathLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(lock = %self.lock_path.display(), error = %e, "failed to release WDM lock");
        } else {
            debug!(lock = %self.lock_path.display(), "released WDM lock");
        }
    }
}
