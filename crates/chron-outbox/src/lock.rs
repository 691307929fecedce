use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

use crate::error::{OutboxError, OutboxResult};

/// Exclusive advisory lock on a file, held until dropped.
///
/// Only one drain per lock path may run at a time, across processes.
#[derive(Debug)]
pub struct ProcessLock {
    path: PathBuf,
    file: File,
}

impl ProcessLock {
    /// Take the lock without waiting. Fails with
    /// [`OutboxError::LockContention`] if another holder has it.
    pub fn acquire(path: impl AsRef<Path>) -> OutboxResult<Self> {
        let path = path.as_ref().to_path_buf();
        match Self::lock_file(&path) {
            Ok(file) => {
                debug!(path = %path.display(), "drain lock acquired");
                Ok(Self { path, file })
            }
            Err(e) if is_contended(&e) => Err(OutboxError::LockContention { path }),
            Err(source) => Err(OutboxError::Lock { path, source }),
        }
    }

    fn lock_file(path: &Path) -> io::Result<File> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        file.try_lock_exclusive()?;
        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        Ok(file)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn is_contended(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

impl Drop for ProcessLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        debug!(path = %self.path.display(), "drain lock released");
    }
}
