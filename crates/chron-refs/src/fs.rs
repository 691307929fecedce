//! On-disk reference store.
//!
//! Layout under the repository metadata directory:
//!
//! ```text
//! HEAD                         "ref: refs/heads/<branch>"
//! refs/heads/<branch>          commit id as hex + newline
//! logs/refs/heads/<branch>     one RefLogEntry line per create/update
//! ```
//!
//! Updates take `<ref>.lock` with `create_new`, write the new value into it,
//! fsync, and rename it over the ref. A leftover lock file means another
//! updater is active (or crashed) and fails the update with `Locked`.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chron_types::{ObjectId, Signature};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{RefError, Result};
use crate::names::{branch_ref_name, validate_branch_name};
use crate::traits::RefStore;
use crate::types::{Head, RefLogEntry};

/// Filesystem-backed [`RefStore`].
#[derive(Debug, Clone)]
pub struct FsRefStore {
    root: PathBuf,
}

/// Exclusive hold on a ref's `.lock` file. Removed on drop unless committed.
struct RefLock {
    lock_path: PathBuf,
    target: PathBuf,
    file: File,
    committed: bool,
}

impl RefLock {
    fn acquire(target: &Path, name: &str) -> Result<Self> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut lock_path = target.as_os_str().to_owned();
        lock_path.push(".lock");
        let lock_path = PathBuf::from(lock_path);
        let file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(RefError::Locked {
                    name: name.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            lock_path,
            target: target.to_path_buf(),
            file,
            committed: false,
        })
    }

    fn commit(mut self, contents: &str) -> Result<()> {
        self.file.write_all(contents.as_bytes())?;
        self.file.sync_all()?;
        fs::rename(&self.lock_path, &self.target)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for RefLock {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.lock_path);
        }
    }
}

impl FsRefStore {
    /// Open a ref store rooted at a repository metadata directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join("refs").join("heads"))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ref_path(&self, branch: &str) -> PathBuf {
        self.root.join(branch_ref_name(branch))
    }

    fn log_path(&self, branch: &str) -> PathBuf {
        self.root.join("logs").join(branch_ref_name(branch))
    }

    fn head_path(&self) -> PathBuf {
        self.root.join("HEAD")
    }

    fn read_id(path: &Path, name: &str) -> Result<Option<ObjectId>> {
        match fs::read_to_string(path) {
            Ok(contents) => ObjectId::from_hex(&contents)
                .map(Some)
                .map_err(|e| RefError::Malformed {
                    name: name.to_string(),
                    reason: e.to_string(),
                }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn append_log(&self, branch: &str, entry: &RefLogEntry) -> Result<()> {
        let path = self.log_path(branch);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(entry.to_line().as_bytes())?;
        file.sync_data()?;
        Ok(())
    }
}

impl RefStore for FsRefStore {
    fn read_branch(&self, branch: &str) -> Result<Option<ObjectId>> {
        validate_branch_name(branch)?;
        Self::read_id(&self.ref_path(branch), branch)
    }

    fn create_branch(
        &self,
        branch: &str,
        target: &ObjectId,
        force: bool,
        committer: &Signature,
        message: &str,
    ) -> Result<()> {
        validate_branch_name(branch)?;
        let path = self.ref_path(branch);
        let lock = RefLock::acquire(&path, branch)?;
        let old = Self::read_id(&path, branch)?;
        if old.is_some() && !force {
            return Err(RefError::AlreadyExists {
                name: branch.to_string(),
            });
        }
        lock.commit(&format!("{target}\n"))?;
        self.append_log(
            branch,
            &RefLogEntry {
                old,
                new: *target,
                committer: committer.clone(),
                message: message.to_string(),
            },
        )?;
        debug!(branch, target = %target.short_hex(), force, "branch created");
        Ok(())
    }

    fn update_branch(
        &self,
        branch: &str,
        expected: &ObjectId,
        new: &ObjectId,
        committer: &Signature,
        message: &str,
    ) -> Result<()> {
        validate_branch_name(branch)?;
        let path = self.ref_path(branch);
        let lock = RefLock::acquire(&path, branch)?;
        let actual = Self::read_id(&path, branch)?;
        if actual != Some(*expected) {
            return Err(RefError::Conflict {
                name: branch.to_string(),
                expected: *expected,
                actual,
            });
        }
        lock.commit(&format!("{new}\n"))?;
        self.append_log(
            branch,
            &RefLogEntry {
                old: Some(*expected),
                new: *new,
                committer: committer.clone(),
                message: message.to_string(),
            },
        )?;
        debug!(
            branch,
            from = %expected.short_hex(),
            to = %new.short_hex(),
            "branch updated"
        );
        Ok(())
    }

    fn reflog(&self, branch: &str) -> Result<Vec<RefLogEntry>> {
        validate_branch_name(branch)?;
        let contents = match fs::read_to_string(self.log_path(branch)) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        contents
            .lines()
            .filter(|line| !line.is_empty())
            .map(|line| {
                RefLogEntry::parse_line(line).ok_or_else(|| RefError::Malformed {
                    name: branch.to_string(),
                    reason: format!("bad ref log line: {line:?}"),
                })
            })
            .collect()
    }

    fn list_branches(&self) -> Result<Vec<(String, ObjectId)>> {
        let heads = self.root.join("refs").join("heads");
        let mut branches = Vec::new();
        for entry in WalkDir::new(&heads).min_depth(1) {
            let entry = entry.map_err(|e| {
                e.into_io_error()
                    .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "ref walk loop"))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&heads) else {
                continue;
            };
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if name.ends_with(".lock") {
                continue;
            }
            if let Some(id) = Self::read_id(entry.path(), &name)? {
                branches.push((name, id));
            }
        }
        branches.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(branches)
    }

    fn head(&self) -> Result<Option<Head>> {
        match fs::read_to_string(self.head_path()) {
            Ok(contents) => Head::parse(&contents)
                .map(Some)
                .ok_or_else(|| RefError::Malformed {
                    name: "HEAD".into(),
                    reason: format!("unrecognised contents {:?}", contents.trim()),
                }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_head(&self, branch: &str) -> Result<()> {
        validate_branch_name(branch)?;
        let lock = RefLock::acquire(&self.head_path(), "HEAD")?;
        lock.commit(&Head::Symbolic(branch.to_string()).to_file_contents())
    }
}
