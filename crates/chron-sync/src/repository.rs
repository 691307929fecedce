//! Repository handle: object store, refs, staging snapshot and working tree.
//!
//! A bare repository keeps its metadata directly in `path`. A repository with
//! a working tree keeps it in `path/.chron` and checks files out into `path`.
//!
//! ```text
//! <meta>/objects/   loose objects
//! <meta>/refs/      branch refs
//! <meta>/logs/      ref logs
//! <meta>/HEAD       checked-out branch
//! <meta>/index      staging snapshot (tree id)
//! ```

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chron_refs::{validate_branch_name, FsRefStore, InMemoryRefStore, RefStore};
use chron_store::{Commit, FsObjectStore, InMemoryObjectStore, ObjectStore, StoreError};
use chron_types::ObjectId;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{RepositoryStateError, SyncError, SyncResult};

/// Name of the metadata directory inside a working tree.
pub const METADATA_DIR: &str = ".chron";

enum Staging {
    File(PathBuf),
    Memory(RwLock<Option<ObjectId>>),
}

/// A repository the synchronizer can commit into.
pub struct Repository {
    objects: Box<dyn ObjectStore>,
    refs: Box<dyn RefStore>,
    staging: Staging,
    workdir: Option<PathBuf>,
    branch: String,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("branch", &self.branch)
            .field("workdir", &self.workdir)
            .finish()
    }
}

impl Repository {
    /// Create the on-disk layout (if missing) and open it.
    ///
    /// HEAD is pointed at `branch` unless it is already set.
    pub fn init(path: impl AsRef<Path>, branch: &str, bare: bool) -> SyncResult<Self> {
        let path = path.as_ref();
        validate_branch_name(branch)?;
        let meta = metadata_dir(path, bare);
        fs::create_dir_all(&meta)?;
        let repo = Self::from_metadata(path, &meta, branch, bare)?;
        if repo.refs.head()?.is_none() {
            repo.refs.set_head(branch)?;
        }
        info!(path = %path.display(), branch, bare, "repository initialised");
        Ok(repo)
    }

    /// Open an existing repository.
    pub fn open(path: impl AsRef<Path>, branch: &str, bare: bool) -> SyncResult<Self> {
        let path = path.as_ref();
        validate_branch_name(branch)?;
        let meta = metadata_dir(path, bare);
        if !meta.join("objects").is_dir() {
            return Err(SyncError::NotARepository(path.to_path_buf()));
        }
        Self::from_metadata(path, &meta, branch, bare)
    }

    /// Open the repository at `path`, initialising it first if needed.
    pub fn open_or_init(path: impl AsRef<Path>, branch: &str, bare: bool) -> SyncResult<Self> {
        match Self::open(path.as_ref(), branch, bare) {
            Err(SyncError::NotARepository(_)) => Self::init(path, branch, bare),
            other => other,
        }
    }

    /// A bare repository held entirely in memory.
    pub fn in_memory(branch: &str) -> SyncResult<Self> {
        validate_branch_name(branch)?;
        let refs = InMemoryRefStore::new();
        refs.set_head(branch)?;
        Ok(Self {
            objects: Box::new(InMemoryObjectStore::new()),
            refs: Box::new(refs),
            staging: Staging::Memory(RwLock::new(None)),
            workdir: None,
            branch: branch.to_string(),
        })
    }

    fn from_metadata(path: &Path, meta: &Path, branch: &str, bare: bool) -> SyncResult<Self> {
        let objects = FsObjectStore::open(meta.join("objects"))?;
        let refs = FsRefStore::open(meta)?;
        debug!(meta = %meta.display(), "repository opened");
        Ok(Self {
            objects: Box::new(objects),
            refs: Box::new(refs),
            staging: Staging::File(meta.join("index")),
            workdir: (!bare).then(|| path.to_path_buf()),
            branch: branch.to_string(),
        })
    }

    pub fn objects(&self) -> &dyn ObjectStore {
        self.objects.as_ref()
    }

    pub fn refs(&self) -> &dyn RefStore {
        self.refs.as_ref()
    }

    /// The configured branch change sets target by default.
    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn is_bare(&self) -> bool {
        self.workdir.is_none()
    }

    pub fn workdir(&self) -> Option<&Path> {
        self.workdir.as_deref()
    }

    /// Current commit of `branch`, if it has one.
    pub fn branch_head(&self, branch: &str) -> SyncResult<Option<ObjectId>> {
        Ok(self.refs.read_branch(branch)?)
    }

    /// Load a commit a ref (or another commit) points at.
    pub(crate) fn load_commit(&self, id: &ObjectId, referrer: &str) -> SyncResult<Commit> {
        self.objects.get_commit(id).map_err(|e| match e {
            StoreError::NotFound(id) => RepositoryStateError::MissingObject {
                what: "commit",
                id,
                referrer: referrer.to_string(),
            }
            .into(),
            other => other.into(),
        })
    }

    /// Tree id of the staging snapshot, if one has been recorded.
    pub fn staged_tree(&self) -> SyncResult<Option<ObjectId>> {
        match &self.staging {
            Staging::Memory(cell) => Ok(*cell.read().expect("lock poisoned")),
            Staging::File(path) => match fs::read_to_string(path) {
                Ok(contents) => ObjectId::from_hex(&contents)
                    .map(Some)
                    .map_err(|e| RepositoryStateError::MalformedIndex(e.to_string()).into()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e.into()),
            },
        }
    }

    /// Record `tree` as the staging snapshot.
    pub fn set_staged_tree(&self, tree: &ObjectId) -> SyncResult<()> {
        match &self.staging {
            Staging::Memory(cell) => *cell.write().expect("lock poisoned") = Some(*tree),
            Staging::File(path) => {
                let dir = path.parent().unwrap_or_else(|| Path::new("."));
                let mut tmp = NamedTempFile::new_in(dir)?;
                writeln!(tmp, "{tree}")?;
                tmp.as_file().sync_all()?;
                tmp.persist(path).map_err(|e| SyncError::Io(e.error))?;
            }
        }
        debug!(tree = %tree.short_hex(), "staging snapshot updated");
        Ok(())
    }
}

fn metadata_dir(path: &Path, bare: bool) -> PathBuf {
    if bare {
        path.to_path_buf()
    } else {
        path.join(METADATA_DIR)
    }
}
