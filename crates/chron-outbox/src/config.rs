use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chron_sync::Repository;
use chron_types::Identity;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, OutboxError, OutboxResult};
use crate::identity::StaticDirectory;

/// Contents of `chron.toml`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct OutboxConfig {
    pub lock_path: PathBuf,
    pub queue_path: PathBuf,
    pub identities: BTreeMap<String, Identity>,
    pub repositories: Vec<RepositoryConfig>,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            lock_path: PathBuf::from("chron-drain.lock"),
            queue_path: PathBuf::from("chron-queue.db"),
            identities: BTreeMap::new(),
            repositories: Vec::new(),
        }
    }
}

impl OutboxConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn directory(&self) -> StaticDirectory {
        StaticDirectory::new(self.identities.clone())
    }

    pub fn registry(&self) -> Result<RepositoryRegistry, ConfigError> {
        RepositoryRegistry::new(self.repositories.clone())
    }
}

/// One managed repository.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub id: String,
    pub path: PathBuf,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default)]
    pub bare: bool,
    /// Where the queued content originates. Informational only.
    #[serde(default)]
    pub remote_source: Option<String>,
}

fn default_branch() -> String {
    "main".to_string()
}

/// Repository id → configuration, in configuration order.
#[derive(Clone, Debug, Default)]
pub struct RepositoryRegistry {
    repositories: Vec<RepositoryConfig>,
}

impl RepositoryRegistry {
    pub fn new(repositories: Vec<RepositoryConfig>) -> Result<Self, ConfigError> {
        let mut seen = std::collections::HashSet::new();
        for repo in &repositories {
            if repo.id.trim().is_empty() {
                return Err(ConfigError::InvalidRepository {
                    id: repo.id.clone(),
                    reason: "empty id".into(),
                });
            }
            if repo.branch.trim().is_empty() {
                return Err(ConfigError::InvalidRepository {
                    id: repo.id.clone(),
                    reason: "empty branch".into(),
                });
            }
            if !seen.insert(repo.id.as_str()) {
                return Err(ConfigError::DuplicateRepository(repo.id.clone()));
            }
        }
        Ok(Self { repositories })
    }

    pub fn get(&self, id: &str) -> Option<&RepositoryConfig> {
        self.repositories.iter().find(|r| r.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RepositoryConfig> {
        self.repositories.iter()
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }

    /// Open the repository registered as `id`, initializing it if needed.
    pub fn open(&self, id: &str) -> OutboxResult<Repository> {
        let config = self
            .get(id)
            .ok_or_else(|| OutboxError::UnknownRepository(id.to_string()))?;
        Ok(Repository::open_or_init(&config.path, &config.branch, config.bare)?)
    }
}
