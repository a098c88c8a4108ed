use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::config::{Config, ConfigError};

/// Process-wide configuration store backed by a TOML file on disk.
///
/// Readers get a cloned snapshot via [`get`](Self::get); writers go through
/// [`update`](Self::update), which applies a mutation and persists the result
/// before making it visible. One instance is built at process start and
/// shared by reference.
pub struct ConfigStore {
    path: PathBuf,
    current: RwLock<Config>,
}

impl ConfigStore {
    /// Open the store at `path`, falling back to defaults when the file is
    /// missing or unparseable. Nothing is written until the first update.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let current = match load(&path) {
            Ok(cfg) => cfg,
            Err(ConfigError::Io(e)) => {
                debug!(path = %path.display(), error = %e, "no config file, using defaults");
                Config::default()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "invalid config file, using defaults");
                Config::default()
            }
        };
        Self {
            path,
            current: RwLock::new(current),
        }
    }

    /// Store that starts from an explicit config instead of reading disk.
    pub fn with_config(path: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            path: path.into(),
            current: RwLock::new(config),
        }
    }

    /// Snapshot of the current configuration.
    pub fn get(&self) -> Config {
        self.current.read().clone()
    }

    /// Apply `mutate` to a copy of the current config, persist it, and then
    /// publish it. On error the in-memory config is left untouched.
    pub fn update<F>(&self, mutate: F) -> Result<Config, ConfigError>
    where
        F: FnOnce(&mut Config),
    {
        let mut guard = self.current.write();
        let mut next = guard.clone();
        mutate(&mut next);
        save(&self.path, &next)?;
        *guard = next.clone();
        Ok(next)
    }

    /// Return the file path this store reads/writes.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn load(path: &Path) -> Result<Config, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
    Config::from_toml(&text)
}

/// Write via a sibling temp file and rename, so a crash never leaves a
/// truncated config behind.
fn save(path: &Path, config: &Config) -> Result<(), ConfigError> {
    let text = config.to_toml()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
    }
    let tmp = path.with_extension("toml.tmp");
    std::fs::write(&tmp, text).map_err(|e| ConfigError::Io(e.to_string()))?;
    std::fs::rename(&tmp, path).map_err(|e| ConfigError::Io(e.to_string()))?;
    Ok(())
}
