use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The registry of published repositories: a mapping from a repository's
/// public key (`repos/<owner>/<name>`) to its location on disk.
///
/// Serving infrastructure reads this file to route clone traffic, so every
/// entry must be kept in step with the database. Renames rewrite the key in
/// place and keep the location.
pub trait PathRegistry: Send + Sync {
    fn add(&self, key: &str, path: &Path) -> Result<()>;
    fn rename(&self, old_key: &str, new_key: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
    fn get(&self, key: &str) -> Result<Option<PathBuf>>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PathsFile {
    #[serde(default)]
    paths: BTreeMap<String, PathBuf>,
}

/// Registry backed by a TOML file. Each operation re-reads the file and
/// rewrites it whole, so external edits between calls are preserved.
pub struct TomlPathRegistry {
    file: PathBuf,
}

impl TomlPathRegistry {
    pub fn new<P: Into<PathBuf>>(file: P) -> Self {
        Self { file: file.into() }
    }

    fn load(&self) -> Result<PathsFile> {
        if !self.file.exists() {
            return Ok(PathsFile::default());
        }
        let content = fs::read_to_string(&self.file)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid published paths file: {e}")))
    }

    fn save(&self, file: &PathsFile) -> Result<()> {
        if let Some(parent) = self.file.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(file)
            .map_err(|e| Error::Config(format!("Failed to serialize published paths: {e}")))?;
        fs::write(&self.file, content)?;
        Ok(())
    }
}

impl PathRegistry for TomlPathRegistry {
    fn add(&self, key: &str, path: &Path) -> Result<()> {
        let mut file = self.load()?;
        file.paths.insert(key.to_string(), path.to_path_buf());
        self.save(&file)
    }

    fn rename(&self, old_key: &str, new_key: &str) -> Result<()> {
        let mut file = self.load()?;
        let Some(path) = file.paths.remove(old_key) else {
            return Err(Error::Config(format!(
                "No published path entry for {old_key}"
            )));
        };
        file.paths.insert(new_key.to_string(), path);
        self.save(&file)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut file = self.load()?;
        file.paths.remove(key);
        self.save(&file)
    }

    fn get(&self, key: &str) -> Result<Option<PathBuf>> {
        let file = self.load()?;
        Ok(file.paths.get(key).cloned())
    }
}
