//! The one piece of state that outlives a session: the last-used filename.

use std::{collections::BTreeMap, fs, path::PathBuf};

use anyhow::{Context, Result};

pub const LAST_FILENAME_KEY: &str = "classquiz.last_filename";

pub trait PreferenceStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// JSON object of string values stored in a single file.
#[derive(Debug, Clone)]
pub struct FilePreferences {
    path: PathBuf,
}

impl FilePreferences {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/classquiz-dashboard/preferences.json`.
    pub fn in_config_dir() -> Option<Self> {
        dirs::config_dir()
            .map(|dir| Self::new(dir.join("classquiz-dashboard").join("preferences.json")))
    }

    fn read_all(&self) -> BTreeMap<String, String> {
        fs::read_to_string(&self.path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }
}

impl PreferenceStore for FilePreferences {
    fn get(&self, key: &str) -> Option<String> {
        self.read_all().remove(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.read_all();
        values.insert(key.to_string(), value.to_string());
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create '{}'", parent.display()))?;
        }
        let raw = serde_json::to_string_pretty(&values).context("failed to encode preferences")?;
        fs::write(&self.path, raw)
            .with_context(|| format!("failed to write '{}'", self.path.display()))
    }
}
