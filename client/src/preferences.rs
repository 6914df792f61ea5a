//! Local preference stores

use crate::gateway::PreferenceStore;
use log::{debug, warn};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Clone)]
pub struct MemoryPreferences {
    values: HashMap<String, String>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }
}

/// Preferences kept in a flat JSON object on disk.
///
/// A missing or unreadable file starts out empty; write failures are logged
/// and the in-memory value is still updated.
#[derive(Debug)]
pub struct FilePreferences {
    path: PathBuf,
    values: HashMap<String, String>,
}

impl FilePreferences {
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();

        let values = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!("Ignoring malformed preferences in {}: {}", path.display(), e);
                HashMap::new()
            }),
            Err(e) => {
                debug!("No preferences loaded from {}: {}", path.display(), e);
                HashMap::new()
            }
        };

        Self { path, values }
    }

    fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let contents = serde_json::to_string_pretty(&self.values)?;
        fs::write(&self.path, contents)?;
        Ok(())
    }
}

impl PreferenceStore for FilePreferences {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());

        if let Err(e) = self.save() {
            warn!("Failed to save preferences to {}: {}", self.path.display(), e);
        }
    }
}
