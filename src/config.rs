//! User settings: default interpreter, default run mode, registered
//! script folders. Stored as JSON at `~/.pqrun/config.json` with
//! explicit load/save; the settings value is passed into the resolver
//! rather than read as ambient global state.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Interpreter used when a script declares none.
    #[serde(default = "default_interpreter")]
    pub interpreter_path: String,
    /// Run scripts in a visible terminal by default.
    #[serde(default)]
    pub use_terminal: bool,
    /// Folders scanned for `.py` scripts.
    #[serde(default)]
    pub registered_folders: Vec<String>,
}

fn default_interpreter() -> String {
    if cfg!(target_os = "windows") {
        "python".to_string()
    } else {
        "/usr/bin/python3".to_string()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            interpreter_path: default_interpreter(),
            use_terminal: false,
            registered_folders: Vec::new(),
        }
    }
}

/// Settings file location (~/.pqrun/config.json).
pub fn config_path() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".pqrun").join("config.json"))
        .unwrap_or_else(|| std::env::temp_dir().join("pqrun-config.json"))
}

impl Settings {
    /// Load from the default location, falling back to defaults on any
    /// failure. Never errors; a broken config file must not take the
    /// launcher down.
    pub fn load() -> Settings {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> Settings {
        if !path.exists() {
            info!(path = %path.display(), "Settings file not found, using defaults");
            return Settings::default();
        }

        match std::fs::read_to_string(path) {
            Err(e) => {
                warn!(error = %e, path = %path.display(), "Failed to read settings, using defaults");
                Settings::default()
            }
            Ok(content) => match serde_json::from_str::<Settings>(&content) {
                Ok(settings) => {
                    info!(path = %path.display(), "Loaded settings");
                    settings
                }
                Err(e) => {
                    warn!(error = %e, path = %path.display(), "Failed to parse settings, using defaults");
                    Settings::default()
                }
            },
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&config_path())
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        info!(path = %path.display(), "Saved settings");
        Ok(())
    }

    /// Register a folder. Returns false if it was already present.
    pub fn add_folder(&mut self, folder: &str) -> bool {
        if self.registered_folders.iter().any(|f| f == folder) {
            return false;
        }
        self.registered_folders.push(folder.to_string());
        true
    }

    /// Remove a registered folder by path. Returns false if absent.
    pub fn remove_folder(&mut self, folder: &str) -> bool {
        let before = self.registered_folders.len();
        self.registered_folders.retain(|f| f != folder);
        self.registered_folders.len() != before
    }
}
