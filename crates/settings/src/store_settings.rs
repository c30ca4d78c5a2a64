use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tabhierarchy_tabs::{write_atomic, RestorePolicy};
use thiserror::Error;
use tracing::debug;

const SETTINGS_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse settings {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize settings {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write settings {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// How tab snapshots are written and restored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default = "default_version")]
    pub version: u32,
    /// File name of the snapshot, relative to the data directory.
    #[serde(default = "default_snapshot_file")]
    pub snapshot_file: String,
    #[serde(default = "default_true")]
    pub pretty_json: bool,
    #[serde(default = "default_true")]
    pub keep_backup: bool,
    #[serde(default)]
    pub restore_policy: RestorePolicy,
}

fn default_version() -> u32 {
    SETTINGS_VERSION
}

fn default_snapshot_file() -> String {
    "tabs.json".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            snapshot_file: default_snapshot_file(),
            pretty_json: true,
            keep_backup: true,
            restore_policy: RestorePolicy::default(),
        }
    }
}

impl StoreSettings {
    pub fn sanitize(&mut self) {
        if self.version == 0 {
            self.version = SETTINGS_VERSION;
        }
        let trimmed = self.snapshot_file.trim();
        if trimmed.is_empty() || trimmed.contains(['/', '\\']) || trimmed == "." || trimmed == ".."
        {
            self.snapshot_file = default_snapshot_file();
        } else if trimmed.len() != self.snapshot_file.len() {
            self.snapshot_file = trimmed.to_string();
        }
    }

    /// Resolves the snapshot path inside `data_dir`.
    pub fn snapshot_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.snapshot_file)
    }
}

#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    data: StoreSettings,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>, settings: StoreSettings) -> Self {
        Self {
            path: path.into(),
            data: settings,
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            debug!(path = %path.display(), "settings file missing, using defaults");
            let mut data = StoreSettings::default();
            data.sanitize();
            return Ok(Self { path, data });
        }

        let contents = fs::read_to_string(&path).map_err(|source| SettingsError::Read {
            path: path.clone(),
            source,
        })?;
        let mut data: StoreSettings =
            serde_json::from_str(&contents).map_err(|source| SettingsError::Parse {
                path: path.clone(),
                source,
            })?;
        data.sanitize();
        Ok(Self { path, data })
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.data
    }

    pub fn update<F>(&mut self, mut op: F) -> Result<(), SettingsError>
    where
        F: FnMut(&mut StoreSettings),
    {
        op(&mut self.data);
        self.data.sanitize();
        self.save()
    }

    pub fn overwrite(&mut self, settings: StoreSettings) -> Result<(), SettingsError> {
        self.data = settings;
        self.data.sanitize();
        self.save()
    }

    /// Writes the settings through the same atomic writer as tab snapshots.
    /// 以與分頁快照相同的原子寫入方式儲存設定。
    pub fn save(&self) -> Result<(), SettingsError> {
        let payload = serde_json::to_string_pretty(&self.data).map_err(|source| {
            SettingsError::Serialize {
                path: self.path.clone(),
                source,
            }
        })?;

        write_atomic(&self.path, payload.as_bytes()).map_err(|source| SettingsError::Write {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), "saved store settings");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
