use std::fs;
use std::io;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::snapshot::{current_timestamp, TabSnapshot};
use crate::util::{backup_existing, write_atomic};

/// Persists [`TabSnapshot`]s as JSON using atomic writes.
/// 以 JSON 搭配原子寫入方式儲存 [`TabSnapshot`]。
#[derive(Debug)]
pub struct TabSnapshotStore {
    path: PathBuf,
    pretty: bool,
    keep_backup: bool,
}

impl TabSnapshotStore {
    /// Constructs a store bound to `path` (pretty JSON, no backup).
    /// 建立綁定至指定路徑的儲存器。
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            pretty: true,
            keep_backup: false,
        }
    }

    pub fn with_pretty_json(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Copy the previous snapshot to `<file>.bak` before each save.
    pub fn with_backup(mut self, keep_backup: bool) -> Self {
        self.keep_backup = keep_backup;
        self
    }

    /// Returns the backing path used for persistence.
    /// 取得此儲存器使用的檔案路徑。
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads a snapshot from disk, returning `Ok(None)` when the file is absent.
    /// 從磁碟載入快照；若檔案不存在則回傳 `Ok(None)`。
    pub fn load(&self) -> Result<Option<TabSnapshot>, TabStoreError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let snapshot: TabSnapshot = serde_json::from_str(&contents)
                    .map_err(|err| TabStoreError::Invalid(err.to_string()))?;
                info!(
                    path = %self.path.display(),
                    groups = snapshot.groups.len(),
                    "loaded tab snapshot"
                );
                Ok(Some(snapshot))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(TabStoreError::Io(err)),
        }
    }

    /// Saves `snapshot`, stamping `saved_at_unix` when unset.
    /// 儲存快照；若未設定儲存時間則自動補上。
    pub fn save(&self, snapshot: &TabSnapshot) -> Result<(), TabStoreError> {
        let mut payload = snapshot.clone();
        if payload.metadata.saved_at_unix.is_none() {
            payload.metadata.saved_at_unix = Some(current_timestamp());
        }
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(&payload)
        } else {
            serde_json::to_vec(&payload)
        }
        .map_err(|err| TabStoreError::Invalid(err.to_string()))?;

        if self.keep_backup {
            backup_existing(&self.path)?;
        }
        write_atomic(&self.path, &bytes)?;
        info!(
            path = %self.path.display(),
            groups = payload.groups.len(),
            "saved tab snapshot"
        );
        Ok(())
    }
}

/// Errors emitted by [`TabSnapshotStore`].
/// [`TabSnapshotStore`] 可能拋出的錯誤。
#[derive(Debug, Error)]
pub enum TabStoreError {
    #[error("tab snapshot IO error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid tab snapshot payload: {0}")]
    Invalid(String),
}
