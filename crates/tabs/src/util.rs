use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Writes `data` to a temporary sibling, flushes it to disk, then renames it over `path`.
/// An interrupted save therefore leaves either the old file or the new one, never a torn mix.
/// On failure the temporary file is removed again.
/// 先寫入同目錄的暫存檔並同步至磁碟，再改名覆蓋目標，避免中斷時產生半寫入檔案；失敗時會移除暫存檔。
pub fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp_path = temp_sibling(path);
    let result = write_synced(&tmp_path, data).and_then(|()| fs::rename(&tmp_path, path));
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

fn write_synced(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(data)?;
    file.sync_all()
}

/// Copies the current file to `<name>.bak` when it exists.
pub fn backup_existing(path: &Path) -> io::Result<Option<PathBuf>> {
    if !path.exists() {
        return Ok(None);
    }
    let backup = path.with_extension("bak");
    fs::copy(path, &backup)?;
    Ok(Some(backup))
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_atomic_replaces_contents_and_cleans_up() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("tabs.json");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"second");
        assert!(!dir.path().join("nested").join("tabs.json.tmp").exists());
    }

    #[test]
    fn failed_rename_removes_temporary_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tabs.json");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("occupant"), b"keep").unwrap();

        assert!(write_atomic(&path, b"payload").is_err());
        assert!(!dir.path().join("tabs.json.tmp").exists());
        assert_eq!(fs::read(path.join("occupant")).unwrap(), b"keep");
    }

    #[test]
    fn backup_copies_previous_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tabs.json");
        assert!(backup_existing(&path).unwrap().is_none());
        fs::write(&path, b"old").unwrap();
        let backup = backup_existing(&path).unwrap().unwrap();
        assert_eq!(fs::read(backup).unwrap(), b"old");
    }
}
